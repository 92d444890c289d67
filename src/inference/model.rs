use crate::backends::{create_backend, BackendConfig, InferenceBackend};
use crate::error::{ClassifierError, Result};
use crate::types::{InputShape, InputTensor, OUTPUT_CLASSES_COUNT};
use tracing::info;

/// Interpreter handle bound to one loaded model.
///
/// The handle is stateful and not reentrant; every method that touches the
/// runtime takes `&mut self`. `close` consumes it, so a closed interpreter
/// cannot be run again.
pub struct Interpreter {
    backend: Box<dyn InferenceBackend>,
    shape: InputShape,
    output_classes: usize,
}

impl Interpreter {
    /// Load a model through the configured backend.
    ///
    /// This performs blocking I/O and graph construction. Only call it from
    /// the classifier's worker.
    pub fn load(config: BackendConfig) -> Result<Self> {
        let backend = create_backend(config)?;
        Self::from_backend(backend)
    }

    /// Wrap an already constructed backend.
    pub fn from_backend(backend: Box<dyn InferenceBackend>) -> Result<Self> {
        let shape = backend.input_shape();
        if shape.width == 0 || shape.height == 0 {
            return Err(ClassifierError::invalid_model(format!(
                "model declares an empty input ({shape})"
            )));
        }
        info!("Initialized interpreter with input shape {}", shape);

        Ok(Self {
            backend,
            shape,
            output_classes: OUTPUT_CLASSES_COUNT,
        })
    }

    /// Expect `classes` scores from every forward pass.
    pub fn with_output_classes(mut self, classes: usize) -> Self {
        self.output_classes = classes;
        self
    }

    pub fn input_shape(&self) -> InputShape {
        self.shape
    }

    /// Run one forward pass.
    ///
    /// # Panics
    ///
    /// Panics if the tensor was built for a different shape than the model's.
    /// That is a programming error in the caller.
    pub fn run(&mut self, input: &InputTensor) -> Result<Vec<f32>> {
        assert_eq!(
            input.values().len(),
            self.shape.tensor_len(),
            "input tensor has {} values, model {} expects {}",
            input.values().len(),
            self.shape,
            self.shape.tensor_len()
        );

        let output = self.backend.run(input.values())?;
        if output.len() != self.output_classes {
            return Err(ClassifierError::InvalidOutput(format!(
                "expected {} scores, got {}",
                self.output_classes,
                output.len()
            )));
        }
        Ok(output)
    }

    /// Release the backend and the model it holds.
    pub fn close(mut self) {
        self.backend.close();
        info!("Closed interpreter.");
    }
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("backend", &"<backend>")
            .field("shape", &self.shape)
            .field("output_classes", &self.output_classes)
            .finish()
    }
}
