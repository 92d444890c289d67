//! Classifier service.
//!
//! `DigitClassifier` owns the interpreter (through its worker), the lifecycle
//! state machine and the public asynchronous API used by the drawing UI:
//! `initialize` once, `classify` after each stroke, `shutdown` on teardown.

use crate::backends::{BackendConfig, InferenceBackend};
use crate::config::ClassifierConfig;
use crate::decode::decode;
use crate::error::{ClassifierError, Result};
use crate::executor::{Pending, SerialExecutor};
use crate::inference::Interpreter;
use crate::preprocess;
use crate::types::{InputShape, LifecycleState, Prediction};
use image::DynamicImage;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tracing::{debug, info, warn};

type ModelLoader = dyn Fn() -> Result<Interpreter> + Send + Sync;

/// Lifecycle state shared between callers and the worker.
#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
    fn new(state: LifecycleState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn get(&self) -> LifecycleState {
        LifecycleState::from(self.0.load(Ordering::Acquire))
    }

    /// Move from `from` to `to`, or report the state that was found instead.
    fn transition(
        &self,
        from: LifecycleState,
        to: LifecycleState,
    ) -> std::result::Result<(), LifecycleState> {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from)
    }

    /// Enter the terminal state, returning the previous one.
    fn close(&self) -> LifecycleState {
        LifecycleState::from(self.0.swap(LifecycleState::Closed as u8, Ordering::AcqRel))
    }
}

/// Reverts an in-flight initialization unless disarmed, even on panic.
struct InitGuard<'a> {
    state: &'a StateCell,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self
                .state
                .transition(LifecycleState::Initializing, LifecycleState::Uninitialized);
        }
    }
}

/// State owned by the worker thread.
#[derive(Default)]
struct Slot {
    interpreter: Option<Interpreter>,
}

/// Asynchronous handwritten digit classifier.
///
/// All model work happens on a single background worker, so the interpreter
/// is never used from two threads at once. Every entry point returns
/// immediately.
///
/// # Examples
///
/// ```no_run
/// use digit_classifier::{ClassifierConfig, DigitClassifier};
///
/// let classifier = DigitClassifier::new(ClassifierConfig::default()).unwrap();
/// classifier.initialize().unwrap().wait().unwrap();
///
/// let drawing = image::open("drawing.png").unwrap();
/// let prediction = classifier.classify(&drawing).unwrap().wait().unwrap();
/// println!("{prediction}");
///
/// classifier.shutdown().wait().unwrap();
/// ```
pub struct DigitClassifier {
    config: ClassifierConfig,
    loader: Arc<ModelLoader>,
    state: Arc<StateCell>,
    shape: Arc<OnceLock<InputShape>>,
    executor: SerialExecutor<Slot>,
}

impl DigitClassifier {
    /// Create a classifier that loads `config.model_path()` with the
    /// configured backend.
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let backend_config = BackendConfig::from(&config);
        let output_classes = config.output_classes;
        let loader = move || {
            Interpreter::load(backend_config.clone())
                .map(|interpreter| interpreter.with_output_classes(output_classes))
        };
        Self::build(config, Arc::new(loader))
    }

    /// Create a classifier around a custom backend constructor.
    ///
    /// `load` runs on the worker during `initialize`, and again on retry.
    pub fn with_loader<F>(config: ClassifierConfig, load: F) -> Result<Self>
    where
        F: Fn() -> Result<Box<dyn InferenceBackend>> + Send + Sync + 'static,
    {
        config.validate()?;
        let output_classes = config.output_classes;
        let loader = move || {
            let backend = load()?;
            Interpreter::from_backend(backend)
                .map(|interpreter| interpreter.with_output_classes(output_classes))
        };
        Self::build(config, Arc::new(loader))
    }

    fn build(config: ClassifierConfig, loader: Arc<ModelLoader>) -> Result<Self> {
        let executor = SerialExecutor::spawn(&config.worker_name, Slot::default())?;
        Ok(Self {
            config,
            loader,
            state: Arc::new(StateCell::new(LifecycleState::Uninitialized)),
            shape: Arc::new(OnceLock::new()),
            executor,
        })
    }

    /// Load the model in the background.
    ///
    /// Only valid in `Uninitialized`. The returned handle resolves to the
    /// model's input shape once the classifier is `Ready`. If loading fails
    /// the state returns to `Uninitialized` and `initialize` may be retried.
    pub fn initialize(&self) -> Result<Pending<InputShape>> {
        if let Err(current) = self
            .state
            .transition(LifecycleState::Uninitialized, LifecycleState::Initializing)
        {
            return Err(match current {
                LifecycleState::Closed => ClassifierError::Closed,
                other => ClassifierError::InvalidOperation(format!(
                    "initialize called while {other}"
                )),
            });
        }

        let loader = Arc::clone(&self.loader);
        let state = Arc::clone(&self.state);
        let shape = Arc::clone(&self.shape);
        let model = self.config.model_path();

        Ok(self.executor.submit(move |slot: &mut Slot| {
            let mut guard = InitGuard {
                state: &state,
                armed: true,
            };
            let start = Instant::now();

            let interpreter = loader().map_err(|e| {
                warn!("Error setting up digit classifier from {}: {}", model.display(), e);
                e
            })?;
            let input_shape = interpreter.input_shape();
            slot.interpreter = Some(interpreter);
            let _ = shape.set(input_shape);

            if state
                .transition(LifecycleState::Initializing, LifecycleState::Ready)
                .is_err()
            {
                // Shut down while loading; the close job queued behind us
                // will find an empty slot.
                guard.armed = false;
                if let Some(interpreter) = slot.interpreter.take() {
                    interpreter.close();
                }
                return Err(ClassifierError::Closed);
            }
            guard.armed = false;

            info!(
                "Initialized digit classifier ({}, {} byte input) in {}ms",
                input_shape,
                input_shape.byte_size(),
                start.elapsed().as_millis()
            );
            Ok(input_shape)
        }))
    }

    /// Classify a drawing in the background.
    ///
    /// Fails immediately with `NotInitialized` before the classifier is
    /// `Ready`, or `Closed` after shutdown; nothing is scheduled in either
    /// case. The pixels are copied before returning, so `image` is not
    /// borrowed past this call.
    pub fn classify(&self, image: &DynamicImage) -> Result<Pending<Prediction>> {
        match self.state.get() {
            LifecycleState::Ready => {}
            LifecycleState::Closed => return Err(ClassifierError::Closed),
            LifecycleState::Uninitialized | LifecycleState::Initializing => {
                return Err(ClassifierError::NotInitialized)
            }
        }

        let pixels = preprocess::snapshot(image)?;

        Ok(self.executor.submit(move |slot: &mut Slot| {
            let interpreter = slot
                .interpreter
                .as_mut()
                .ok_or(ClassifierError::Closed)?;

            let start = Instant::now();
            let tensor = preprocess::to_input_tensor(&pixels, interpreter.input_shape());
            debug!("Preprocessing time = {}ms", start.elapsed().as_millis());

            let start = Instant::now();
            let output = interpreter.run(&tensor)?;
            debug!("Inference time = {}ms", start.elapsed().as_millis());

            decode(&output)
        }))
    }

    /// Release the model in the background and refuse further work.
    ///
    /// Calling it again is a no-op that resolves immediately.
    pub fn shutdown(&self) -> Pending<()> {
        let previous = self.state.close();
        if previous == LifecycleState::Closed {
            debug!("Digit classifier already closed");
            return Pending::ready(Ok(()));
        }

        self.executor.submit(|slot: &mut Slot| {
            if let Some(interpreter) = slot.interpreter.take() {
                interpreter.close();
            }
            Ok(())
        })
    }

    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LifecycleState::Ready
    }

    /// Input shape reported by the model, once it has been loaded.
    pub fn input_shape(&self) -> Option<InputShape> {
        self.shape.get().copied()
    }

    /// Size in bytes of every input tensor, once the model has been loaded.
    pub fn input_byte_size(&self) -> Option<usize> {
        self.input_shape().map(|shape| shape.byte_size())
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

impl Drop for DigitClassifier {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

impl std::fmt::Debug for DigitClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitClassifier")
            .field("state", &self.state())
            .field("input_shape", &self.input_shape())
            .field("model", &self.config.model_path())
            .finish()
    }
}
