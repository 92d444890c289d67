//! Tract backend implementation
//!
//! This module runs ONNX digit networks with the pure Rust `tract-onnx`
//! runtime. The model bytes come from a memory-mapped `ModelArtifact`.

use super::{image_shape_from_dims, pinned_dims, InferenceBackend};
use crate::artifact::ModelArtifact;
use crate::error::{ClassifierError, Result};
use crate::types::InputShape;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;
use tract_onnx::prelude::*;

type Plan = TypedSimplePlan<TypedModel>;

/// Tract backend holding an optimized execution plan
pub struct TractBackend {
    /// Execution plan built from the model graph
    plan: Option<Plan>,
    /// Concrete dimensions of the first input, batch pinned to 1
    input_dims: Vec<usize>,
    /// Spatial view of `input_dims`
    shape: InputShape,
    /// Mapped model file, held until the backend is closed
    artifact: Option<ModelArtifact>,
}

impl TractBackend {
    /// Map the model at `path` and build an execution plan for it.
    pub fn load(path: &Path, optimize: bool) -> Result<Self> {
        let artifact = ModelArtifact::open(path)?;
        let mut backend = Self::from_artifact(&artifact, optimize)?;
        backend.artifact = Some(artifact);
        Ok(backend)
    }

    /// Build an execution plan from an already mapped artifact.
    pub fn from_artifact(artifact: &ModelArtifact, optimize: bool) -> Result<Self> {
        let mut reader = Cursor::new(artifact.as_bytes());
        let model = tract_onnx::onnx()
            .model_for_read(&mut reader)
            .map_err(|e| ClassifierError::invalid_model(format!("{e:#}")))?;

        let declared = Self::declared_input_dims(&model)?;
        let shape = image_shape_from_dims(&declared)?;
        let input_dims = pinned_dims(&declared);
        debug!(
            "Model {} declares input {:?}, running with {:?} ({})",
            artifact.path().display(),
            declared,
            input_dims,
            shape
        );

        let model = model
            .with_input_fact(0, f32::fact(input_dims.clone()).into())
            .map_err(|e| ClassifierError::invalid_model(format!("{e:#}")))?;
        let typed = if optimize {
            model.into_optimized()
        } else {
            model.into_typed().and_then(|m| m.into_decluttered())
        }
        .map_err(|e| ClassifierError::invalid_model(format!("{e:#}")))?;
        let plan = typed
            .into_runnable()
            .map_err(|e| ClassifierError::invalid_model(format!("{e:#}")))?;

        Ok(Self {
            plan: Some(plan),
            input_dims,
            shape,
            artifact: None,
        })
    }

    /// Read the first input's dimensions; symbolic ones come back as `None`.
    fn declared_input_dims(model: &InferenceModel) -> Result<Vec<Option<usize>>> {
        let typed = model
            .clone()
            .into_typed()
            .map_err(|e| ClassifierError::invalid_model(format!("{e:#}")))?;
        let fact = typed
            .input_fact(0)
            .map_err(|e| ClassifierError::invalid_model(format!("{e:#}")))?;
        Ok(fact
            .shape
            .iter()
            .map(|dim| dim.as_i64().and_then(|d| usize::try_from(d).ok()))
            .collect())
    }
}

impl InferenceBackend for TractBackend {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        let plan = self
            .plan
            .as_ref()
            .ok_or_else(|| ClassifierError::PreconditionViolation("run after close".to_string()))?;

        let tensor = Tensor::from_shape(&self.input_dims, input)
            .map_err(|e| ClassifierError::execution(format!("{e:#}")))?;
        let outputs = plan
            .run(tvec!(tensor.into()))
            .map_err(|e| ClassifierError::execution(format!("{e:#}")))?;
        let output = outputs
            .first()
            .ok_or_else(|| ClassifierError::InvalidOutput("model produced no outputs".to_string()))?;
        let scores = output
            .to_array_view::<f32>()
            .map_err(|e| ClassifierError::InvalidOutput(format!("{e:#}")))?;

        Ok(scores.iter().copied().collect())
    }

    fn close(&mut self) {
        self.plan = None;
        if let Some(artifact) = self.artifact.take() {
            debug!("Released model {}", artifact.path().display());
        }
    }
}
