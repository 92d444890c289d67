//! Backend abstraction for model execution
//!
//! This module provides a trait-based abstraction over the runtime that
//! executes the digit network:
//!
//! - **Tract Backend**: pure Rust execution of ONNX graphs through `tract-onnx`
//!
//! New runtimes are added by implementing the `InferenceBackend` trait and
//! extending `BackendConfig`.

use crate::config::{BackendKind, ClassifierConfig};
use crate::error::{ClassifierError, Result};
use crate::types::InputShape;
use std::path::PathBuf;

/// Configuration for different backend types
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Tract ONNX runtime
    Tract {
        /// Path to the model file
        path: PathBuf,
        /// Optimize the graph before building the execution plan
        optimize: bool,
    },
}

impl From<&ClassifierConfig> for BackendConfig {
    fn from(config: &ClassifierConfig) -> Self {
        match config.backend {
            BackendKind::Tract => BackendConfig::Tract {
                path: config.model_path(),
                optimize: config.optimize,
            },
        }
    }
}

/// Trait for inference backends
///
/// A backend is a stateful interpreter bound to one model. It is not
/// reentrant: `run` takes `&mut self`, and the owner must never share it
/// between threads without serializing access.
pub trait InferenceBackend: Send {
    /// Spatial input dimensions declared by the model's first input.
    fn input_shape(&self) -> InputShape;

    /// Run one forward pass over a row-major grayscale tensor.
    ///
    /// `input.len()` is always `input_shape().tensor_len()`.
    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>>;

    /// Release runtime resources. Called exactly once, before drop.
    fn close(&mut self) {}
}

#[cfg(feature = "tract")]
pub mod tract;

/// Factory function to create the appropriate backend
pub fn create_backend(config: BackendConfig) -> Result<Box<dyn InferenceBackend>> {
    match config {
        #[cfg(feature = "tract")]
        BackendConfig::Tract { path, optimize } => {
            use self::tract::TractBackend;
            Ok(Box::new(TractBackend::load(&path, optimize)?))
        }
        #[cfg(not(feature = "tract"))]
        BackendConfig::Tract { .. } => Err(ClassifierError::InvalidOperation(
            "Tract backend not enabled. Enable the 'tract' feature.".to_string(),
        )),
    }
}

/// Map a model's declared input dimensions to a single-channel image shape.
///
/// `None` marks a dimension that is symbolic in the graph. Only the leading
/// batch axis may be symbolic; it is pinned to 1 by the backend. Accepted
/// layouts are `[N,H,W,1]`, `[N,1,H,W]`, `[N,H,W]` and the flattened
/// `[N,K]`, where `K` must be a perfect square and is read as a `√K×√K`
/// row-major image.
pub fn image_shape_from_dims(dims: &[Option<usize>]) -> Result<InputShape> {
    if dims.iter().skip(1).any(Option::is_none) {
        return Err(ClassifierError::invalid_model(format!(
            "only the batch dimension may be symbolic, got {}",
            format_dims(dims)
        )));
    }

    let (width, height) = match *dims {
        [_, Some(height), Some(width), Some(1)] => (width, height),
        [_, Some(1), Some(height), Some(width)] => (width, height),
        [_, _, _, Some(channels)] => {
            return Err(ClassifierError::invalid_model(format!(
                "expected a single-channel image input, got {channels} channels in {}",
                format_dims(dims)
            )))
        }
        [_, Some(height), Some(width)] => (width, height),
        [_, Some(len)] => {
            let side = (len as f64).sqrt().round() as usize;
            if side * side != len {
                return Err(ClassifierError::invalid_model(format!(
                    "flattened input of {len} values is not a square image"
                )));
            }
            (side, side)
        }
        _ => {
            return Err(ClassifierError::invalid_model(format!(
                "unsupported input rank {} ({})",
                dims.len(),
                format_dims(dims)
            )))
        }
    };

    if width < 2 || height < 2 {
        return Err(ClassifierError::invalid_model(format!(
            "input must be at least 2x2, got {}",
            format_dims(dims)
        )));
    }

    let width = u32::try_from(width)
        .map_err(|_| ClassifierError::invalid_model(format!("input too wide: {width}")))?;
    let height = u32::try_from(height)
        .map_err(|_| ClassifierError::invalid_model(format!("input too tall: {height}")))?;

    Ok(InputShape::new(width, height))
}

/// Concrete dimensions to feed the model, with a symbolic batch pinned to 1.
pub fn pinned_dims(dims: &[Option<usize>]) -> Vec<usize> {
    dims.iter().map(|dim| dim.unwrap_or(1)).collect()
}

fn format_dims(dims: &[Option<usize>]) -> String {
    let parts: Vec<String> = dims
        .iter()
        .map(|dim| match dim {
            Some(value) => value.to_string(),
            None => "?".to_string(),
        })
        .collect();
    format!("[{}]", parts.join(","))
}
