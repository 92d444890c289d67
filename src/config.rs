//! Configuration for the classifier service.

use crate::error::{ClassifierError, Result};
use crate::types::OUTPUT_CLASSES_COUNT;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Runtime used to execute the model graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Pure Rust ONNX runtime
    #[default]
    Tract,
}

/// Top-level classifier configuration.
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Directory holding the bundled model resources
    pub model_dir: PathBuf,
    /// Name of the model resource inside `model_dir`
    pub model_file: String,
    /// Inference runtime
    pub backend: BackendKind,
    /// Let the runtime optimize the graph before running it
    pub optimize: bool,
    /// Width of the model's output tensor, at most one score per digit
    pub output_classes: usize,
    /// Name given to the background worker thread
    pub worker_name: String,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("assets"),
            model_file: "mnist.onnx".to_string(),
            backend: BackendKind::default(),
            optimize: true,
            output_classes: OUTPUT_CLASSES_COUNT,
            worker_name: "digit-classifier".to_string(),
        }
    }
}

impl ClassifierConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Point the config at a single model file, splitting it into directory
    /// and resource name.
    pub fn with_model_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        let path = path.as_ref();
        self.model_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        self.model_file = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        self
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    /// Full path of the model resource.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn validate(&self) -> Result<()> {
        if self.model_file.trim().is_empty() {
            return Err(ClassifierError::Config(
                "model_file must not be empty".to_string(),
            ));
        }
        if self.output_classes == 0 {
            return Err(ClassifierError::Config(
                "output_classes must be greater than zero".to_string(),
            ));
        }
        if self.output_classes > OUTPUT_CLASSES_COUNT {
            return Err(ClassifierError::Config(format!(
                "output_classes must be at most {OUTPUT_CLASSES_COUNT}, got {}",
                self.output_classes
            )));
        }
        Ok(())
    }
}
