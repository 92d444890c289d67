//! On-device handwritten digit classification.
//!
//! A [`DigitClassifier`] loads a small pre-trained network on a background
//! worker, turns drawings into normalized grayscale tensors, runs the network
//! and reports the most likely digit with its score.

mod artifact;
pub mod backends;
mod classifier;
pub mod config;
mod decode;
mod error;
pub mod executor;
pub mod inference;
pub mod preprocess;
pub mod types;

pub use artifact::ModelArtifact;
pub use backends::{BackendConfig, InferenceBackend};
pub use classifier::DigitClassifier;
pub use config::ClassifierConfig;
pub use decode::decode;
pub use error::{ClassifierError, Result};
pub use executor::Pending;
pub use inference::Interpreter;
pub use types::{InputShape, InputTensor, LifecycleState, Prediction};

#[cfg(test)]
mod testing;
