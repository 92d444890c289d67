//! Common types used throughout the digit classifier.
//!
//! This module contains the data structures that describe the model's input
//! requirements, the tensors exchanged with the interpreter and the prediction
//! handed back to the caller.

use serde::Serialize;
use std::fmt;

/// Number of digit classes produced by the network.
pub const OUTPUT_CLASSES_COUNT: usize = 10;

/// Size in bytes of one input element (a 32-bit float).
pub const FLOAT_TYPE_SIZE: usize = 4;

/// Number of channels per input pixel (grayscale).
pub const PIXEL_SIZE: usize = 1;

/// Spatial input dimensions declared by the loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InputShape {
    /// Required width of input images in pixels
    pub width: u32,
    /// Required height of input images in pixels
    pub height: u32,
}

impl InputShape {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of f32 values in every input tensor.
    pub fn tensor_len(&self) -> usize {
        self.width as usize * self.height as usize * PIXEL_SIZE
    }

    /// Size in bytes of the input tensor buffer.
    pub fn byte_size(&self) -> usize {
        FLOAT_TYPE_SIZE * self.tensor_len()
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A preprocessed image, ready to be fed to the interpreter.
///
/// Values are row-major, one per pixel, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    shape: InputShape,
    values: Vec<f32>,
}

impl InputTensor {
    pub(crate) fn new(shape: InputShape, values: Vec<f32>) -> Self {
        debug_assert_eq!(values.len(), shape.tensor_len());
        Self { shape, values }
    }

    pub fn shape(&self) -> InputShape {
        self.shape
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// Renders the tensor as a byte buffer in native byte order.
    ///
    /// This is the `byte_size()`-long wire form for runtimes whose input API
    /// takes raw bytes. The tract backend reads `values()` directly.
    pub fn to_ne_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(self.shape.byte_size());
        for value in &self.values {
            buffer.extend_from_slice(&value.to_ne_bytes());
        }
        buffer
    }
}

/// The decoded answer for one classification request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    /// Winning digit class (0 to 9)
    pub class_index: usize,
    /// Raw score of the winning class
    pub confidence: f32,
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Prediction Result: {}\nConfidence: {:.6}",
            self.class_index, self.confidence
        )
    }
}

/// Lifecycle of a classifier service.
///
/// Transitions only move forward, except that a failed initialization returns
/// to `Uninitialized` so it can be retried. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LifecycleState {
    Uninitialized = 0,
    Initializing = 1,
    Ready = 2,
    Closed = 3,
}

impl From<u8> for LifecycleState {
    fn from(value: u8) -> Self {
        match value {
            0 => LifecycleState::Uninitialized,
            1 => LifecycleState::Initializing,
            2 => LifecycleState::Ready,
            _ => LifecycleState::Closed,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::Closed => "closed",
        };
        f.write_str(name)
    }
}
