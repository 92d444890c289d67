//! Image to tensor conversion.
//!
//! The network was trained on drawings that were resized with bilinear
//! smoothing, averaged to grayscale without channel weights and scaled to
//! `[0, 1]`. These steps must be reproduced exactly.

use crate::error::{ClassifierError, Result};
use crate::types::{InputShape, InputTensor};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};

/// Interpolation used when scaling drawings to the model's input size.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Copy the caller's image into an owned RGB buffer, dropping any alpha.
///
/// The returned buffer is what gets moved to the worker, so the caller's image
/// is never referenced after `classify` returns.
pub fn snapshot(image: &DynamicImage) -> Result<RgbImage> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ClassifierError::InvalidInput(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image.to_rgb8())
}

/// Resize, grayscale and normalize `image` into a tensor for `shape`.
pub fn to_input_tensor(image: &RgbImage, shape: InputShape) -> InputTensor {
    let resized = if image.dimensions() == (shape.width, shape.height) {
        image.clone()
    } else {
        imageops::resize(image, shape.width, shape.height, RESIZE_FILTER)
    };

    let mut values = Vec::with_capacity(shape.tensor_len());
    for pixel in resized.pixels() {
        let [r, g, b] = pixel.0;
        let sum = r as u32 + g as u32 + b as u32;
        values.push(sum as f32 / 3.0 / 255.0);
    }

    InputTensor::new(shape, values)
}
