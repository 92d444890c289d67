//! Output tensor decoding.

use crate::error::{ClassifierError, Result};
use crate::types::Prediction;

/// Pick the highest scoring class.
///
/// Ties go to the lowest index. NaN scores never win against a number.
pub fn decode(output: &[f32]) -> Result<Prediction> {
    let mut best: Option<(usize, f32)> = None;
    for (index, &score) in output.iter().enumerate() {
        let replace = match best {
            None => true,
            Some((_, best_score)) => {
                score > best_score || (best_score.is_nan() && !score.is_nan())
            }
        };
        if replace {
            best = Some((index, score));
        }
    }

    let (class_index, confidence) = best
        .ok_or_else(|| ClassifierError::InvalidOutput("output tensor is empty".to_string()))?;

    Ok(Prediction {
        class_index,
        confidence,
    })
}
