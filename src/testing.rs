//! Deterministic in-process backends for tests.

use crate::backends::InferenceBackend;
use crate::error::Result;
use crate::types::{InputShape, OUTPUT_CLASSES_COUNT};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Invocation counters shared between a test and its backend.
#[derive(Debug, Default, Clone)]
pub struct Calls {
    pub runs: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    pub loads: Arc<AtomicUsize>,
}

impl Calls {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

/// Scores class `k` by how close the mean brightness is to `k / 9`.
///
/// A black image therefore always predicts 0 and a white one 9, both with a
/// score of exactly `0.0`.
pub struct BrightnessBackend {
    shape: InputShape,
    calls: Calls,
    delay: Duration,
}

impl BrightnessBackend {
    pub fn new(shape: InputShape, calls: Calls) -> Self {
        Self {
            shape,
            calls,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

impl InferenceBackend for BrightnessBackend {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn run(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.calls.runs.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }

        let mean = input.iter().sum::<f32>() / input.len() as f32;
        let level = mean * 9.0;
        Ok((0..OUTPUT_CLASSES_COUNT)
            .map(|k| {
                let distance = level - k as f32;
                0.0 - distance * distance
            })
            .collect())
    }

    fn close(&mut self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Returns a fixed output regardless of input.
pub struct FixedBackend {
    pub shape: InputShape,
    pub output: Vec<f32>,
}

impl InferenceBackend for FixedBackend {
    fn input_shape(&self) -> InputShape {
        self.shape
    }

    fn run(&mut self, _input: &[f32]) -> Result<Vec<f32>> {
        Ok(self.output.clone())
    }
}

/// Tiny ONNX graphs written to disk for exercising the tract backend.
#[cfg(feature = "tract")]
pub mod onnx {
    use prost::Message;
    use std::path::Path;
    use tract_onnx::pb;
    use tract_onnx::pb::tensor_shape_proto::dimension::Value as DimValue;

    /// Number of pixels the linear layer expects.
    pub const FEATURES: usize = 28 * 28;

    /// One dimension of the graph input.
    pub enum Dim {
        Fixed(i64),
        Symbolic(&'static str),
    }

    fn tensor_type(dims: Option<&[Dim]>) -> pb::TypeProto {
        let shape = dims.map(|dims| pb::TensorShapeProto {
            dim: dims
                .iter()
                .map(|dim| pb::tensor_shape_proto::Dimension {
                    value: Some(match dim {
                        Dim::Fixed(value) => DimValue::DimValue(*value),
                        Dim::Symbolic(name) => DimValue::DimParam(name.to_string()),
                    }),
                    ..Default::default()
                })
                .collect(),
        });
        pb::TypeProto {
            value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                elem_type: pb::tensor_proto::DataType::Float as i32,
                shape,
            })),
            ..Default::default()
        }
    }

    fn initializer(name: &str, dims: Vec<i64>, values: Vec<f32>) -> pb::TensorProto {
        pb::TensorProto {
            name: name.to_string(),
            dims,
            data_type: pb::tensor_proto::DataType::Float as i32,
            float_data: values,
            ..Default::default()
        }
    }

    fn node(op_type: &str, inputs: &[&str], output: &str) -> pb::NodeProto {
        pb::NodeProto {
            name: output.to_string(),
            op_type: op_type.to_string(),
            input: inputs.iter().map(|s| s.to_string()).collect(),
            output: vec![output.to_string()],
            ..Default::default()
        }
    }

    /// Writes a single linear layer `y = flatten(x) · W + b` to `path`.
    ///
    /// Every weight of class `k` is `k / FEATURES` and its bias is `-k / 2`,
    /// so an all-zero input scores `-k / 2` (class 0 wins with `0.0`) and an
    /// all-one input scores about `k / 2` (class 9 wins with `4.5`).
    pub fn write_linear_model(path: &Path, input: &[Dim]) -> std::io::Result<()> {
        let classes = crate::types::OUTPUT_CLASSES_COUNT;
        let weights = (0..FEATURES)
            .flat_map(|_| (0..classes).map(|k| k as f32 / FEATURES as f32))
            .collect();
        let bias = (0..classes).map(|k| 0.0 - k as f32 / 2.0).collect();

        let mut nodes = Vec::new();
        let flat = if input.len() > 2 {
            nodes.push(node("Flatten", &["x"], "flat"));
            "flat"
        } else {
            "x"
        };
        nodes.push(node("MatMul", &[flat, "w"], "logits"));
        nodes.push(node("Add", &["logits", "b"], "y"));

        let graph = pb::GraphProto {
            name: "linear".to_string(),
            node: nodes,
            initializer: vec![
                initializer("w", vec![FEATURES as i64, classes as i64], weights),
                initializer("b", vec![classes as i64], bias),
            ],
            input: vec![pb::ValueInfoProto {
                name: "x".to_string(),
                r#type: Some(tensor_type(Some(input))),
                ..Default::default()
            }],
            output: vec![pb::ValueInfoProto {
                name: "y".to_string(),
                r#type: Some(tensor_type(None)),
                ..Default::default()
            }],
            ..Default::default()
        };
        let model = pb::ModelProto {
            ir_version: 7,
            opset_import: vec![pb::OperatorSetIdProto {
                domain: String::new(),
                version: 13,
            }],
            graph: Some(graph),
            ..Default::default()
        };

        std::fs::write(path, model.encode_to_vec())
    }
}
