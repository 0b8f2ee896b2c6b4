//! Graph tracing
//!
//! Running a network through [`crate::nets::Network::forward_traced`]
//! produces a [`GraphTrace`]: the ordered list of operations the forward
//! pass executed, with concrete tensor shapes. The converter inspects the
//! trace to decide whether a target representation supports every
//! operation, and the trace is embedded in the bundle manifest so the
//! consuming app can see what it is loading.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Operation kinds that can appear in a trace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpKind {
    Conv,
    ConvTranspose,
    BatchNorm,
    Relu,
    Sigmoid,
    Tanh,
    MaxPool,
    Upsample,
    PixelShuffle,
    Affine,
    Add,
    Clamp,
    Luma,
}

impl OpKind {
    /// Stable snake_case name, matching the serialized form
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Conv => "conv",
            OpKind::ConvTranspose => "conv_transpose",
            OpKind::BatchNorm => "batch_norm",
            OpKind::Relu => "relu",
            OpKind::Sigmoid => "sigmoid",
            OpKind::Tanh => "tanh",
            OpKind::MaxPool => "max_pool",
            OpKind::Upsample => "upsample",
            OpKind::PixelShuffle => "pixel_shuffle",
            OpKind::Affine => "affine",
            OpKind::Add => "add",
            OpKind::Clamp => "clamp",
            OpKind::Luma => "luma",
        }
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracedOp {
    /// Stage name within the network, e.g. "conv1" or "dec2.bn"
    pub name: String,
    pub kind: OpKind,
    /// Shapes of the input tensors (more than one for skip additions)
    pub inputs: Vec<Vec<usize>>,
    /// Shape of the output tensor
    pub output: Vec<usize>,
    /// Numeric attributes: kernel, stride, padding, factor, mul, ...
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, f64>,
}

/// Complete trace of one forward pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphTrace {
    pub input_shape: Vec<usize>,
    pub output_shape: Vec<usize>,
    pub ops: Vec<TracedOp>,
}

impl GraphTrace {
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Whether any recorded operation is of the given kind
    #[must_use]
    pub fn contains(&self, kind: OpKind) -> bool {
        self.ops.iter().any(|op| op.kind == kind)
    }

    /// Distinct operation kinds, in first-seen order
    pub fn kinds(&self) -> Vec<OpKind> {
        let mut seen = Vec::new();
        for op in &self.ops {
            if !seen.contains(&op.kind) {
                seen.push(op.kind);
            }
        }
        seen
    }
}

/// Accumulates operations while a forward pass runs
#[derive(Debug, Default)]
pub struct Tape {
    ops: Vec<TracedOp>,
}

impl Tape {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    /// Record one operation with its observed shapes
    pub fn record(
        &mut self,
        name: impl Into<String>,
        kind: OpKind,
        inputs: Vec<Vec<usize>>,
        output: Vec<usize>,
        attrs: &[(&str, f64)],
    ) {
        self.ops.push(TracedOp {
            name: name.into(),
            kind,
            inputs,
            output,
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        });
    }

    /// Close the tape into an immutable trace
    pub fn finish(self, input_shape: Vec<usize>, output_shape: Vec<usize>) -> GraphTrace {
        GraphTrace {
            input_shape,
            output_shape,
            ops: self.ops,
        }
    }
}
