//! Transform stages
//!
//! Every network in this crate is an ordered composition of [`Stage`]
//! values. A stage knows how to apply itself to a tensor and how to
//! describe itself on the trace tape, so the graph a bundle ships with is
//! exactly the sequence of stages the forward pass ran.

use candle_core::{Module, Result, Tensor};
use candle_nn::{
    batch_norm, conv2d, conv_transpose2d, BatchNorm, BatchNormConfig, Conv2d, Conv2dConfig,
    ConvTranspose2d, ConvTranspose2dConfig, ModuleT, VarBuilder,
};

use crate::trace::{OpKind, Tape};

/// A single transform in a network graph
pub enum Stage {
    Conv {
        layer: Conv2d,
        kernel: usize,
        stride: usize,
        padding: usize,
    },
    ConvT {
        layer: ConvTranspose2d,
        kernel: usize,
        stride: usize,
        padding: usize,
        output_padding: usize,
    },
    Norm {
        layer: BatchNorm,
        features: usize,
    },
    Relu,
    Sigmoid,
    Tanh,
    MaxPool {
        kernel: usize,
    },
    Upsample {
        factor: usize,
    },
    PixelShuffle {
        factor: usize,
    },
    /// Elementwise `x * mul + add`, used for in-graph pixel scaling
    Affine {
        mul: f64,
        add: f64,
    },
    Clamp {
        min: f64,
        max: f64,
    },
}

impl Stage {
    pub fn conv(
        vb: VarBuilder,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Result<Self> {
        let cfg = Conv2dConfig {
            padding,
            stride,
            ..Default::default()
        };
        Ok(Stage::Conv {
            layer: conv2d(in_channels, out_channels, kernel, cfg, vb)?,
            kernel,
            stride,
            padding,
        })
    }

    #[allow(clippy::too_many_arguments)]
    pub fn conv_t(
        vb: VarBuilder,
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
        output_padding: usize,
    ) -> Result<Self> {
        let cfg = ConvTranspose2dConfig {
            padding,
            output_padding,
            stride,
            ..Default::default()
        };
        Ok(Stage::ConvT {
            layer: conv_transpose2d(in_channels, out_channels, kernel, cfg, vb)?,
            kernel,
            stride,
            padding,
            output_padding,
        })
    }

    pub fn norm(vb: VarBuilder, features: usize) -> Result<Self> {
        Ok(Stage::Norm {
            layer: batch_norm(features, BatchNormConfig::default(), vb)?,
            features,
        })
    }

    pub fn max_pool(kernel: usize) -> Self {
        Stage::MaxPool { kernel }
    }

    pub fn upsample(factor: usize) -> Self {
        Stage::Upsample { factor }
    }

    pub fn pixel_shuffle(factor: usize) -> Self {
        Stage::PixelShuffle { factor }
    }

    pub fn scale(mul: f64, add: f64) -> Self {
        Stage::Affine { mul, add }
    }

    pub fn clamp(min: f64, max: f64) -> Self {
        Stage::Clamp { min, max }
    }

    /// The op kind this stage records on the tape
    pub fn kind(&self) -> OpKind {
        match self {
            Stage::Conv { .. } => OpKind::Conv,
            Stage::ConvT { .. } => OpKind::ConvTranspose,
            Stage::Norm { .. } => OpKind::BatchNorm,
            Stage::Relu => OpKind::Relu,
            Stage::Sigmoid => OpKind::Sigmoid,
            Stage::Tanh => OpKind::Tanh,
            Stage::MaxPool { .. } => OpKind::MaxPool,
            Stage::Upsample { .. } => OpKind::Upsample,
            Stage::PixelShuffle { .. } => OpKind::PixelShuffle,
            Stage::Affine { .. } => OpKind::Affine,
            Stage::Clamp { .. } => OpKind::Clamp,
        }
    }

    fn attrs(&self) -> Vec<(&'static str, f64)> {
        match self {
            Stage::Conv {
                kernel,
                stride,
                padding,
                ..
            } => vec![
                ("kernel", *kernel as f64),
                ("stride", *stride as f64),
                ("padding", *padding as f64),
            ],
            Stage::ConvT {
                kernel,
                stride,
                padding,
                output_padding,
                ..
            } => vec![
                ("kernel", *kernel as f64),
                ("stride", *stride as f64),
                ("padding", *padding as f64),
                ("output_padding", *output_padding as f64),
            ],
            Stage::Norm { features, .. } => vec![("features", *features as f64)],
            Stage::MaxPool { kernel } => vec![("kernel", *kernel as f64)],
            Stage::Upsample { factor } | Stage::PixelShuffle { factor } => {
                vec![("factor", *factor as f64)]
            }
            Stage::Affine { mul, add } => vec![("mul", *mul), ("add", *add)],
            Stage::Clamp { min, max } => vec![("min", *min), ("max", *max)],
            Stage::Relu | Stage::Sigmoid | Stage::Tanh => Vec::new(),
        }
    }

    /// Apply the stage and record it on the tape
    pub fn apply(&self, name: &str, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        let input = xs.dims().to_vec();
        let out = match self {
            Stage::Conv { layer, .. } => layer.forward(xs)?,
            Stage::ConvT { layer, .. } => layer.forward(xs)?,
            // Batch norm always runs in eval mode here; nothing trains
            Stage::Norm { layer, .. } => layer.forward_t(xs, false)?,
            Stage::Relu => xs.relu()?,
            Stage::Sigmoid => candle_nn::ops::sigmoid(xs)?,
            Stage::Tanh => xs.tanh()?,
            Stage::MaxPool { kernel } => xs.max_pool2d(*kernel)?,
            Stage::Upsample { factor } => {
                let (_, _, h, w) = xs.dims4()?;
                xs.upsample_nearest2d(h * factor, w * factor)?
            }
            Stage::PixelShuffle { factor } => candle_nn::ops::pixel_shuffle(xs, *factor)?,
            Stage::Affine { mul, add } => xs.affine(*mul, *add)?,
            Stage::Clamp { min, max } => xs.clamp(*min as f32, *max as f32)?,
        };
        tape.record(name, self.kind(), vec![input], out.dims().to_vec(), &self.attrs());
        Ok(out)
    }
}

/// A named, ordered run of stages
///
/// Stage names are namespaced under the sequence prefix so trace entries
/// line up with the weight paths in the var map.
pub struct StageSeq {
    prefix: String,
    stages: Vec<(String, Stage)>,
}

impl StageSeq {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            stages: Vec::new(),
        }
    }

    pub fn push(&mut self, name: &str, stage: Stage) {
        self.stages.push((name.to_string(), stage));
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn apply(&self, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        let mut xs = xs.clone();
        for (name, stage) in &self.stages {
            xs = stage.apply(&format!("{}.{}", self.prefix, name), &xs, tape)?;
        }
        Ok(xs)
    }
}

/// Residual addition, recorded as a two-input op
pub fn skip_add(name: &str, a: &Tensor, b: &Tensor, tape: &mut Tape) -> Result<Tensor> {
    let out = (a + b)?;
    tape.record(
        name,
        OpKind::Add,
        vec![a.dims().to_vec(), b.dims().to_vec()],
        out.dims().to_vec(),
        &[],
    );
    Ok(out)
}

/// Reduce an RGB tensor to single-channel luma with the usual weights
pub fn luma(name: &str, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
    let r = xs.narrow(1, 0, 1)?;
    let g = xs.narrow(1, 1, 1)?;
    let b = xs.narrow(1, 2, 1)?;
    let out = (((&r * 0.299)? + (&g * 0.587)?)? + (&b * 0.114)?)?;
    tape.record(
        name,
        OpKind::Luma,
        vec![xs.dims().to_vec()],
        out.dims().to_vec(),
        &[("r", 0.299), ("g", 0.587), ("b", 0.114)],
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn test_vb(varmap: &VarMap) -> VarBuilder {
        VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu)
    }

    #[test]
    fn test_conv_stage_shape_and_trace() {
        let varmap = VarMap::new();
        let stage = Stage::conv(test_vb(&varmap).pp("c"), 3, 8, 3, 1, 1).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (1, 3, 16, 16), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = stage.apply("c", &xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 8, 16, 16]);
        let trace = tape.finish(xs.dims().to_vec(), out.dims().to_vec());
        assert_eq!(trace.ops[0].kind, OpKind::Conv);
        assert_eq!(trace.ops[0].attrs["kernel"], 3.0);
    }

    #[test]
    fn test_strided_conv_halves_spatial_dims() {
        let varmap = VarMap::new();
        let stage = Stage::conv(test_vb(&varmap).pp("down"), 4, 8, 3, 2, 1).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (1, 4, 32, 32), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = stage.apply("down", &xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 8, 16, 16]);
    }

    #[test]
    fn test_conv_transpose_doubles_spatial_dims() {
        let varmap = VarMap::new();
        let stage = Stage::conv_t(test_vb(&varmap).pp("up"), 8, 4, 3, 2, 1, 1).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (1, 8, 16, 16), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = stage.apply("up", &xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 4, 32, 32]);
    }

    #[test]
    fn test_pool_and_upsample_invert_each_other() {
        let xs = Tensor::randn(0f32, 1f32, (1, 2, 16, 16), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let pooled = Stage::max_pool(2).apply("pool", &xs, &mut tape).unwrap();
        assert_eq!(pooled.dims(), &[1, 2, 8, 8]);
        let up = Stage::upsample(2).apply("up", &pooled, &mut tape).unwrap();
        assert_eq!(up.dims(), &[1, 2, 16, 16]);
    }

    #[test]
    fn test_pixel_shuffle_moves_channels_to_space() {
        let xs = Tensor::randn(0f32, 1f32, (1, 12, 8, 8), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = Stage::pixel_shuffle(2).apply("ps", &xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 3, 16, 16]);
        assert_eq!(tape.finish(vec![], vec![]).ops[0].kind, OpKind::PixelShuffle);
    }

    #[test]
    fn test_affine_and_clamp_values() {
        let xs = Tensor::full(0.5f32, (1, 1, 2, 2), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let scaled = Stage::scale(2.0, -1.0).apply("s", &xs, &mut tape).unwrap();
        let v = scaled.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(v.iter().all(|&x| (x - 0.0).abs() < 1e-6));
        let clamped = Stage::clamp(0.25, 1.0).apply("c", &scaled, &mut tape).unwrap();
        let v = clamped.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(v.iter().all(|&x| (x - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_luma_reduces_to_one_channel() {
        let xs = Tensor::full(1.0f32, (1, 3, 4, 4), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = luma("gray", &xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 1, 4, 4]);
        // 0.299 + 0.587 + 0.114 = 1.0
        let v = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(v.iter().all(|&x| (x - 1.0).abs() < 1e-5));
    }

    #[test]
    fn test_skip_add_records_both_inputs() {
        let a = Tensor::full(1.0f32, (1, 2, 4, 4), &Device::Cpu).unwrap();
        let b = Tensor::full(2.0f32, (1, 2, 4, 4), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = skip_add("skip", &a, &b, &mut tape).unwrap();
        let v = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(v.iter().all(|&x| (x - 3.0).abs() < 1e-6));
        let trace = tape.finish(vec![], vec![]);
        assert_eq!(trace.ops[0].inputs.len(), 2);
    }

    #[test]
    fn test_stage_seq_namespaces_trace_entries() {
        let varmap = VarMap::new();
        let vb = test_vb(&varmap).pp("enc");
        let mut seq = StageSeq::new("enc");
        seq.push("conv1", Stage::conv(vb.pp("conv1"), 1, 4, 3, 1, 1).unwrap());
        seq.push("relu1", Stage::Relu);
        let xs = Tensor::randn(0f32, 1f32, (1, 1, 8, 8), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = seq.apply(&xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 4, 8, 8]);
        let trace = tape.finish(vec![], vec![]);
        assert_eq!(trace.ops[0].name, "enc.conv1");
        assert_eq!(trace.ops[1].name, "enc.relu1");
    }
}
