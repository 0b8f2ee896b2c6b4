//! Mobile-optimized colorizer
//!
//! A flat sequence tuned for small weight files: strided convolutions down
//! two levels, a 3x3 in the middle, transposed convolutions back up, and a
//! sigmoid head. No batch norm, no skips. Works in the [0, 1] domain.

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use super::stages::{Stage, StageSeq};
use crate::trace::Tape;

pub struct MobileColorizer {
    features: StageSeq,
}

impl MobileColorizer {
    pub fn new(vb: VarBuilder, width: usize) -> Result<Self> {
        let w = width;
        let f_vb = vb.pp("features");
        let mut features = StageSeq::new("features");
        features.push("conv_in", Stage::conv(f_vb.pp("conv_in"), 1, w, 3, 1, 1)?);
        features.push("relu_in", Stage::Relu);
        features.push("down1", Stage::conv(f_vb.pp("down1"), w, w * 2, 3, 2, 1)?);
        features.push("relu1", Stage::Relu);
        features.push("down2", Stage::conv(f_vb.pp("down2"), w * 2, w * 4, 3, 2, 1)?);
        features.push("relu2", Stage::Relu);
        features.push("mid", Stage::conv(f_vb.pp("mid"), w * 4, w * 4, 3, 1, 1)?);
        features.push("relu3", Stage::Relu);
        features.push("up1", Stage::conv_t(f_vb.pp("up1"), w * 4, w * 2, 3, 2, 1, 1)?);
        features.push("relu4", Stage::Relu);
        features.push("up2", Stage::conv_t(f_vb.pp("up2"), w * 2, w, 3, 2, 1, 1)?);
        features.push("relu5", Stage::Relu);
        features.push("head", Stage::conv(f_vb.pp("head"), w, 3, 3, 1, 1)?);
        features.push("sigmoid", Stage::Sigmoid);
        Ok(Self { features })
    }

    pub fn forward(&self, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        self.features.apply(xs, tape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_mobile_colorizer_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = MobileColorizer::new(vb, 8).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (1, 1, 32, 32), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = net.forward(&xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_mobile_colorizer_output_in_unit_range() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = MobileColorizer::new(vb, 8).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (1, 1, 16, 16), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = net.forward(&xs, &mut tape).unwrap();
        let v = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        assert!(v.iter().all(|&x| (0.0..=1.0).contains(&x)));
    }
}
