//! Photo enhancement network
//!
//! Six 3x3 convolutions in an encoder/decoder arrangement with two
//! additive skip connections and a sigmoid head. Pixel scaling happens
//! inside the graph: the net takes 0-255 input and produces 0-255 output.

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use super::stages::{skip_add, Stage};
use crate::trace::Tape;

pub struct EnhancementNet {
    conv1: Stage,
    conv2: Stage,
    conv3: Stage,
    conv4: Stage,
    conv5: Stage,
    conv6: Stage,
}

impl EnhancementNet {
    pub fn new(vb: VarBuilder, base_filters: usize) -> Result<Self> {
        let bf = base_filters;
        Ok(Self {
            conv1: Stage::conv(vb.pp("conv1"), 3, bf, 3, 1, 1)?,
            conv2: Stage::conv(vb.pp("conv2"), bf, bf * 2, 3, 1, 1)?,
            conv3: Stage::conv(vb.pp("conv3"), bf * 2, bf * 4, 3, 1, 1)?,
            conv4: Stage::conv(vb.pp("conv4"), bf * 4, bf * 2, 3, 1, 1)?,
            conv5: Stage::conv(vb.pp("conv5"), bf * 2, bf, 3, 1, 1)?,
            conv6: Stage::conv(vb.pp("conv6"), bf, 3, 3, 1, 1)?,
        })
    }

    pub fn forward(&self, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        let xs = Stage::scale(1.0 / 255.0, 0.0).apply("scale_in", xs, tape)?;

        let x1 = self.conv1.apply("conv1", &xs, tape)?;
        let x1 = Stage::Relu.apply("relu1", &x1, tape)?;
        let x2 = self.conv2.apply("conv2", &x1, tape)?;
        let x2 = Stage::Relu.apply("relu2", &x2, tape)?;
        let x3 = self.conv3.apply("conv3", &x2, tape)?;
        let x3 = Stage::Relu.apply("relu3", &x3, tape)?;

        // Decoder reuses the encoder activations at matching widths
        let x4 = self.conv4.apply("conv4", &x3, tape)?;
        let x4 = skip_add("skip1", &x4, &x2, tape)?;
        let x4 = Stage::Relu.apply("relu4", &x4, tape)?;
        let x5 = self.conv5.apply("conv5", &x4, tape)?;
        let x5 = skip_add("skip2", &x5, &x1, tape)?;
        let x5 = Stage::Relu.apply("relu5", &x5, tape)?;

        let out = self.conv6.apply("conv6", &x5, tape)?;
        let out = Stage::Sigmoid.apply("sigmoid", &out, tape)?;
        Stage::scale(255.0, 0.0).apply("scale_out", &out, tape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_enhancement_preserves_shape() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = EnhancementNet::new(vb, 8).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (1, 3, 64, 64), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = net.forward(&xs, &mut tape).unwrap();
        assert_eq!(out.dims(), &[1, 3, 64, 64]);
    }

    #[test]
    fn test_enhancement_output_stays_in_pixel_range() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = EnhancementNet::new(vb, 8).unwrap();
        let xs = Tensor::full(128.0f32, (1, 3, 32, 32), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = net.forward(&xs, &mut tape).unwrap();
        let v = out.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        // sigmoid then x255 keeps every pixel inside [0, 255]
        assert!(v.iter().all(|&x| (0.0..=255.0).contains(&x)));
    }

    #[test]
    fn test_enhancement_records_skip_connections() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let net = EnhancementNet::new(vb, 8).unwrap();
        let xs = Tensor::randn(0f32, 1f32, (1, 3, 32, 32), &Device::Cpu).unwrap();
        let mut tape = Tape::new();
        let out = net.forward(&xs, &mut tape).unwrap();
        let trace = tape.finish(xs.dims().to_vec(), out.dims().to_vec());
        let adds: Vec<_> = trace
            .ops
            .iter()
            .filter(|op| op.kind == crate::trace::OpKind::Add)
            .collect();
        assert_eq!(adds.len(), 2);
        assert_eq!(adds[0].name, "skip1");
        assert_eq!(adds[1].name, "skip2");
    }
}
