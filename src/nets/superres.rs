//! Super-resolution network
//!
//! ESPCN-style layout: a wide 9x9 feature extractor, a 1x1 squeeze, a 5x5
//! expansion to `out_channels * factor^2`, then a pixel shuffle that trades
//! those channels for spatial resolution. The graph maps 0-255 pixels to
//! [-1, 1] on entry and back on exit, with tanh ahead of the rescale.

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use super::stages::Stage;
use crate::trace::Tape;

pub struct SuperResolutionNet {
    conv1: Stage,
    conv2: Stage,
    conv3: Stage,
    shuffle: Stage,
}

impl SuperResolutionNet {
    pub fn new(vb: VarBuilder, base_filters: usize, factor: usize) -> Result<Self> {
        let bf = base_filters;
        Ok(Self {
            conv1: Stage::conv(vb.pp("conv1"), 3, bf, 9, 1, 4)?,
            conv2: Stage::conv(vb.pp("conv2"), bf, bf / 2, 1, 1, 0)?,
            conv3: Stage::conv(vb.pp("conv3"), bf / 2, 3 * factor * factor, 5, 1, 2)?,
            shuffle: Stage::pixel_shuffle(factor),
        })
    }

    pub fn forward(&self, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        // (x / 255) * 2 - 1
        let xs = Stage::scale(2.0 / 255.0, -1.0).apply("scale_in", xs, tape)?;

        let xs = self.conv1.apply("conv1", &xs, tape)?;
        let xs = Stage::Relu.apply("relu1", &xs, tape)?;
        let xs = self.conv2.apply("conv2", &xs, tape)?;
        let xs = Stage::Relu.apply("relu2", &xs, tape)?;
        let xs = self.conv3.apply("conv3", &xs, tape)?;

        let xs = self.shuffle.apply("shuffle", &xs, tape)?;
        let xs = Stage::Tanh.apply("tanh", &xs, tape)?;

        // ((x + 1) / 2) * 255
        Stage::scale(127.5, 127.5).apply("scale_out", &xs, tape)
    }
}
