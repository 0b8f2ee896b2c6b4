//! Deep U-shaped colorizer
//!
//! The architecture behind the `artistic` and `stable` kinds: a strided
//! convolutional encoder over three levels with batch norm, a widened
//! bottleneck, and a transposed-convolution decoder ending in a 7x7 head
//! with tanh. Works in the [-1, 1] domain; pixel mapping is left to the
//! conversion-time descriptors. Spatial dims must be a multiple of 8.

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use super::stages::{Stage, StageSeq};
use crate::trace::Tape;

pub struct UnetColorizer {
    encoder: StageSeq,
    bottleneck: StageSeq,
    decoder: StageSeq,
}

impl UnetColorizer {
    /// `width` is the channel count after the first convolution; the
    /// production nets use 64, which gives 64/128/256/512 down the
    /// encoder and 1024 in the bottleneck.
    pub fn new(vb: VarBuilder, width: usize) -> Result<Self> {
        let w = width;

        let enc_vb = vb.pp("enc");
        let mut encoder = StageSeq::new("enc");
        encoder.push("conv_in", Stage::conv(enc_vb.pp("conv_in"), 1, w, 7, 1, 3)?);
        encoder.push("relu_in", Stage::Relu);
        encoder.push("down1", Stage::conv(enc_vb.pp("down1"), w, w * 2, 3, 2, 1)?);
        encoder.push("bn1", Stage::norm(enc_vb.pp("bn1"), w * 2)?);
        encoder.push("relu1", Stage::Relu);
        encoder.push("down2", Stage::conv(enc_vb.pp("down2"), w * 2, w * 4, 3, 2, 1)?);
        encoder.push("bn2", Stage::norm(enc_vb.pp("bn2"), w * 4)?);
        encoder.push("relu2", Stage::Relu);
        encoder.push("down3", Stage::conv(enc_vb.pp("down3"), w * 4, w * 8, 3, 2, 1)?);
        encoder.push("bn3", Stage::norm(enc_vb.pp("bn3"), w * 8)?);
        encoder.push("relu3", Stage::Relu);

        let mid_vb = vb.pp("mid");
        let mut bottleneck = StageSeq::new("mid");
        bottleneck.push("conv1", Stage::conv(mid_vb.pp("conv1"), w * 8, w * 16, 3, 1, 1)?);
        bottleneck.push("bn1", Stage::norm(mid_vb.pp("bn1"), w * 16)?);
        bottleneck.push("relu1", Stage::Relu);
        bottleneck.push("conv2", Stage::conv(mid_vb.pp("conv2"), w * 16, w * 8, 3, 1, 1)?);
        bottleneck.push("bn2", Stage::norm(mid_vb.pp("bn2"), w * 8)?);
        bottleneck.push("relu2", Stage::Relu);

        let dec_vb = vb.pp("dec");
        let mut decoder = StageSeq::new("dec");
        decoder.push("up1", Stage::conv_t(dec_vb.pp("up1"), w * 8, w * 4, 3, 2, 1, 1)?);
        decoder.push("bn1", Stage::norm(dec_vb.pp("bn1"), w * 4)?);
        decoder.push("relu1", Stage::Relu);
        decoder.push("up2", Stage::conv_t(dec_vb.pp("up2"), w * 4, w * 2, 3, 2, 1, 1)?);
        decoder.push("bn2", Stage::norm(dec_vb.pp("bn2"), w * 2)?);
        decoder.push("relu2", Stage::Relu);
        decoder.push("up3", Stage::conv_t(dec_vb.pp("up3"), w * 2, w, 3, 2, 1, 1)?);
        decoder.push("bn3", Stage::norm(dec_vb.pp("bn3"), w)?);
        decoder.push("relu3", Stage::Relu);
        decoder.push("conv_out", Stage::conv(dec_vb.pp("conv_out"), w, 3, 7, 1, 3)?);
        decoder.push("tanh", Stage::Tanh);

        Ok(Self {
            encoder,
            bottleneck,
            decoder,
        })
    }

    pub fn forward(&self, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        let encoded = self.encoder.apply(xs, tape)?;
        let mid = self.bottleneck.apply(&encoded, tape)?;
        self.decoder.apply(&mid, tape)
    }
}
