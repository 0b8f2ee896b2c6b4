//! Colorization network
//!
//! Pooling encoder / upsampling decoder over single-channel input with a
//! three-channel sigmoid head. An RGB input is reduced to luma first, so
//! the same net serves both grayscale and color sources. Spatial dims must
//! be a multiple of 4 for the two pool/upsample pairs to invert exactly.

use candle_core::{Device, Result, Tensor};
use candle_nn::{VarBuilder, VarMap};

use super::stages::{luma, Stage, StageSeq};
use crate::trace::Tape;

pub struct ColorizerNet {
    encoder: StageSeq,
    decoder: StageSeq,
}

impl ColorizerNet {
    pub fn new(vb: VarBuilder, base_filters: usize) -> Result<Self> {
        let bf = base_filters;

        let enc_vb = vb.pp("enc");
        let mut encoder = StageSeq::new("enc");
        encoder.push("conv1a", Stage::conv(enc_vb.pp("conv1a"), 1, bf, 3, 1, 1)?);
        encoder.push("relu1a", Stage::Relu);
        encoder.push("conv1b", Stage::conv(enc_vb.pp("conv1b"), bf, bf, 3, 1, 1)?);
        encoder.push("relu1b", Stage::Relu);
        encoder.push("pool1", Stage::max_pool(2));
        encoder.push("conv2a", Stage::conv(enc_vb.pp("conv2a"), bf, bf * 2, 3, 1, 1)?);
        encoder.push("relu2a", Stage::Relu);
        encoder.push("conv2b", Stage::conv(enc_vb.pp("conv2b"), bf * 2, bf * 2, 3, 1, 1)?);
        encoder.push("relu2b", Stage::Relu);
        encoder.push("pool2", Stage::max_pool(2));
        encoder.push("conv3a", Stage::conv(enc_vb.pp("conv3a"), bf * 2, bf * 4, 3, 1, 1)?);
        encoder.push("relu3a", Stage::Relu);
        encoder.push("conv3b", Stage::conv(enc_vb.pp("conv3b"), bf * 4, bf * 4, 3, 1, 1)?);
        encoder.push("relu3b", Stage::Relu);

        let dec_vb = vb.pp("dec");
        let mut decoder = StageSeq::new("dec");
        decoder.push("up1", Stage::upsample(2));
        decoder.push("conv1a", Stage::conv(dec_vb.pp("conv1a"), bf * 4, bf * 2, 3, 1, 1)?);
        decoder.push("relu1a", Stage::Relu);
        decoder.push("conv1b", Stage::conv(dec_vb.pp("conv1b"), bf * 2, bf * 2, 3, 1, 1)?);
        decoder.push("relu1b", Stage::Relu);
        decoder.push("up2", Stage::upsample(2));
        decoder.push("conv2a", Stage::conv(dec_vb.pp("conv2a"), bf * 2, bf, 3, 1, 1)?);
        decoder.push("relu2a", Stage::Relu);
        decoder.push("conv2b", Stage::conv(dec_vb.pp("conv2b"), bf, bf, 3, 1, 1)?);
        decoder.push("relu2b", Stage::Relu);
        decoder.push("head", Stage::conv(dec_vb.pp("head"), bf, 3, 3, 1, 1)?);
        decoder.push("sigmoid", Stage::Sigmoid);

        Ok(Self { encoder, decoder })
    }

    pub fn forward(&self, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        let (_, channels, _, _) = xs.dims4()?;
        let gray = if channels == 3 {
            luma("gray", xs, tape)?
        } else {
            xs.clone()
        };
        let gray = Stage::scale(1.0 / 255.0, 0.0).apply("scale_in", &gray, tape)?;
        let features = self.encoder.apply(&gray, tape)?;
        let colors = self.decoder.apply(&features, tape)?;
        Stage::scale(255.0, 0.0).apply("scale_out", &colors, tape)
    }
}

/// Nudge the freshly initialized head toward warm output colors
///
/// Halves the head weights and pins the channel biases to hand-picked
/// constants. The constants are placeholders, not a tuned result.
pub fn warm_start(varmap: &mut VarMap, device: &Device) -> Result<()> {
    let weight = {
        let data = varmap.data().lock().unwrap();
        match data.get("dec.head.weight") {
            Some(var) => var.as_tensor().clone(),
            None => candle_core::bail!("colorizer head weights missing from var map"),
        }
    };
    varmap.set_one("dec.head.weight", (weight * 0.5)?)?;
    varmap.set_one("dec.head.bias", Tensor::new(&[0.1f32, 0.05f32, 0.0f32], device)?)?;
    Ok(())
}
