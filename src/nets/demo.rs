//! Demo colorizer
//!
//! Not a learned model at all: a 1x1 convolution with fixed per-channel
//! multipliers that spreads a grayscale input across RGB with a warm cast,
//! then clamps to [0, 1]. Deterministic by construction, which makes it
//! useful for wiring up the consuming app before real models exist.

use candle_core::{DType, Device, Result, Tensor};
use candle_nn::{VarBuilder, VarMap};

use super::stages::Stage;
use crate::trace::Tape;

/// Per-channel multipliers for the warm cast (R, G, B)
pub const WARM_TONE: [f32; 3] = [1.1, 1.0, 0.8];

pub struct DemoColorizer {
    mix: Stage,
}

impl DemoColorizer {
    pub fn new(vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            mix: Stage::conv(vb.pp("mix"), 1, 3, 1, 1, 0)?,
        })
    }

    pub fn forward(&self, xs: &Tensor, tape: &mut Tape) -> Result<Tensor> {
        let xs = self.mix.apply("mix", xs, tape)?;
        Stage::clamp(0.0, 1.0).apply("clamp", &xs, tape)
    }
}

/// Replace the random conv init with the fixed warm-tone multipliers
pub fn set_warm_tone_weights(varmap: &mut VarMap, device: &Device) -> Result<()> {
    varmap.set_one(
        "mix.weight",
        Tensor::from_vec(WARM_TONE.to_vec(), (3, 1, 1, 1), device)?,
    )?;
    varmap.set_one("mix.bias", Tensor::zeros(3, DType::F32, device)?)?;
    Ok(())
}
