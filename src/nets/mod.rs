//! Network definitions
//!
//! One module per architecture plus the shared [`Stage`] vocabulary.
//! [`ModelKind`] is the single source of truth for everything the rest of
//! the crate needs to know about a kind: channel counts, port names,
//! bundle names, size constraints and metadata text.

pub mod colorize;
pub mod demo;
pub mod enhancement;
pub mod mobile;
pub mod stages;
pub mod superres;
pub mod unet;

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use serde::{Deserialize, Serialize};

use crate::error::{LensforgeError, Result};
use crate::trace::{GraphTrace, Tape};
use colorize::ColorizerNet;
use demo::DemoColorizer;
use enhancement::EnhancementNet;
use mobile::MobileColorizer;
pub use stages::Stage;
use superres::SuperResolutionNet;
use unet::UnetColorizer;

/// Channel width of the mobile colorizer's first layer
const MOBILE_WIDTH: usize = 32;
/// Channel width of the deep colorizer's first layer
const DEEP_WIDTH: usize = 64;

/// The model kinds this tool can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelKind {
    Enhancement,
    SuperResolution,
    Colorization,
    Mobile,
    Artistic,
    Stable,
    Demo,
}

impl ModelKind {
    /// Every kind the `build` command can select. The demo colorizer has
    /// its own subcommand and is not part of a batch build.
    pub fn all() -> [ModelKind; 6] {
        [
            ModelKind::Enhancement,
            ModelKind::SuperResolution,
            ModelKind::Colorization,
            ModelKind::Mobile,
            ModelKind::Artistic,
            ModelKind::Stable,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Enhancement => "enhancement",
            ModelKind::SuperResolution => "super-resolution",
            ModelKind::Colorization => "colorization",
            ModelKind::Mobile => "mobile",
            ModelKind::Artistic => "artistic",
            ModelKind::Stable => "stable",
            ModelKind::Demo => "demo",
        }
    }

    /// Bundle directory name the consuming app looks for
    pub fn bundle_name(&self) -> &'static str {
        match self {
            ModelKind::Enhancement => "PhotoEnhancement",
            ModelKind::SuperResolution => "SuperResolution2x",
            ModelKind::Colorization => "PhotoColorization",
            ModelKind::Mobile => "ColorizerMobile",
            ModelKind::Artistic => "ColorizerArtistic",
            ModelKind::Stable => "ColorizerStable",
            ModelKind::Demo => "DemoColorizer",
        }
    }

    pub fn input_channels(&self) -> usize {
        match self {
            ModelKind::Enhancement | ModelKind::SuperResolution => 3,
            _ => 1,
        }
    }

    pub fn output_channels(&self) -> usize {
        3
    }

    pub fn input_port(&self) -> &'static str {
        match self {
            ModelKind::Enhancement | ModelKind::SuperResolution => "input_image",
            _ => "grayscale_image",
        }
    }

    pub fn output_port(&self) -> &'static str {
        match self {
            ModelKind::Enhancement => "enhanced_image",
            ModelKind::SuperResolution => "upscaled_image",
            _ => "colorized_image",
        }
    }

    /// Spatial upscale factor between input and output
    pub fn upscale(&self) -> usize {
        match self {
            ModelKind::SuperResolution => 2,
            _ => 1,
        }
    }

    pub fn default_size(&self) -> usize {
        match self {
            ModelKind::SuperResolution => 128,
            _ => 256,
        }
    }

    /// Input sizes must be a multiple of this for the down/up stages to
    /// restore the resolution exactly
    pub fn size_multiple(&self) -> usize {
        match self {
            ModelKind::Colorization | ModelKind::Mobile => 4,
            ModelKind::Artistic | ModelKind::Stable => 8,
            _ => 1,
        }
    }

    pub fn validate_size(&self, size: usize) -> Result<()> {
        if size == 0 {
            return Err(LensforgeError::Other(format!(
                "Input size for the {self} model must be positive"
            )));
        }
        let multiple = self.size_multiple();
        if size % multiple != 0 {
            return Err(LensforgeError::Other(format!(
                "Input size {size} is not a multiple of {multiple}, required by the {self} model"
            )));
        }
        Ok(())
    }

    pub fn short_description(&self) -> &'static str {
        match self {
            ModelKind::Enhancement => "Lightweight photo enhancement model for RetroLens",
            ModelKind::SuperResolution => "2x Super Resolution model for RetroLens",
            ModelKind::Colorization => "Simple Photo Colorization",
            ModelKind::Mobile => "Mobile-Optimized Photo Colorization",
            ModelKind::Artistic => "Artistic Photo Colorization",
            ModelKind::Stable => "Stable Photo Colorization",
            ModelKind::Demo => "Demo Photo Colorization",
        }
    }

    pub fn long_description(&self) -> &'static str {
        match self {
            ModelKind::Enhancement => "Lightweight CNN for photo enhancement",
            ModelKind::SuperResolution => "Lightweight CNN for 2x super resolution",
            ModelKind::Colorization => {
                "Lightweight AI model for adding realistic colors to grayscale photos"
            }
            ModelKind::Mobile => "Lightweight AI colorization optimized for mobile devices",
            ModelKind::Artistic => "Artistic colorization with enhanced colors",
            ModelKind::Stable => "Stable colorization with realistic colors",
            ModelKind::Demo => "Simple demo model that adds warm tones to grayscale photos",
        }
    }

    pub fn input_description(&self) -> &'static str {
        match self {
            ModelKind::Enhancement => "RGB photo to enhance",
            ModelKind::SuperResolution => "RGB photo to upscale",
            _ => "Grayscale photo to colorize",
        }
    }

    pub fn output_description(&self) -> &'static str {
        match self {
            ModelKind::Enhancement => "Enhanced photo at the input resolution",
            ModelKind::SuperResolution => "Photo upscaled to twice the input resolution",
            ModelKind::Demo => "Colorized photo with warm demo tones",
            _ => "Colorized photo with realistic colors",
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A constructed network with its weights
pub struct Network {
    kind: ModelKind,
    device: Device,
    varmap: VarMap,
    arch: Arch,
}

enum Arch {
    Enhancement(EnhancementNet),
    SuperResolution(SuperResolutionNet),
    Colorization(ColorizerNet),
    Mobile(MobileColorizer),
    Deep(UnetColorizer),
    Demo(DemoColorizer),
}

impl Network {
    /// Construct a network of the given kind with fresh weights.
    ///
    /// `base_filters` applies to the enhancement, super-resolution and
    /// colorization nets; the mobile and deep colorizers have fixed
    /// widths matching their weight-file layouts.
    pub fn build(kind: ModelKind, base_filters: usize, device: &Device) -> Result<Self> {
        let mut varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let arch = match kind {
            ModelKind::Enhancement => Arch::Enhancement(EnhancementNet::new(vb, base_filters)?),
            ModelKind::SuperResolution => Arch::SuperResolution(SuperResolutionNet::new(
                vb,
                base_filters,
                kind.upscale(),
            )?),
            ModelKind::Colorization => {
                let net = ColorizerNet::new(vb, base_filters)?;
                colorize::warm_start(&mut varmap, device)?;
                Arch::Colorization(net)
            }
            ModelKind::Mobile => Arch::Mobile(MobileColorizer::new(vb, MOBILE_WIDTH)?),
            ModelKind::Artistic | ModelKind::Stable => {
                Arch::Deep(UnetColorizer::new(vb, DEEP_WIDTH)?)
            }
            ModelKind::Demo => {
                let net = DemoColorizer::new(vb)?;
                demo::set_warm_tone_weights(&mut varmap, device)?;
                Arch::Demo(net)
            }
        };
        Ok(Self {
            kind,
            device: device.clone(),
            varmap,
            arch,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Random example tensor of the declared input shape, used to drive
    /// tracing. Values are never validated for realism.
    pub fn example_input(&self, size: usize) -> Result<Tensor> {
        let shape = (1, self.kind.input_channels(), size, size);
        Ok(Tensor::randn(0f32, 1f32, shape, &self.device)?)
    }

    /// Run one forward pass, recording every stage on a tape
    pub fn forward_traced(&self, xs: &Tensor) -> Result<(Tensor, GraphTrace)> {
        let mut tape = Tape::new();
        let out = match &self.arch {
            Arch::Enhancement(net) => net.forward(xs, &mut tape),
            Arch::SuperResolution(net) => net.forward(xs, &mut tape),
            Arch::Colorization(net) => net.forward(xs, &mut tape),
            Arch::Mobile(net) => net.forward(xs, &mut tape),
            Arch::Deep(net) => net.forward(xs, &mut tape),
            Arch::Demo(net) => net.forward(xs, &mut tape),
        }?;
        let trace = tape.finish(xs.dims().to_vec(), out.dims().to_vec());
        Ok((out, trace))
    }

    /// Total parameter count across the var map
    pub fn parameter_count(&self) -> usize {
        self.varmap
            .all_vars()
            .iter()
            .map(|var| var.elem_count())
            .sum()
    }

    /// Serialize all weights to a safetensors file
    pub fn save_weights(&self, path: &Path) -> Result<()> {
        self.varmap.save(path)?;
        Ok(())
    }
}
