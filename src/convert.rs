//! Conversion to the mobile bundle format
//!
//! [`Converter`] takes a constructed network plus declared input/output
//! feature descriptors, traces one forward pass, validates the descriptors
//! and the op set against the target representation, and produces an
//! in-memory [`ModelArtifact`](crate::artifact::ModelArtifact) ready to
//! annotate and save. The trace is only valid for the traced shapes; so is
//! the bundle.

use candle_core::Tensor;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::artifact::{ArtifactMetadata, BundleManifest, ModelArtifact, FORMAT_VERSION};
use crate::error::{ConvertError, Result};
use crate::nets::{ModelKind, Network};
use crate::trace::OpKind;

/// Pixel layout of an image-typed port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorLayout {
    Rgb,
    Grayscale,
}

/// Declared shape and pixel mapping for one network port.
///
/// `scale`/`bias` describe the linear pixel mapping the consuming runtime
/// applies. For inputs: `network_value = pixel * scale + bias` with pixels
/// in 0-255. For outputs: `pixel = network_value * scale + bias`. Kinds
/// that scale pixels inside the graph declare the identity mapping here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDescriptor {
    pub name: String,
    pub shape: Vec<usize>,
    pub color: ColorLayout,
    pub scale: f64,
    pub bias: f64,
}

impl FeatureDescriptor {
    /// Canonical input descriptor for a kind at the given spatial size
    pub fn input_for(kind: ModelKind, size: usize) -> Self {
        let (scale, bias) = match kind {
            // these kinds carry their own scale stages in the graph
            ModelKind::Enhancement | ModelKind::SuperResolution | ModelKind::Colorization => {
                (1.0, 0.0)
            }
            ModelKind::Mobile | ModelKind::Demo => (1.0 / 255.0, 0.0),
            ModelKind::Artistic | ModelKind::Stable => (2.0 / 255.0, -1.0),
        };
        let channels = kind.input_channels();
        Self {
            name: kind.input_port().to_string(),
            shape: vec![1, channels, size, size],
            color: if channels == 1 {
                ColorLayout::Grayscale
            } else {
                ColorLayout::Rgb
            },
            scale,
            bias,
        }
    }

    /// Canonical output descriptor for a kind at the given input size
    pub fn output_for(kind: ModelKind, size: usize) -> Self {
        let out = size * kind.upscale();
        let (scale, bias) = match kind {
            ModelKind::Enhancement | ModelKind::SuperResolution | ModelKind::Colorization => {
                (1.0, 0.0)
            }
            ModelKind::Mobile | ModelKind::Demo => (255.0, 0.0),
            ModelKind::Artistic | ModelKind::Stable => (127.5, 127.5),
        };
        Self {
            name: kind.output_port().to_string(),
            shape: vec![1, kind.output_channels(), out, out],
            color: ColorLayout::Rgb,
            scale,
            bias,
        }
    }
}

/// Minimum OS release the bundle targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployTarget {
    #[default]
    Ios15,
    Ios16,
    Ios17,
}

impl DeployTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployTarget::Ios15 => "ios15",
            DeployTarget::Ios16 => "ios16",
            DeployTarget::Ios17 => "ios17",
        }
    }
}

/// Which processors the runtime may schedule the model on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComputeUnits {
    #[default]
    All,
    CpuOnly,
    CpuAndGpu,
}

impl ComputeUnits {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComputeUnits::All => "all",
            ComputeUnits::CpuOnly => "cpu-only",
            ComputeUnits::CpuAndGpu => "cpu-and-gpu",
        }
    }
}

/// Target graph dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Representation {
    /// The modern program dialect; supports every stage this crate emits
    #[default]
    Program,
    /// The classic layer-list dialect; no pixel shuffle support
    NeuralNetwork,
}

impl Representation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Representation::Program => "program",
            Representation::NeuralNetwork => "neural-network",
        }
    }

    pub fn supports(&self, kind: OpKind) -> bool {
        match self {
            Representation::Program => true,
            Representation::NeuralNetwork => !matches!(kind, OpKind::PixelShuffle),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    pub representation: Representation,
    pub target: DeployTarget,
    pub compute_units: ComputeUnits,
}

pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Trace the network with the example input and package the result.
    ///
    /// Descriptor shapes are checked against the example input before
    /// tracing and against the traced output after; every traced op must
    /// be expressible in the selected representation.
    pub fn convert(
        &self,
        network: &Network,
        example: &Tensor,
        input: &FeatureDescriptor,
        output: &FeatureDescriptor,
    ) -> Result<ModelArtifact> {
        if input.shape != example.dims() {
            return Err(ConvertError::Descriptor(format!(
                "input '{}' declares shape {:?} but the example input has shape {:?}",
                input.name,
                input.shape,
                example.dims()
            ))
            .into());
        }

        debug!(kind = %network.kind(), "tracing forward pass");
        let (_, trace) = network
            .forward_traced(example)
            .map_err(|e| ConvertError::Trace(e.to_string()))?;

        if output.shape != trace.output_shape {
            return Err(ConvertError::Descriptor(format!(
                "output '{}' declares shape {:?} but the traced graph produces {:?}",
                output.name, output.shape, trace.output_shape
            ))
            .into());
        }

        for op in &trace.ops {
            if !self.options.representation.supports(op.kind) {
                return Err(ConvertError::UnsupportedOp {
                    op: op.kind.as_str().to_string(),
                    representation: self.options.representation.as_str().to_string(),
                }
                .into());
            }
        }
        debug!(ops = trace.op_count(), "trace accepted");

        let manifest = BundleManifest {
            format_version: FORMAT_VERSION,
            kind: network.kind(),
            created_at: Utc::now().to_rfc3339(),
            deployment_target: self.options.target,
            compute_units: self.options.compute_units,
            representation: self.options.representation,
            inputs: vec![input.clone()],
            outputs: vec![output.clone()],
            graph: trace,
            metadata: ArtifactMetadata::default(),
        };
        Ok(ModelArtifact::new(manifest, network.varmap().clone()))
    }
}

/// Post-save verification: run one forward pass on a fresh random input
/// and confirm the output shape matches the declared descriptor.
pub fn smoke_check(
    network: &Network,
    input: &FeatureDescriptor,
    output: &FeatureDescriptor,
) -> Result<bool> {
    let example = Tensor::randn(0f32, 1f32, input.shape.clone(), network.device())?;
    let (out, _) = network.forward_traced(&example)?;
    Ok(out.dims() == output.shape.as_slice())
}
