//! Bundle artifacts
//!
//! A produced model is saved as a bundle directory,
//! `<Name>.mlbundle/`, holding a JSON manifest next to a safetensors
//! weight file. The manifest carries everything the consuming app needs:
//! declared ports, the traced graph, target/compute settings and the
//! descriptive metadata. Bundles are written once per invocation and
//! overwritten in place on rerun.

pub mod metadata;

use std::fs;
use std::path::{Path, PathBuf};

use candle_nn::VarMap;
use serde::{Deserialize, Serialize};

use crate::convert::{ComputeUnits, DeployTarget, FeatureDescriptor, Representation};
use crate::error::{ConvertError, LensforgeError, Result};
use crate::nets::ModelKind;
use crate::trace::GraphTrace;
pub use metadata::ArtifactMetadata;

/// Bumped when the manifest layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;
pub const MANIFEST_FILE: &str = "manifest.json";
pub const WEIGHTS_FILE: &str = "weights.safetensors";
pub const BUNDLE_EXT: &str = "mlbundle";

/// On-disk description of a produced bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub kind: ModelKind,
    pub created_at: String,
    pub deployment_target: DeployTarget,
    pub compute_units: ComputeUnits,
    pub representation: Representation,
    pub inputs: Vec<FeatureDescriptor>,
    pub outputs: Vec<FeatureDescriptor>,
    pub graph: GraphTrace,
    pub metadata: ArtifactMetadata,
}

impl BundleManifest {
    /// Read the manifest back from a bundle directory
    pub fn load(bundle_dir: &Path) -> Result<Self> {
        let content = fs::read_to_string(bundle_dir.join(MANIFEST_FILE))?;
        serde_json::from_str(&content)
            .map_err(|e| LensforgeError::Other(format!("Failed to parse bundle manifest: {e}")))
    }
}

/// An in-memory converted model: manifest plus weights
pub struct ModelArtifact {
    manifest: BundleManifest,
    weights: VarMap,
}

impl ModelArtifact {
    pub fn new(manifest: BundleManifest, weights: VarMap) -> Self {
        Self { manifest, weights }
    }

    #[must_use]
    pub fn manifest(&self) -> &BundleManifest {
        &self.manifest
    }

    #[must_use]
    pub fn kind(&self) -> ModelKind {
        self.manifest.kind
    }

    pub fn metadata(&self) -> &ArtifactMetadata {
        &self.manifest.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut ArtifactMetadata {
        &mut self.manifest.metadata
    }

    /// Bundle directory for a kind under the output directory
    pub fn bundle_path(output_dir: &Path, kind: ModelKind) -> PathBuf {
        output_dir.join(format!("{}.{}", kind.bundle_name(), BUNDLE_EXT))
    }

    /// Write the bundle to disk and return its path.
    ///
    /// The manifest is written atomically (tmp + rename); the weight file
    /// is written through the var map's safetensors serializer. Re-running
    /// overwrites both files in place.
    pub fn save(&self, output_dir: &Path) -> Result<PathBuf> {
        let bundle = Self::bundle_path(output_dir, self.manifest.kind);
        fs::create_dir_all(&bundle)
            .map_err(|e| ConvertError::Save(format!("create {}: {e}", bundle.display())))?;

        let manifest_path = bundle.join(MANIFEST_FILE);
        let tmp_path = manifest_path.with_extension("tmp");
        let content = serde_json::to_string_pretty(&self.manifest)
            .map_err(|e| ConvertError::Save(format!("serialize manifest: {e}")))?;
        fs::write(&tmp_path, content)
            .map_err(|e| ConvertError::Save(format!("write manifest: {e}")))?;
        fs::rename(&tmp_path, &manifest_path)
            .map_err(|e| ConvertError::Save(format!("rename manifest: {e}")))?;

        self.weights
            .save(bundle.join(WEIGHTS_FILE))
            .map_err(|e| ConvertError::Save(format!("write weights: {e}")))?;

        Ok(bundle)
    }
}

/// Total size of the files directly inside a bundle directory
pub fn bundle_size_bytes(bundle_dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(bundle_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ConvertOptions, Converter, FeatureDescriptor};
    use crate::nets::Network;
    use candle_core::Device;
    use tempfile::TempDir;

    fn sample_artifact() -> ModelArtifact {
        let net = Network::build(ModelKind::Colorization, 8, &Device::Cpu).unwrap();
        let example = net.example_input(16).unwrap();
        let input = FeatureDescriptor::input_for(ModelKind::Colorization, 16);
        let output = FeatureDescriptor::output_for(ModelKind::Colorization, 16);
        Converter::new(ConvertOptions::default())
            .convert(&net, &example, &input, &output)
            .unwrap()
    }

    #[test]
    fn test_bundle_path_uses_kind_name() {
        let path = ModelArtifact::bundle_path(Path::new("/tmp/models"), ModelKind::Enhancement);
        assert_eq!(path, Path::new("/tmp/models/PhotoEnhancement.mlbundle"));
    }

    #[test]
    fn test_save_writes_manifest_and_weights() {
        let temp_dir = TempDir::new().unwrap();
        let mut artifact = sample_artifact();
        *artifact.metadata_mut() =
            ArtifactMetadata::for_kind(ModelKind::Colorization, "Team", "MIT", "1.0");

        let bundle = artifact.save(temp_dir.path()).unwrap();
        assert!(bundle.join(MANIFEST_FILE).exists());
        assert!(bundle.join(WEIGHTS_FILE).exists());
        // the tmp staging file must not survive the rename
        assert!(!bundle.join("manifest.tmp").exists());

        let loaded = BundleManifest::load(&bundle).unwrap();
        assert_eq!(loaded.format_version, FORMAT_VERSION);
        assert_eq!(loaded.kind, ModelKind::Colorization);
        assert_eq!(loaded.inputs[0].name, "grayscale_image");
        assert_eq!(loaded.metadata.author, "Team");
        assert_eq!(loaded.graph.op_count(), artifact.manifest().graph.op_count());
    }

    #[test]
    fn test_save_overwrites_existing_bundle() {
        let temp_dir = TempDir::new().unwrap();
        let artifact = sample_artifact();
        let first = artifact.save(temp_dir.path()).unwrap();
        let second = artifact.save(temp_dir.path()).unwrap();
        assert_eq!(first, second);
        assert!(BundleManifest::load(&second).is_ok());
    }

    #[test]
    fn test_bundle_size_counts_both_files() {
        let temp_dir = TempDir::new().unwrap();
        let artifact = sample_artifact();
        let bundle = artifact.save(temp_dir.path()).unwrap();
        let manifest_len = fs::metadata(bundle.join(MANIFEST_FILE)).unwrap().len();
        let weights_len = fs::metadata(bundle.join(WEIGHTS_FILE)).unwrap().len();
        assert_eq!(bundle_size_bytes(&bundle).unwrap(), manifest_len + weights_len);
    }
}
