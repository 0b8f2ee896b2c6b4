//! End-to-end bundle builds through the library API

use std::path::{Path, PathBuf};

use candle_core::Device;
use lensforge::artifact::{
    bundle_size_bytes, ArtifactMetadata, BundleManifest, MANIFEST_FILE, WEIGHTS_FILE,
};
use lensforge::convert::{ConvertOptions, Converter, FeatureDescriptor};
use lensforge::nets::{ModelKind, Network};
use tempfile::TempDir;

// Small widths and edge lengths keep these runs in CPU-friendly territory
fn build_bundle(kind: ModelKind, base_filters: usize, size: usize, dir: &Path) -> PathBuf {
    let device = Device::Cpu;
    let network = Network::build(kind, base_filters, &device).unwrap();
    let example = network.example_input(size).unwrap();
    let input = FeatureDescriptor::input_for(kind, size);
    let output = FeatureDescriptor::output_for(kind, size);

    let converter = Converter::new(ConvertOptions::default());
    let mut bundle = converter.convert(&network, &example, &input, &output).unwrap();
    *bundle.metadata_mut() = ArtifactMetadata::for_kind(kind, "RetroLens Team", "MIT", "1.0");
    bundle.save(dir).unwrap()
}

#[test]
fn test_enhancement_bundle_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let path = build_bundle(ModelKind::Enhancement, 4, 64, temp_dir.path());

    assert!(path.ends_with("PhotoEnhancement.mlbundle"));
    assert!(path.join(MANIFEST_FILE).exists());
    assert!(path.join(WEIGHTS_FILE).exists());

    let manifest = BundleManifest::load(&path).unwrap();
    assert_eq!(manifest.format_version, 1);
    assert_eq!(manifest.kind, ModelKind::Enhancement);
    assert_eq!(manifest.inputs.len(), 1);
    assert_eq!(manifest.inputs[0].name, "input_image");
    assert_eq!(manifest.inputs[0].shape, vec![1, 3, 64, 64]);
    assert_eq!(manifest.outputs[0].name, "enhanced_image");
    assert_eq!(manifest.outputs[0].shape, vec![1, 3, 64, 64]);
    assert!(manifest.graph.op_count() > 0);
}

#[test]
fn test_super_resolution_bundle_doubles_output_edges() {
    let temp_dir = TempDir::new().unwrap();
    let path = build_bundle(ModelKind::SuperResolution, 4, 32, temp_dir.path());

    let manifest = BundleManifest::load(&path).unwrap();
    assert_eq!(manifest.inputs[0].shape, vec![1, 3, 32, 32]);
    assert_eq!(manifest.outputs[0].name, "upscaled_image");
    assert_eq!(manifest.outputs[0].shape, vec![1, 3, 64, 64]);
}

#[test]
fn test_colorization_bundle_is_grayscale_to_rgb() {
    let temp_dir = TempDir::new().unwrap();
    let path = build_bundle(ModelKind::Colorization, 4, 32, temp_dir.path());

    let manifest = BundleManifest::load(&path).unwrap();
    assert_eq!(manifest.inputs[0].name, "grayscale_image");
    assert_eq!(manifest.inputs[0].shape, vec![1, 1, 32, 32]);
    assert_eq!(manifest.outputs[0].name, "colorized_image");
    assert_eq!(manifest.outputs[0].shape, vec![1, 3, 32, 32]);
}

// Two networks built from scratch carry different random weights, yet
// the recorded graph must come out structurally identical.
#[test]
fn test_trace_is_stable_across_builds() {
    let device = Device::Cpu;
    let first = Network::build(ModelKind::Enhancement, 4, &device).unwrap();
    let second = Network::build(ModelKind::Enhancement, 4, &device).unwrap();

    let (_, trace_a) = first
        .forward_traced(&first.example_input(32).unwrap())
        .unwrap();
    let (_, trace_b) = second
        .forward_traced(&second.example_input(32).unwrap())
        .unwrap();

    assert_eq!(trace_a, trace_b);
}

#[test]
fn test_rebuild_overwrites_and_metadata_survives_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = build_bundle(ModelKind::Demo, 4, 16, temp_dir.path());

    let manifest = BundleManifest::load(&path).unwrap();
    assert_eq!(manifest.metadata.author, "RetroLens Team");
    assert_eq!(manifest.metadata.license, "MIT");
    assert_eq!(
        manifest.metadata.short_description,
        "Demo Photo Colorization"
    );

    // rebuilding into the same directory replaces the bundle in place
    let again = build_bundle(ModelKind::Demo, 4, 16, temp_dir.path());
    assert_eq!(path, again);
    let reloaded = BundleManifest::load(&again).unwrap();
    assert_eq!(reloaded.metadata, manifest.metadata);

    let total = bundle_size_bytes(&again).unwrap();
    assert!(total > 0);
}

#[test]
fn test_size_validation_respects_stride_multiples() {
    assert!(ModelKind::Enhancement.validate_size(37).is_ok());
    assert!(ModelKind::Mobile.validate_size(30).is_err());
    assert!(ModelKind::Artistic.validate_size(100).is_err());
    assert!(ModelKind::Artistic.validate_size(96).is_ok());
    assert!(ModelKind::Colorization.validate_size(0).is_err());
}
