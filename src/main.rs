#![allow(clippy::multiple_crate_versions)]

use std::path::{Path, PathBuf};

use candle_core::Device;
use clap::{Parser, Subcommand, ValueEnum};
use lensforge::artifact::{self, ArtifactMetadata};
use lensforge::config::Config;
use lensforge::convert::{self, ConvertOptions, Converter, FeatureDescriptor};
use lensforge::error::{LensforgeError, Result};
use lensforge::fetch::{format_bytes, FetchOutcome, Fetcher, RemoteModel, VENDOR_MODELS};
use lensforge::nets::{ModelKind, Network};

#[derive(Parser)]
#[command(name = "lensforge")]
#[command(about = "Model build and fetch tooling for RetroLens", long_about = None)]
struct Cli {
    /// Config file path (default: ~/.config/lensforge/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Where bundles and downloads land (overrides config)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build model bundles
    Build {
        /// Model to build; repeat the flag for several (default: all)
        #[arg(long = "model", value_enum)]
        models: Vec<ModelSelect>,
        /// Channel width of the first conv layer (overrides config)
        #[arg(long)]
        base_filters: Option<usize>,
        /// Input edge length in pixels (default depends on the model)
        #[arg(long)]
        size: Option<usize>,
    },
    /// Download ready-made vendor models
    Fetch {
        /// Fetch a single vendor model by name
        #[arg(long)]
        only: Option<String>,
    },
    /// Build the tiny warm-tone demo colorizer
    Demo,
    /// List buildable and fetchable models
    List,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModelSelect {
    Enhancement,
    SuperResolution,
    Colorization,
    Mobile,
    Artistic,
    Stable,
    All,
}

impl ModelSelect {
    fn kind(self) -> Option<ModelKind> {
        match self {
            ModelSelect::Enhancement => Some(ModelKind::Enhancement),
            ModelSelect::SuperResolution => Some(ModelKind::SuperResolution),
            ModelSelect::Colorization => Some(ModelKind::Colorization),
            ModelSelect::Mobile => Some(ModelKind::Mobile),
            ModelSelect::Artistic => Some(ModelKind::Artistic),
            ModelSelect::Stable => Some(ModelKind::Stable),
            ModelSelect::All => None,
        }
    }
}

/// Expand the `--model` flags into a deduplicated kind list
fn selected_kinds(models: &[ModelSelect]) -> Vec<ModelKind> {
    if models.is_empty() || models.contains(&ModelSelect::All) {
        return ModelKind::all().to_vec();
    }
    let mut kinds = Vec::new();
    for kind in models.iter().filter_map(|m| m.kind()) {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    kinds
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| config.output.dir.clone());

    match cli.command {
        Commands::Build {
            models,
            base_filters,
            size,
        } => {
            let kinds = selected_kinds(&models);
            let base_filters = base_filters.unwrap_or(config.build.base_filters);
            run_build(&config, &output_dir, &kinds, base_filters, size).await
        }
        Commands::Fetch { only } => run_fetch(&config, &output_dir, only.as_deref()).await,
        Commands::Demo => run_demo(&config, &output_dir).await,
        Commands::List => {
            run_list();
            Ok(())
        }
    }
}

fn convert_options(config: &Config) -> ConvertOptions {
    ConvertOptions {
        representation: config.build.representation,
        target: config.build.deployment_target,
        compute_units: config.build.compute_units,
    }
}

/// Build each requested kind in turn. One failed build never aborts the
/// batch; the summary reports how many made it.
async fn run_build(
    config: &Config,
    output_dir: &Path,
    kinds: &[ModelKind],
    base_filters: usize,
    size: Option<usize>,
) -> Result<()> {
    let converter = Converter::new(convert_options(config));
    let device = Device::Cpu;
    let mut built = 0usize;

    for &kind in kinds {
        println!("\nBuilding {} ({kind})", kind.bundle_name());
        match build_one(
            config,
            &converter,
            output_dir,
            kind,
            base_filters,
            size,
            &device,
        )
        .await
        {
            Ok(path) => {
                let bytes = artifact::bundle_size_bytes(&path).unwrap_or(0);
                println!("✓ Saved {} ({})", path.display(), format_bytes(bytes));
                built += 1;
            }
            Err(e) => {
                tracing::error!("build failed for {kind}: {e}");
                println!("✗ {kind}: {e}");
            }
        }
    }

    println!("\nBuilt {built}/{} bundles", kinds.len());
    Ok(())
}

/// The full pipeline for one kind: stage weights when the kind expects
/// them, construct, trace, convert, stamp metadata, save, smoke check.
async fn build_one(
    config: &Config,
    converter: &Converter,
    output_dir: &Path,
    kind: ModelKind,
    base_filters: usize,
    size: Option<usize>,
    device: &Device,
) -> Result<PathBuf> {
    let size = size.unwrap_or_else(|| kind.default_size());
    kind.validate_size(size)?;

    if let Some(weights) = RemoteModel::weights_for(kind) {
        let fetcher = Fetcher::new(output_dir, config.fetch.timeout_secs)?;
        match fetcher.fetch(weights).await? {
            FetchOutcome::AlreadyPresent => {
                tracing::debug!("weights already staged for {kind}");
            }
            FetchOutcome::Downloaded { bytes } => {
                println!("  Staged {} ({})", weights.filename, format_bytes(bytes));
            }
        }
    }

    let network = Network::build(kind, base_filters, device)?;
    println!("  {} parameters", network.parameter_count());

    let example = network.example_input(size)?;
    let input = FeatureDescriptor::input_for(kind, size);
    let output = FeatureDescriptor::output_for(kind, size);

    let mut bundle = converter.convert(&network, &example, &input, &output)?;
    *bundle.metadata_mut() = ArtifactMetadata::for_kind(
        kind,
        &config.metadata.author,
        &config.metadata.license,
        &config.metadata.version,
    );
    let path = bundle.save(output_dir)?;

    if !convert::smoke_check(&network, &input, &output)? {
        tracing::warn!("smoke check failed for {kind}");
        println!("  Warning: output shape check failed for {kind}");
    }

    Ok(path)
}

async fn run_fetch(config: &Config, output_dir: &Path, only: Option<&str>) -> Result<()> {
    let fetcher = Fetcher::new(output_dir, config.fetch.timeout_secs)?;

    let models: Vec<&RemoteModel> = match only {
        Some(name) => match RemoteModel::find(name) {
            Some(model) => vec![model],
            None => {
                let mut msg = format!(
                    "Unknown model '{name}'. Available: {}",
                    RemoteModel::all_names().join(", ")
                );
                if let Some(suggestion) = RemoteModel::suggest(name) {
                    msg.push_str(&format!("\nDid you mean '{suggestion}'?"));
                }
                return Err(LensforgeError::Other(msg));
            }
        },
        None => VENDOR_MODELS.iter().collect(),
    };

    println!(
        "Fetching {} model(s) into {}",
        models.len(),
        output_dir.display()
    );
    let summary = fetcher.fetch_all(&models).await;

    println!(
        "\nSuccessfully downloaded: {}/{} models",
        summary.succeeded, summary.attempted
    );
    for (name, err) in &summary.failures {
        println!("  ✗ {name}: {err}");
    }
    Ok(())
}

async fn run_demo(config: &Config, output_dir: &Path) -> Result<()> {
    let converter = Converter::new(convert_options(config));
    let device = Device::Cpu;
    let kind = ModelKind::Demo;

    println!("Building {} (demo)", kind.bundle_name());
    let path = build_one(
        config,
        &converter,
        output_dir,
        kind,
        config.build.base_filters,
        None,
        &device,
    )
    .await?;
    let bytes = artifact::bundle_size_bytes(&path)?;
    println!("✓ Saved {} ({})", path.display(), format_bytes(bytes));
    Ok(())
}

fn run_list() {
    println!("Buildable models:");
    for kind in ModelKind::all() {
        println!(
            "  {:<16} {}.{} ({} {}x{}x{})",
            kind.as_str(),
            kind.bundle_name(),
            artifact::BUNDLE_EXT,
            kind.input_port(),
            kind.input_channels(),
            kind.default_size(),
            kind.default_size()
        );
    }
    let demo = ModelKind::Demo;
    println!(
        "  {:<16} {}.{} (built by the demo command)",
        demo.as_str(),
        demo.bundle_name(),
        artifact::BUNDLE_EXT
    );

    println!("\nVendor models (fetch):");
    for model in VENDOR_MODELS {
        println!(
            "  {:<14} ~{} MB  {}",
            model.name, model.size_mb, model.description
        );
    }

    println!("\nColorizer weights (staged before artistic/stable builds):");
    for model in lensforge::fetch::COLORIZER_WEIGHTS {
        println!(
            "  {:<14} ~{} MB  {}",
            model.name, model.size_mb, model.description
        );
    }
}
