use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::convert::{ComputeUnits, DeployTarget, Representation};
use crate::error::{LensforgeError, Result};

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub build: BuildConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct BuildConfig {
    #[serde(default = "default_base_filters")]
    pub base_filters: usize,
    #[serde(default)]
    pub representation: Representation,
    #[serde(default)]
    pub deployment_target: DeployTarget,
    #[serde(default)]
    pub compute_units: ComputeUnits,
}

/// Stamped into every bundle manifest
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MetadataConfig {
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_license")]
    pub license: String,
    #[serde(default = "default_version")]
    pub version: String,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct FetchConfig {
    /// Per-request timeout; downloads run without one when unset
    pub timeout_secs: Option<u64>,
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("./models")
}
fn default_base_filters() -> usize {
    16
}
fn default_author() -> String {
    "RetroLens Team".to_string()
}
fn default_license() -> String {
    "MIT".to_string()
}
fn default_version() -> String {
    "1.0".to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_filters: default_base_filters(),
            representation: Representation::default(),
            deployment_target: DeployTarget::default(),
            compute_units: ComputeUnits::default(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            author: default_author(),
            license: default_license(),
            version: default_version(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: OutputConfig::default(),
            build: BuildConfig::default(),
            metadata: MetadataConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, falling back to embedded defaults
    /// when no file exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Load from an explicit path. A missing file yields defaults; a file
    /// that exists but fails to parse is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|e| {
            LensforgeError::Config(format!("Failed to parse {}: {e}", path.display()))
        })
    }

    /// `$XDG_CONFIG_HOME/lensforge/config.toml` or the platform equivalent
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            LensforgeError::Config("Cannot determine config directory".to_string())
        })?;
        Ok(config_dir.join("lensforge/config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output.dir, PathBuf::from("./models"));
        assert_eq!(config.build.base_filters, 16);
        assert_eq!(config.build.representation, Representation::Program);
        assert_eq!(config.metadata.author, "RetroLens Team");
        assert_eq!(config.metadata.license, "MIT");
        assert_eq!(config.metadata.version, "1.0");
        assert_eq!(config.fetch.timeout_secs, None);
    }

    #[test]
    fn test_partial_config_merges_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [metadata]
            author = "Somebody Else"

            [build]
            base_filters = 8
            representation = "neural-network"
            "#,
        )
        .unwrap();
        assert_eq!(config.metadata.author, "Somebody Else");
        assert_eq!(config.metadata.license, "MIT");
        assert_eq!(config.build.base_filters, 8);
        assert_eq!(config.build.representation, Representation::NeuralNetwork);
        assert_eq!(config.output.dir, PathBuf::from("./models"));
    }

    #[test]
    fn test_load_from_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.build.base_filters, 16);
    }

    #[test]
    fn test_load_from_rejects_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[build\nbase_filters = oops").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, LensforgeError::Config(_)));
    }

    #[test]
    #[serial]
    fn test_load_reads_xdg_config_home() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        let dir = temp_dir.path().join("lensforge");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.toml"), "[output]\ndir = \"/tmp/out\"\n").unwrap();

        let config = Config::load().unwrap();
        assert_eq!(config.output.dir, PathBuf::from("/tmp/out"));

        std::env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    #[serial]
    fn test_load_without_config_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        let config = Config::load().unwrap();
        assert_eq!(config.metadata.author, "RetroLens Team");

        std::env::remove_var("XDG_CONFIG_HOME");
    }
}
