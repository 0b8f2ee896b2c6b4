//! Remote model fetching
//!
//! Downloads pre-built model files from the fixed descriptor lists in
//! [`registry`]. Strictly sequential: one descriptor at a time, an
//! existence check before any network traffic, a disk-space preflight,
//! then a streamed download into a `.part` staging file that is renamed
//! into place on success. Failures are per-item; the loop always moves on
//! to the next descriptor.

pub mod registry;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::{FetchError, Result};
pub use registry::{RemoteModel, COLORIZER_WEIGHTS, VENDOR_MODELS};

/// Outcome of fetching one descriptor
#[derive(Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded { bytes: u64 },
    AlreadyPresent,
}

/// Aggregated result over a descriptor list
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<(String, FetchError)>,
}

impl FetchSummary {
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Sequential downloader for remote model files
pub struct Fetcher {
    client: reqwest::Client,
    dest_dir: PathBuf,
}

impl Fetcher {
    /// Create a fetcher writing into `dest_dir`, creating it if absent.
    /// Downloads run without a timeout unless one is configured.
    pub fn new(dest_dir: &Path, timeout_secs: Option<u64>) -> Result<Self> {
        fs::create_dir_all(dest_dir)?;
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(FetchError::Transport)?;
        Ok(Self {
            client,
            dest_dir: dest_dir.to_path_buf(),
        })
    }

    #[must_use]
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Where a descriptor's file lands
    #[must_use]
    pub fn dest_path(&self, model: &RemoteModel) -> PathBuf {
        self.dest_dir.join(model.filename)
    }

    /// Fetch one descriptor. A file already at the destination short-
    /// circuits the whole operation, network untouched.
    pub async fn fetch(
        &self,
        model: &RemoteModel,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        let dest = self.dest_path(model);
        if dest.exists() {
            return Ok(FetchOutcome::AlreadyPresent);
        }

        self.check_disk_space(model.size_mb)?;

        info!("Downloading {} from {}", model.name, model.url);
        let response = self
            .client
            .get(model.url)
            .send()
            .await
            .map_err(FetchError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status,
                url: model.url.to_string(),
            });
        }

        let bar = progress_bar(response.content_length(), model.name);
        let part = dest.with_file_name(format!("{}.part", model.filename));
        let mut file = fs::File::create(&part)?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    bar.finish_and_clear();
                    return Err(FetchError::Transport(e));
                }
            };
            file.write_all(&chunk)?;
            downloaded += chunk.len() as u64;
            bar.set_position(downloaded);
        }
        drop(file);
        fs::rename(&part, &dest)?;
        bar.finish_and_clear();

        Ok(FetchOutcome::Downloaded { bytes: downloaded })
    }

    /// Fetch every descriptor in order, reporting per-item outcomes and
    /// collecting a summary. A failure never stops the loop.
    pub async fn fetch_all(&self, models: &[&RemoteModel]) -> FetchSummary {
        let mut summary = FetchSummary::default();
        for model in models {
            summary.attempted += 1;
            println!("\n{} (~{} MB)", model.name, model.size_mb);
            println!("  {}", model.description);
            match self.fetch(model).await {
                Ok(FetchOutcome::AlreadyPresent) => {
                    println!("  Already exists, skipping");
                    summary.succeeded += 1;
                }
                Ok(FetchOutcome::Downloaded { bytes }) => {
                    println!("  ✓ Downloaded {} ({})", model.filename, format_bytes(bytes));
                    summary.succeeded += 1;
                }
                Err(e) => {
                    warn!("download failed for {}: {e}", model.name);
                    println!("  ✗ {e}");
                    summary.failures.push((model.name.to_string(), e));
                }
            }
        }
        summary
    }

    /// Refuse to start a download that cannot fit on disk
    fn check_disk_space(&self, required_mb: u64) -> std::result::Result<(), FetchError> {
        let stats = nix::sys::statvfs::statvfs(&self.dest_dir)
            .map_err(|e| FetchError::Other(format!("Failed to check disk space: {e}")))?;

        let available_bytes = stats.blocks_available() * stats.block_size();
        // 100MB safety margin on top of the expected size
        let required_bytes = required_mb * 1_024 * 1_024 + 100 * 1_024 * 1_024;

        if available_bytes < required_bytes {
            return Err(FetchError::Other(format!(
                "Not enough disk space: {} MB required, {} MB available",
                required_bytes / (1_024 * 1_024),
                available_bytes / (1_024 * 1_024)
            )));
        }
        Ok(())
    }
}

fn progress_bar(total: Option<u64>, name: &str) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::with_template("  [{bar:50}] {percent}% ({bytes}/{total_bytes})")
                    .expect("valid progress template")
                    .progress_chars("██░"),
            );
            bar
        }
        None => {
            // no content length from the server; fall back to a spinner
            let bar = ProgressBar::new_spinner();
            bar.set_message(format!("Downloading {name}"));
            bar
        }
    }
}

/// Format bytes as a human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[(u64, &str)] = &[(1 << 30, "GB"), (1 << 20, "MB"), (1 << 10, "KB")];
    for &(scale, unit) in UNITS {
        if bytes >= scale {
            return format!("{:.2} {unit}", bytes as f64 / scale as f64);
        }
    }
    format!("{bytes} B")
}
