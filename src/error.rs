use thiserror::Error;

/// Main error type for lensforge
#[derive(Error, Debug)]
pub enum LensforgeError {
    #[error("Tensor error: {0}")]
    Tensor(#[from] candle_core::Error),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("Download error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/lensforge/config.toml\n- Remove the file to fall back to built-in defaults\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Tracing/conversion-specific errors
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Tracing failed: {0}")]
    Trace(String),

    #[error("Operation '{op}' is not supported by the '{representation}' representation\n\nTroubleshooting:\n- Convert with the 'program' representation instead\n- Or pick a model kind whose graph avoids '{op}' stages")]
    UnsupportedOp { op: String, representation: String },

    #[error("Descriptor mismatch: {0}")]
    Descriptor(String),

    #[error("Failed to save bundle: {0}")]
    Save(String),
}

/// Failure taxonomy for the remote fetcher
///
/// Mirrors what the console reports per descriptor: protocol-level
/// rejection, transport-level failure, local filesystem failure, or
/// anything unclassified.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP error {status} for {url}")]
    Http {
        status: reqwest::StatusCode,
        url: String,
    },

    #[error("Transport error: {0}\n\nTroubleshooting:\n- Check internet connection\n- The vendor may have moved the file; see `lensforge list` for the expected URLs")]
    Transport(#[source] reqwest::Error),

    #[error("IO error while writing download: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, LensforgeError>;
