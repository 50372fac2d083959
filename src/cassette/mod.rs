//! Cassettes: recorded port interactions used to replay runs deterministically.

pub mod format;
pub mod recorder;
pub mod replayer;

use std::path::PathBuf;

use thiserror::Error;

pub use format::{Cassette, Interaction};
pub use recorder::CassetteRecorder;
pub use replayer::CassetteReplayer;

/// Failures loading, saving or replaying a cassette.
#[derive(Debug, Error)]
pub enum CassetteError {
    /// The cassette file could not be read or written.
    #[error("cassette {path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The cassette file is not valid cassette YAML.
    #[error("cassette {path}: {source}")]
    Yaml {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        source: serde_yaml::Error,
    },
    /// Nothing was recorded for this port/method pair.
    #[error("no interactions recorded for {port}::{method}; available: [{available}]")]
    Unrecorded {
        /// Port requested.
        port: String,
        /// Method requested.
        method: String,
        /// Comma-separated `port::method` pairs present in the cassette.
        available: String,
    },
    /// Every recorded interaction for this pair has been served.
    #[error("all {count} interactions for {port}::{method} have been consumed")]
    Exhausted {
        /// Port requested.
        port: String,
        /// Method requested.
        method: String,
        /// Number recorded.
        count: usize,
    },
}
