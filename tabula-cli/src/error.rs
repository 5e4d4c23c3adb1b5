//! Error types emitted by the Tabula CLI.
//!
//! Request-level failures are reported as envelopes on stdout; the variants
//! here cover everything that prevents an envelope from being produced.

use std::sync::Arc;

use camino::Utf8PathBuf;
use tabula_data::ServiceBuildError;
use thiserror::Error;

/// Errors emitted by the Tabula CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A configured value is outside its accepted range.
    #[error("invalid {field}: {reason}")]
    InvalidOverride {
        field: &'static str,
        reason: &'static str,
    },
    /// The async runtime could not be started.
    #[error("failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The transport or scratch directory could not be set up.
    #[error(transparent)]
    ServiceBuild(#[from] ServiceBuildError),
    /// Opening the request file failed.
    #[error("failed to open request at {path:?}: {source}")]
    OpenRequest {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The one-off scratch sweep could not list its directory.
    #[error("failed to sweep {dir:?}: {source}")]
    Sweep {
        dir: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Serializing command output failed.
    #[error("failed to serialize output: {0}")]
    SerializeOutput(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
