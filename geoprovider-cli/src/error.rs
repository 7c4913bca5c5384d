//! Error types emitted by the geoprovider CLI.
//!
//! Keep this error type reasonably small, as many CLI helpers return
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use geoprovider_core::{ErrorKind, ProviderError};
use thiserror::Error;

/// Errors emitted by the geoprovider CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// An option was present but unusable.
    #[error("invalid --{field}: {message}")]
    InvalidArgument {
        field: &'static str,
        message: String,
    },
    /// A payload path does not exist or is not a file.
    #[error("payload path {path:?} does not exist or is not a file")]
    MissingPayload { path: Utf8PathBuf },
    /// Reading a payload failed.
    #[error("failed to read payload from {source_name}: {source}")]
    ReadPayload {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
    /// The provider rejected the operation.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Serialising the command output failed.
    #[error("failed to serialise output: {0}")]
    SerialiseOutput(#[source] serde_json::Error),
    /// Writing the command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Provider errors map by kind: storage `1`, invalid input `2`, not found
    /// `3` and conflict `4`. Argument and payload problems count as invalid
    /// input; output failures as `1`.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Provider(error) => match error.kind() {
                ErrorKind::Storage => 1,
                ErrorKind::InvalidInput => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::Conflict => 4,
            },
            Self::ArgumentParsing(_)
            | Self::Configuration(_)
            | Self::MissingArgument { .. }
            | Self::InvalidArgument { .. }
            | Self::MissingPayload { .. }
            | Self::ReadPayload { .. } => 2,
            Self::SerialiseOutput(_) | Self::WriteOutput(_) => 1,
        }
    }
}
