//! Error types with clear, actionable messages
//!
//! Every abort path in pubmend ends in one of these variants. Lookup
//! failures are scoped to a single package and recovered by the caller;
//! the others abort the whole invocation.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::LookupError;

#[derive(Error, Debug)]
pub enum Error {
    /// The manifest was expected on disk but does not exist
    #[error("Pubspec file not found: {path}\n\nRun pubmend from your project root or pass --file <path to pubspec.yaml>.")]
    ManifestNotFound { path: PathBuf },

    /// The catalog could not answer a lookup
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// The manifest is not valid enough to parse or re-serialize
    #[error("Your pubspec file has a syntax problem and could not be edited.\n\nDetails: {detail}\n\nFix the YAML syntax (or set useLegacyParser: true) and try again.")]
    MalformedManifest { detail: String },

    /// Reading or writing the manifest failed
    #[error("Failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Anything else
    #[error("Unexpected internal error: {0:#}\n\nThis is a bug in pubmend. Please report it to the maintainers along with the details above.")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn malformed(detail: impl std::fmt::Display) -> Self {
        Error::MalformedManifest {
            detail: detail.to_string(),
        }
    }

    /// Internal faults are the only errors worth a bug report
    pub fn is_critical(&self) -> bool {
        matches!(self, Error::Internal(_))
    }

    /// Whether retrying the same operation could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Lookup(e) if e.is_retryable())
    }
}

impl From<serde_yaml_ng::Error> for Error {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Error::malformed(err)
    }
}
