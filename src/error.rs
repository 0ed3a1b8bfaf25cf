//! Error types for bender
//!
//! All modules use `BenderResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for bender operations
pub type BenderResult<T> = Result<T, BenderError>;

/// All errors that can occur in bender
#[derive(Error, Debug)]
pub enum BenderError {
    // HTTP failures, classified after the retry budget is exhausted
    #[error("Server error ({status}) from asset origin for: {url}")]
    ServerError { status: u16, url: String },

    #[error("Url doesn't exist at asset origin ({status}): {url}")]
    NotFound { status: u16, url: String },

    #[error("Asset origin returned error ({status}) for: {url}")]
    ClientError { status: u16, url: String },

    #[error("Transport failure fetching {url}: {reason}")]
    Transport { url: String, reason: String },

    // Version resolution errors
    #[error("Could not find a build version for {0}")]
    VersionNotFound(String),

    #[error("Invalid version file (empty) from: {0}")]
    EmptyPointer(String),

    #[error("Version pointer for {project} resolved to another pointer: {value}")]
    DoublePointer { project: String, value: String },

    #[error("Unparseable build name for {project}: {value}")]
    InvalidBuildName { project: String, value: String },

    // Bundle path errors
    #[error("Malformed bundle path: {0}. Expected <project>/static[-<version>]/<path>")]
    MalformedBundlePath(String),

    #[error("Missing extension in static path: {0}. The file must end in 'js' or 'css'")]
    MissingExtension(String),

    #[error(
        "You cannot use the '{extension}' extension in this static path: {path}. \
         You must use 'js' or 'css' (it will work locally, but not against built assets)"
    )]
    PrecompiledExtension { extension: String, path: String },

    // Configuration errors
    #[error("Host project name is not configured (set project.name in bender.toml)")]
    MissingHostProject,

    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Missing manifest file: {0}")]
    ManifestMissing(PathBuf),

    #[error("Invalid manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BenderError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// True for failures of the fetch layer (as opposed to caller errors),
    /// i.e. the errors a scaffold build may log and skip per bundle.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            Self::ServerError { .. }
                | Self::NotFound { .. }
                | Self::ClientError { .. }
                | Self::Transport { .. }
                | Self::VersionNotFound(_)
                | Self::EmptyPointer(_)
        )
    }
}
