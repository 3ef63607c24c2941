//! Error types for display lifecycle and configuration persistence

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// A display configuration that violates an invariant
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("display identifier must not be empty")]
    EmptyDisplayId,

    #[error("invalid display address {0:?} (expected something like \":1\")")]
    InvalidDisplayAddress(String),

    #[error("invalid resolution {width}x{height}: both dimensions must be positive")]
    InvalidResolution { width: u32, height: u32 },

    #[error("unsupported colour depth {depth} (supported: {supported:?})")]
    UnsupportedDepth {
        depth: u32,
        supported: &'static [u32],
    },

    #[error("display {0} is configured more than once")]
    DuplicateDisplayId(String),

    #[error("no display at index {index} (have {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Why a display server could not be started
#[derive(Error, Debug)]
pub enum StartError {
    #[error("cannot start {backend} display: missing {}", .missing.join(", "))]
    DependenciesMissing {
        backend: &'static str,
        missing: Vec<String>,
    },

    #[error("failed to launch {program}: {source}")]
    ProcessLaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("a display is already running on {address}; stop it first")]
    AlreadyRunning { address: String },

    #[error("invalid display configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

/// Why a configuration could not be pushed onto a running display
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("failed to launch {program}: {source}")]
    LaunchFailed {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    ToolFailed { program: String, status: ExitStatus },
}

/// Any failure while bringing up one display
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Start(#[from] StartError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Reading or writing the persisted display list failed
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("config file {} not found", .path.display())]
    NotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize display list: {0}")]
    Serialize(#[source] serde_json::Error),
}
