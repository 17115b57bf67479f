//! Error types for the learning engine and its driver

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for driver-level operations
pub type Result<T> = std::result::Result<T, Error>;

/// Invalid or inconsistent settings, rejected at construction time.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("network needs at least one layer")]
    NoLayers,

    #[error("layer {layer} has zero width")]
    ZeroWidth { layer: usize },

    #[error("layer {layer} weights must be 2D, found shape {found:?}")]
    WeightRank { layer: usize, found: Vec<usize> },

    #[error("layer {layer} expects {found} inputs but the previous layer produces {expected}")]
    LayerMismatch { layer: usize, expected: usize, found: usize },

    #[error("layer {layer} bias has shape {found:?}, expected [1, {expected}]")]
    BiasShape { layer: usize, expected: usize, found: Vec<usize> },

    #[error("network {what} width is {found}, expected {expected}")]
    Interface { what: &'static str, expected: usize, found: usize },

    #[error("learning rate must be positive and finite, got {0}")]
    LearningRate(f32),

    #[error("discount factor must lie in [0, 1], got {0}")]
    Discount(f32),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("grid {width}x{height} cannot hold a body of length {length}")]
    GridTooSmall { width: i32, height: i32, length: usize },

    #[error("invalid weight initialization: {0}")]
    Init(#[from] rand_distr::NormalError),

    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Checkpoint save/load failures. Always recoverable: the in-memory model is left untouched.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("checkpoint {0:?} does not exist")]
    NotFound(PathBuf),

    #[error("checkpoint I/O failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checkpoint {path:?} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },

    #[error("checkpoint format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("checkpoint holds {found} layers, model declares {expected}")]
    LayerCountMismatch { expected: usize, found: usize },

    #[error("checkpoint is missing array {0}")]
    MissingArray(String),

    #[error("array {key} has shape {found:?}, model declares {expected:?}")]
    ShapeMismatch { key: String, expected: Vec<usize>, found: Vec<usize> },
}

/// Failures writing the CSV training logs.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("log I/O error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Report(#[from] ReportError),
}
