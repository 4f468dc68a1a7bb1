//! Crate-level error type and `Result` alias for structured error handling.
//! Axis and tiling validation failures, configuration problems, and model
//! failures each get their own variant; only `ResourceExhausted` is ever
//! recovered from (by the adaptive tiling loop).
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid n_tiles: {0}")]
    InvalidTiles(String),

    #[error("n_tiles must be an iterable of length {expected}, got {got} entries")]
    TilesLength { expected: usize, got: usize },

    #[error("Cannot parse n_tiles from '{0}': expected 'none', an integer, or a comma-separated list")]
    TilesParse(String),

    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error(
        "Giving up increasing number of tiles after {retries} retries (last n_tiles = {n_tiles:?}). Memory occupied by another process?"
    )]
    OutOfMemory { retries: usize, n_tiles: Vec<usize> },

    #[error("Model error: {0}")]
    Model(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),
}

impl Error {
    pub fn shape<S: Into<String>>(msg: S) -> Self {
        Error::ShapeMismatch(msg.into())
    }

    /// True for the one failure class the adaptive tiling loop retries on.
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, Error::ResourceExhausted(_))
    }
}
