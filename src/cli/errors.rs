use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Memory budget must be greater than 0, got: {budget}")]
    ZeroBudget { budget: usize },

    #[error("Image axes '{axes}' have {n} spatial axes; a network for 2 or 3 is required")]
    UnsupportedDimensions { axes: String, n: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Unetile(#[from] unetile::Error),
}
