//! The model capability consumed by tiled prediction, plus reference
//! implementations for testing and the CLI.
use ndarray::{ArrayD, ArrayViewD};
use thiserror::Error;

use crate::error::Error;

pub mod reference;

pub use reference::{MeanFilterNet, MemoryBudget};

/// Failure of a single model call.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Not enough (accelerator) memory for this tile; smaller tiles may work.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("{0}")]
    Failed(String),
}

impl ModelError {
    pub fn failed<E: std::fmt::Display>(e: E) -> Self {
        ModelError::Failed(e.to_string())
    }
}

impl From<ModelError> for Error {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::ResourceExhausted(msg) => Error::ResourceExhausted(msg),
            ModelError::Failed(msg) => Error::Model(msg),
        }
    }
}

/// A network that maps one tile laid out in the network input axes to an
/// array laid out in the network output axes. Spatial extents are preserved.
pub trait Model {
    fn apply(&mut self, tile: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError>;
}

impl<M: Model + ?Sized> Model for &mut M {
    fn apply(&mut self, tile: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        (**self).apply(tile)
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn apply(&mut self, tile: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        (**self).apply(tile)
    }
}

/// Model backed by a closure; see [`from_fn`].
pub struct FnModel<F>(F);

impl<F> Model for FnModel<F>
where
    F: FnMut(ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError>,
{
    fn apply(&mut self, tile: ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError> {
        (self.0)(tile)
    }
}

/// Wrap a closure as a [`Model`].
pub fn from_fn<F>(f: F) -> FnModel<F>
where
    F: FnMut(ArrayViewD<'_, f32>) -> Result<ArrayD<f32>, ModelError>,
{
    FnModel(f)
}
