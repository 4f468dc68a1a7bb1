//! Pre/post processing around tiled prediction: intensity normalization and
//! padding the input to block multiples.
pub mod normalize;
pub mod resize;

pub use normalize::{NoNormalizer, Normalizer, PercentileNormalizer, percentile};
pub use resize::{NoResizer, PadAndCropResizer, PadMode, Resizer};
