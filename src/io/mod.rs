//! I/O layer: grayscale TIFF stacks in, float TIFF predictions out.
pub mod tiff;
pub use self::tiff::{read_tiff, write_tiff};
