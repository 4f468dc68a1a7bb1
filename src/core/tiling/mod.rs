//! Adaptive tiled execution: axis remapping, block/overlap resolution, tile
//! planning, the tiled executor, and the out-of-memory retry loop.
pub mod axes;
pub mod blocks;
pub mod executor;
pub mod planner;
pub mod progress;
pub mod retry;

pub use axes::{AxisRemapper, move_axes, permute, permute_with_loss};
pub use blocks::{BlockLayout, receptive_field_overlap, resolve};
pub use executor::execute;
pub use planner::{
    Guarantee, TilePlan, TilePlanner, TileSpec, TileWindow, resolve_n_tiles, total_tile_count,
};
pub use progress::{LogProgress, NoProgress, ProgressError, ProgressSink};
pub use retry::{AdaptiveTiler, MAX_OOM_RETRIES, RetryPolicy, TiledOutcome, largest_tile_axis};
