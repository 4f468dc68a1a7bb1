//! Adaptive tiling: run the tiled executor and, whenever the model runs out
//! of memory, double the tile count along the axis with the largest tiles
//! and start over with a fresh plan.
use ndarray::ArrayD;
use tracing::{debug, info, warn};

use crate::core::tiling::axes::AxisRemapper;
use crate::core::tiling::executor::execute;
use crate::core::tiling::planner::{TilePlan, TilePlanner};
use crate::core::tiling::progress::{ProgressSink, best_effort};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::types::AxisOrder;

/// Default number of tile-count doublings before giving up.
pub const MAX_OOM_RETRIES: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_OOM_RETRIES,
        }
    }
}

/// Result of a successful adaptive run.
#[derive(Debug, Clone)]
pub struct TiledOutcome {
    pub output: ArrayD<f32>,
    /// Tile counts (network input axes) of the successful attempt.
    pub n_tiles: Vec<usize>,
    pub retries: usize,
}

/// Index of the eligible axis with the largest approximate tile size
/// `shape / n_tiles`; ties go to the lowest index.
pub fn largest_tile_axis(shape: &[usize], n_tiles: &[usize], eligible: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, (&len, &n)) in shape.iter().zip(n_tiles).enumerate() {
        if !eligible[i] {
            continue;
        }
        let size = len as f64 / n.max(1) as f64;
        if best.is_none_or(|(_, s)| size > s) {
            best = Some((i, size));
        }
    }
    best.map(|(i, _)| i)
}

fn describe(axes: &AxisOrder, n_tiles: &[usize]) -> String {
    let parts: Vec<String> = axes
        .iter()
        .zip(n_tiles)
        .map(|(a, n)| format!("{}: {}", a, n))
        .collect();
    format!("({})", parts.join(", "))
}

enum Phase {
    Planning,
    Executing(TilePlan),
    Retrying,
}

/// Drives the planner and executor through the retry state machine.
pub struct AdaptiveTiler<'a> {
    planner: &'a TilePlanner,
    axes_in: &'a AxisOrder,
    axes_out: &'a AxisOrder,
    n_channel_out: usize,
    policy: RetryPolicy,
    remapper: Option<&'a AxisRemapper>,
}

impl<'a> AdaptiveTiler<'a> {
    pub fn new(
        planner: &'a TilePlanner,
        axes_in: &'a AxisOrder,
        axes_out: &'a AxisOrder,
        n_channel_out: usize,
    ) -> Self {
        Self {
            planner,
            axes_in,
            axes_out,
            n_channel_out,
            policy: RetryPolicy::default(),
            remapper: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Report tile counts (notices and [`Error::OutOfMemory`]) per image
    /// axis instead of per network input axis.
    pub fn with_remapper(mut self, remapper: &'a AxisRemapper) -> Self {
        self.remapper = Some(remapper);
        self
    }

    fn reported(&self, n_tiles: &[usize]) -> Vec<usize> {
        match self.remapper {
            Some(r) => r.tiles_to_image(n_tiles),
            None => n_tiles.to_vec(),
        }
    }

    fn describe_tiles(&self, n_tiles: &[usize]) -> String {
        match self.remapper {
            Some(r) => describe(r.img_axes_in(), &r.tiles_to_image(n_tiles)),
            None => describe(self.axes_in, n_tiles),
        }
    }

    pub fn run<M: Model + ?Sized>(
        &self,
        model: &mut M,
        x: &ArrayD<f32>,
        n_tiles: Vec<usize>,
        progress: &mut dyn ProgressSink,
    ) -> Result<TiledOutcome> {
        let mut n_tiles = n_tiles;
        let mut retries = 0;
        let mut phase = Phase::Planning;

        loop {
            phase = match phase {
                Phase::Planning => {
                    let plan = self.planner.plan(x.shape(), &n_tiles)?;
                    best_effort(
                        progress.set_total(self.planner.total_tile_count(x.shape(), &n_tiles)),
                    );
                    Phase::Executing(plan)
                }
                Phase::Executing(plan) => match execute(
                    model,
                    x,
                    &plan,
                    self.axes_in,
                    self.axes_out,
                    self.n_channel_out,
                    progress,
                ) {
                    Ok(output) => {
                        best_effort(progress.close());
                        if retries > 0 {
                            info!(
                                "Prediction succeeded with n_tiles = {} after {} retries",
                                self.describe_tiles(&n_tiles),
                                retries
                            );
                        }
                        return Ok(TiledOutcome {
                            output,
                            n_tiles,
                            retries,
                        });
                    }
                    Err(e) if e.is_resource_exhausted() => {
                        debug!("Attempt with {:?} tiles failed: {}", plan.tiles_per_axis(), e);
                        Phase::Retrying
                    }
                    Err(e) => return Err(e),
                },
                Phase::Retrying => {
                    if retries >= self.policy.max_retries {
                        best_effort(progress.close());
                        return Err(Error::OutOfMemory {
                            retries,
                            n_tiles: self.reported(&n_tiles),
                        });
                    }
                    let axis = largest_tile_axis(x.shape(), &n_tiles, self.planner.eligible())
                        .ok_or_else(|| {
                            Error::InvalidTiles("no axis is eligible for tiling".to_string())
                        })?;
                    n_tiles[axis] = n_tiles[axis].saturating_mul(2);
                    retries += 1;
                    warn!(
                        "Out of memory, retrying with n_tiles = {}",
                        self.describe_tiles(&n_tiles)
                    );
                    Phase::Planning
                }
            };
        }
    }
}
