//! Runs a model tile by tile over a planned array and stitches the tile
//! interiors into one full-size output.
use ndarray::{ArrayD, IxDyn, Slice};
use tracing::debug;

use crate::core::tiling::planner::{TilePlan, TileWindow};
use crate::core::tiling::progress::{ProgressSink, best_effort};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::types::{Axis, AxisOrder};

/// Output shape for `input_shape` (in `axes_in`) after a network that emits
/// `axes_out` with `n_channel_out` channels.
pub fn output_shape(
    input_shape: &[usize],
    axes_in: &AxisOrder,
    axes_out: &AxisOrder,
    n_channel_out: usize,
) -> Result<Vec<usize>> {
    axes_out
        .iter()
        .map(|a| {
            if a == Axis::C {
                return Ok(n_channel_out);
            }
            axes_in
                .index_of(a)
                .map(|i| input_shape[i])
                .ok_or_else(|| Error::shape(format!("output axis '{}' not in input axes '{}'", a, axes_in)))
        })
        .collect()
}

/// Execute `model` over every tile of `plan` and assemble the result.
///
/// `x` is laid out in `axes_in`; the model returns tiles in `axes_out`.
/// Only the core of each tile is kept, the overlap margin is discarded.
/// Tiling along axes missing from `axes_out` is rejected.
pub fn execute<M: Model + ?Sized>(
    model: &mut M,
    x: &ArrayD<f32>,
    plan: &TilePlan,
    axes_in: &AxisOrder,
    axes_out: &AxisOrder,
    n_channel_out: usize,
    progress: &mut dyn ProgressSink,
) -> Result<ArrayD<f32>> {
    if x.ndim() != axes_in.len() || x.shape() != plan.shape() {
        return Err(Error::shape(format!(
            "array with shape {:?} does not match axes '{}' and plan shape {:?}",
            x.shape(),
            axes_in,
            plan.shape()
        )));
    }

    // Input axis feeding each output axis; None for the channel axis.
    let sources: Vec<Option<usize>> = axes_out
        .iter()
        .map(|a| if a == Axis::C { None } else { axes_in.index_of(a) })
        .collect();
    for (i, &n) in plan.tiles_per_axis().iter().enumerate() {
        let a = axes_in.axes()[i];
        if n > 1 && (a == Axis::C || !axes_out.contains(a)) {
            return Err(Error::shape(format!(
                "cannot tile along axis '{}' which is not a spatial output axis of '{}'",
                a, axes_out
            )));
        }
    }

    let out_shape = output_shape(x.shape(), axes_in, axes_out, n_channel_out)?;
    let mut output = ArrayD::<f32>::zeros(IxDyn(&out_shape));

    for index in plan.tile_indices() {
        let windows: Vec<TileWindow> = index
            .iter()
            .enumerate()
            .map(|(axis, &i)| plan.window(axis, i))
            .collect();
        let tile = x.slice_each_axis(|d| Slice::from(windows[d.axis.index()].window()));
        debug!("Tile {:?}: window shape {:?}", index, tile.shape());

        let result = model.apply(tile).map_err(Error::from)?;

        if result.ndim() != axes_out.len() {
            return Err(Error::shape(format!(
                "model returned shape {:?} for output axes '{}'",
                result.shape(),
                axes_out
            )));
        }
        for (j, source) in sources.iter().enumerate() {
            let expected = match source {
                Some(i) => windows[*i].len(),
                None => n_channel_out,
            };
            if result.shape()[j] != expected {
                return Err(Error::shape(format!(
                    "model returned shape {:?} for tile {:?}; axis '{}' should have length {}",
                    result.shape(),
                    index,
                    axes_out.axes()[j],
                    expected
                )));
            }
        }

        let interior = result.slice_each_axis(|d| match sources[d.axis.index()] {
            Some(i) => Slice::from(windows[i].crop()),
            None => Slice::from(..),
        });
        output
            .slice_each_axis_mut(|d| match sources[d.axis.index()] {
                Some(i) => Slice::from(windows[i].core()),
                None => Slice::from(..),
            })
            .assign(&interior);

        best_effort(progress.advance(1));
    }

    Ok(output)
}
