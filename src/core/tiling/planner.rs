//! Tile planning: where each tile's core starts and stops along every axis,
//! and how far its window extends into the neighbours for context.
use std::ops::Range;

use tracing::{info, warn};

use crate::core::tiling::axes::AxisRemapper;
use crate::error::{Error, Result};
use crate::types::NTiles;

/// What the planner keeps fixed when an axis cannot be split evenly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Guarantee {
    /// All tile cores have the same size except the last; may yield fewer
    /// tiles than requested.
    #[default]
    Size,
    /// Exactly the requested number of tiles; remainder blocks go to the
    /// outermost tiles.
    NTiles,
}

/// Tiling of a single axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSpec {
    pub count: usize,
    pub block_size: usize,
    pub overlap: usize,
}

/// One tile along one axis: the padded window and the core it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileWindow {
    pub start: usize,
    pub stop: usize,
    pub core_start: usize,
    pub core_stop: usize,
}

impl TileWindow {
    pub fn len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop == self.start
    }

    pub fn core_len(&self) -> usize {
        self.core_stop - self.core_start
    }

    /// Core range relative to the window.
    pub fn crop(&self) -> Range<usize> {
        (self.core_start - self.start)..(self.core_stop - self.start)
    }

    pub fn window(&self) -> Range<usize> {
        self.start..self.stop
    }

    pub fn core(&self) -> Range<usize> {
        self.core_start..self.core_stop
    }
}

/// Tile cores along one axis of length `len`.
fn axis_cores(len: usize, count: usize, block_size: usize, guarantee: Guarantee) -> Vec<Range<usize>> {
    let n_blocks = len.div_ceil(block_size).max(1);
    let count = count.clamp(1, n_blocks);
    if count == 1 {
        return vec![0..len];
    }

    let block_counts: Vec<usize> = match guarantee {
        Guarantee::Size => {
            let per_tile = n_blocks.div_ceil(count);
            let mut counts = vec![per_tile; n_blocks / per_tile];
            if n_blocks % per_tile > 0 {
                counts.push(n_blocks % per_tile);
            }
            counts
        }
        Guarantee::NTiles => {
            let per_tile = n_blocks / count;
            let remainder = n_blocks % count;
            let mut counts = vec![per_tile; count];
            for c in counts.iter_mut().take(remainder / 2) {
                *c += 1;
            }
            for c in counts.iter_mut().rev().take(remainder - remainder / 2) {
                *c += 1;
            }
            counts
        }
    };

    let mut cores = Vec::with_capacity(block_counts.len());
    let mut start = 0;
    for blocks in block_counts {
        let stop = ((start / block_size + blocks) * block_size).min(len);
        cores.push(start..stop);
        start = stop;
    }
    cores
}

/// Estimated number of model calls for a tiling, for progress display only.
pub fn total_tile_count(
    shape: &[usize],
    n_tiles: &[usize],
    block_sizes: &[usize],
    guarantee: Guarantee,
) -> usize {
    shape
        .iter()
        .zip(n_tiles)
        .zip(block_sizes)
        .map(|((&len, &n), &b)| axis_cores(len, n, b.max(1), guarantee).len())
        .product()
}

/// Immutable tiling of a whole array for one execution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePlan {
    shape: Vec<usize>,
    specs: Vec<TileSpec>,
    cores: Vec<Vec<Range<usize>>>,
}

impl TilePlan {
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn specs(&self) -> &[TileSpec] {
        &self.specs
    }

    /// Effective tile counts per axis, after clamping to the block count.
    pub fn counts(&self) -> Vec<usize> {
        self.specs.iter().map(|s| s.count).collect()
    }

    /// Tiles actually produced along each axis.
    pub fn tiles_per_axis(&self) -> Vec<usize> {
        self.cores.iter().map(Vec::len).collect()
    }

    pub fn total_tiles(&self) -> usize {
        self.cores.iter().map(Vec::len).product()
    }

    pub fn cores(&self, axis: usize) -> &[Range<usize>] {
        &self.cores[axis]
    }

    /// Padded window of tile `index` along `axis`, clamped to the array.
    pub fn window(&self, axis: usize, index: usize) -> TileWindow {
        let spec = &self.specs[axis];
        let core = &self.cores[axis][index];
        let margin = spec.overlap.div_ceil(spec.block_size) * spec.block_size;
        TileWindow {
            start: core.start.saturating_sub(margin),
            stop: (core.end + margin).min(self.shape[axis]),
            core_start: core.start,
            core_stop: core.end,
        }
    }

    /// All tile indices, row-major (axis 0 outermost).
    pub fn tile_indices(&self) -> TileIndices {
        TileIndices {
            dims: self.tiles_per_axis(),
            next: Some(vec![0; self.ndim()]),
        }
    }
}

/// Row-major iterator over the multi-index of every tile in a plan.
#[derive(Debug, Clone)]
pub struct TileIndices {
    dims: Vec<usize>,
    next: Option<Vec<usize>>,
}

impl Iterator for TileIndices {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.next.take()?;
        if self.dims.iter().any(|&d| d == 0) {
            return None;
        }
        let mut succ = current.clone();
        for axis in (0..succ.len()).rev() {
            succ[axis] += 1;
            if succ[axis] < self.dims[axis] {
                self.next = Some(succ);
                return Some(current);
            }
            succ[axis] = 0;
        }
        Some(current)
    }
}

/// Per-axis block sizes, overlaps and tiling eligibility of one network
/// layout. Builds a fresh [`TilePlan`] for every requested tiling.
#[derive(Debug, Clone)]
pub struct TilePlanner {
    block_sizes: Vec<usize>,
    overlaps: Vec<usize>,
    eligible: Vec<bool>,
    guarantee: Guarantee,
}

impl TilePlanner {
    pub fn new(block_sizes: Vec<usize>, overlaps: Vec<usize>, eligible: Vec<bool>) -> Result<Self> {
        if block_sizes.len() != overlaps.len() || block_sizes.len() != eligible.len() {
            return Err(Error::shape(format!(
                "block sizes ({}), overlaps ({}) and eligibility ({}) must cover the same axes",
                block_sizes.len(),
                overlaps.len(),
                eligible.len()
            )));
        }
        if let Some(i) = block_sizes.iter().position(|&b| b == 0) {
            return Err(Error::Config(format!("block size of axis {} must be positive", i)));
        }
        Ok(Self {
            block_sizes,
            overlaps,
            eligible,
            guarantee: Guarantee::Size,
        })
    }

    pub fn with_guarantee(mut self, guarantee: Guarantee) -> Self {
        self.guarantee = guarantee;
        self
    }

    pub fn block_sizes(&self) -> &[usize] {
        &self.block_sizes
    }

    pub fn overlaps(&self) -> &[usize] {
        &self.overlaps
    }

    pub fn eligible(&self) -> &[bool] {
        &self.eligible
    }

    pub fn guarantee(&self) -> Guarantee {
        self.guarantee
    }

    /// Reject zero counts and tiling requests on ineligible axes.
    pub fn check_counts(&self, n_tiles: &[usize]) -> Result<()> {
        if n_tiles.len() != self.eligible.len() {
            return Err(Error::TilesLength {
                expected: self.eligible.len(),
                got: n_tiles.len(),
            });
        }
        if n_tiles.iter().any(|&n| n == 0) {
            return Err(Error::InvalidTiles(
                "all values of n_tiles must be integer values >= 1".to_string(),
            ));
        }
        if let Some(i) = (0..n_tiles.len()).find(|&i| n_tiles[i] > 1 && !self.eligible[i]) {
            return Err(Error::InvalidTiles(format!(
                "tile count > 1 only allowed on spatial axes (axis {} requested {})",
                i, n_tiles[i]
            )));
        }
        Ok(())
    }

    pub fn plan(&self, shape: &[usize], n_tiles: &[usize]) -> Result<TilePlan> {
        if shape.len() != self.eligible.len() {
            return Err(Error::shape(format!(
                "array with {} dimensions cannot be planned for {} axes",
                shape.len(),
                self.eligible.len()
            )));
        }
        self.check_counts(n_tiles)?;

        let mut specs = Vec::with_capacity(shape.len());
        let mut cores = Vec::with_capacity(shape.len());
        for (axis, &len) in shape.iter().enumerate() {
            let block_size = self.block_sizes[axis];
            let n_blocks = len.div_ceil(block_size).max(1);
            let requested = n_tiles[axis];
            let count = requested.min(n_blocks);
            if count != requested {
                warn!(
                    "invalid value ({}) for n_tiles of axis {}, changing to {}",
                    requested, axis, count
                );
            }
            specs.push(TileSpec {
                count,
                block_size,
                overlap: self.overlaps[axis],
            });
            cores.push(axis_cores(len, count, block_size, self.guarantee));
        }

        let plan = TilePlan {
            shape: shape.to_vec(),
            specs,
            cores,
        };
        info!(
            "Tile plan for shape {:?}: {:?} tile(s) per axis, {} in total",
            plan.shape,
            plan.tiles_per_axis(),
            plan.total_tiles()
        );
        Ok(plan)
    }

    /// Progress estimate for a tiling of `shape`.
    pub fn total_tile_count(&self, shape: &[usize], n_tiles: &[usize]) -> usize {
        total_tile_count(shape, n_tiles, &self.block_sizes, self.guarantee)
    }
}

/// Turn a caller's tile request into per-network-axis counts, validating it
/// before any model call. `net_shape` is the shape after remapping to the
/// network input axes.
pub fn resolve_n_tiles(
    n_tiles: &NTiles,
    remapper: &AxisRemapper,
    net_shape: &[usize],
    planner: &TilePlanner,
) -> Result<Vec<usize>> {
    let img_ndim = remapper.img_axes_in().len();
    let per_network_axis = match n_tiles {
        NTiles::None => vec![1; net_shape.len()],
        NTiles::Scalar(0) => {
            return Err(Error::InvalidTiles(
                "all values of n_tiles must be integer values >= 1".to_string(),
            ));
        }
        NTiles::Scalar(n) => {
            // Largest eligible axis wins; ties go to the lowest index.
            let mut largest: Option<usize> = None;
            for (i, &len) in net_shape.iter().enumerate() {
                if planner.eligible()[i] && largest.is_none_or(|l| len > net_shape[l]) {
                    largest = Some(i);
                }
            }
            let largest = largest.ok_or_else(|| {
                Error::InvalidTiles("no axis is eligible for tiling".to_string())
            })?;
            let counts: Vec<usize> = (0..net_shape.len())
                .map(|i| if i == largest { *n } else { 1 })
                .collect();
            let img_counts = remapper.tiles_to_image(&counts);
            warn!("n_tiles should be a tuple with an entry for each image axis");
            warn!("Changing n_tiles to {:?}", img_counts);
            counts
        }
        NTiles::PerAxis(counts) => {
            if counts.len() != img_ndim {
                return Err(Error::TilesLength {
                    expected: img_ndim,
                    got: counts.len(),
                });
            }
            if counts.iter().any(|&n| n == 0) {
                return Err(Error::InvalidTiles(
                    "all values of n_tiles must be integer values >= 1".to_string(),
                ));
            }
            remapper.tiles_to_network(counts)?
        }
    };
    planner.check_counts(&per_network_axis)?;
    Ok(per_network_axis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner_2d() -> TilePlanner {
        // YXC with depth 4, overlap 94
        TilePlanner::new(vec![16, 16, 1], vec![94, 94, 0], vec![true, true, false]).unwrap()
    }

    #[test]
    fn even_split_of_256_into_two_tiles_per_axis() {
        let plan = planner_2d().plan(&[256, 256, 1], &[2, 2, 1]).unwrap();
        assert_eq!(plan.total_tiles(), 4);
        assert_eq!(plan.cores(0), &[0..128, 128..256]);
        assert_eq!(plan.cores(1), &[0..128, 128..256]);
        assert_eq!(plan.cores(2), &[0..1]);
    }

    #[test]
    fn windows_pad_by_whole_blocks_and_stay_in_bounds() {
        let plan = planner_2d().plan(&[256, 256, 1], &[2, 2, 1]).unwrap();
        // 94 rounds up to 6 blocks of 16 = 96
        assert_eq!(
            plan.window(0, 0),
            TileWindow { start: 0, stop: 224, core_start: 0, core_stop: 128 }
        );
        assert_eq!(
            plan.window(0, 1),
            TileWindow { start: 32, stop: 256, core_start: 128, core_stop: 256 }
        );
        assert_eq!(plan.window(0, 1).crop(), 96..224);
    }

    #[test]
    fn interior_cores_are_block_multiples() {
        let planner = TilePlanner::new(vec![8], vec![5], vec![true]).unwrap();
        for len in [8usize, 50, 97, 200, 333] {
            for n in 1..=7 {
                let plan = planner.plan(&[len], &[n]).unwrap();
                let cores = plan.cores(0);
                assert_eq!(cores.first().unwrap().start, 0);
                assert_eq!(cores.last().unwrap().end, len);
                for pair in cores.windows(2) {
                    assert_eq!(pair[0].end, pair[1].start);
                }
                for core in &cores[..cores.len() - 1] {
                    assert_eq!(core.len() % 8, 0, "len={} n={} cores={:?}", len, n, cores);
                }
            }
        }
    }

    #[test]
    fn size_guarantee_can_yield_fewer_tiles() {
        // 5 blocks into 4 tiles: 2 blocks each -> 3 tiles
        let planner = TilePlanner::new(vec![16], vec![0], vec![true]).unwrap();
        let plan = planner.plan(&[80], &[4]).unwrap();
        assert_eq!(plan.cores(0), &[0..32, 32..64, 64..80]);
        assert_eq!(planner.total_tile_count(&[80], &[4]), 3);

        let exact = planner.clone().with_guarantee(Guarantee::NTiles);
        let plan = exact.plan(&[80], &[4]).unwrap();
        assert_eq!(plan.cores(0), &[0..16, 16..32, 32..48, 48..80]);
    }

    #[test]
    fn counts_above_block_count_are_clamped() {
        let planner = TilePlanner::new(vec![16], vec![0], vec![true]).unwrap();
        let plan = planner.plan(&[32], &[8]).unwrap();
        assert_eq!(plan.counts(), vec![2]);
        assert_eq!(plan.total_tiles(), 2);
    }

    #[test]
    fn ineligible_axes_reject_tiling() {
        let err = planner_2d().plan(&[64, 64, 3], &[1, 1, 2]).unwrap_err();
        assert!(matches!(err, Error::InvalidTiles(_)));
        let err = planner_2d().plan(&[64, 64, 3], &[0, 1, 1]).unwrap_err();
        assert!(matches!(err, Error::InvalidTiles(_)));
    }

    #[test]
    fn tile_indices_are_row_major() {
        let planner = TilePlanner::new(vec![1, 1], vec![0, 0], vec![true, true]).unwrap();
        let plan = planner.plan(&[2, 3], &[2, 3]).unwrap();
        let order: Vec<Vec<usize>> = plan.tile_indices().collect();
        assert_eq!(
            order,
            vec![
                vec![0, 0],
                vec![0, 1],
                vec![0, 2],
                vec![1, 0],
                vec![1, 1],
                vec![1, 2]
            ]
        );
    }

    fn remapper(img: &str) -> AxisRemapper {
        AxisRemapper::new(img.parse().unwrap(), "YXC".parse().unwrap(), "YXC".parse().unwrap())
            .unwrap()
    }

    #[test]
    fn resolve_validates_length_and_positivity() {
        let r = remapper("YXC");
        let p = planner_2d();
        let shape = [64, 64, 1];
        assert!(matches!(
            resolve_n_tiles(&NTiles::PerAxis(vec![2, 2]), &r, &shape, &p),
            Err(Error::TilesLength { expected: 3, got: 2 })
        ));
        assert!(matches!(
            resolve_n_tiles(&NTiles::Scalar(0), &r, &shape, &p),
            Err(Error::InvalidTiles(_))
        ));
        assert!(matches!(
            resolve_n_tiles(&NTiles::PerAxis(vec![2, 0, 1]), &r, &shape, &p),
            Err(Error::InvalidTiles(_))
        ));
        assert_eq!(
            resolve_n_tiles(&NTiles::None, &r, &shape, &p).unwrap(),
            resolve_n_tiles(&NTiles::PerAxis(vec![1, 1, 1]), &r, &shape, &p).unwrap()
        );
    }

    #[test]
    fn legacy_scalar_goes_to_largest_axis_with_low_index_tie_break() {
        let r = remapper("YX");
        let p = planner_2d();
        assert_eq!(
            resolve_n_tiles(&NTiles::Scalar(4), &r, &[64, 128, 1], &p).unwrap(),
            vec![1, 4, 1]
        );
        assert_eq!(
            resolve_n_tiles(&NTiles::Scalar(4), &r, &[96, 96, 1], &p).unwrap(),
            vec![4, 1, 1]
        );
    }
}
