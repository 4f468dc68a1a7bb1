//! Per-axis block sizes and tile overlaps derived from the network depth and
//! kernel size.
use crate::error::{Error, Result};
use crate::types::{Axis, AxisOrder};

/// Measured receptive-field overlaps of the U-Net for (depth, kernel size).
const MEASURED_OVERLAPS: &[((usize, usize), usize)] = &[
    ((1, 3), 9),
    ((1, 5), 17),
    ((1, 7), 25),
    ((2, 3), 22),
    ((2, 5), 43),
    ((2, 7), 62),
    ((3, 3), 46),
    ((3, 5), 92),
    ((3, 7), 138),
    ((4, 3), 94),
    ((4, 5), 188),
    ((4, 7), 282),
    ((5, 3), 190),
    ((5, 5), 380),
    ((5, 7), 570),
];

/// Block sizes and overlaps for every axis of a network layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockLayout {
    pub block_sizes: Vec<usize>,
    pub overlaps: Vec<usize>,
}

impl BlockLayout {
    /// Overlaps expressed in whole blocks, rounded up.
    pub fn n_block_overlaps(&self) -> Vec<usize> {
        self.overlaps
            .iter()
            .zip(&self.block_sizes)
            .map(|(&o, &b)| o.div_ceil(b))
            .collect()
    }
}

fn check_depth_and_kernel(n_depth: usize, kern_size: usize) -> Result<()> {
    if n_depth == 0 {
        return Err(Error::Config("unet_n_depth must be >= 1".to_string()));
    }
    if kern_size == 0 || kern_size % 2 == 0 {
        return Err(Error::Config(format!(
            "unet_kern_size must be a positive odd number, got {}",
            kern_size
        )));
    }
    Ok(())
}

/// Divisibility unit imposed by `n_depth` 2x pooling stages.
pub fn pooling_block_size(n_depth: usize) -> Result<usize> {
    check_depth_and_kernel(n_depth, 1)?;
    u32::try_from(n_depth)
        .ok()
        .and_then(|d| 1usize.checked_shl(d))
        .filter(|&b| b > 0)
        .ok_or_else(|| Error::Config(format!("block size 2^{} overflows", n_depth)))
}

/// Context (in pixels, per side) a tile needs so that its interior matches
/// untiled prediction.
pub fn receptive_field_overlap(n_depth: usize, kern_size: usize) -> Result<usize> {
    check_depth_and_kernel(n_depth, kern_size)?;
    if let Some(&(_, o)) = MEASURED_OVERLAPS
        .iter()
        .find(|((d, k), _)| *d == n_depth && *k == kern_size)
    {
        return Ok(o);
    }
    // (k-1)(3*2^d - 2) + 1: two convolutions per level on the way down, at
    // the bottom, and on the way up.
    let block = pooling_block_size(n_depth)?;
    block
        .checked_mul(3)
        .and_then(|v| v.checked_sub(2))
        .and_then(|v| v.checked_mul(kern_size - 1))
        .and_then(|v| v.checked_add(1))
        .ok_or_else(|| {
            Error::Config(format!(
                "overlap for n_depth={} and kern_size={} overflows",
                n_depth, kern_size
            ))
        })
}

/// Resolve block sizes and overlaps for each axis of `axes`.
pub fn resolve(axes: &AxisOrder, n_depth: usize, kern_size: usize) -> Result<BlockLayout> {
    let block = pooling_block_size(n_depth)?;
    let overlap = receptive_field_overlap(n_depth, kern_size)?;
    let block_sizes = axes
        .iter()
        .map(|a| if a.is_pooled() { block } else { 1 })
        .collect();
    let overlaps = axes
        .iter()
        .map(|a| match a {
            Axis::C | Axis::S => 0,
            _ => overlap,
        })
        .collect();
    Ok(BlockLayout {
        block_sizes,
        overlaps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spatial_axes_get_pooling_block_and_overlap() {
        let axes: AxisOrder = "ZYXC".parse().unwrap();
        let layout = resolve(&axes, 4, 3).unwrap();
        assert_eq!(layout.block_sizes, vec![16, 16, 16, 1]);
        assert_eq!(layout.overlaps, vec![94, 94, 94, 0]);
        assert_eq!(layout.n_block_overlaps(), vec![6, 6, 6, 0]);
    }

    #[test]
    fn unmeasured_combinations_use_the_analytic_bound() {
        assert_eq!(receptive_field_overlap(6, 3).unwrap(), 2 * (3 * 64 - 2) + 1);
        assert_eq!(receptive_field_overlap(2, 9).unwrap(), 8 * (3 * 4 - 2) + 1);
    }

    #[test]
    fn invalid_depth_or_kernel_is_a_config_error() {
        let axes: AxisOrder = "YXC".parse().unwrap();
        assert!(matches!(resolve(&axes, 0, 3), Err(Error::Config(_))));
        assert!(matches!(resolve(&axes, 2, 0), Err(Error::Config(_))));
        assert!(matches!(resolve(&axes, 2, 4), Err(Error::Config(_))));
        assert!(matches!(pooling_block_size(200), Err(Error::Config(_))));
    }
}
