use std::collections::HashMap;

use ndarray::{ArrayD, Axis as NdAxis, Slice};
use tracing::info;

use crate::error::{Error, Result};
use crate::types::{Axis, AxisOrder};

/// Makes the network input divisible by the per-axis block sizes and undoes
/// that after prediction.
pub trait Resizer {
    fn before(
        &mut self,
        x: ArrayD<f32>,
        axes: &AxisOrder,
        block_sizes: &[usize],
    ) -> Result<ArrayD<f32>>;
    fn after(&mut self, x: ArrayD<f32>, axes: &AxisOrder) -> Result<ArrayD<f32>>;
}

/// Requires the input to already be divisible; never changes the array.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoResizer;

impl Resizer for NoResizer {
    fn before(
        &mut self,
        x: ArrayD<f32>,
        axes: &AxisOrder,
        block_sizes: &[usize],
    ) -> Result<ArrayD<f32>> {
        for ((a, &len), &b) in axes.iter().zip(x.shape()).zip(block_sizes) {
            if b > 1 && len % b != 0 {
                return Err(Error::shape(format!(
                    "axis '{}' has length {}, which is not divisible by {}",
                    a, len, b
                )));
            }
        }
        Ok(x)
    }

    fn after(&mut self, x: ArrayD<f32>, _axes: &AxisOrder) -> Result<ArrayD<f32>> {
        Ok(x)
    }
}

/// How padded values are filled.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum PadMode {
    /// Mirror without repeating the edge value.
    #[default]
    Reflect,
    /// Repeat the edge value.
    Edge,
    Constant(f32),
}

/// Source index for padded position `i` (>= n) of an axis of length `n`.
fn source_index(mode: PadMode, i: usize, n: usize) -> usize {
    match mode {
        PadMode::Reflect if n > 1 => {
            let period = 2 * (n - 1);
            let k = i % period;
            if k < n { k } else { period - k }
        }
        _ => n - 1,
    }
}

/// Pads at the end of every axis up to the next block multiple; `after`
/// crops the prediction back to the original lengths.
#[derive(Debug, Default, Clone)]
pub struct PadAndCropResizer {
    pub mode: PadMode,
    original: HashMap<Axis, usize>,
}

impl PadAndCropResizer {
    pub fn new(mode: PadMode) -> Self {
        Self {
            mode,
            original: HashMap::new(),
        }
    }

    fn pad_axis(&self, x: ArrayD<f32>, axis: usize, target: usize) -> Result<ArrayD<f32>> {
        let n = x.len_of(NdAxis(axis));
        if target <= n {
            return Ok(x);
        }
        if n == 0 {
            return Err(Error::shape(format!("cannot pad empty axis {}", axis)));
        }
        let mut shape = x.shape().to_vec();
        shape[axis] = target;
        let mut out = ArrayD::<f32>::zeros(shape);
        out.slice_axis_mut(NdAxis(axis), Slice::from(0..n)).assign(&x);
        for i in n..target {
            let mut dst = out.index_axis_mut(NdAxis(axis), i);
            match self.mode {
                PadMode::Constant(v) => dst.fill(v),
                mode => dst.assign(&x.index_axis(NdAxis(axis), source_index(mode, i, n))),
            }
        }
        Ok(out)
    }
}

impl Resizer for PadAndCropResizer {
    fn before(
        &mut self,
        mut x: ArrayD<f32>,
        axes: &AxisOrder,
        block_sizes: &[usize],
    ) -> Result<ArrayD<f32>> {
        if x.ndim() != axes.len() || block_sizes.len() != axes.len() {
            return Err(Error::shape(format!(
                "array {:?}, axes '{}' and block sizes {:?} disagree in length",
                x.shape(),
                axes,
                block_sizes
            )));
        }
        self.original.clear();
        for (i, (a, &b)) in axes.iter().zip(block_sizes).enumerate() {
            let len = x.len_of(NdAxis(i));
            self.original.insert(a, len);
            let target = len.div_ceil(b.max(1)) * b.max(1);
            if target != len {
                info!(
                    "Padding axis {}: {} -> {} ({:?})",
                    a, len, target, self.mode
                );
                x = self.pad_axis(x, i, target)?;
            }
        }
        Ok(x)
    }

    fn after(&mut self, mut x: ArrayD<f32>, axes: &AxisOrder) -> Result<ArrayD<f32>> {
        if x.ndim() != axes.len() {
            return Err(Error::shape(format!(
                "array {:?} does not match axes '{}'",
                x.shape(),
                axes
            )));
        }
        for (i, a) in axes.iter().enumerate() {
            if a == Axis::C {
                continue;
            }
            // Axes the network dropped have no entry to restore
            let Some(&len) = self.original.get(&a) else {
                continue;
            };
            let cur = x.len_of(NdAxis(i));
            if len < cur {
                info!("Cropping axis {}: {} -> {}", a, cur, len);
                x.slice_axis_inplace(NdAxis(i), Slice::from(0..len));
            }
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{IxDyn, array};

    fn order(s: &str) -> AxisOrder {
        s.parse().unwrap()
    }

    #[test]
    fn reflect_index_mirrors_without_edge() {
        // 0 1 2 3 | 2 1 0 1 2
        let idx: Vec<usize> = (4..9).map(|i| source_index(PadMode::Reflect, i, 4)).collect();
        assert_eq!(idx, vec![2, 1, 0, 1, 2]);
        assert_eq!(source_index(PadMode::Reflect, 3, 1), 0);
        assert_eq!(source_index(PadMode::Edge, 7, 4), 3);
    }

    #[test]
    fn pads_to_block_multiple_and_crops_back() {
        let x = ArrayD::from_shape_fn(IxDyn(&[10, 13, 1]), |i| (i[0] * 13 + i[1]) as f32);
        let mut r = PadAndCropResizer::default();
        let padded = r.before(x.clone(), &order("YXC"), &[8, 8, 1]).unwrap();
        assert_eq!(padded.shape(), &[16, 16, 1]);
        assert_eq!(padded[[10, 0, 0]], x[[8, 0, 0]]);
        assert_eq!(padded[[0, 13, 0]], x[[0, 11, 0]]);

        let cropped = r.after(padded, &order("YXC")).unwrap();
        assert_eq!(cropped, x);
    }

    #[test]
    fn constant_and_edge_modes() {
        let x = array![[1.0f32, 2.0, 3.0]].into_dyn();
        let mut c = PadAndCropResizer::new(PadMode::Constant(-1.0));
        let p = c.before(x.clone(), &order("YX"), &[1, 4]).unwrap();
        assert_eq!(p, array![[1.0f32, 2.0, 3.0, -1.0]].into_dyn());

        let mut e = PadAndCropResizer::new(PadMode::Edge);
        let p = e.before(x, &order("YX"), &[1, 4]).unwrap();
        assert_eq!(p, array![[1.0f32, 2.0, 3.0, 3.0]].into_dyn());
    }

    #[test]
    fn crop_skips_channel_and_lost_axes() {
        let x = ArrayD::<f32>::zeros(IxDyn(&[3, 6, 6, 1]));
        let mut r = PadAndCropResizer::default();
        let _ = r.before(x, &order("ZYXC"), &[1, 4, 4, 1]).unwrap();
        // network dropped Z and emits two channels
        let y = ArrayD::<f32>::zeros(IxDyn(&[8, 8, 2]));
        let y = r.after(y, &order("YXC")).unwrap();
        assert_eq!(y.shape(), &[6, 6, 2]);
    }

    #[test]
    fn no_resizer_rejects_indivisible_axes() {
        let x = ArrayD::<f32>::zeros(IxDyn(&[12, 16, 1]));
        let err = NoResizer.before(x.clone(), &order("YXC"), &[8, 8, 1]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
        assert!(NoResizer.before(x, &order("YXC"), &[4, 8, 1]).is_ok());
    }
}
