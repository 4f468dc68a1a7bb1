//! Axis remapping between the three orders a prediction passes through:
//! image axes, network input axes, and network output axes.
use ndarray::{ArrayD, Axis as NdAxis};

use crate::error::{Error, Result};
use crate::types::{Axis, AxisOrder};

fn check_ndim<T>(array: &ArrayD<T>, axes: &AxisOrder) -> Result<()> {
    if array.ndim() != axes.len() {
        return Err(Error::shape(format!(
            "array with shape {:?} has {} dimensions, but axes '{}' describe {}",
            array.shape(),
            array.ndim(),
            axes,
            axes.len()
        )));
    }
    Ok(())
}

/// Reorder `array` from `from` to `to`. Both orders must hold the same labels.
pub fn permute<T: Clone>(array: ArrayD<T>, from: &AxisOrder, to: &AxisOrder) -> Result<ArrayD<T>> {
    permute_with_loss(array, from, to, &[])
}

/// Like [`permute`], but labels of `from` missing in `to` are dropped when
/// they are listed in `lost` and have length 1.
pub fn permute_with_loss<T: Clone>(
    array: ArrayD<T>,
    from: &AxisOrder,
    to: &AxisOrder,
    lost: &[Axis],
) -> Result<ArrayD<T>> {
    check_ndim(&array, from)?;
    let initial_shape = array.shape().to_vec();
    let mut x = array;
    let mut fr = from.clone();

    for a in from.iter().filter(|a| !to.contains(*a)) {
        let i = fr
            .index_of(a)
            .ok_or_else(|| Error::shape(format!("axis '{}' missing from '{}'", a, fr)))?;
        if !lost.contains(&a) || x.len_of(NdAxis(i)) != 1 {
            return Err(Error::shape(format!(
                "image with shape {:?} and axes {} not compatible with target axes {}",
                initial_shape, from, to
            )));
        }
        x = x.index_axis_move(NdAxis(i), 0);
        fr = fr.without(&[a]);
    }

    let perm = to
        .iter()
        .map(|a| {
            fr.index_of(a).ok_or_else(|| {
                Error::shape(format!(
                    "image with shape {:?} and axes {} not compatible with target axes {}",
                    initial_shape, from, to
                ))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if perm.iter().enumerate().all(|(i, &p)| i == p) {
        return Ok(x);
    }
    Ok(x.permuted_axes(perm).as_standard_layout().into_owned())
}

/// Move axes from `from` to `to`. With `adjust_singletons`, singleton axes of
/// `from` unknown to `to` are removed and labels of `to` unknown to `from`
/// are added as singleton axes before permuting.
pub fn move_axes<T: Clone>(
    array: ArrayD<T>,
    from: &AxisOrder,
    to: &AxisOrder,
    adjust_singletons: bool,
) -> Result<ArrayD<T>> {
    check_ndim(&array, from)?;
    if !adjust_singletons {
        return permute(array, from, to);
    }

    let mut x = array;
    let mut fr = from.clone();
    for a in from.iter().filter(|a| !to.contains(*a)) {
        if let Some(i) = fr.index_of(a) {
            if x.len_of(NdAxis(i)) == 1 {
                x = x.index_axis_move(NdAxis(i), 0);
                fr = fr.without(&[a]);
            }
        }
    }
    let missing: Vec<Axis> = to.iter().filter(|a| !fr.contains(*a)).collect();
    for a in missing {
        let end = x.ndim();
        x = x.insert_axis(NdAxis(end));
        fr = fr.with_appended(a);
    }
    permute(x, &fr, to)
}

/// Bookkeeping for one prediction: which image axes map onto which network
/// axes, and which axes the network drops on output.
#[derive(Debug, Clone)]
pub struct AxisRemapper {
    img_in: AxisOrder,
    net_in: AxisOrder,
    net_out: AxisOrder,
    img_out: AxisOrder,
    lost: Vec<Axis>,
}

impl AxisRemapper {
    pub fn new(img_in: AxisOrder, net_in: AxisOrder, net_out: AxisOrder) -> Result<Self> {
        if !net_in.contains(Axis::C) || !net_out.contains(Axis::C) {
            return Err(Error::shape(format!(
                "network axes '{}' -> '{}' must both contain a channel axis",
                net_in, net_out
            )));
        }
        if let Some(extra) = net_out.iter().find(|a| !net_in.contains(*a)) {
            return Err(Error::shape(format!(
                "different kinds of output than input axes: '{}' not in '{}'",
                extra, net_in
            )));
        }
        let lost: Vec<Axis> = net_in.iter().filter(|a| !net_out.contains(*a)).collect();
        let img_out = img_in.without(&lost);
        Ok(Self {
            img_in,
            net_in,
            net_out,
            img_out,
            lost,
        })
    }

    pub fn img_axes_in(&self) -> &AxisOrder {
        &self.img_in
    }

    pub fn net_axes_in(&self) -> &AxisOrder {
        &self.net_in
    }

    pub fn net_axes_out(&self) -> &AxisOrder {
        &self.net_out
    }

    /// Image axes of the final result: input image axes minus lost axes.
    pub fn img_axes_out(&self) -> &AxisOrder {
        &self.img_out
    }

    pub fn lost_axes(&self) -> &[Axis] {
        &self.lost
    }

    /// Axes the output is allowed to be tiled along.
    pub fn tiling_axes(&self) -> AxisOrder {
        self.net_out.without(&[Axis::C])
    }

    /// Image layout -> network input layout.
    pub fn to_network<T: Clone>(&self, img: ArrayD<T>) -> Result<ArrayD<T>> {
        move_axes(img, &self.img_in, &self.net_in, true)
    }

    /// Network output layout -> image layout. If the image had no channel
    /// axis, output channels are appended last and dropped when there is
    /// only one.
    pub fn to_image<T: Clone>(&self, y: ArrayD<T>) -> Result<ArrayD<T>> {
        if self.img_out.contains(Axis::C) {
            return move_axes(y, &self.net_out, &self.img_out, true);
        }
        let target = self.img_out.with_appended(Axis::C);
        let y = move_axes(y, &self.net_out, &target, true)?;
        let last = y.ndim() - 1;
        if y.len_of(NdAxis(last)) == 1 {
            Ok(y.index_axis_move(NdAxis(last), 0))
        } else {
            Ok(y)
        }
    }

    /// Per-image-axis tile counts -> per-network-input-axis tile counts.
    pub fn tiles_to_network(&self, n_tiles: &[usize]) -> Result<Vec<usize>> {
        if n_tiles.len() != self.img_in.len() {
            return Err(Error::TilesLength {
                expected: self.img_in.len(),
                got: n_tiles.len(),
            });
        }
        for (a, &n) in self.img_in.iter().zip(n_tiles) {
            if !self.net_in.contains(a) && n != 1 {
                return Err(Error::InvalidTiles(format!(
                    "entry of n_tiles > 1 only allowed for axes '{}' (got {} for '{}')",
                    self.tiling_axes(),
                    n,
                    a
                )));
            }
        }
        Ok(self
            .net_in
            .iter()
            .map(|a| self.img_in.index_of(a).map_or(1, |i| n_tiles[i]))
            .collect())
    }

    /// Per-network-input-axis tile counts -> per-image-axis tile counts.
    pub fn tiles_to_image(&self, n_tiles: &[usize]) -> Vec<usize> {
        self.img_in
            .iter()
            .map(|a| self.net_in.index_of(a).map_or(1, |i| n_tiles[i]))
            .collect()
    }
}
