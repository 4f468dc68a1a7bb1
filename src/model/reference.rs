//! Deterministic stand-in networks. `MeanFilterNet` has the properties that
//! matter for tiling (finite receptive field, spatial shape preserved,
//! channel count remapped, U-Net style last activation) without any weights.
use ndarray::{ArrayD, ArrayViewD, Axis as NdAxis, Zip};
use tracing::debug;

use crate::core::config::{LastActivation, UNetConfig};
use crate::error::Result;
use crate::model::{Model, ModelError};
use crate::types::{Axis, AxisOrder};

#[inline]
fn sigmoid(v: f32) -> f32 {
    1.0 / (1.0 + (-v).exp())
}

/// Zero-padded box filter of `radius` along one axis.
fn box_filter_axis(x: &ArrayD<f32>, axis: usize, radius: usize) -> ArrayD<f32> {
    let mut out = ArrayD::<f32>::zeros(x.raw_dim());
    let norm = (2 * radius + 1) as f32;
    Zip::from(out.lanes_mut(NdAxis(axis)))
        .and(x.lanes(NdAxis(axis)))
        .par_for_each(|mut dst, src| {
            let n = src.len();
            for k in 0..n {
                let lo = k.saturating_sub(radius);
                let hi = (k + radius + 1).min(n);
                let mut acc = 0.0f32;
                for t in lo..hi {
                    acc += src[t];
                }
                dst[k] = acc / norm;
            }
        });
    out
}

/// Box-filters every pooled axis, averages the input channels, and emits
/// `n_channel_out` scaled copies through the last activation.
#[derive(Debug, Clone)]
pub struct MeanFilterNet {
    axes: AxisOrder,
    radius: usize,
    n_channel_out: usize,
    activation: LastActivation,
}

impl MeanFilterNet {
    pub fn new(
        axes: AxisOrder,
        radius: usize,
        n_channel_out: usize,
        activation: LastActivation,
    ) -> Self {
        Self {
            axes,
            radius,
            n_channel_out,
            activation,
        }
    }

    /// Network matching a configuration; the filter radius is one kernel
    /// radius per level, well inside the U-Net's receptive field.
    pub fn from_config(config: &UNetConfig) -> Result<Self> {
        Ok(Self::new(
            config.net_axes_in()?,
            config.unet_n_depth * (config.unet_kern_size / 2),
            config.n_channel_predicted(),
            config.unet_last_activation,
        ))
    }

    pub fn radius(&self) -> usize {
        self.radius
    }
}

impl Model for MeanFilterNet {
    fn apply(&mut self, tile: ArrayViewD<'_, f32>) -> std::result::Result<ArrayD<f32>, ModelError> {
        if tile.ndim() != self.axes.len() {
            return Err(ModelError::Failed(format!(
                "expected {} dimensions ({}), got shape {:?}",
                self.axes.len(),
                self.axes,
                tile.shape()
            )));
        }
        let channel = self
            .axes
            .index_of(Axis::C)
            .ok_or_else(|| ModelError::failed(format!("axes '{}' lack a channel axis", self.axes)))?;

        let mut filtered = tile.to_owned();
        for (i, a) in self.axes.iter().enumerate() {
            if a.is_pooled() && self.radius > 0 {
                filtered = box_filter_axis(&filtered, i, self.radius);
            }
        }
        let mean = filtered
            .mean_axis(NdAxis(channel))
            .ok_or_else(|| ModelError::failed("tile has no input channels"))?;

        let outputs: Vec<ArrayD<f32>> = (0..self.n_channel_out)
            .map(|o| mean.mapv(|v| v * (o + 1) as f32))
            .collect();
        let views: Vec<_> = outputs.iter().map(|o| o.view()).collect();
        let mut out = ndarray::stack(NdAxis(channel), &views).map_err(ModelError::failed)?;

        match self.activation {
            LastActivation::Sigmoid => out.mapv_inplace(sigmoid),
            LastActivation::Softmax => {
                for mut lane in out.lanes_mut(NdAxis(channel)) {
                    let max = lane.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
                    lane.mapv_inplace(|v| (v - max).exp());
                    let sum = lane.sum();
                    lane.mapv_inplace(|v| v / sum);
                }
            }
        }
        debug!("MeanFilterNet: {:?} -> {:?}", tile.shape(), out.shape());
        Ok(out)
    }
}

/// Simulated accelerator memory: tiles with more than `max_elements` input
/// elements fail with [`ModelError::ResourceExhausted`].
#[derive(Debug, Clone)]
pub struct MemoryBudget<M> {
    inner: M,
    max_elements: usize,
}

impl<M: Model> MemoryBudget<M> {
    pub fn new(inner: M, max_elements: usize) -> Self {
        Self {
            inner,
            max_elements,
        }
    }

    pub fn into_inner(self) -> M {
        self.inner
    }
}

impl<M: Model> Model for MemoryBudget<M> {
    fn apply(&mut self, tile: ArrayViewD<'_, f32>) -> std::result::Result<ArrayD<f32>, ModelError> {
        if tile.len() > self.max_elements {
            return Err(ModelError::ResourceExhausted(format!(
                "tile {:?} has {} elements, budget is {}",
                tile.shape(),
                tile.len(),
                self.max_elements
            )));
        }
        self.inner.apply(tile)
    }
}
