use ndarray::{ArrayD, Axis as NdAxis};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Axis, AxisOrder};

/// Intensity normalization applied once before and once after prediction.
pub trait Normalizer {
    fn before(&mut self, x: ArrayD<f32>, axes: &AxisOrder) -> Result<ArrayD<f32>>;
    fn after(&mut self, x: ArrayD<f32>, axes: &AxisOrder) -> Result<ArrayD<f32>>;
}

/// Leaves intensities untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNormalizer;

impl Normalizer for NoNormalizer {
    fn before(&mut self, x: ArrayD<f32>, _axes: &AxisOrder) -> Result<ArrayD<f32>> {
        Ok(x)
    }

    fn after(&mut self, x: ArrayD<f32>, _axes: &AxisOrder) -> Result<ArrayD<f32>> {
        Ok(x)
    }
}

/// Linear-interpolated percentile of `values` (sorted in place), `p` in [0, 100].
pub fn percentile(values: &mut [f32], p: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let rank = (p.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    values[lo] + (values[hi] - values[lo]) * frac
}

/// Per-channel percentile normalization: maps the `pmin` percentile to 0
/// and the `pmax` percentile to 1. With `do_after`, predictions are mapped
/// back to the input intensity range.
#[derive(Debug, Clone)]
pub struct PercentileNormalizer {
    pub pmin: f64,
    pub pmax: f64,
    pub do_after: bool,
    pub eps: f32,
    mi: Vec<f32>,
    ma: Vec<f32>,
}

impl PercentileNormalizer {
    pub fn new(pmin: f64, pmax: f64, do_after: bool) -> Result<Self> {
        if !(0.0 <= pmin && pmin < pmax && pmax <= 100.0) {
            return Err(Error::Config(format!(
                "percentiles must satisfy 0 <= pmin < pmax <= 100, got pmin={} pmax={}",
                pmin, pmax
            )));
        }
        Ok(Self {
            pmin,
            pmax,
            do_after,
            eps: 1e-20,
            mi: Vec::new(),
            ma: Vec::new(),
        })
    }

    pub fn with_eps(mut self, eps: f32) -> Self {
        self.eps = eps;
        self
    }

    /// (low, high) percentile values per channel from the last `before` call.
    pub fn ranges(&self) -> Vec<(f32, f32)> {
        self.mi.iter().copied().zip(self.ma.iter().copied()).collect()
    }
}

impl Default for PercentileNormalizer {
    fn default() -> Self {
        Self {
            pmin: 2.0,
            pmax: 99.8,
            do_after: false,
            eps: 1e-20,
            mi: Vec::new(),
            ma: Vec::new(),
        }
    }
}

impl Normalizer for PercentileNormalizer {
    fn before(&mut self, mut x: ArrayD<f32>, axes: &AxisOrder) -> Result<ArrayD<f32>> {
        self.mi.clear();
        self.ma.clear();
        match axes.index_of(Axis::C) {
            Some(c) => {
                for mut channel in x.axis_iter_mut(NdAxis(c)) {
                    let mut values: Vec<f32> = channel.iter().copied().collect();
                    let mi = percentile(&mut values, self.pmin);
                    let ma = percentile(&mut values, self.pmax);
                    let scale = ma - mi + self.eps;
                    channel.mapv_inplace(|v| (v - mi) / scale);
                    self.mi.push(mi);
                    self.ma.push(ma);
                }
            }
            None => {
                let mut values: Vec<f32> = x.iter().copied().collect();
                let mi = percentile(&mut values, self.pmin);
                let ma = percentile(&mut values, self.pmax);
                let scale = ma - mi + self.eps;
                x.mapv_inplace(|v| (v - mi) / scale);
                self.mi.push(mi);
                self.ma.push(ma);
            }
        }
        info!(
            "Normalized percentiles {}..{}: {:?}",
            self.pmin,
            self.pmax,
            self.ranges()
        );
        Ok(x)
    }

    fn after(&mut self, mut x: ArrayD<f32>, axes: &AxisOrder) -> Result<ArrayD<f32>> {
        if !self.do_after {
            return Ok(x);
        }
        if self.mi.is_empty() {
            return Err(Error::Config(
                "PercentileNormalizer::after called before before".to_string(),
            ));
        }
        let ranges = self.ranges();
        let c = axes.index_of(Axis::C);
        match (c, ranges.len()) {
            (_, 1) => {
                let (mi, ma) = ranges[0];
                x.mapv_inplace(|v| (ma - mi) * v + mi);
            }
            (Some(c), n) if x.len_of(NdAxis(c)) == n => {
                for (mut channel, &(mi, ma)) in x.axis_iter_mut(NdAxis(c)).zip(&ranges) {
                    channel.mapv_inplace(|v| (ma - mi) * v + mi);
                }
            }
            _ => {
                return Err(Error::shape(format!(
                    "cannot undo normalization of {} channels on array {:?} with axes '{}'",
                    ranges.len(),
                    x.shape(),
                    axes
                )));
            }
        }
        debug!("Restored intensity range on {:?}", x.shape());
        Ok(x)
    }
}
