#![allow(dead_code)]

use ndarray::{ArrayD, Dimension, IxDyn};
use unetile::{ProgressError, ProgressSink};

/// Progress sink that remembers every call.
#[derive(Debug, Default)]
pub struct Recorder {
    pub totals: Vec<usize>,
    pub advanced: usize,
    pub closed: usize,
}

impl ProgressSink for Recorder {
    fn set_total(&mut self, total: usize) -> Result<(), ProgressError> {
        self.totals.push(total);
        Ok(())
    }

    fn advance(&mut self, units: usize) -> Result<(), ProgressError> {
        self.advanced += units;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ProgressError> {
        self.closed += 1;
        Ok(())
    }
}

/// Sink whose every call fails.
pub struct Broken;

impl ProgressSink for Broken {
    fn set_total(&mut self, _total: usize) -> Result<(), ProgressError> {
        Err(ProgressError("display closed".to_string()))
    }

    fn advance(&mut self, _units: usize) -> Result<(), ProgressError> {
        Err(ProgressError("display closed".to_string()))
    }

    fn close(&mut self) -> Result<(), ProgressError> {
        Err(ProgressError("display closed".to_string()))
    }
}

/// Smooth, non-constant test image.
pub fn texture(shape: &[usize]) -> ArrayD<f32> {
    ArrayD::from_shape_fn(IxDyn(shape), |idx| {
        idx.slice()
            .iter()
            .enumerate()
            .map(|(i, &v)| ((v as f32) * 0.37 * (i + 1) as f32).sin())
            .sum::<f32>()
    })
}
