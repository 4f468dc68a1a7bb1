//! High-level library API: bind a model to a `UNetConfig` and predict whole
//! images of any size and axis order, plus file and directory helpers built
//! on top. Prefer these entrypoints over the low-level tiling modules.
use std::path::{Path, PathBuf};

use ndarray::{ArrayD, ArrayViewD};
use tracing::{error, info};

use crate::core::config::UNetConfig;
use crate::core::processing::{
    NoNormalizer, Normalizer, PadAndCropResizer, PercentileNormalizer, Resizer,
};
use crate::core::tiling::{
    AdaptiveTiler, AxisRemapper, Guarantee, LogProgress, ProgressSink, RetryPolicy, TilePlanner,
    blocks, resolve_n_tiles,
};
use crate::error::{Error, Result};
use crate::io::tiff::{read_tiff, write_tiff};
use crate::model::Model;
use crate::types::{Axis, AxisOrder, NTiles};

/// Result of [`UNet::predict_with`].
#[derive(Debug, Clone)]
pub struct Prediction {
    pub output: ArrayD<f32>,
    /// Axes of `output`: the image axes minus the axes the network drops,
    /// plus a trailing channel axis when there are several output channels.
    pub axes: AxisOrder,
    /// Tile counts (image axes) of the successful attempt.
    pub n_tiles: Vec<usize>,
    pub retries: usize,
}

/// A model bound to its network configuration.
pub struct UNet<M> {
    config: UNetConfig,
    model: M,
    policy: RetryPolicy,
    guarantee: Guarantee,
}

impl<M: Model> UNet<M> {
    pub fn new(config: UNetConfig, model: M) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            model,
            policy: RetryPolicy::default(),
            guarantee: Guarantee::default(),
        })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_guarantee(mut self, guarantee: Guarantee) -> Self {
        self.guarantee = guarantee;
        self
    }

    pub fn config(&self) -> &UNetConfig {
        &self.config
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Predict with percentile normalization, reflect padding and progress
    /// logged through `tracing`.
    pub fn predict(
        &mut self,
        img: ArrayViewD<'_, f32>,
        axes: &str,
        n_tiles: &NTiles,
    ) -> Result<ArrayD<f32>> {
        let mut normalizer = PercentileNormalizer::default();
        let mut resizer = PadAndCropResizer::default();
        let mut progress = LogProgress::default();
        self.predict_with(
            img,
            axes,
            n_tiles,
            &mut normalizer,
            &mut resizer,
            &mut progress,
        )
        .map(|p| p.output)
    }

    /// Full prediction with explicit collaborators.
    ///
    /// `axes` describes `img` (e.g. `"YX"`, `"ZYXC"`); `n_tiles` is given per
    /// image axis. The caller's array is never modified.
    pub fn predict_with(
        &mut self,
        img: ArrayViewD<'_, f32>,
        axes: &str,
        n_tiles: &NTiles,
        normalizer: &mut dyn Normalizer,
        resizer: &mut dyn Resizer,
        progress: &mut dyn ProgressSink,
    ) -> Result<Prediction> {
        let img_axes = AxisOrder::parse_for_ndim(axes, img.ndim())?;
        let remapper = AxisRemapper::new(
            img_axes,
            self.config.net_axes_in()?,
            self.config.net_axes_out()?,
        )?;
        let net_in = remapper.net_axes_in().clone();
        let net_out = remapper.net_axes_out().clone();

        let x = remapper.to_network(img.to_owned())?;
        let c = net_in
            .index_of(Axis::C)
            .ok_or_else(|| Error::shape(format!("network axes '{}' lack 'C'", net_in)))?;
        if x.len_of(ndarray::Axis(c)) != self.config.n_channel_in {
            return Err(Error::shape(format!(
                "image with {} channel(s) does not match n_channel_in = {}",
                x.len_of(ndarray::Axis(c)),
                self.config.n_channel_in
            )));
        }

        let layout = blocks::resolve(
            &net_in,
            self.config.unet_n_depth,
            self.config.unet_kern_size,
        )?;
        let tiling_axes = remapper.tiling_axes();
        let eligible: Vec<bool> = net_in.iter().map(|a| tiling_axes.contains(a)).collect();
        let planner = TilePlanner::new(layout.block_sizes.clone(), layout.overlaps, eligible)?
            .with_guarantee(self.guarantee);
        let n_tiles = resolve_n_tiles(n_tiles, &remapper, x.shape(), &planner)?;

        let x = normalizer.before(x, &net_in)?;
        let x = resizer.before(x, &net_in, &layout.block_sizes)?;

        let n_channel_out = self.config.n_channel_predicted();
        let outcome = AdaptiveTiler::new(&planner, &net_in, &net_out, n_channel_out)
            .with_policy(self.policy)
            .with_remapper(&remapper)
            .run(&mut self.model, &x, n_tiles, progress)?;

        let c_out = net_out
            .index_of(Axis::C)
            .ok_or_else(|| Error::shape(format!("network axes '{}' lack 'C'", net_out)))?;
        if outcome.output.len_of(ndarray::Axis(c_out)) != n_channel_out {
            return Err(Error::shape(format!(
                "network produced {} channel(s), expected {}",
                outcome.output.len_of(ndarray::Axis(c_out)),
                n_channel_out
            )));
        }

        let y = resizer.after(outcome.output, &net_out)?;
        let y = normalizer.after(y, &net_out)?;
        let y = remapper.to_image(y)?;

        let out_axes = if y.ndim() == remapper.img_axes_out().len() {
            remapper.img_axes_out().clone()
        } else {
            remapper.img_axes_out().with_appended(Axis::C)
        };
        Ok(Prediction {
            output: y,
            axes: out_axes,
            n_tiles: remapper.tiles_to_image(&outcome.n_tiles),
            retries: outcome.retries,
        })
    }
}

/// Options for the file-level helpers.
#[derive(Debug, Clone)]
pub struct PredictOptions {
    pub axes: String,
    pub n_tiles: NTiles,
    pub normalize: bool,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            axes: "YX".to_string(),
            n_tiles: NTiles::None,
            normalize: true,
        }
    }
}

/// Read a TIFF, predict it, and write the result as a float TIFF.
pub fn predict_tiff_to_path<M: Model>(
    unet: &mut UNet<M>,
    input: &Path,
    output: &Path,
    options: &PredictOptions,
) -> Result<Prediction> {
    let img = read_tiff(input)?;
    info!("Read {:?} with shape {:?}", input, img.shape());

    let mut percentile = PercentileNormalizer::default();
    let mut identity = NoNormalizer;
    let normalizer: &mut dyn Normalizer = if options.normalize {
        &mut percentile
    } else {
        &mut identity
    };
    let mut resizer = PadAndCropResizer::default();
    let mut progress = LogProgress::default();
    let prediction = unet.predict_with(
        img.view(),
        &options.axes,
        &options.n_tiles,
        normalizer,
        &mut resizer,
        &mut progress,
    )?;
    write_tiff(output, &prediction.output, &prediction.axes)?;
    info!("Prediction saved to: {:?}", output);
    Ok(prediction)
}

/// Batch processing report
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

/// Immediate entries of `input_dir`, sorted by path.
pub fn iterate_tiff_files(input_dir: &Path) -> Result<std::vec::IntoIter<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(input_dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files.into_iter())
}

/// Predict every TIFF in `input_dir` into `output_dir`. Non-TIFF files are
/// skipped. With `continue_on_error`, failures are counted and processing
/// goes on; otherwise the first error is returned.
pub fn predict_directory_to_path<M: Model>(
    unet: &mut UNet<M>,
    input_dir: &Path,
    output_dir: &Path,
    options: &PredictOptions,
    continue_on_error: bool,
) -> Result<BatchReport> {
    std::fs::create_dir_all(output_dir)?;

    let mut report = BatchReport::default();
    for path in iterate_tiff_files(input_dir)? {
        if !is_tiff(&path) {
            report.skipped += 1;
            continue;
        }
        let Some(name) = path.file_stem() else {
            report.skipped += 1;
            continue;
        };
        let output_path = output_dir.join(format!("{}_pred.tif", name.to_string_lossy()));
        match predict_tiff_to_path(unet, &path, &output_path, options) {
            Ok(_) => report.processed += 1,
            Err(e) => {
                report.errors += 1;
                error!("Failed to process {:?}: {}", path, e);
                if !continue_on_error {
                    return Err(e);
                }
            }
        }
    }
    info!(
        "Batch finished: processed={} skipped={} errors={}",
        report.processed, report.skipped, report.errors
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processing::NoResizer;
    use crate::core::tiling::NoProgress;
    use crate::model::{MeanFilterNet, from_fn};
    use ndarray::IxDyn;

    fn config_2d() -> UNetConfig {
        let mut c = UNetConfig::new(2, 1, 1).unwrap();
        c.unet_n_depth = 2;
        c
    }

    #[test]
    fn grayscale_image_keeps_its_shape() {
        let config = config_2d();
        let net = MeanFilterNet::from_config(&config).unwrap();
        let mut unet = UNet::new(config, net).unwrap();
        let img = ArrayD::from_shape_fn(IxDyn(&[30, 45]), |i| (i[0] + 2 * i[1]) as f32);
        let y = unet.predict(img.view(), "YX", &NTiles::None).unwrap();
        assert_eq!(y.shape(), &[30, 45]);
    }

    #[test]
    fn channel_count_is_checked() {
        let config = config_2d();
        let net = MeanFilterNet::from_config(&config).unwrap();
        let mut unet = UNet::new(config, net).unwrap();
        let img = ArrayD::<f32>::zeros(IxDyn(&[16, 16, 3]));
        let err = unet.predict(img.view(), "YXC", &NTiles::None).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn wrong_output_channel_count_is_rejected() {
        let config = config_2d();
        let model = from_fn(|t: ArrayViewD<'_, f32>| {
            let mut shape = t.shape().to_vec();
            shape[2] = 2;
            Ok(ArrayD::zeros(IxDyn(&shape)))
        });
        let mut unet = UNet::new(config, model).unwrap();
        let img = ArrayD::<f32>::zeros(IxDyn(&[16, 16]));
        let err = unet
            .predict_with(
                img.view(),
                "YX",
                &NTiles::None,
                &mut NoNormalizer,
                &mut NoResizer,
                &mut NoProgress,
            )
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }

    #[test]
    fn prediction_reports_output_axes_and_tiles() {
        let mut config = UNetConfig::new(2, 1, 3).unwrap();
        config.unet_n_depth = 2;
        let net = MeanFilterNet::from_config(&config).unwrap();
        let mut unet = UNet::new(config, net).unwrap();
        let img = ArrayD::<f32>::ones(IxDyn(&[32, 40]));
        let p = unet
            .predict_with(
                img.view(),
                "YX",
                &NTiles::PerAxis(vec![2, 1]),
                &mut NoNormalizer,
                &mut PadAndCropResizer::default(),
                &mut NoProgress,
            )
            .unwrap();
        assert_eq!(p.output.shape(), &[32, 40, 3]);
        assert_eq!(p.axes.to_string(), "YXC");
        assert_eq!(p.n_tiles, vec![2, 1]);
        assert_eq!(p.retries, 0);
    }

    #[test]
    fn directory_batch_skips_non_tiff_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let img = ArrayD::from_shape_fn(IxDyn(&[20, 24]), |i| (i[0] * i[1]) as f32);
        write_tiff(&dir.path().join("a.tif"), &img, &"YX".parse().unwrap()).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let config = config_2d();
        let net = MeanFilterNet::from_config(&config).unwrap();
        let mut unet = UNet::new(config, net).unwrap();
        let report = predict_directory_to_path(
            &mut unet,
            dir.path(),
            &out,
            &PredictOptions::default(),
            true,
        )
        .unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 0);
        let y = read_tiff(&out.join("a_pred.tif")).unwrap();
        assert_eq!(y.shape(), &[20, 24]);
    }
}
