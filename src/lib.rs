#![doc = r#"
UNETILE — adaptive tiled inference for U-Net style networks.

This crate applies a convolutional network over 2D or 3D images that are too
large to fit into accelerator memory in one piece. An image of any axis order
is mapped onto the network's axis layout, split into overlapping tiles whose
interiors are exact multiples of the network's pooling block, run tile by tile
and stitched back together. When the model reports memory exhaustion, the
tile count along the axis with the largest tiles is doubled and the
prediction is retried.

Stability
---------
The public library API is experimental in initial releases and may evolve.
Breaking changes can occur.

Quick start: predict an in-memory image
---------------------------------------
```rust
use ndarray::{ArrayD, IxDyn};
use unetile::{MeanFilterNet, NTiles, UNet, UNetConfig};

fn main() -> unetile::Result<()> {
    let config = UNetConfig::new(2, 1, 1)?;
    let net = MeanFilterNet::from_config(&config)?;
    let mut unet = UNet::new(config, net)?;

    let img = ArrayD::<f32>::zeros(IxDyn(&[300, 200]));
    let labels = unet.predict(img.view(), "YX", &NTiles::PerAxis(vec![2, 1]))?;
    assert_eq!(labels.shape(), &[300, 200]);
    Ok(())
}
```

Bring your own model
--------------------
Anything implementing [`Model`] can be tiled, including closures. Report
[`ModelError::ResourceExhausted`] when a tile does not fit; any other failure
is fatal.

```rust
use ndarray::{ArrayD, ArrayViewD};
use unetile::{ModelError, UNet, UNetConfig, model::from_fn};

fn main() -> unetile::Result<()> {
    let model = from_fn(|tile: ArrayViewD<'_, f32>| -> Result<ArrayD<f32>, ModelError> {
        if tile.len() > 64 * 64 {
            return Err(ModelError::ResourceExhausted("tile too large".to_string()));
        }
        Ok(tile.mapv(|v| v * 0.5))
    });
    let _unet = UNet::new(UNetConfig::new(2, 1, 1)?, model)?;
    Ok(())
}
```

Predict TIFF files
------------------
```rust,no_run
use std::path::Path;
use unetile::{MeanFilterNet, UNet, UNetConfig};
use unetile::api::{PredictOptions, predict_directory_to_path, predict_tiff_to_path};

fn main() -> unetile::Result<()> {
    let config = UNetConfig::load_json(Path::new("/models/nuclei.json"))?;
    let net = MeanFilterNet::from_config(&config)?;
    let mut unet = UNet::new(config, net)?;

    let options = PredictOptions::default();
    predict_tiff_to_path(&mut unet, Path::new("/data/img.tif"), Path::new("/out/img.tif"), &options)?;

    let report = predict_directory_to_path(&mut unet, Path::new("/data"), Path::new("/out"), &options, true)?;
    println!("processed={} skipped={} errors={}", report.processed, report.skipped, report.errors);
    Ok(())
}
```

Error handling
--------------
All public functions return `unetile::Result<T>`; match on `unetile::Error` to
handle specific cases.

```rust,no_run
use ndarray::{ArrayD, IxDyn};
use unetile::{Error, MeanFilterNet, MemoryBudget, NTiles, UNet, UNetConfig};

fn main() {
    let config = UNetConfig::default();
    let net = MeanFilterNet::from_config(&config).unwrap();
    let mut unet = UNet::new(config, MemoryBudget::new(net, 16)).unwrap();
    let img = ArrayD::<f32>::zeros(IxDyn(&[4096, 4096]));

    match unet.predict(img.view(), "YX", &NTiles::None) {
        Ok(_) => {}
        Err(Error::OutOfMemory { n_tiles, .. }) => eprintln!("gave up at {n_tiles:?}"),
        Err(Error::TilesLength { expected, got }) => eprintln!("need {expected} counts, got {got}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`] — high-level predictor and file helpers.
- [`core::tiling`] — axis remapping, block/overlap resolution, planning, execution and retry.
- [`core::processing`] — normalizers and resizers applied around prediction.
- [`model`] — the `Model` capability and reference networks.
- [`io`] — TIFF readers/writers.
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod logging;
pub mod model;
pub mod types;

// Curated public API surface
pub use api::{
    BatchReport, PredictOptions, Prediction, UNet, predict_directory_to_path,
    predict_tiff_to_path,
};
pub use core::config::{LastActivation, TrainLoss, UNetConfig};
pub use core::processing::{
    NoNormalizer, NoResizer, Normalizer, PadAndCropResizer, PadMode, PercentileNormalizer,
    Resizer,
};
pub use core::tiling::{
    AdaptiveTiler, AxisRemapper, Guarantee, LogProgress, MAX_OOM_RETRIES, NoProgress,
    ProgressError, ProgressSink, RetryPolicy, TilePlan, TilePlanner,
};
pub use error::{Error, Result};
pub use logging::CaptureLayer;
pub use model::{MeanFilterNet, MemoryBudget, Model, ModelError};
pub use types::{Axis, AxisOrder, NTiles};
