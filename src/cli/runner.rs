use std::path::Path;

use tracing::info;

use unetile::api::{PredictOptions, UNet, predict_directory_to_path, predict_tiff_to_path};
use unetile::logging::init_cli_logging;
use unetile::model::{MeanFilterNet, MemoryBudget, Model};
use unetile::types::{Axis, AxisOrder, NTiles};
use unetile::UNetConfig;

use super::args::CliArgs;
use super::errors::AppError;

/// Load the network configuration, or build a default one whose spatial
/// dimensionality matches the image axes.
fn load_config(path: Option<&Path>, axes: &str) -> Result<UNetConfig, AppError> {
    if let Some(path) = path {
        info!("Loading network configuration from {:?}", path);
        return Ok(UNetConfig::load_json(path)?);
    }
    let order: AxisOrder = axes.parse()?;
    let n_dim = [Axis::Z, Axis::Y, Axis::X]
        .iter()
        .filter(|a| order.contains(**a))
        .count();
    if !(2..=3).contains(&n_dim) {
        return Err(AppError::UnsupportedDimensions {
            axes: axes.to_string(),
            n: n_dim,
        });
    }
    info!("No configuration given, using default {}D network", n_dim);
    Ok(UNetConfig::new(n_dim, 1, 1)?)
}

fn build_model(config: &UNetConfig, memory_budget: Option<usize>) -> Result<Box<dyn Model>, AppError> {
    let net = MeanFilterNet::from_config(config)?;
    match memory_budget {
        Some(0) => Err(AppError::ZeroBudget { budget: 0 }),
        Some(budget) => {
            info!("Simulating a memory budget of {} elements per tile", budget);
            Ok(Box::new(MemoryBudget::new(net, budget)))
        }
        None => Ok(Box::new(net)),
    }
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_cli_logging(args.log);

    let n_tiles: NTiles = args.n_tiles.parse().map_err(AppError::from)?;
    let options = PredictOptions {
        axes: args.axes.clone(),
        n_tiles,
        normalize: args.normalize,
    };
    let config = load_config(args.config.as_deref(), &args.axes)?;
    let model = build_model(&config, args.memory_budget)?;
    let mut unet = UNet::new(config, model).map_err(AppError::from)?;

    let batch_mode = args.batch || args.input_dir.is_some();

    if batch_mode {
        let input_dir = args.input_dir.ok_or(AppError::MissingArgument {
            arg: "--input-dir".to_string(),
        })?;
        let output_dir = args.output_dir.ok_or(AppError::MissingArgument {
            arg: "--output-dir".to_string(),
        })?;

        info!("Starting batch prediction from directory: {:?}", input_dir);
        info!("Output directory: {:?}", output_dir);

        let report = predict_directory_to_path(&mut unet, &input_dir, &output_dir, &options, true)
            .map_err(AppError::from)?;

        info!("Batch prediction complete!");
        info!("Processed: {}", report.processed);
        info!("Skipped: {}", report.skipped);
        info!("Errors: {}", report.errors);
    } else {
        let input = args.input.ok_or(AppError::MissingArgument {
            arg: "--input".to_string(),
        })?;
        let output = args.output.ok_or(AppError::MissingArgument {
            arg: "--output".to_string(),
        })?;

        let prediction =
            predict_tiff_to_path(&mut unet, &input, &output, &options).map_err(AppError::from)?;
        info!(
            "Successfully predicted: {:?} -> {:?} (axes {}, n_tiles {:?}, {} retries)",
            input, output, prediction.axes, prediction.n_tiles, prediction.retries
        );
    }

    Ok(())
}
