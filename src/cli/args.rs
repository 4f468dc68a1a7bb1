use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "unetile", version, about = "UNETILE tiled U-Net inference CLI")]
pub struct CliArgs {
    /// Input TIFF (single file mode)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Input directory containing TIFF files (batch mode)
    #[arg(long)]
    pub input_dir: Option<PathBuf>,

    /// Output TIFF (single file mode)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (batch mode)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Axes of the input image, e.g. YX, ZYX, YXC
    #[arg(long, default_value = "YX")]
    pub axes: String,

    /// Network configuration (JSON). Defaults to a 2D or 3D network matching the input.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Tiles per image axis: "none", a single integer (deprecated), or a list such as "2,2"
    #[arg(long, default_value = "none")]
    pub n_tiles: String,

    /// Simulated accelerator memory in elements per tile; larger tiles trigger retries
    #[arg(long)]
    pub memory_budget: Option<usize>,

    /// Percentile-normalize the input before prediction
    #[arg(long, default_value_t = false)]
    pub normalize: bool,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Batch mode: continue with the next file when one fails
    #[arg(long, default_value_t = false)]
    pub batch: bool,
}
