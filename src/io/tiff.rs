use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ::tiff::ColorType;
use ::tiff::decoder::{Decoder, DecodingResult};
use ::tiff::encoder::{TiffEncoder, colortype};
use ndarray::{ArrayD, IxDyn};
use tracing::{debug, info};

use crate::core::tiling::permute;
use crate::error::{Error, Result};
use crate::types::{Axis, AxisOrder};

fn page_to_f32(page: DecodingResult) -> Result<Vec<f32>> {
    Ok(match page {
        DecodingResult::U8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f32::from).collect(),
        DecodingResult::F32(v) => v,
        DecodingResult::F64(v) => v.into_iter().map(|x| x as f32).collect(),
        _ => {
            return Err(Error::UnsupportedImage(
                "only 8/16-bit integer and float samples are supported".to_string(),
            ));
        }
    })
}

/// Read a grayscale TIFF. A single page gives a `YX` array, several pages of
/// equal size give a `ZYX` stack.
pub fn read_tiff(path: &Path) -> Result<ArrayD<f32>> {
    let mut decoder = Decoder::new(BufReader::new(File::open(path)?))?;
    let mut pages: Vec<f32> = Vec::new();
    let mut n_pages = 0usize;
    let mut dims: Option<(u32, u32)> = None;

    loop {
        match decoder.colortype()? {
            ColorType::Gray(_) => {}
            other => {
                return Err(Error::UnsupportedImage(format!(
                    "{:?}: expected a grayscale image, found {:?}",
                    path, other
                )));
            }
        }
        let (w, h) = decoder.dimensions()?;
        if let Some((w0, h0)) = dims {
            if (w0, h0) != (w, h) {
                return Err(Error::UnsupportedImage(format!(
                    "{:?}: page {} is {}x{}, first page is {}x{}",
                    path, n_pages, w, h, w0, h0
                )));
            }
        }
        dims = Some((w, h));
        pages.extend(page_to_f32(decoder.read_image()?)?);
        n_pages += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    let (w, h) = dims.unwrap_or((0, 0));
    let shape = if n_pages == 1 {
        vec![h as usize, w as usize]
    } else {
        vec![n_pages, h as usize, w as usize]
    };
    debug!("Decoded {} page(s) of {}x{} from {:?}", n_pages, w, h, path);
    ArrayD::from_shape_vec(IxDyn(&shape), pages).map_err(|e| Error::shape(e.to_string()))
}

/// Write `x` (laid out in `axes`) as 32-bit float grayscale pages. Every
/// axis other than Y and X is flattened into the page sequence.
pub fn write_tiff(path: &Path, x: &ArrayD<f32>, axes: &AxisOrder) -> Result<()> {
    if x.ndim() != axes.len() || !axes.contains(Axis::Y) || !axes.contains(Axis::X) {
        return Err(Error::shape(format!(
            "cannot write array {:?} with axes '{}': Y and X are required",
            x.shape(),
            axes
        )));
    }
    let mut order: Vec<Axis> = axes
        .iter()
        .filter(|a| !matches!(a, Axis::Y | Axis::X))
        .collect();
    order.push(Axis::Y);
    order.push(Axis::X);
    let target = AxisOrder::new(order)?;
    let y = permute(x.clone(), axes, &target)?.as_standard_layout().into_owned();

    let nd = y.ndim();
    let (h, w) = (y.shape()[nd - 2], y.shape()[nd - 1]);
    let data = y
        .as_slice()
        .ok_or_else(|| Error::shape("array is not contiguous".to_string()))?;

    let mut encoder = TiffEncoder::new(BufWriter::new(File::create(path)?))?;
    let page_len = h * w;
    let mut n_pages = 0;
    if page_len > 0 {
        for page in data.chunks(page_len) {
            encoder.write_image::<colortype::Gray32Float>(w as u32, h as u32, page)?;
            n_pages += 1;
        }
    }
    info!("Wrote {} page(s) of {}x{} to {:?}", n_pages, w, h, path);
    Ok(())
}
