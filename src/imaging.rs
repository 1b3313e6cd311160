//! Pixel-level image operations used by the ingest pipeline.
//!
//! - [`binarize`]: grayscale + adaptive mean threshold, to help OCR.
//! - [`make_thumbnail`]: fit into a square bounding box, JPEG encoded.
//!
//! Decoding guesses the format from the bytes, so a mislabeled upload still
//! works as long as the `image` crate can read it.

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, ImageFormat, ImageReader, Luma};
use std::io::Cursor;

/// Decodes image bytes of any supported format.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("Image format guess failed")?
        .decode()
        .context("Image decode failed")
}

/// Encodes an image into `format`.
pub fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    // JPEG has no alpha channel
    let img = match format {
        ImageFormat::Jpeg => match img {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img.clone(),
            other => DynamicImage::ImageRgb8(other.to_rgb8()),
        },
        _ => img.clone(),
    };
    img.write_to(&mut Cursor::new(&mut out), format)
        .with_context(|| format!("Image encode as {:?} failed", format))?;
    Ok(out)
}

/// Converts to grayscale and applies an adaptive mean threshold.
pub fn binarize(img: &DynamicImage, block_size: u32, offset: i32) -> GrayImage {
    adaptive_mean_threshold(&img.to_luma8(), block_size, offset)
}

/// Binary adaptive threshold against the local mean.
///
/// A pixel becomes white when it is brighter than the rounded mean of the
/// `block_size`×`block_size` window around it minus `offset`, otherwise
/// black. Pixels outside the image replicate the nearest edge pixel.
pub fn adaptive_mean_threshold(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let (wi, hi) = (w as i64, h as i64);
    let r = (block_size / 2) as i64;
    let area = {
        let side = 2 * r + 1;
        side * side
    };

    let px = |x: i64, y: i64| -> i64 {
        let x = x.clamp(0, wi - 1) as u32;
        let y = y.clamp(0, hi - 1) as u32;
        gray.get_pixel(x, y).0[0] as i64
    };

    // Horizontal window sums, sliding along each row.
    let mut row_sums = vec![0i64; (w * h) as usize];
    for y in 0..hi {
        let mut sum: i64 = (-r..=r).map(|dx| px(dx, y)).sum();
        for x in 0..wi {
            if x > 0 {
                sum += px(x + r, y) - px(x - 1 - r, y);
            }
            row_sums[(y * wi + x) as usize] = sum;
        }
    }
    let row = |x: i64, y: i64| -> i64 {
        let y = y.clamp(0, hi - 1);
        row_sums[(y * wi + x) as usize]
    };

    let mut out = GrayImage::new(w, h);
    for x in 0..wi {
        let mut sum: i64 = (-r..=r).map(|dy| row(x, dy)).sum();
        for y in 0..hi {
            if y > 0 {
                sum += row(x, y + r) - row(x, y - 1 - r);
            }
            let mean = (sum + area / 2) / area;
            let value = if px(x, y) > mean - offset as i64 { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    out
}

/// Shrinks `img` to fit within `max_side`×`max_side`, keeping its aspect
/// ratio, and returns JPEG bytes. Smaller images are not enlarged.
pub fn make_thumbnail(img: &DynamicImage, max_side: u32) -> Result<Vec<u8>> {
    let thumb = if img.width() <= max_side && img.height() <= max_side {
        img.clone()
    } else {
        img.thumbnail(max_side, max_side)
    };
    encode(&thumb, ImageFormat::Jpeg)
}
