//! Frame pre-processing.
//!
//! Turns one captured frame into the classifier's input tensor:
//! decode → rotate → quarter-area center crop → luma → histogram
//! equalization → resize to S×S → scale to `[0, 1]`.
//!
//! Every step is deterministic. The crop keeps a square of side
//! `min(w, h) / 2`, not the full shorter side; the bundled model was trained
//! on crops taken this way.

use anyhow::{anyhow, Result};
use image::imageops;
use image::{GrayImage, RgbImage};

use crate::frame::Frame;
use crate::ingest::normalize::frame_to_rgb;

/// Side length of the square input the bundled model expects.
pub const INPUT_SIZE: u32 = 32;

/// Classifier input of shape `[1, S, S, 1]`, row-major, values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    size: u32,
    data: Vec<f32>,
}

impl InputTensor {
    pub fn new(size: u32, data: Vec<f32>) -> Result<Self> {
        let expected = (size as usize) * (size as usize);
        if size == 0 || data.len() != expected {
            return Err(anyhow!(
                "input tensor of side {} needs {} values, got {}",
                size,
                expected,
                data.len()
            ));
        }
        Ok(Self { size, data })
    }

    /// Tensor filled with one value. Mostly useful for tests and warm-up.
    pub fn filled(size: u32, value: f32) -> Self {
        Self {
            size,
            data: vec![value; (size as usize) * (size as usize)],
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn shape(&self) -> [usize; 4] {
        let s = self.size as usize;
        [1, s, s, 1]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Value at row `y`, column `x`.
    pub fn at(&self, y: usize, x: usize) -> f32 {
        self.data[y * self.size as usize + x]
    }

    pub fn mean(&self) -> f32 {
        self.data.iter().sum::<f32>() / self.data.len() as f32
    }
}

/// Converts a captured frame into classifier input.
pub trait FrameTransform: Send {
    fn prepare(&self, frame: &Frame) -> Result<InputTensor>;
}

/// The production pre-processor.
#[derive(Clone, Copy, Debug)]
pub struct Preprocessor {
    size: u32,
}

impl Preprocessor {
    pub fn new(size: u32) -> Self {
        Self { size }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Run every step after decoding.
    pub fn prepare_rgb(&self, rgb: RgbImage, rotation_degrees: u32) -> Result<InputTensor> {
        let rotated = rotate(rgb, rotation_degrees)?;
        let cropped = center_crop_quarter(&rotated)?;
        let mut gray = to_luma(&cropped);
        equalize_histogram(&mut gray);
        let resized = resize_bilinear(&gray, self.size);
        let data = resized
            .into_raw()
            .into_iter()
            .map(|v| v as f32 / 255.0)
            .collect();
        InputTensor::new(self.size, data)
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new(INPUT_SIZE)
    }
}

impl FrameTransform for Preprocessor {
    fn prepare(&self, frame: &Frame) -> Result<InputTensor> {
        let rgb = frame_to_rgb(frame)?;
        self.prepare_rgb(rgb, frame.rotation_degrees)
    }
}

/// Rotate clockwise by a multiple of 90 degrees.
pub fn rotate(image: RgbImage, degrees: u32) -> Result<RgbImage> {
    match degrees % 360 {
        0 => Ok(image),
        90 => Ok(imageops::rotate90(&image)),
        180 => Ok(imageops::rotate180(&image)),
        270 => Ok(imageops::rotate270(&image)),
        other => Err(anyhow!(
            "rotation must be a multiple of 90 degrees, got {}",
            other
        )),
    }
}

/// Crop the centered square of side `min(w, h) / 2`.
pub fn center_crop_quarter(image: &RgbImage) -> Result<RgbImage> {
    let (width, height) = image.dimensions();
    let crop = width.min(height) / 2;
    if crop == 0 {
        return Err(anyhow!("frame {}x{} is too small to crop", width, height));
    }
    let x = (width - crop) / 2;
    let y = (height - crop) / 2;
    Ok(imageops::crop_imm(image, x, y, crop, crop).to_image())
}

/// BT.601 luma in 14-bit fixed point, rounded.
pub fn to_luma(image: &RgbImage) -> GrayImage {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        let luma = (r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14;
        image::Luma([luma.min(255) as u8])
    })
}

/// Spread intensities over the full range using the cumulative histogram.
///
/// The darkest occupied level maps to 0 and the brightest to 255. An image
/// with a single level is left unchanged.
pub fn equalize_histogram(image: &mut GrayImage) {
    let total = (image.width() as u64) * (image.height() as u64);
    if total == 0 {
        return;
    }

    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let Some(first) = histogram.iter().position(|&count| count > 0) else {
        return;
    };
    if histogram[first] == total {
        return;
    }

    let scale = 255.0 / (total - histogram[first]) as f64;
    let mut lut = [0u8; 256];
    let mut sum = 0u64;
    for level in first + 1..256 {
        sum += histogram[level];
        lut[level] = (sum as f64 * scale).round().min(255.0) as u8;
    }

    for pixel in image.pixels_mut() {
        pixel.0[0] = lut[pixel.0[0] as usize];
    }
}

/// Bilinear resize to `size`×`size`, sampling at pixel centres.
///
/// Source coordinates are `(d + 0.5) * scale - 0.5`, clamped at the borders,
/// with 11-bit fixed-point weights. Downscaling does not average over the
/// whole footprint, only the nearest 2×2 neighbours.
pub fn resize_bilinear(image: &GrayImage, size: u32) -> GrayImage {
    const COEF_BITS: u32 = 11;
    const COEF_SCALE: f32 = (1 << COEF_BITS) as f32;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 || size == 0 {
        return GrayImage::new(size, size);
    }

    // (index, index + 1, weight of index + 1) along one axis.
    let taps = |src: u32| -> Vec<(u32, u32, i32)> {
        let scale = src as f32 / size as f32;
        (0..size)
            .map(|d| {
                let f = (d as f32 + 0.5) * scale - 0.5;
                let mut s = f.floor() as i64;
                let mut frac = f - s as f32;
                if s < 0 {
                    s = 0;
                    frac = 0.0;
                }
                if s >= src as i64 - 1 {
                    s = src as i64 - 1;
                    frac = 0.0;
                }
                let s = s as u32;
                let next = (s + 1).min(src - 1);
                (s, next, (frac * COEF_SCALE).round() as i32)
            })
            .collect()
    };
    let xs = taps(width);
    let ys = taps(height);

    let one = 1i32 << COEF_BITS;
    let px = |x: u32, y: u32| image.get_pixel(x, y).0[0] as i32;
    GrayImage::from_fn(size, size, |dx, dy| {
        let (x0, x1, wx) = xs[dx as usize];
        let (y0, y1, wy) = ys[dy as usize];
        let top = px(x0, y0) * (one - wx) + px(x1, y0) * wx;
        let bottom = px(x0, y1) * (one - wx) + px(x1, y1) * wx;
        let value = (top * (one - wy) + bottom * wy + (1 << (2 * COEF_BITS - 1))) >> (2 * COEF_BITS);
        image::Luma([value.clamp(0, 255) as u8])
    })
}
