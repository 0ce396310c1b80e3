use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use imageproc::hough::{detect_lines, LineDetectionOptions};
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::NormalizerConfig;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Failed to read image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unreadable image: {0}")]
    UnreadableImage(String),
    #[error("Failed to encode processed image: {0}")]
    Encode(String),
}

/// Formats swept by the secondary decoder when content sniffing fails.
const FALLBACK_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::Tga,
    ImageFormat::Pnm,
];

/// Decode image bytes: content sniffing first, then the format suggested by
/// the file extension, then a sweep over every supported format.
pub fn decode_image(data: &[u8], hint: Option<ImageFormat>) -> Result<DynamicImage, PreprocessError> {
    if data.is_empty() {
        return Err(PreprocessError::UnreadableImage("empty buffer".into()));
    }

    let mut last_error = match image::load_from_memory(data) {
        Ok(img) => return Ok(img),
        Err(e) => e.to_string(),
    };
    debug!(error = %last_error, "primary decoder failed, trying fallbacks");

    let candidates = hint
        .into_iter()
        .chain(FALLBACK_FORMATS.iter().copied().filter(|f| Some(*f) != hint));
    for format in candidates {
        match image::load_from_memory_with_format(data, format) {
            Ok(img) => {
                debug!(?format, "fallback decoder succeeded");
                return Ok(img);
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(PreprocessError::UnreadableImage(last_error))
}

/// Guess the image format from a file extension.
pub fn format_hint(ext: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(ext)
}

/// Deskew, denoise, contrast-enhance and rescale images before recognition.
#[derive(Debug, Clone, Default)]
pub struct ImageNormalizer {
    config: NormalizerConfig,
}

impl ImageNormalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NormalizerConfig {
        &self.config
    }

    /// Decode and normalize raw image bytes.
    pub fn prepare(&self, data: &[u8], hint: Option<ImageFormat>) -> Result<GrayImage, PreprocessError> {
        let img = decode_image(data, hint)?;
        Ok(self.normalize(&img))
    }

    /// Run every step in order. A step that panics or does not apply hands
    /// its input on unchanged, so this never fails.
    pub fn normalize(&self, img: &DynamicImage) -> GrayImage {
        let c = &self.config;

        let gray = run_step("contrast_stretch", img.to_luma8(), stretch_contrast);
        let gray = run_step("deskew", gray, |g| deskew(g, c.deskew_threshold_deg));
        let gray = run_step("denoise", gray, |g| {
            (c.denoise_radius > 0).then(|| median_filter(g, c.denoise_radius, c.denoise_radius))
        });
        let gray = run_step("binarize", gray, |g| {
            c.binarize.then(|| binarize_local_mean(g, c.binarize_block_radius, c.binarize_offset))
        });
        run_step("resize", gray, |g| resize_to_bounds(g, c.min_dimension, c.max_dimension))
    }
}

fn run_step<F>(name: &'static str, input: GrayImage, step: F) -> GrayImage
where
    F: FnOnce(&GrayImage) -> Option<GrayImage>,
{
    match catch_unwind(AssertUnwindSafe(|| step(&input))) {
        Ok(Some(output)) => {
            debug!(step = name, width = output.width(), height = output.height(), "applied");
            output
        }
        Ok(None) => input,
        Err(_) => {
            warn!(step = name, "normalization step panicked, keeping previous image");
            input
        }
    }
}

/// Linear stretch of the luminance range to 0..=255. `None` for uniform images.
fn stretch_contrast(gray: &GrayImage) -> Option<GrayImage> {
    let (min_px, max_px) = gray
        .pixels()
        .fold((255u8, 0u8), |(mn, mx), p| (mn.min(p[0]), mx.max(p[0])));

    if max_px <= min_px {
        return None;
    }

    let range = (max_px - min_px) as u32;
    Some(ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        let p = gray.get_pixel(x, y)[0];
        Luma([((p - min_px) as u32 * 255 / range) as u8])
    }))
}

/// Adaptive binarization: a pixel turns black when it is darker than the
/// mean of its `(2r+1)²` neighbourhood minus `offset`.
fn binarize_local_mean(gray: &GrayImage, radius: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let stride = (w + 1) as usize;

    // Summed-area table with a zero row and column in front.
    let mut integral = vec![0u64; stride * (h + 1) as usize];
    for y in 0..h {
        let mut row_sum = 0u64;
        for x in 0..w {
            row_sum += gray.get_pixel(x, y)[0] as u64;
            integral[(y + 1) as usize * stride + (x + 1) as usize] =
                row_sum + integral[y as usize * stride + (x + 1) as usize];
        }
    }

    ImageBuffer::from_fn(w, h, |x, y| {
        let x1 = x.saturating_sub(radius) as usize;
        let y1 = y.saturating_sub(radius) as usize;
        let x2 = ((x + radius + 1) as usize).min(w as usize);
        let y2 = ((y + radius + 1) as usize).min(h as usize);
        let area = ((x2 - x1) * (y2 - y1)) as f64;
        let sum = integral[y2 * stride + x2] as f64 - integral[y1 * stride + x2] as f64
            - integral[y2 * stride + x1] as f64
            + integral[y1 * stride + x1] as f64;
        let threshold = (sum / area) as i32 - offset;
        Luma([if (gray.get_pixel(x, y)[0] as i32) < threshold { 0 } else { 255 }])
    })
}

/// Estimate the skew of text lines in degrees from the dominant
/// near-horizontal Hough lines. Positive means lines descend to the right.
pub fn estimate_skew(gray: &GrayImage) -> Option<f32> {
    let (w, h) = gray.dimensions();
    if w < 16 || h < 16 {
        return None;
    }

    let blurred = gaussian_blur_f32(gray, 1.5);
    let edges = canny(&blurred, 50.0, 150.0);
    let vote_threshold = ((w.min(h) as f32) * 0.25).max(40.0) as u32;
    let lines = detect_lines(&edges, LineDetectionOptions { vote_threshold, suppression_radius: 8 });

    // The normal of a horizontal line points at 90°.
    let mut angles: Vec<f32> = lines
        .iter()
        .filter(|l| (45..=135).contains(&l.angle_in_degrees))
        .map(|l| l.angle_in_degrees as f32 - 90.0)
        .collect();
    if angles.is_empty() {
        return None;
    }
    angles.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = angles[angles.len() / 2];
    debug!(line_count = angles.len(), skew = median, "estimated skew");
    Some(median)
}

fn deskew(gray: &GrayImage, threshold_deg: f32) -> Option<GrayImage> {
    let skew = estimate_skew(gray)?;
    if skew.abs() <= threshold_deg {
        return None;
    }
    debug!(skew, "rotating to correct skew");
    Some(rotate_about_center(
        gray,
        (-skew).to_radians(),
        Interpolation::Bicubic,
        Luma([255u8]),
    ))
}

/// Upscale small captures so glyphs are large enough, downscale huge ones to
/// bound recognition cost. `None` when already within bounds.
fn resize_to_bounds(gray: &GrayImage, min_dim: u32, max_dim: u32) -> Option<GrayImage> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let (short, long) = (w.min(h) as f32, w.max(h) as f32);

    let (scale, filter) = if long > max_dim as f32 {
        (max_dim as f32 / long, FilterType::Lanczos3)
    } else if short < min_dim as f32 {
        // At least double, aim for a long side of ~2×min_dim, never past max_dim.
        let wanted = (min_dim as f32 / short).max(2.0 * min_dim as f32 / long).max(2.0);
        (wanted.min(max_dim as f32 / long), FilterType::CatmullRom)
    } else {
        return None;
    };

    let nw = ((w as f32 * scale).round() as u32).max(1);
    let nh = ((h as f32 * scale).round() as u32).max(1);
    if (nw, nh) == (w, h) {
        return None;
    }
    Some(image::imageops::resize(gray, nw, nh, filter))
}

pub fn encode_as_png(gray: &GrayImage) -> Result<Vec<u8>, PreprocessError> {
    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(gray.clone())
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PreprocessError::Encode(e.to_string()))?;
    Ok(buf)
}
