//! Deterministic enhancement chain that turns a photographed page into a
//! clean, bounded, single-channel image for recognition.
//!
//! Stage order is fixed: grayscale, CLAHE, non-local-means denoise, Otsu
//! binarization, open/close cleanup, bounded resize.

use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Luma};
use imageproc::distance_transform::Norm;
use scrawl_core::PreprocessConfig;
use std::io::Cursor;
use thiserror::Error;

use crate::loader::RawImage;

#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Empty image buffer at {stage} stage")]
    EmptyBuffer { stage: &'static str },
    #[error("Image has no intensity variation (every pixel is {value})")]
    ZeroVariance { value: u8 },
    #[error("Invalid preprocessing parameter: {0}")]
    InvalidParameter(String),
    #[error("Failed to encode processed image: {0}")]
    Encode(#[from] image::ImageError),
}

/// Single-channel image whose longest side never exceeds the configured bound.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    source: String,
    pixels: GrayImage,
}

impl ProcessedImage {
    pub fn new(source: impl Into<String>, pixels: GrayImage) -> Self {
        ProcessedImage { source: source.into(), pixels }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn to_png_bytes(&self) -> Result<Vec<u8>, PreprocessError> {
        let mut buf = Vec::new();
        self.pixels
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        Ok(buf)
    }
}

/// Run the full enhancement chain.
pub fn preprocess(raw: &RawImage, config: &PreprocessConfig) -> Result<ProcessedImage, PreprocessError> {
    check_params(config)?;

    let gray = grayscale(raw);
    ensure_non_empty("grayscale", &gray)?;
    ensure_variance(&gray)?;

    let enhanced = clahe(&gray, config.clip_limit, config.tile_grid);
    ensure_non_empty("contrast", &enhanced)?;

    let denoised = denoise(
        &enhanced,
        config.denoise_strength,
        config.template_window,
        config.search_window,
    );
    ensure_non_empty("denoise", &denoised)?;

    let mut binary = binarize(&denoised);
    if config.invert_dark_background && mean_intensity(&binary) < 127.0 {
        image::imageops::invert(&mut binary);
    }

    let cleaned = open_close(&binary, config.morph_kernel);
    ensure_non_empty("morphology", &cleaned)?;

    let resized = bounded_resize(cleaned, config.max_dimension);
    tracing::debug!(
        source = raw.source(),
        from_width = raw.width(),
        from_height = raw.height(),
        width = resized.width(),
        height = resized.height(),
        "preprocessing complete"
    );
    Ok(ProcessedImage::new(raw.source(), resized))
}

/// Luminance only, bounded in size, no enhancement. Used when preprocessing is switched off.
pub fn prepare_raw(raw: &RawImage, config: &PreprocessConfig) -> Result<ProcessedImage, PreprocessError> {
    check_params(config)?;
    let gray = grayscale(raw);
    ensure_non_empty("grayscale", &gray)?;
    Ok(ProcessedImage::new(raw.source(), bounded_resize(gray, config.max_dimension)))
}

fn check_params(config: &PreprocessConfig) -> Result<(), PreprocessError> {
    if config.tile_grid.contains(&0) {
        return Err(PreprocessError::InvalidParameter("tile_grid must be non-zero".into()));
    }
    if config.template_window % 2 == 0 || config.search_window % 2 == 0 {
        return Err(PreprocessError::InvalidParameter(
            "denoise windows must have odd sizes".into(),
        ));
    }
    if config.max_dimension == 0 {
        return Err(PreprocessError::InvalidParameter("max_dimension must be non-zero".into()));
    }
    Ok(())
}

fn ensure_non_empty(stage: &'static str, img: &GrayImage) -> Result<(), PreprocessError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PreprocessError::EmptyBuffer { stage });
    }
    Ok(())
}

fn ensure_variance(img: &GrayImage) -> Result<(), PreprocessError> {
    let first = img.as_raw()[0];
    if img.as_raw().iter().all(|&p| p == first) {
        return Err(PreprocessError::ZeroVariance { value: first });
    }
    Ok(())
}

fn mean_intensity(img: &GrayImage) -> f64 {
    let sum: u64 = img.as_raw().iter().map(|&p| p as u64).sum();
    sum as f64 / img.as_raw().len().max(1) as f64
}

// ── Stage 1: grayscale ───────────────────────────────────────────────────────

pub fn grayscale(raw: &RawImage) -> GrayImage {
    raw.pixels().to_luma8()
}

// ── Stage 2: contrast-limited adaptive histogram equalization ───────────────

/// CLAHE with bilinear blending between neighbouring tile mappings.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tile_grid: [u32; 2]) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let tiles_x = tile_grid[0].clamp(1, w.max(1));
    let tiles_y = tile_grid[1].clamp(1, h.max(1));
    let tile_w = w.div_ceil(tiles_x);
    let tile_h = h.div_ceil(tiles_y);
    // Rounding up can leave trailing tiles empty; drop them.
    let tiles_x = w.div_ceil(tile_w);
    let tiles_y = h.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            luts.push(tile_lut(gray, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: usize, ty: usize| &luts[ty * tiles_x as usize + tx];
    ImageBuffer::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;
        let (x0, x1, ax) = blend_neighbours(x, tile_w, tiles_x);
        let (y0, y1, ay) = blend_neighbours(y, tile_h, tiles_y);
        let top = lut_at(x0, y0)[v] as f32 * (1.0 - ax) + lut_at(x1, y0)[v] as f32 * ax;
        let bottom = lut_at(x0, y1)[v] as f32 * (1.0 - ax) + lut_at(x1, y1)[v] as f32 * ax;
        let out = top * (1.0 - ay) + bottom * ay;
        Luma([out.round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    let scale = 255.0 / area.max(1) as f32;
    for (v, count) in hist.iter().enumerate() {
        cdf += count;
        lut[v] = (cdf as f32 * scale).round().min(255.0) as u8;
    }
    lut
}

/// Tile indices whose centres bracket `pos`, plus the blend weight of the second.
fn blend_neighbours(pos: u32, tile: u32, tiles: u32) -> (usize, usize, f32) {
    let f = (pos as f32 + 0.5) / tile as f32 - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let lo = f.floor() as u32;
    if lo + 1 >= tiles {
        let last = (tiles - 1) as usize;
        return (last, last, 0.0);
    }
    (lo as usize, lo as usize + 1, f - lo as f32)
}

// ── Stage 3: non-local-means denoise ─────────────────────────────────────────

const DENOISE_BAND_ROWS: u32 = 32;

/// Non-local means over a `search`×`search` neighbourhood, comparing
/// `template`×`template` patches. Each search offset contributes through an
/// integral image of squared differences, built one band of rows at a time.
pub fn denoise(gray: &GrayImage, strength: f32, template: u32, search: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let rt = (template / 2) as i64;
    let rs = (search / 2) as i64;
    let patch_area = (template * template) as u64;

    // Weight per mean squared patch distance, exp(-d²/h²).
    let h2 = (strength * strength).max(f32::EPSILON);
    let weights: Vec<f32> = (0..=255u32 * 255)
        .map(|d2| (-(d2 as f32) / h2).exp())
        .collect();

    let px = |x: i64, y: i64| -> i64 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        gray.get_pixel(cx, cy)[0] as i64
    };

    let mut out = GrayImage::new(w, h);
    let ext_w = (w as i64 + 2 * rt) as usize;
    let t = template as usize;

    let mut band_start = 0u32;
    while band_start < h {
        let band_rows = DENOISE_BAND_ROWS.min(h - band_start) as usize;
        let ext_h = band_rows + 2 * rt as usize;
        let mut sum_w = vec![0f32; band_rows * w as usize];
        let mut sum_wv = vec![0f32; band_rows * w as usize];
        let mut integral = vec![0u64; (ext_w + 1) * (ext_h + 1)];

        for dy in -rs..=rs {
            for dx in -rs..=rs {
                // Integral of squared differences over the padded band.
                for ey in 0..ext_h {
                    let y = band_start as i64 + ey as i64 - rt;
                    let mut row = 0u64;
                    for ex in 0..ext_w {
                        let x = ex as i64 - rt;
                        let d = px(x, y) - px(x + dx, y + dy);
                        row += (d * d) as u64;
                        let idx = (ey + 1) * (ext_w + 1) + ex + 1;
                        integral[idx] = integral[idx - ext_w - 1] + row;
                    }
                }

                for ly in 0..band_rows {
                    let y = band_start as i64 + ly as i64;
                    for x in 0..w as usize {
                        let top = ly * (ext_w + 1);
                        let bottom = (ly + t) * (ext_w + 1);
                        let ssd = integral[bottom + x + t] + integral[top + x]
                            - integral[top + x + t]
                            - integral[bottom + x];
                        let weight = weights[(ssd / patch_area) as usize];
                        let i = ly * w as usize + x;
                        sum_w[i] += weight;
                        sum_wv[i] += weight * px(x as i64 + dx, y + dy) as f32;
                    }
                }
            }
        }

        for ly in 0..band_rows {
            for x in 0..w as usize {
                let i = ly * w as usize + x;
                let v = (sum_wv[i] / sum_w[i]).round().clamp(0.0, 255.0) as u8;
                out.put_pixel(x as u32, band_start + ly as u32, Luma([v]));
            }
        }
        band_start += band_rows as u32;
    }
    out
}

// ── Stage 4: Otsu binarization ───────────────────────────────────────────────

/// Pixels strictly above the Otsu level become 255, the rest 0.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let level = imageproc::contrast::otsu_level(gray);
    let mut out = gray.clone();
    for p in out.pixels_mut() {
        p[0] = if p[0] > level { 255 } else { 0 };
    }
    out
}

// ── Stage 5: morphological cleanup ───────────────────────────────────────────

/// Open (drop specks) then close (bridge stroke gaps).
pub fn open_close(binary: &GrayImage, kernel: u8) -> GrayImage {
    let radius = kernel / 2;
    if radius == 0 {
        return binary.clone();
    }
    let opened = imageproc::morphology::open(binary, Norm::LInf, radius);
    imageproc::morphology::close(&opened, Norm::LInf, radius)
}

// ── Stage 6: bounded resize ──────────────────────────────────────────────────

/// Output size for a `width`×`height` image under `max_dimension`; never larger than the input.
pub fn bounded_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let fit = |side: u32| -> u32 {
        if side == longest {
            max_dimension
        } else {
            ((side as f64 * scale).round() as u32).clamp(1, max_dimension)
        }
    };
    (fit(width), fit(height))
}

pub fn bounded_resize(img: GrayImage, max_dimension: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    let (nw, nh) = bounded_dimensions(w, h, max_dimension);
    if (nw, nh) == (w, h) {
        return img;
    }
    tracing::debug!(width = w, height = h, new_width = nw, new_height = nh, "downscaling");
    image::imageops::resize(&img, nw, nh, FilterType::Triangle)
}
