//! Locating UI element templates on a screenshot.
//!
//! Scores are zero-mean normalized cross-correlation in `-1.0..=1.0`, the same
//! measure screen automation tools usually expose as "confidence". The search
//! runs on a downscaled copy first and is refined at full resolution around
//! the best coarse hit, which keeps a full-screen search affordable.

use crate::desktop::Point;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Smallest template side (in pixels) that still gets a coarse pass.
const MIN_COARSE_SIDE: u32 = 4;

/// A template hit on the searched image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    /// Top-left corner of the matched area, in image coordinates
    pub top_left: Point,
    /// Middle of the matched area, in image coordinates
    pub center: Point,
    pub score: f32,
}

/// Errors about a template that can never match.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateError {
    Empty,
    /// Every pixel has the same value, so correlation is undefined
    NoContrast,
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::Empty => write!(f, "Template image is empty"),
            TemplateError::NoContrast => write!(f, "Template image has no contrast"),
        }
    }
}

impl std::error::Error for TemplateError {}

/// Find the best placement of `template` in `image` at or above `confidence`.
///
/// `downscale` is the coarse-pass reduction factor; `1` searches at full
/// resolution only.
pub fn locate(
    image: &GrayImage,
    template: &GrayImage,
    confidence: f32,
    downscale: u32,
) -> Result<Option<Match>, TemplateError> {
    let best = best_match(image, template, downscale)?;
    Ok(best.filter(|m| m.score >= confidence))
}

/// Best placement regardless of score. `None` if the template does not fit.
pub fn best_match(
    image: &GrayImage,
    template: &GrayImage,
    downscale: u32,
) -> Result<Option<Match>, TemplateError> {
    let prepared = PreparedTemplate::new(template)?;
    let (tw, th) = template.dimensions();
    if tw > image.width() || th > image.height() {
        return Ok(None);
    }

    let factor = downscale.max(1);
    let use_coarse =
        factor > 1 && tw / factor >= MIN_COARSE_SIDE && th / factor >= MIN_COARSE_SIDE;

    let found = if use_coarse {
        coarse_to_fine(image, template, &prepared, factor)
    } else {
        scan(image, &prepared)
    };

    Ok(found.map(|(x, y, score)| {
        let top_left = Point::new(x as i32, y as i32);
        Match {
            top_left,
            center: top_left.offset((tw / 2) as i32, (th / 2) as i32),
            score,
        }
    }))
}

fn coarse_to_fine(
    image: &GrayImage,
    template: &GrayImage,
    prepared: &PreparedTemplate,
    factor: u32,
) -> Option<(u32, u32, f32)> {
    let small_image = imageops::resize(
        image,
        (image.width() / factor).max(1),
        (image.height() / factor).max(1),
        FilterType::Triangle,
    );
    let small_template = imageops::resize(
        template,
        template.width() / factor,
        template.height() / factor,
        FilterType::Triangle,
    );

    // A template that blurs flat at the coarse scale still has detail at full scale.
    let coarse = match PreparedTemplate::new(&small_template) {
        Ok(p) if small_template.width() <= small_image.width()
            && small_template.height() <= small_image.height() =>
        {
            scan(&small_image, &p)
        }
        _ => return scan(image, prepared),
    };
    let (cx, cy, _) = coarse?;

    // Refine in a neighbourhood of the coarse hit at full resolution.
    let margin = 2 * factor;
    let (tw, th) = template.dimensions();
    let x0 = (cx * factor).saturating_sub(margin);
    let y0 = (cy * factor).saturating_sub(margin);
    let x1 = (cx * factor + margin + tw).min(image.width());
    let y1 = (cy * factor + margin + th).min(image.height());
    let window = imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image();

    scan(&window, prepared).map(|(x, y, score)| (x + x0, y + y0, score))
}

/// Zero-mean template values and their norm.
struct PreparedTemplate {
    width: u32,
    height: u32,
    centered: Vec<f64>,
    norm: f64,
}

impl PreparedTemplate {
    fn new(template: &GrayImage) -> Result<Self, TemplateError> {
        let (width, height) = template.dimensions();
        if width == 0 || height == 0 {
            return Err(TemplateError::Empty);
        }
        let n = (width * height) as f64;
        let mean = template.pixels().map(|p| p.0[0] as f64).sum::<f64>() / n;
        let centered: Vec<f64> = template.pixels().map(|p| p.0[0] as f64 - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm < 1e-9 {
            return Err(TemplateError::NoContrast);
        }
        Ok(Self {
            width,
            height,
            centered,
            norm,
        })
    }
}

/// Summed-area tables of pixel values and squared values.
struct Integrals {
    stride: usize,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
}

impl Integrals {
    fn new(image: &GrayImage) -> Self {
        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut sum = vec![0.0; stride * (h + 1)];
        let mut sum_sq = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..w {
                let v = image.get_pixel(x as u32, y as u32).0[0] as f64;
                row += v;
                row_sq += v * v;
                let i = (y + 1) * stride + x + 1;
                sum[i] = sum[i - stride] + row;
                sum_sq[i] = sum_sq[i - stride] + row_sq;
            }
        }
        Self {
            stride,
            sum,
            sum_sq,
        }
    }

    fn window(&self, x: usize, y: usize, w: usize, h: usize) -> (f64, f64) {
        let s = self.stride;
        let a = y * s + x;
        let b = y * s + x + w;
        let c = (y + h) * s + x;
        let d = (y + h) * s + x + w;
        (
            self.sum[d] - self.sum[b] - self.sum[c] + self.sum[a],
            self.sum_sq[d] - self.sum_sq[b] - self.sum_sq[c] + self.sum_sq[a],
        )
    }
}

/// Exhaustive scan. Returns the top-left and score of the best placement.
fn scan(image: &GrayImage, template: &PreparedTemplate) -> Option<(u32, u32, f32)> {
    let (iw, ih) = image.dimensions();
    if template.width > iw || template.height > ih {
        return None;
    }
    let (tw, th) = (template.width as usize, template.height as usize);
    let n = (tw * th) as f64;
    let integrals = Integrals::new(image);
    let pixels = image.as_raw();
    let row_len = iw as usize;

    let mut best: Option<(u32, u32, f32)> = None;
    for y in 0..=(ih as usize - th) {
        for x in 0..=(iw as usize - tw) {
            let (sum, sum_sq) = integrals.window(x, y, tw, th);
            let variance = sum_sq - sum * sum / n;
            let score = if variance <= 1e-6 {
                // A flat window correlates with nothing.
                0.0
            } else {
                let mut dot = 0.0;
                for j in 0..th {
                    let row = &pixels[(y + j) * row_len + x..(y + j) * row_len + x + tw];
                    let t_row = &template.centered[j * tw..(j + 1) * tw];
                    for (p, t) in row.iter().zip(t_row) {
                        dot += *p as f64 * t;
                    }
                }
                dot / (variance.sqrt() * template.norm)
            };

            let score = score as f32;
            if score.is_finite() && best.map_or(true, |(_, _, s)| score > s) {
                best = Some((x as u32, y as u32, score));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// Deterministic texture with `block`-sized cells so it survives downscaling.
    fn texture(width: u32, height: u32, seed: u32, block: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let cell = (x / block) * 7919 + (y / block) * 104_729 + seed * 31;
            let v = cell.wrapping_mul(2_654_435_761) >> 24;
            Luma([v as u8])
        })
    }

    fn paste(canvas: &mut GrayImage, patch: &GrayImage, x: u32, y: u32) {
        imageops::replace(canvas, patch, x as i64, y as i64);
    }

    #[test]
    fn test_exact_match_full_resolution() {
        let mut screen = GrayImage::from_pixel(120, 80, Luma([30]));
        let template = texture(16, 10, 1, 1);
        paste(&mut screen, &template, 57, 33);

        let found = locate(&screen, &template, 0.9, 1).unwrap().unwrap();
        assert_eq!(found.top_left, Point::new(57, 33));
        assert_eq!(found.center, Point::new(65, 38));
        assert!(found.score > 0.999);
    }

    #[test]
    fn test_coarse_to_fine_finds_same_position() {
        let mut screen = texture(320, 200, 99, 3);
        let template = texture(48, 24, 5, 4);
        paste(&mut screen, &template, 200, 116);

        let found = locate(&screen, &template, 0.9, 4).unwrap().unwrap();
        assert_eq!(found.top_left, Point::new(200, 116));
        assert!(found.score > 0.999);
    }

    #[test]
    fn test_absent_template_is_below_confidence() {
        let screen = texture(120, 80, 42, 2);
        let template = texture(16, 10, 7, 1);
        assert!(locate(&screen, &template, 0.9, 1).unwrap().is_none());
    }

    #[test]
    fn test_oversized_template_never_matches() {
        let screen = texture(10, 10, 1, 1);
        let template = texture(20, 5, 2, 1);
        assert!(best_match(&screen, &template, 1).unwrap().is_none());
    }

    #[test]
    fn test_flat_template_is_rejected() {
        let screen = texture(40, 40, 1, 1);
        let template = GrayImage::from_pixel(8, 8, Luma([128]));
        assert_eq!(
            locate(&screen, &template, 0.9, 1),
            Err(TemplateError::NoContrast)
        );
    }

    #[test]
    fn test_brightness_shift_keeps_full_score() {
        let template = texture(12, 12, 3, 1);
        // Same pattern, halved contrast and offset brightness.
        let shifted = GrayImage::from_fn(12, 12, |x, y| {
            Luma([template.get_pixel(x, y).0[0] / 2 + 60])
        });
        let mut screen = GrayImage::from_pixel(50, 50, Luma([0]));
        paste(&mut screen, &shifted, 20, 5);

        let found = locate(&screen, &template, 0.95, 1).unwrap().unwrap();
        assert_eq!(found.top_left, Point::new(20, 5));
    }
}
