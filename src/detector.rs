//! Stage 3: Tile Detector (spec.md 4.3). Per-cell occupied-vs-empty
//! decision from color+contrast heuristics parameterized by mode and by
//! the cell's premium-square type, plus blank-tile sub-detection.
//! Ported from `original_source/board.cpp`'s `is_tile`/`is_blank_tile`.

use image::{GenericImageView, GrayImage, RgbImage};

use crate::image_buf::rgb_to_hsv;
use crate::premium::{premium_at, PremiumKind};

fn mean_stddev(gray: &GrayImage) -> (f64, f64) {
    let n = (gray.width() * gray.height()) as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let sum: f64 = gray.pixels().map(|p| p.0[0] as f64).sum();
    let mean = sum / n;
    let var: f64 = gray.pixels().map(|p| (p.0[0] as f64 - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn mean_hsv(rgb: &RgbImage) -> (f32, f32, f32) {
    let n = (rgb.width() * rgb.height()) as f64;
    if n == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let (mut sh, mut ss, mut sv) = (0.0f64, 0.0f64, 0.0f64);
    for px in rgb.pixels() {
        let hsv = rgb_to_hsv(px.0[0], px.0[1], px.0[2]);
        sh += hsv.h as f64;
        ss += hsv.s as f64;
        sv += hsv.v as f64;
    }
    ((sh / n) as f32, (ss / n) as f32, (sv / n) as f32)
}

/// Central 60% sub-rect of a cell image (used both for occupancy and for
/// the HSV sample underpinning it).
fn central_region(cell: &RgbImage) -> RgbImage {
    let (w, h) = cell.dimensions();
    let cx = w / 5;
    let cy = h / 5;
    let cw = w * 3 / 5;
    let ch = h * 3 / 5;
    if cw == 0 || ch == 0 {
        return cell.clone();
    }
    cell.view(cx, cy, cw, ch).to_image()
}

/// Decides whether a cell contains a tile. `row`/`col` are needed because
/// the light-mode DL/TL branch depends on the cell's premium type.
pub fn is_tile(cell: &RgbImage, is_light: bool, row: usize, col: usize) -> bool {
    let center = central_region(cell);
    if center.width() == 0 || center.height() == 0 {
        return false;
    }
    let gray = image::imageops::grayscale(&center);
    let (brightness, contrast) = mean_stddev(&gray);

    if brightness < 80.0 || contrast < 8.0 {
        return false;
    }

    let (h, s, v) = mean_hsv(&center);

    if is_light {
        let is_pink = (h < 12.0 || h > 155.0) && s > 25.0 && v > 100.0;
        if is_pink {
            return false;
        }

        let is_beige = (8.0..=40.0).contains(&h) && (15.0..=140.0).contains(&s) && v > 140.0;
        let is_gold = (8.0..=45.0).contains(&h) && s > 100.0 && v > 160.0;
        if (is_beige || is_gold) && contrast > 15.0 {
            return true;
        }

        let is_played = (78.0..=150.0).contains(&h) && s > 30.0 && v > 80.0;
        if is_played && contrast > 30.0 && !(s < 70.0 && v > 210.0) {
            let prem = premium_at(row, col);
            if matches!(prem, PremiumKind::DoubleLetter | PremiumKind::TripleLetter) && v >= 163.0
            {
                return false;
            }
            return true;
        }

        return false;
    }

    let is_beige = (8.0..=40.0).contains(&h) && (15.0..=140.0).contains(&s) && v > 140.0;
    let is_cream = s < 30.0 && v > 180.0;
    let is_gold = (15.0..=45.0).contains(&h) && s > 100.0 && v > 160.0;

    if (is_beige || is_cream || is_gold) && contrast > 15.0 {
        return true;
    }
    // Dark-mode recently-played tiles: low-saturation blue/purple tint.
    // Empty cells all have contrast == 0, so a flat contrast > 40 gate is
    // enough without a dedicated hue test.
    contrast > 40.0
}

/// A cell is a blank tile if, after it's already been classified as a
/// tile with a letter, the bottom-right quadrant (where the point-value
/// subscript would be) has near-zero contrast — i.e. no digit is there.
pub fn is_blank_tile(cell: &RgbImage) -> bool {
    let (w, h) = cell.dimensions();
    let qx = w / 2;
    let qy = h / 2;
    let (qw, qh) = (w.saturating_sub(qx), h.saturating_sub(qy));
    if qw == 0 || qh == 0 {
        return false;
    }
    let quad = cell.view(qx, qy, qw, qh).to_image();
    let gray = image::imageops::grayscale(&quad);
    let (_, stddev) = mean_stddev(&gray);
    stddev < 12.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(rgb))
    }

    fn noisy_beige(w: u32, h: u32) -> RgbImage {
        let mut img = RgbImage::new(w, h);
        for (i, px) in img.pixels_mut().enumerate() {
            // Alternate two beige-ish shades so contrast clears the
            // detector's >15 threshold while the mean HSV stays in-gate.
            *px = if i % 2 == 0 {
                Rgb([210, 180, 120])
            } else {
                Rgb([170, 140, 90])
            };
        }
        img
    }

    #[test]
    fn flat_green_is_empty_in_dark_mode() {
        let cell = solid(40, 40, [40, 120, 60]);
        assert!(!is_tile(&cell, false, 7, 7));
    }

    #[test]
    fn noisy_beige_is_a_tile_in_dark_mode() {
        let cell = noisy_beige(40, 40);
        assert!(is_tile(&cell, false, 7, 7));
    }

    #[test]
    fn flat_pink_dw_square_is_rejected_in_light_mode() {
        let cell = solid(40, 40, [230, 140, 170]);
        assert!(!is_tile(&cell, true, 1, 1));
    }

    #[test]
    fn low_brightness_is_always_empty() {
        let cell = solid(40, 40, [10, 10, 10]);
        assert!(!is_tile(&cell, false, 0, 0));
        assert!(!is_tile(&cell, true, 0, 0));
    }

    #[test]
    fn blank_tile_detected_when_subscript_quadrant_is_flat() {
        let cell = noisy_beige(40, 40);
        // The bottom-right quadrant of `noisy_beige` still alternates
        // pixel-by-pixel, so stddev there is high: not a blank.
        assert!(!is_blank_tile(&cell));

        let mut flat_quadrant = noisy_beige(40, 40);
        for y in 20..40 {
            for x in 20..40 {
                flat_quadrant.put_pixel(x, y, Rgb([200, 200, 200]));
            }
        }
        assert!(is_blank_tile(&flat_quadrant));
    }
}
