//! The `Image` data model from spec.md 3: an RGB raster of known size,
//! with two derived views (grayscale, HSV) computed once and shared
//! read-only by every stage, including the rayon workers in the Stage 1
//! precision sweep.

use std::sync::OnceLock;

use image::{GrayImage, RgbImage};

/// HSV triples stored as OpenCV-style ranges: H in [0, 180), S and V in
/// [0, 255]. `score_premium`/`is_tile` et al. were ported straight out of
/// `original_source/board.cpp`, which uses `cv::cvtColor(..., COLOR_BGR2HSV)`
/// at that scale, so every threshold in this crate assumes it too.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta < f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max < f32::EPSILON { 0.0 } else { delta / max * 255.0 };
    let v = max;

    Hsv { h: h / 2.0, s, v }
}

/// A dense HSV raster the same size as the source image.
pub struct HsvImage {
    width: u32,
    height: u32,
    data: Vec<Hsv>,
}

impl HsvImage {
    fn from_rgb(rgb: &RgbImage) -> Self {
        let (width, height) = rgb.dimensions();
        let mut data = Vec::with_capacity((width * height) as usize);
        for px in rgb.pixels() {
            data.push(rgb_to_hsv(px.0[0], px.0[1], px.0[2]));
        }
        HsvImage { width, height, data }
    }

    pub fn get(&self, x: i64, y: i64) -> Option<Hsv> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        Some(self.data[(y as u32 * self.width + x as u32) as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Mean HSV over a square block centered at (cx, cy) with the given
    /// radius, clamped to the image bounds. Mirrors
    /// `original_source/board.cpp`'s `mean_hsv_block`: sampling a small
    /// area instead of one pixel makes the localizer's scoring robust to
    /// anti-aliasing and compression noise at cell boundaries.
    pub fn mean_block(&self, cx: i64, cy: i64, radius: i64) -> Hsv {
        let x0 = (cx - radius).max(0);
        let y0 = (cy - radius).max(0);
        let x1 = (cx + radius + 1).min(self.width as i64);
        let y1 = (cy + radius + 1).min(self.height as i64);
        if x1 <= x0 || y1 <= y0 {
            return Hsv::default();
        }

        let mut sh = 0.0f64;
        let mut ss = 0.0f64;
        let mut sv = 0.0f64;
        let mut n = 0.0f64;
        for y in y0..y1 {
            for x in x0..x1 {
                let hsv = self.data[(y as u32 * self.width + x as u32) as usize];
                sh += hsv.h as f64;
                ss += hsv.s as f64;
                sv += hsv.v as f64;
                n += 1.0;
            }
        }
        Hsv {
            h: (sh / n) as f32,
            s: (ss / n) as f32,
            v: (sv / n) as f32,
        }
    }
}

/// Owns the RGB raster and lazily builds/caches the grayscale and HSV
/// derived views the first time a stage asks for them.
pub struct BoardImage {
    rgb: RgbImage,
    gray: OnceLock<GrayImage>,
    hsv: OnceLock<HsvImage>,
}

impl BoardImage {
    pub fn new(rgb: RgbImage) -> Self {
        BoardImage {
            rgb,
            gray: OnceLock::new(),
            hsv: OnceLock::new(),
        }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn gray(&self) -> &GrayImage {
        self.gray.get_or_init(|| image::imageops::grayscale(&self.rgb))
    }

    pub fn hsv(&self) -> &HsvImage {
        self.hsv.get_or_init(|| HsvImage::from_rgb(&self.rgb))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn pure_red_has_hue_zero_full_saturation() {
        let hsv = rgb_to_hsv(255, 0, 0);
        assert!(hsv.h.abs() < 0.01);
        assert!((hsv.s - 255.0).abs() < 0.01);
        assert!((hsv.v - 255.0).abs() < 0.01);
    }

    #[test]
    fn gray_has_zero_saturation() {
        let hsv = rgb_to_hsv(128, 128, 128);
        assert!(hsv.s.abs() < 0.01);
    }

    #[test]
    fn views_are_cached_across_calls() {
        let rgb = RgbImage::from_pixel(10, 10, Rgb([10, 20, 30]));
        let img = BoardImage::new(rgb);
        let g1 = img.gray() as *const GrayImage;
        let g2 = img.gray() as *const GrayImage;
        assert_eq!(g1, g2);
    }

    #[test]
    fn mean_block_clamps_to_bounds() {
        let rgb = RgbImage::from_pixel(4, 4, Rgb([0, 255, 0]));
        let img = BoardImage::new(rgb);
        let hsv = img.hsv().mean_block(0, 0, 5);
        assert!(hsv.s > 0.0);
    }
}
