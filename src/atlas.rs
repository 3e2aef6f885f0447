//! Process-wide template atlas (spec.md 3, 4.4, 9): 26 grayscale 128x128
//! images, one per A-Z tile, each with the letter centered in the upper
//! 80% band and its Scrabble point-value subscript bottom-right. Built
//! once and cached for the process lifetime; read-only thereafter.
//!
//! Mirrors the teacher's `LETTERS: RwLock<Arc<Letters>>` global: a
//! guarded first-use singleton rather than unsafe `OnceCell` trickery,
//! so concurrent pipeline calls (spec.md 5) always see either "not yet
//! built" or a fully-built, immutable atlas.

use std::sync::{Arc, RwLock};

use ab_glyph::{point, Font, FontRef, PxScale};
use image::{GrayImage, Luma};
use lazy_static::lazy_static;
use log::warn;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::tile_dist::point_value_of;

pub const TMPL_SIZE: u32 = 128;

pub struct TemplateAtlas {
    pub tiles: Vec<GrayImage>, // always 26 entries, A..Z, when valid
    pub valid: bool,
}

impl TemplateAtlas {
    fn empty() -> Self {
        TemplateAtlas {
            tiles: Vec::new(),
            valid: false,
        }
    }
}

lazy_static! {
    static ref ATLAS: RwLock<Arc<TemplateAtlas>> = RwLock::new(Arc::new(TemplateAtlas::empty()));
}

/// Eagerly builds the atlas now, per spec.md 9's preferred strategy for a
/// long-lived service ("explicit dependency-injection of the font
/// path"). Safe to call more than once; later calls are no-ops once a
/// valid atlas exists.
pub fn init_atlas(cfg: &PipelineConfig) {
    get_or_init(cfg);
}

/// Returns the current atlas, building it on first use if no eager
/// `init_atlas` call has happened yet (spec.md 9's other strategy: a
/// first-use guard preventing duplicate construction).
pub fn get_or_init(cfg: &PipelineConfig) -> Arc<TemplateAtlas> {
    {
        let guard = ATLAS.read().unwrap();
        if guard.valid {
            return guard.clone();
        }
    }
    let mut guard = ATLAS.write().unwrap();
    if !guard.valid {
        *guard = Arc::new(build_atlas(cfg));
    }
    guard.clone()
}

fn locate_font(cfg: &PipelineConfig) -> Option<Vec<u8>> {
    for path in &cfg.font_search_paths {
        match std::fs::read(path) {
            Ok(bytes) => return Some(bytes),
            Err(_) => continue,
        }
    }
    None
}

fn build_atlas(cfg: &PipelineConfig) -> TemplateAtlas {
    match try_build_atlas(cfg) {
        Ok(atlas) => atlas,
        Err(e) => {
            warn!("{e}, template atlas not built; Stage 4 will emit '?' for every occupied cell");
            TemplateAtlas::empty()
        }
    }
}

/// Per spec.md 7's "missing font" mode: `Err(PipelineError::FontUnavailable)`
/// covers both "nothing on the search path" and "found a file but it
/// doesn't parse as a font". `build_atlas` degrades either case to an
/// empty, invalid atlas rather than letting the error reach a caller.
fn try_build_atlas(cfg: &PipelineConfig) -> Result<TemplateAtlas, PipelineError> {
    let font_bytes = locate_font(cfg).ok_or(PipelineError::FontUnavailable)?;
    let font = FontRef::try_from_slice(&font_bytes).map_err(|_| PipelineError::FontUnavailable)?;

    let mut tiles = Vec::with_capacity(26);
    for i in 0..26u8 {
        let letter = (b'A' + i) as char;
        let tile = render_tile(&font, letter, TMPL_SIZE);
        let blurred = imageproc::filter::gaussian_blur_f32(&tile, 1.0);
        tiles.push(blurred);
    }

    Ok(TemplateAtlas { tiles, valid: true })
}

/// Renders a complete glyph-plus-subscript tile, matching
/// `original_source/board.cpp`'s `render_tile`: main glyph at ~58% tile
/// size centered in the upper 80% band, subscript at ~16% tile size with
/// its right edge at 92% width and baseline at 93% height.
fn render_tile(font: &FontRef, letter: char, tmpl_size: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(tmpl_size, tmpl_size, Luma([255]));
    let size_f = tmpl_size as f32;

    let letter_px = size_f * 0.58;
    let area_h = size_f * 0.80;
    draw_centered_glyph(&mut img, font, letter, letter_px, area_h);

    let pts = point_value_of(letter);
    if pts > 0 {
        let sub = pts.to_string();
        let sub_px = size_f * 0.16;
        draw_right_aligned_text(&mut img, font, &sub, sub_px, size_f * 0.92, size_f * 0.93);
    }

    img
}

fn draw_centered_glyph(img: &mut GrayImage, font: &FontRef, ch: char, scale_px: f32, area_h: f32) {
    let scaled = font.as_scaled(PxScale::from(scale_px));
    let ascent = scaled.ascent();
    let descent = scaled.descent();
    let baseline_y = (area_h + ascent - descent) / 2.0;

    let gid = font.glyph_id(ch);
    let probe = gid.clone().with_scale_and_position(scale_px, point(0.0, baseline_y));
    let Some(outlined) = font.outline_glyph(probe) else {
        return;
    };
    let bounds = outlined.px_bounds();
    let width = bounds.max.x - bounds.min.x;
    let shift_x = (img.width() as f32 - width) / 2.0 - bounds.min.x;
    blit_outline(img, &outlined, shift_x, 0.0);
}

fn draw_right_aligned_text(
    img: &mut GrayImage,
    font: &FontRef,
    text: &str,
    scale_px: f32,
    right_edge: f32,
    baseline_y: f32,
) {
    let scaled = font.as_scaled(PxScale::from(scale_px));
    let total_advance: f32 = text.chars().map(|c| scaled.h_advance(font.glyph_id(c))).sum();
    let mut x = right_edge - total_advance;

    for ch in text.chars() {
        let gid = font.glyph_id(ch);
        let glyph = gid.clone().with_scale_and_position(scale_px, point(x, baseline_y));
        if let Some(outlined) = font.outline_glyph(glyph) {
            blit_outline(img, &outlined, 0.0, 0.0);
        }
        x += scaled.h_advance(gid);
    }
}

fn blit_outline(img: &mut GrayImage, outlined: &ab_glyph::OutlinedGlyph, shift_x: f32, shift_y: f32) {
    let bounds = outlined.px_bounds();
    let (w, h) = (img.width() as i32, img.height() as i32);
    outlined.draw(|gx, gy, coverage| {
        let px = (bounds.min.x + shift_x) as i32 + gx as i32;
        let py = (bounds.min.y + shift_y) as i32 + gy as i32;
        if px < 0 || py < 0 || px >= w || py >= h {
            return;
        }
        let alpha = (coverage.clamp(0.0, 1.0) * 255.0) as u8;
        let cur = img.get_pixel(px as u32, py as u32).0[0];
        img.put_pixel(px as u32, py as u32, Luma([cur.min(255u8.saturating_sub(alpha))]));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_leaves_atlas_invalid() {
        let mut cfg = PipelineConfig::default();
        cfg.font_search_paths = vec!["/nonexistent/path/does-not-exist.ttf".to_string()];
        let atlas = build_atlas(&cfg);
        assert!(!atlas.valid);
        assert!(atlas.tiles.is_empty());
    }
}
