//! Stage 5 + top-level orchestration (spec.md 4.5, 5, 6, 7). Wires the
//! localizer, extractor, detector, and classifier into the five-stage
//! dataflow, runs the one-shot feedback retry, and renders the debug
//! overlay. Ported from `original_source/board.cpp`'s
//! `process_board_image`/`process_board_image_debug`.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as DrawRect;
use log::{info, warn};

use crate::atlas;
use crate::classifier::{compute_scores, refine_distribution, top_candidates, Assignment, CellGuess};
use crate::config::PipelineConfig;
use crate::detector::{is_blank_tile, is_tile};
use crate::error::PipelineError;
use crate::extractor::{extract_cells, CellImage};
use crate::image_buf::BoardImage;
use crate::localizer::{find_board_region, BoardRegion};
use crate::serializer::{count_identified_and_unknown, format_cgp, DECODE_ERROR_CGP};

/// Decodes raw image bytes into an RGB raster (spec.md 7's "input decode
/// failure" mode). Internal control flow only — `run` converts `Err`
/// into the sentinel CGP and a log line before it ever reaches a caller.
fn decode_image(bytes: &[u8]) -> Result<RgbImage, PipelineError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Three arguments per spec.md 6's progress callback contract: a short
/// status string, the accumulated log text, and the current overlay PNG
/// bytes.
pub type ProgressCallback<'a> = dyn FnMut(&str, &str, &[u8]) + 'a;

/// BoardState (spec.md 3): the detected region, the final per-cell
/// grid, the serialized CGP, and the human-readable log.
pub struct BoardState {
    pub region: BoardRegion,
    pub grid: Vec<Vec<Assignment>>,
    pub cgp: String,
    pub log: String,
}

/// DebugResult (spec.md 6): everything `BoardState` carries plus a
/// PNG-encoded overlay image.
pub struct DebugResult {
    pub state: BoardState,
    pub overlay_png: Vec<u8>,
}

/// Entry point: image bytes in, CGP string out. Never panics or returns
/// an error — decode failure produces the sentinel CGP (spec.md 7).
pub fn process_board_image(image_bytes: &[u8]) -> String {
    run(image_bytes, &PipelineConfig::default(), None).state.cgp
}

/// Entry point with progress reporting and debug artifacts.
pub fn process_board_image_debug(
    image_bytes: &[u8],
    on_progress: Option<&mut ProgressCallback>,
) -> DebugResult {
    run(image_bytes, &PipelineConfig::default(), on_progress)
}

fn run(image_bytes: &[u8], cfg: &PipelineConfig, mut on_progress: Option<&mut ProgressCallback>) -> DebugResult {
    let mut log = String::new();

    let rgb = match decode_image(image_bytes) {
        Ok(img) => img,
        Err(e) => {
            log.push_str(&format!("Failed to decode image: {e}\n"));
            let empty_region = BoardRegion {
                rect: crate::localizer::Rect::new(0, 0, 0, 0),
                cell_size: 0,
                is_light: false,
                found: false,
            };
            return DebugResult {
                state: BoardState {
                    region: empty_region,
                    grid: Vec::new(),
                    cgp: DECODE_ERROR_CGP.to_string(),
                    log,
                },
                overlay_png: Vec::new(),
            };
        }
    };

    let board_img = BoardImage::new(rgb);
    let atlas = atlas::get_or_init(cfg);

    let region = find_board_region(&board_img, cfg, None, &mut log);
    notify(&mut on_progress, "board-detected", &log, &board_img, region);

    let cells = extract_cells(board_img.rgb(), &region);
    notify(&mut on_progress, "cells-extracted", &log, &board_img, region);

    let (mut grid, mut region_used) = (
        classify(&cells, &region, &atlas, cfg, &mut log),
        region,
    );
    notify(&mut on_progress, "classified", &log, &board_img, region_used);

    // `occupied` is every tile-detected cell, identified or not — matching
    // `original_source/board.cpp`'s `tiles` counter (spec.md 4.5's "at
    // least 3 tiles were identified" means 3 occupied cells total, not 3
    // successfully-OCR'd ones; a board that's all '?' still retries).
    let (identified, unknown) = count_identified_and_unknown(&grid);
    let occupied = identified + unknown;
    let should_retry = occupied as u32 > cfg.retry_min_occupied
        && unknown as f64 > occupied as f64 * cfg.retry_unknown_fraction;

    if should_retry {
        info!("Retrying Stage 1: {unknown}/{occupied} cells unresolved");
        log.push_str(&format!("Retrying Stage 1: {unknown}/{occupied} cells unresolved\n"));
        let retried_region = find_board_region(&board_img, cfg, Some((region.rect, region.is_light)), &mut log);
        let retried_cells = extract_cells(board_img.rgb(), &retried_region);
        grid = classify(&retried_cells, &retried_region, &atlas, cfg, &mut log);
        region_used = retried_region;
        notify(&mut on_progress, "retried", &log, &board_img, region_used);
    }

    let cgp = format_cgp(&grid);
    let overlay = render_overlay(board_img.rgb(), region_used);
    let overlay_png = encode_png(&overlay);

    DebugResult {
        state: BoardState {
            region: region_used,
            grid,
            cgp,
            log,
        },
        overlay_png,
    }
}

/// Stage 3 + Stage 4 for one board region: per-cell occupancy, template
/// match, blank detection, then the distribution-aware refinement pass.
fn classify(
    cells: &[Vec<CellImage>],
    region: &BoardRegion,
    atlas: &atlas::TemplateAtlas,
    cfg: &PipelineConfig,
    log: &mut String,
) -> Vec<Vec<Assignment>> {
    let mut guesses: Vec<Vec<Option<CellGuess>>> = Vec::with_capacity(15);
    let mut occupied_count = 0usize;

    for (row, row_cells) in cells.iter().enumerate() {
        let mut row_guesses = Vec::with_capacity(15);
        for (col, cell) in row_cells.iter().enumerate() {
            if !is_tile(cell, region.is_light, row, col) {
                row_guesses.push(None);
                continue;
            }
            occupied_count += 1;
            let scores = compute_scores(cell, atlas);
            let candidates = top_candidates(&scores);
            let is_blank = is_blank_tile(cell);
            row_guesses.push(Some(CellGuess { candidates, is_blank }));
        }
        guesses.push(row_guesses);
    }

    log.push_str(&format!("Occupied cells: {occupied_count}\n"));
    refine_distribution(&guesses, cfg.acceptance_threshold)
}

/// Draws the detected rectangle in green and the 16x16 grid lines in
/// yellow onto a copy of the source image, matching
/// `original_source/board.cpp`'s `generate_debug_image` (no letter
/// overlays — the original doesn't draw them either).
fn render_overlay(rgb: &RgbImage, region: BoardRegion) -> RgbImage {
    let mut img = rgb.clone();
    if region.rect.w <= 0 || region.rect.h <= 0 {
        return img;
    }

    let green = Rgb([0u8, 220, 0]);
    let yellow = Rgb([230u8, 220, 0]);

    let rect = DrawRect::at(region.rect.x as i32, region.rect.y as i32)
        .of_size(region.rect.w as u32, region.rect.h as u32);
    draw_hollow_rect_mut(&mut img, rect, green);

    let cw = region.rect.w as f32 / 15.0;
    let ch = region.rect.h as f32 / 15.0;
    let (x0, y0) = (region.rect.x as f32, region.rect.y as f32);
    let (x1, y1) = (region.rect.right() as f32, region.rect.bottom() as f32);

    for i in 0..=15 {
        let x = x0 + i as f32 * cw;
        draw_line_segment_mut(&mut img, (x, y0), (x, y1), yellow);
        let y = y0 + i as f32 * ch;
        draw_line_segment_mut(&mut img, (x0, y), (x1, y), yellow);
    }
    img
}

fn encode_png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut buf);
    if let Err(e) = DynamicImage::ImageRgb8(img.clone()).write_to(&mut cursor, ImageFormat::Png) {
        warn!("Failed to encode debug overlay: {e}");
        return Vec::new();
    }
    buf
}

/// Invokes the progress callback, if present, with the current overlay.
/// Tolerant of a zero-size region (spec.md 6's "callbacks must be
/// tolerant of empty image bytes").
fn notify(cb: &mut Option<&mut ProgressCallback>, status: &str, log: &str, board_img: &BoardImage, region: BoardRegion) {
    if let Some(f) = cb.as_mut() {
        let overlay = render_overlay(board_img.rgb(), region);
        let png = encode_png(&overlay);
        f(status, log, &png);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failure_returns_sentinel_cgp() {
        let garbage = b"not an image";
        let cgp = process_board_image(garbage);
        assert_eq!(cgp, DECODE_ERROR_CGP);
    }

    #[test]
    fn decode_failure_log_mentions_failure() {
        let garbage = b"not an image";
        let result = process_board_image_debug(garbage, None);
        assert!(result.state.log.contains("Failed to decode"));
        assert!(result.overlay_png.is_empty());
    }

    #[test]
    fn blank_board_produces_all_empty_cgp() {
        let img = RgbImage::from_pixel(600, 600, Rgb([40, 120, 60]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        DynamicImage::ImageRgb8(img).write_to(&mut cursor, ImageFormat::Png).unwrap();

        let cgp = process_board_image(&buf);
        let board = cgp.split(" / ").next().unwrap();
        assert_eq!(board.matches('/').count(), 14);
    }

    #[test]
    fn progress_callback_is_invoked_at_least_once() {
        let img = RgbImage::from_pixel(600, 600, Rgb([40, 120, 60]));
        let mut buf = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut buf);
        DynamicImage::ImageRgb8(img).write_to(&mut cursor, ImageFormat::Png).unwrap();

        let mut calls = 0u32;
        let mut cb = |_status: &str, _log: &str, _png: &[u8]| {
            calls += 1;
        };
        let _ = process_board_image_debug(&buf, Some(&mut cb));
        assert!(calls >= 3);
    }
}
