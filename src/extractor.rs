//! Stage 2: Cell Extractor (spec.md 4.2). Carves the board rectangle
//! into 225 cell images with a uniform 8% inward inset that excludes
//! grid lines and anti-aliased cell boundaries.

use image::{GenericImageView, RgbImage};

use crate::localizer::{BoardRegion, Rect};

pub const INSET_FRAC: f64 = 0.08;

/// A single owned BGR... well, RGB sub-image for one board cell
/// (spec.md 3's CellImage). 225 of these are produced per board.
pub type CellImage = RgbImage;

/// Crops the board rectangle into a 15x15 grid of cell images, each
/// clamped to the parent image's bounds. If a cell's clipped area ends
/// up empty (spec.md 7, "cell out of image bounds"), a 1x1 placeholder
/// is returned and the detector will read it as empty.
pub fn extract_cells(rgb: &RgbImage, region: &BoardRegion) -> Vec<Vec<CellImage>> {
    let (img_w, img_h) = (rgb.width() as i64, rgb.height() as i64);
    let cw = region.rect.w as f64 / 15.0;
    let ch = region.rect.h as f64 / 15.0;

    let mut cells = Vec::with_capacity(15);
    for row in 0..15i64 {
        let mut row_cells = Vec::with_capacity(15);
        for col in 0..15i64 {
            let cell = crop_cell(rgb, region.rect, row, col, cw, ch, img_w, img_h);
            row_cells.push(cell);
        }
        cells.push(row_cells);
    }
    cells
}

fn crop_cell(
    rgb: &RgbImage,
    rect: Rect,
    row: i64,
    col: i64,
    cw: f64,
    ch: f64,
    img_w: i64,
    img_h: i64,
) -> CellImage {
    let mut x0 = rect.x + (col as f64 * cw + cw * INSET_FRAC) as i64;
    let mut y0 = rect.y + (row as f64 * ch + ch * INSET_FRAC) as i64;
    let mut x1 = rect.x + ((col + 1) as f64 * cw - cw * INSET_FRAC) as i64;
    let mut y1 = rect.y + ((row + 1) as f64 * ch - ch * INSET_FRAC) as i64;

    x0 = x0.clamp(0, img_w - 1);
    y0 = y0.clamp(0, img_h - 1);
    x1 = x1.clamp(x0 + 1, img_w);
    y1 = y1.clamp(y0 + 1, img_h);

    let (w, h) = ((x1 - x0) as u32, (y1 - y0) as u32);
    if w == 0 || h == 0 {
        return RgbImage::new(1, 1);
    }
    rgb.view(x0 as u32, y0 as u32, w, h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localizer::BoardRegion;
    use image::Rgb;

    #[test]
    fn extracts_225_cells_with_inset() {
        let board = RgbImage::from_pixel(300, 300, Rgb([10, 10, 10]));
        let region = BoardRegion {
            rect: Rect::new(0, 0, 300, 300),
            cell_size: 20,
            is_light: false,
            found: true,
        };
        let cells = extract_cells(&board, &region);
        assert_eq!(cells.len(), 15);
        assert_eq!(cells[0].len(), 15);

        // Cell width 20px, 8% inset each side -> ~16.8px wide crop.
        let sample = &cells[7][7];
        assert!(sample.width() < 20);
        assert!(sample.width() > 14);
    }

    #[test]
    fn clips_cleanly_when_board_rect_touches_image_edge() {
        let board = RgbImage::from_pixel(300, 300, Rgb([0, 0, 0]));
        let region = BoardRegion {
            rect: Rect::new(0, 0, 300, 300),
            cell_size: 20,
            is_light: false,
            found: true,
        };
        let cells = extract_cells(&board, &region);
        // Corner cells must not panic and must stay inside bounds.
        assert!(cells[0][0].width() > 0 && cells[0][0].height() > 0);
        assert!(cells[14][14].width() > 0 && cells[14][14].height() > 0);
    }
}
