//! Stage 4: Classifier (spec.md 4.4). Template-matches each occupied
//! cell against the 26-letter atlas, keeps the top-5 candidates per
//! cell, then runs a distribution-aware refinement pass that demotes
//! over-committed letters to their next-best candidate and may promote
//! a previously-unresolved ('?') cell once its competitors are capped.
//!
//! Ported from `original_source/board.cpp`'s `compute_scores` /
//! `pick_best` / `refine_distribution`.

use image::imageops::{self, FilterType};
use image::RgbImage;
use imageproc::template_matching::{match_template, MatchTemplateMethod};

use crate::atlas::{TemplateAtlas, TMPL_SIZE};
use crate::tile_dist::{max_count_with_blank, TILE_DIST};

const MAX_REFINE_PASSES: u32 = 10;
const BLANK_BUDGET: usize = 2;
const REASSIGN_THRESHOLD: f32 = 0.05;

#[derive(Clone, Copy, Debug)]
pub struct Candidate {
    pub letter: char,
    pub score: f32,
}

/// An occupied cell's top-5 scoring letters plus whether the blank-
/// subscript test fired. `None` at the grid level (not this type) means
/// the tile detector decided the cell is empty.
#[derive(Clone, Debug)]
pub struct CellGuess {
    pub candidates: Vec<Candidate>,
    pub is_blank: bool,
}

/// A cell's final verdict: empty, occupied-but-unidentifiable ('?' in
/// the CGP grammar), or a resolved letter with its blank flag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CellState {
    Empty,
    Unknown,
    Letter(char, bool),
}

impl Default for CellState {
    fn default() -> Self {
        CellState::Empty
    }
}

/// The grid's final per-cell verdict after refinement.
#[derive(Clone, Copy, Debug, Default)]
pub struct Assignment {
    pub state: CellState,
    pub confidence: f32,
}

impl Assignment {
    pub fn letter(&self) -> Option<char> {
        match self.state {
            CellState::Letter(l, _) => Some(l),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self.state, CellState::Letter(_, true))
    }
}

/// Cross-correlates a cell against every letter template, returning one
/// normalized score per A-Z. Mirrors spec.md 4.4's per-cell preparation:
/// upscale to the template size with cubic interpolation, grayscale,
/// invert polarity if the mean sits below mid-gray (templates render a
/// dark glyph on a light background, but dark-mode tiles are light glyph
/// on a darker tile face), then soften with the same 3x3 blur the atlas
/// templates went through so both sides of the match have comparable
/// anti-aliasing. The cell is resized to the template's fixed size first
/// since `match_template` requires the template no larger than the
/// search image in either dimension; at equal sizes the result is a
/// single correlation value.
pub fn compute_scores(cell: &RgbImage, atlas: &TemplateAtlas) -> [f32; 26] {
    let mut scores = [0.0f32; 26];
    if !atlas.valid {
        return scores;
    }

    let resized = imageops::resize(
        &imageops::grayscale(cell),
        TMPL_SIZE,
        TMPL_SIZE,
        FilterType::CatmullRom,
    );

    let mean: f64 =
        resized.pixels().map(|p| p.0[0] as f64).sum::<f64>() / (resized.width() * resized.height()) as f64;
    let polarized = if mean < 127.5 { invert_gray(&resized) } else { resized };

    let gray = imageproc::filter::gaussian_blur_f32(&polarized, 1.0);

    for (i, tmpl) in atlas.tiles.iter().enumerate() {
        let result = match_template(&gray, tmpl, MatchTemplateMethod::CrossCorrelationNormalized);
        scores[i] = result.get_pixel(0, 0).0[0];
    }
    scores
}

fn invert_gray(img: &image::GrayImage) -> image::GrayImage {
    image::GrayImage::from_fn(img.width(), img.height(), |x, y| {
        image::Luma([255 - img.get_pixel(x, y).0[0]])
    })
}

/// The top-5 scoring letters, best first. Always returned in full (even
/// under the acceptance threshold) because the refinement pass may still
/// use a weak candidate to resolve a budget conflict elsewhere on the
/// board (spec.md 4.4, 7).
pub fn top_candidates(scores: &[f32; 26]) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = scores
        .iter()
        .enumerate()
        .map(|(i, &score)| Candidate {
            letter: (b'A' + i as u8) as char,
            score,
        })
        .collect();
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    candidates.truncate(5);
    candidates
}

/// Whether a cell's best candidate clears the immediate acceptance bar
/// (spec.md 4.4's 0.20); cells that don't start the board as '?'.
pub fn is_confident(candidates: &[Candidate], acceptance_threshold: f32) -> bool {
    candidates.first().map(|c| c.score >= acceptance_threshold).unwrap_or(false)
}

fn letter_idx(letter: char) -> usize {
    (letter.to_ascii_uppercase() as u8 - b'A') as usize
}

/// Counts, per letter, how many cells are currently resolved to it
/// (upper or lowercase — a blank standing in for ℓ still counts against
/// ℓ's budget).
fn tally(assigned: &[Vec<Assignment>]) -> [u32; 26] {
    let mut counts = [0u32; 26];
    for row in assigned {
        for cell in row {
            if let Some(letter) = cell.letter() {
                counts[letter_idx(letter)] += 1;
            }
        }
    }
    counts
}

/// Finds the best alternative letter for `guess`, other than `exclude`
/// (the cell's current letter, if any), scoring at least
/// `REASSIGN_THRESHOLD`. Mirrors `original_source/board.cpp`'s two
/// sequential loops: strictly under-represented letters (count below the
/// base `tile_dist`) are preferred, and only if none qualify does the
/// search fall back to letters still at or under their base count (i.e.
/// already using their "+1 blank" headroom is never preferred over an
/// under-full letter, even if the at-limit letter scores higher).
fn best_alternative(guess: &CellGuess, exclude: Option<char>, counts: &[u32; 26]) -> Option<Candidate> {
    let underfull = guess
        .candidates
        .iter()
        .filter(|cand| Some(cand.letter) != exclude)
        .filter(|cand| cand.score >= REASSIGN_THRESHOLD)
        .find(|cand| counts[letter_idx(cand.letter)] < TILE_DIST[letter_idx(cand.letter)])
        .copied();
    if underfull.is_some() {
        return underfull;
    }

    guess
        .candidates
        .iter()
        .filter(|cand| Some(cand.letter) != exclude)
        .filter(|cand| cand.score >= REASSIGN_THRESHOLD)
        .find(|cand| counts[letter_idx(cand.letter)] <= TILE_DIST[letter_idx(cand.letter)])
        .copied()
}

/// Distribution-aware refinement (spec.md 4.4). Two sub-passes run each
/// iteration:
///
/// 1. **Per-letter cap.** Any letter ℓ whose count exceeds
///    `tile_dist[ℓ] + 1` gives up its lowest-confidence excess cells to
///    the best under-budget alternative in their own top-5 (preserving
///    the blank flag), or to '?' if none qualifies.
/// 2. **Global blank budget.** Of all cells whose letter count is over
///    the *base* `tile_dist[ℓ]` (i.e. cells that can only be legal if
///    they're a blank standing in for ℓ), only the 2 most confident
///    board-wide keep the blank flag; the rest are reassigned to an
///    under-full letter if one scores high enough, else demoted to '?'.
///
/// Every pass also gives unresolved ('?') cells a chance to pick up a
/// letter that has room in its cap, since Step 1 may have freed up
/// budget elsewhere on the board. Stops early once a full iteration
/// changes nothing.
pub fn refine_distribution(guesses: &[Vec<Option<CellGuess>>], acceptance_threshold: f32) -> Vec<Vec<Assignment>> {
    let rows = guesses.len();
    let cols = guesses.first().map(|r| r.len()).unwrap_or(0);

    let mut assigned: Vec<Vec<Assignment>> = guesses
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    None => Assignment::default(),
                    Some(guess) => {
                        let top = guess.candidates.first();
                        let confidence = top.map(|c| c.score).unwrap_or(0.0);
                        let state = match top {
                            Some(c) if is_confident(&guess.candidates, acceptance_threshold) => {
                                CellState::Letter(c.letter, guess.is_blank)
                            }
                            _ => CellState::Unknown,
                        };
                        Assignment { state, confidence }
                    }
                })
                .collect()
        })
        .collect();

    for _pass in 0..MAX_REFINE_PASSES {
        let mut changed = false;

        // Step 1: per-letter cap.
        for letter_i in 0..26u8 {
            let letter = (b'A' + letter_i) as char;
            let counts = tally(&assigned);
            let cap = max_count_with_blank(letter_i as usize);
            if counts[letter_i as usize] <= cap {
                continue;
            }
            let excess = (counts[letter_i as usize] - cap) as usize;

            let mut holders: Vec<(usize, usize)> = Vec::new();
            for r in 0..rows {
                for c in 0..cols {
                    if assigned[r][c].letter() == Some(letter) {
                        holders.push((r, c));
                    }
                }
            }
            holders.sort_by(|a, b| {
                assigned[a.0][a.1]
                    .confidence
                    .partial_cmp(&assigned[b.0][b.1].confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let counts_snapshot = tally(&assigned);
            for &(r, c) in holders.iter().take(excess) {
                let guess = guesses[r][c].as_ref().expect("resolved cell always has a guess");
                let was_blank = assigned[r][c].is_blank();
                match best_alternative(guess, Some(letter), &counts_snapshot) {
                    Some(alt) => {
                        assigned[r][c].state = CellState::Letter(alt.letter, was_blank);
                        assigned[r][c].confidence = alt.score;
                    }
                    None => {
                        assigned[r][c].state = CellState::Unknown;
                    }
                }
                changed = true;
            }
        }

        // Step 2: global blank budget.
        let counts = tally(&assigned);
        let mut over_base: Vec<(usize, usize)> = Vec::new();
        for letter_i in 0..26u8 {
            let letter = (b'A' + letter_i) as char;
            let base = TILE_DIST[letter_i as usize];
            if counts[letter_i as usize] <= base {
                continue;
            }
            let n_over = (counts[letter_i as usize] - base) as usize;
            let mut holders: Vec<(usize, usize)> = Vec::new();
            for r in 0..rows {
                for c in 0..cols {
                    if assigned[r][c].letter() == Some(letter) {
                        holders.push((r, c));
                    }
                }
            }
            holders.sort_by(|a, b| {
                assigned[a.0][a.1]
                    .confidence
                    .partial_cmp(&assigned[b.0][b.1].confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            over_base.extend(holders.into_iter().take(n_over));
        }

        over_base.sort_by(|a, b| {
            assigned[b.0][b.1]
                .confidence
                .partial_cmp(&assigned[a.0][a.1].confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for (i, &(r, c)) in over_base.iter().enumerate() {
            let should_be_blank = i < BLANK_BUDGET;
            if assigned[r][c].is_blank() != should_be_blank {
                let letter = assigned[r][c].letter().expect("over-base cell always has a letter");
                if should_be_blank {
                    assigned[r][c].state = CellState::Letter(letter, true);
                } else {
                    let counts = tally(&assigned);
                    let guess = guesses[r][c].as_ref().expect("over-base cell always has a guess");
                    match best_alternative(guess, Some(letter), &counts) {
                        Some(alt) => {
                            assigned[r][c].state = CellState::Letter(alt.letter, false);
                            assigned[r][c].confidence = alt.score;
                        }
                        None => {
                            assigned[r][c].state = CellState::Unknown;
                        }
                    }
                }
                changed = true;
            }
        }

        // Belt-and-suspenders: whatever the over-base accounting above
        // decided, no more than BLANK_BUDGET cells leave this pass
        // flagged blank (spec.md 8's "global count of blanks ≤ 2").
        let mut blanks: Vec<(usize, usize)> = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                if assigned[r][c].is_blank() {
                    blanks.push((r, c));
                }
            }
        }
        if blanks.len() > BLANK_BUDGET {
            blanks.sort_by(|a, b| {
                assigned[b.0][b.1]
                    .confidence
                    .partial_cmp(&assigned[a.0][a.1].confidence)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for &(r, c) in &blanks[BLANK_BUDGET..] {
                let letter = assigned[r][c].letter().expect("blank cell always has a letter");
                assigned[r][c].state = CellState::Letter(letter, false);
                changed = true;
            }
        }

        // Give unresolved cells a chance to claim freed-up budget.
        for r in 0..rows {
            for c in 0..cols {
                if assigned[r][c].state != CellState::Unknown {
                    continue;
                }
                let Some(guess) = guesses[r][c].as_ref() else { continue };
                let counts = tally(&assigned);
                if let Some(alt) = best_alternative(guess, None, &counts) {
                    assigned[r][c].state = CellState::Letter(alt.letter, guess.is_blank);
                    assigned[r][c].confidence = alt.score;
                    changed = true;
                }
            }
        }

        if !changed {
            break;
        }
    }

    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn invert_gray_flips_every_pixel() {
        let img = GrayImage::from_fn(4, 4, |x, _| Luma([(x * 50) as u8]));
        let inverted = invert_gray(&img);
        for x in 0..4 {
            assert_eq!(inverted.get_pixel(x, 0).0[0], 255 - img.get_pixel(x, 0).0[0]);
        }
    }

    #[test]
    fn empty_atlas_returns_all_zero_scores() {
        let atlas = TemplateAtlas { tiles: Vec::new(), valid: false };
        let cell = RgbImage::from_pixel(40, 40, image::Rgb([200, 200, 200]));
        let scores = compute_scores(&cell, &atlas);
        assert!(scores.iter().all(|&s| s == 0.0));
    }

    fn guess(letters: &[(char, f32)], is_blank: bool) -> CellGuess {
        CellGuess {
            candidates: letters.iter().map(|&(letter, score)| Candidate { letter, score }).collect(),
            is_blank,
        }
    }

    #[test]
    fn low_score_stays_unresolved() {
        let mut scores = [0.0f32; 26];
        scores[4] = 0.05;
        let top = top_candidates(&scores);
        assert!(!is_confident(&top, 0.20));
    }

    #[test]
    fn top_candidates_are_sorted_and_capped_at_five() {
        let mut scores = [0.0f32; 26];
        scores[0] = 0.9;
        scores[1] = 0.8;
        scores[2] = 0.7;
        scores[3] = 0.6;
        scores[4] = 0.5;
        scores[5] = 0.4;
        let best = top_candidates(&scores);
        assert_eq!(best.len(), 5);
        assert_eq!(best[0].letter, 'A');
        assert!(best[0].score >= best[4].score);
    }

    #[test]
    fn refinement_demotes_excess_letter_occurrences() {
        // E's cap is tile_dist[E]+1 = 13; feed 14 cells all best-guessing
        // 'E' with distinct confidences and a second-choice that differs.
        let mut grid = vec![vec![None; 1]; 14];
        for (i, row) in grid.iter_mut().enumerate() {
            row[0] = Some(guess(&[('E', 0.9 - i as f32 * 0.01), ('A', 0.5)], false));
        }
        let assigned = refine_distribution(&grid, 0.20);
        let e_count = assigned.iter().flatten().filter(|a| a.letter() == Some('E')).count();
        assert!(e_count <= 13);
    }

    #[test]
    fn refinement_enforces_blank_budget_of_two() {
        let mut grid = vec![vec![None; 1]; 3];
        for (i, row) in grid.iter_mut().enumerate() {
            row[0] = Some(guess(&[('Q', 0.9 - i as f32 * 0.01), ('Z', 0.4)], true));
        }
        let assigned = refine_distribution(&grid, 0.20);
        let blank_count = assigned.iter().flatten().filter(|a| a.is_blank()).count();
        assert!(blank_count <= 2);
    }

    #[test]
    fn empty_cell_stays_empty() {
        let grid: Vec<Vec<Option<CellGuess>>> = vec![vec![None]];
        let assigned = refine_distribution(&grid, 0.20);
        assert_eq!(assigned[0][0].state, CellState::Empty);
    }

    #[test]
    fn weak_candidate_starts_unknown_but_can_resolve_via_budget() {
        // A weak top score (below 0.20) starts unresolved; if its only
        // candidate has room under the cap and scores >= 0.05, the
        // unresolved-cell pass should pick it up.
        let grid = vec![vec![Some(guess(&[('Z', 0.10)], false))]];
        let assigned = refine_distribution(&grid, 0.20);
        assert_eq!(assigned[0][0].state, CellState::Letter('Z', false));
    }
}
