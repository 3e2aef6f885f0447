//! CGP serialization (spec.md 4.5, 6). Turns the final 15x15 cell-state
//! grid into a single-line Crossword Game Position string. This stage
//! is deliberately thin — the hard work already happened upstream in the
//! classifier.
//!
//! Ported from `original_source/board.cpp`'s `format_cgp`.

use crate::classifier::{Assignment, CellState};

pub const DECODE_ERROR_CGP: &str = "[error: could not decode image]";

/// Placeholder rack/score/lexicon suffix the pipeline has no information
/// to fill in (spec.md 4.5).
const PLACEHOLDER_SUFFIX: &str = " / 0/0 0 lex NWL23;";

/// Builds the CGP board string from the 15x15 assignment grid: each row
/// is written left to right, literal letters (lowercase for blanks) with
/// runs of empty cells collapsed to their decimal length, rows joined by
/// `/`. Unresolved ('?') cells are written literally as `?`.
pub fn format_cgp(grid: &[Vec<Assignment>]) -> String {
    let mut board = String::new();
    for (row_i, row) in grid.iter().enumerate() {
        if row_i > 0 {
            board.push('/');
        }
        let mut run = 0u32;
        for cell in row {
            match cell.state {
                CellState::Empty => run += 1,
                CellState::Unknown => {
                    if run > 0 {
                        board.push_str(&run.to_string());
                        run = 0;
                    }
                    board.push('?');
                }
                CellState::Letter(letter, is_blank) => {
                    if run > 0 {
                        board.push_str(&run.to_string());
                        run = 0;
                    }
                    let ch = if is_blank {
                        letter.to_ascii_lowercase()
                    } else {
                        letter.to_ascii_uppercase()
                    };
                    board.push(ch);
                }
            }
        }
        if run > 0 {
            board.push_str(&run.to_string());
        }
    }
    board.push_str(PLACEHOLDER_SUFFIX);
    board
}

/// Counts cells resolved to a letter vs. cells left unresolved ('?'),
/// used by the feedback loop's retry trigger (spec.md 4.5): retry if at
/// least 3 tiles were identified and unresolved cells exceed half of all
/// occupied cells.
pub fn count_identified_and_unknown(grid: &[Vec<Assignment>]) -> (usize, usize) {
    let mut identified = 0usize;
    let mut unknown = 0usize;
    for row in grid {
        for cell in row {
            match cell.state {
                CellState::Letter(_, _) => identified += 1,
                CellState::Unknown => unknown += 1,
                CellState::Empty => {}
            }
        }
    }
    (identified, unknown)
}

/// Parses a board-only CGP string (no rack/score/lexicon suffix) back
/// into a 15x15 grid of `Option<(char, bool)>` (letter, is_blank). Used
/// only by the round-trip test in spec.md 8; the pipeline itself never
/// needs to read CGP back in.
#[cfg(test)]
pub fn parse_board(board: &str) -> Vec<Vec<Option<(char, bool)>>> {
    let mut grid = Vec::with_capacity(15);
    for row_str in board.split('/') {
        let mut row = Vec::with_capacity(15);
        let mut digits = String::new();
        for ch in row_str.chars() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                continue;
            }
            if !digits.is_empty() {
                let n: usize = digits.parse().unwrap();
                for _ in 0..n {
                    row.push(None);
                }
                digits.clear();
            }
            if ch.is_ascii_uppercase() {
                row.push(Some((ch, false)));
            } else if ch.is_ascii_lowercase() {
                row.push(Some((ch.to_ascii_uppercase(), true)));
            } else if ch == '?' {
                row.push(None);
            }
        }
        if !digits.is_empty() {
            let n: usize = digits.parse().unwrap();
            for _ in 0..n {
                row.push(None);
            }
        }
        grid.push(row);
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_grid() -> Vec<Vec<Assignment>> {
        vec![vec![Assignment::default(); 15]; 15]
    }

    fn cell(letter: char, is_blank: bool) -> Assignment {
        Assignment {
            state: CellState::Letter(letter, is_blank),
            confidence: 1.0,
        }
    }

    #[test]
    fn empty_board_is_all_run_lengths() {
        let grid = empty_grid();
        let cgp = format_cgp(&grid);
        let board = cgp.split(" / ").next().unwrap();
        let rows: Vec<&str> = board.split('/').collect();
        assert_eq!(rows.len(), 15);
        for row in rows {
            assert_eq!(row, "15");
        }
    }

    #[test]
    fn single_tile_at_center_round_trips() {
        let mut grid = empty_grid();
        grid[7][7] = cell('Q', false);
        let cgp = format_cgp(&grid);
        let board = cgp.split(" / ").next().unwrap();
        let parsed = parse_board(board);
        assert_eq!(parsed[7][7], Some(('Q', false)));
        for (r, row) in parsed.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if (r, c) != (7, 7) {
                    assert!(cell.is_none());
                }
            }
        }
    }

    #[test]
    fn blank_tile_is_lowercase() {
        let mut grid = empty_grid();
        grid[3][4] = cell('E', true);
        let cgp = format_cgp(&grid);
        assert!(cgp.contains('e'));
        assert!(!cgp.contains('E'));
    }

    #[test]
    fn unresolved_cell_serializes_as_question_mark() {
        let mut grid = empty_grid();
        grid[0][0].state = CellState::Unknown;
        let cgp = format_cgp(&grid);
        let board = cgp.split(" / ").next().unwrap();
        assert!(board.starts_with('?'));
    }

    #[test]
    fn suffix_is_the_fixed_placeholder() {
        let grid = empty_grid();
        let cgp = format_cgp(&grid);
        assert!(cgp.ends_with(" / 0/0 0 lex NWL23;"));
    }

    #[test]
    fn decodes_to_exactly_225_cells() {
        let mut grid = empty_grid();
        grid[0][0] = cell('A', false);
        grid[14][14] = cell('Z', false);
        let cgp = format_cgp(&grid);
        let board = cgp.split(" / ").next().unwrap();
        let parsed = parse_board(board);
        let total: usize = parsed.iter().map(|r| r.len()).sum();
        assert_eq!(total, 225);
    }

    #[test]
    fn retry_trigger_counts_match_spec_thresholds() {
        let mut grid = empty_grid();
        grid[0][0] = cell('A', false);
        grid[0][1] = cell('B', false);
        grid[0][2] = cell('C', false);
        grid[0][3].state = CellState::Unknown;
        grid[0][4].state = CellState::Unknown;
        grid[0][5].state = CellState::Unknown;
        let (identified, unknown) = count_identified_and_unknown(&grid);
        assert_eq!(identified, 3);
        assert_eq!(unknown, 3);
    }
}
