//! Vision pipeline that turns a Scrabble board screenshot into a CGP
//! position string (spec.md 1-2): localize the 15x15 board, extract its
//! cells, decide which are occupied, identify the letter on each tile,
//! and serialize the result. The HTTP front-end, chat-bot adapter, LMM
//! assist path, and dictionary lookup named in spec.md 1 are external
//! collaborators built on top of this library, not part of it.
//!
//! ```no_run
//! let bytes = std::fs::read("board.png").unwrap();
//! let cgp = cgp_vision::process_board_image(&bytes);
//! println!("{cgp}");
//! ```

pub mod atlas;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod image_buf;
pub mod localizer;
pub mod pipeline;
pub mod premium;
pub mod serializer;
pub mod tile_dist;

pub use pipeline::{process_board_image, process_board_image_debug, BoardState, DebugResult, ProgressCallback};
