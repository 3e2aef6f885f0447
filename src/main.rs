//! CLI front-end: reads a board screenshot off disk and prints its CGP
//! position string. `--debug` additionally writes the overlay PNG and a
//! per-cell candidate dump next to the input image.

use std::path::{Path, PathBuf};

use clap::Parser;
use log::info;

use cgp_vision::classifier::{Assignment, CellState};
use cgp_vision::{atlas, config, pipeline};

#[derive(Parser)]
#[command(name = "cgp-vision", about = "Turn a Scrabble board screenshot into a CGP position string")]
struct Cli {
    /// Path to the board screenshot (any format `image` can decode).
    image: PathBuf,

    /// Also write overlay.png and cells.json with the detected region,
    /// grid lines, and per-cell candidate lists.
    #[arg(long)]
    debug: bool,

    /// Directory to write debug artifacts into. Defaults to the input
    /// image's own directory.
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    pretty_env_logger::init();

    let cli = Cli::parse();
    let config = config::init_config()?;
    atlas::init_atlas(&config);

    let bytes = std::fs::read(&cli.image)?;

    if cli.debug {
        let mut progress = |status: &str, _log: &str, _png: &[u8]| {
            info!("stage complete: {status}");
        };
        let result = pipeline::process_board_image_debug(&bytes, Some(&mut progress));

        let out_dir = cli
            .out_dir
            .or_else(|| cli.image.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&out_dir)?;
        std::fs::write(out_dir.join("overlay.png"), &result.overlay_png)?;
        std::fs::write(
            out_dir.join("cells.json"),
            serde_json::to_string_pretty(&grid_to_json(&result.state.grid))?,
        )?;

        info!("{}", result.state.log);
        println!("{}", result.state.cgp);
    } else {
        let cgp = pipeline::process_board_image(&bytes);
        println!("{cgp}");
    }

    Ok(())
}

fn grid_to_json(grid: &[Vec<Assignment>]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = grid
        .iter()
        .map(|row| {
            let cells: Vec<serde_json::Value> = row
                .iter()
                .map(|cell| match cell.state {
                    CellState::Empty => serde_json::json!({ "state": "empty" }),
                    CellState::Unknown => {
                        serde_json::json!({ "state": "unknown", "confidence": cell.confidence })
                    }
                    CellState::Letter(letter, is_blank) => serde_json::json!({
                        "state": "letter",
                        "letter": letter.to_string(),
                        "blank": is_blank,
                        "confidence": cell.confidence,
                    }),
                })
                .collect();
            serde_json::Value::Array(cells)
        })
        .collect();
    serde_json::Value::Array(rows)
}
