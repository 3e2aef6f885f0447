//! Tunable pipeline configuration. Follows the teacher's pattern: write
//! `config.json` with defaults if absent, otherwise load and merge
//! through `more-config`, and mirror the result into a process-wide
//! `RwLock` for callers that don't thread a `&PipelineConfig` through
//! explicitly.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::RwLock;

use config::ext::JsonConfigurationExtensions;
use config::{ConfigurationBuilder, DefaultConfigurationBuilder};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref CONFIG: RwLock<PipelineConfig> = RwLock::new(PipelineConfig::default());
}

macro_rules! define {
    ($name:ident { $($field:tt)* }) => {
        #[derive(Clone, Debug, Serialize, Deserialize)]
        #[serde(rename_all(serialize = "camelCase", deserialize = "PascalCase"))]
        pub struct $name {
            $($field)*
        }
    };
}

define!(PipelineConfig {
    // Phase A: Canny edge thresholds for the rough search window.
    pub canny_low: f32,
    pub canny_high: f32,

    // Phase B: mean-V split between light-mode and dark-mode boards.
    pub light_mode_v_threshold: f32,

    // Stage 4: template-match acceptance and reassignment thresholds.
    pub acceptance_threshold: f32,
    pub reassign_threshold: f32,

    // Stage 5: retry trigger. Re-run Stage 1 if more than
    // `retry_min_occupied` cells were found occupied (identified or not)
    // and unresolved cells exceed `retry_unknown_fraction` of them.
    pub retry_min_occupied: u32,
    pub retry_unknown_fraction: f64,

    // Font search path, tried in order; the first entry that exists and
    // parses as a valid font is used to build the template atlas.
    pub font_search_paths: Vec<String>
});

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            canny_low: 50.0,
            canny_high: 150.0,
            light_mode_v_threshold: 170.0,
            acceptance_threshold: 0.20,
            reassign_threshold: 0.05,
            retry_min_occupied: 3,
            retry_unknown_fraction: 0.5,
            font_search_paths: vec![
                "fonts/RobotoMono-Bold.ttf".to_string(),
                "/usr/share/fonts/truetype/roboto-mono/RobotoMono-Bold.ttf".to_string(),
                "/usr/share/fonts/truetype/dejavu/DejaVuSansMono-Bold.ttf".to_string(),
                "/tmp/RobotoMono-Bold.ttf".to_string(),
            ],
        }
    }
}

/// Loads configuration from `config.json` in the working directory,
/// writing the defaults there first if the file doesn't exist yet.
pub fn init_config() -> anyhow::Result<PipelineConfig> {
    if !Path::new("config.json").exists() {
        let config = PipelineConfig::default();
        let mut file = File::create("config.json")?;
        file.write_all(serde_json::to_string_pretty(&config)?.as_bytes())?;
        return Ok(config);
    }

    let config: PipelineConfig = DefaultConfigurationBuilder::new()
        .add_json_file("config.json")
        .build()?
        .reify();

    if let Ok(mut write) = CONFIG.write() {
        *write = config.clone();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_thresholds() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.light_mode_v_threshold, 170.0);
        assert_eq!(cfg.acceptance_threshold, 0.20);
        assert_eq!(cfg.retry_min_occupied, 3);
        assert!(!cfg.font_search_paths.is_empty());
    }
}
