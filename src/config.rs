// Read once on startup from <project_dir>/clipdeck.json; anything missing
// falls back to the defaults below.
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::instrument::SampleId;
use crate::pipeline::timeline::LOOKAHEAD_SECS;

const CONFIG_FILE: &str = "clipdeck.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assets_dir: PathBuf,     // where the instrument samples live
    pub recordings_dir: PathBuf, // mic takes are written here
    pub output_dir: PathBuf,     // mixdown downloads land here
    pub mixdown_file_name: String,
    pub log_file: PathBuf,

    pub poll_interval_ms: u64, // playhead poll rate
    pub lookahead_secs: f64,   // added past the longest sample
    pub cell_px: f64,          // timeline pixels per terminal column
    pub initial_tracks: usize,

    pub samples: BTreeMap<SampleId, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("audio"),
            recordings_dir: PathBuf::from("recordings"),
            output_dir: PathBuf::from("."),
            mixdown_file_name: String::from("final-mix.mp3"),
            log_file: PathBuf::from("clipdeck.log"),
            poll_interval_ms: 50,
            lookahead_secs: LOOKAHEAD_SECS,
            cell_px: 8.0,
            initial_tracks: 4,
            samples: default_manifest(),
        }
    }
}

fn default_manifest() -> BTreeMap<SampleId, String> {
    SampleId::INSTRUMENTS
        .iter()
        .map(|&id| {
            let file = match id {
                SampleId::Drums => "drum.wav".to_string(),
                other => format!("{}.wav", other.key()),
            };
            (id, file)
        })
        .collect()
}

impl Config {
    // A missing file is normal; a broken one is logged and ignored
    pub fn load(project_dir: &Path) -> Self {
        let path = project_dir.join(CONFIG_FILE);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(_) => return Self::default().rooted_at(project_dir),
        };
        match serde_json::from_str::<Config>(&data) {
            Ok(config) => config.rooted_at(project_dir),
            Err(e) => {
                log::warn!("ignoring {}: {e}", path.display());
                Self::default().rooted_at(project_dir)
            }
        }
    }

    // relative paths in the config are relative to the project dir
    fn rooted_at(mut self, project_dir: &Path) -> Self {
        for dir in [
            &mut self.assets_dir,
            &mut self.recordings_dir,
            &mut self.output_dir,
            &mut self.log_file,
        ] {
            if dir.is_relative() {
                *dir = project_dir.join(&*dir);
            }
        }
        self
    }

    // Instruments in load order, with the file each one comes from
    pub fn sample_paths(&self) -> Vec<(SampleId, PathBuf)> {
        self.samples
            .iter()
            .filter(|(id, _)| id.is_instrument())
            .map(|(&id, file)| (id, self.assets_dir.join(file)))
            .collect()
    }
}
