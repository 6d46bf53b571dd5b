// Mic takes: capture start/stop against the engine, and the handle a clip
// keeps to its recording.
use std::path::{Path, PathBuf};

use crate::audio::{BufferId, ElementId, SampleBuffer};
use crate::audio_api::AudioGraph;
use crate::error::SequencerResult;

pub const MIC_PLACEHOLDER_WIDTH_PX: f64 = 100.0;
pub const MIC_PX_PER_SEC: f64 = 10.0;

// A captured mic take. `path` is the WAV it was written to, `element` the
// engine player that can stream it right away. The length is known from the
// capture; the decoded buffer shows up once the file has been read back.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedAudio {
    pub path: PathBuf,
    pub element: ElementId,
    pub duration: f64,
    pub decoded: Option<BufferId>,
}

impl RecordedAudio {
    pub fn new(path: PathBuf, element: ElementId, duration: f64) -> Self {
        Self {
            path,
            element,
            duration,
            decoded: None,
        }
    }

    pub fn mark_decoded(&mut self, buffer: BufferId, duration: f64) {
        self.decoded = Some(buffer);
        self.duration = duration;
    }
}

#[derive(Debug)]
pub struct MicRecorder {
    recording: bool,
    recordings_dir: PathBuf,
    takes: u32,
}

impl MicRecorder {
    pub fn new(recordings_dir: PathBuf) -> Self {
        Self {
            recording: false,
            recordings_dir,
            takes: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    // On failure nothing changes; the caller logs it
    pub fn start<G: AudioGraph>(&mut self, graph: &mut G) -> SequencerResult<()> {
        if self.recording {
            return Ok(());
        }
        graph.start_mic_capture()?;
        self.recording = true;
        log::info!("mic recording started");
        Ok(())
    }

    pub fn stop<G: AudioGraph>(&mut self, graph: &mut G) {
        if !self.recording {
            return;
        }
        graph.stop_mic_capture();
        self.recording = false;
        log::info!("mic recording stopped");
    }

    // Write the captured take to the next free mic-<n>.wav
    pub fn save_take(&mut self, take: &SampleBuffer) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.recordings_dir)?;
        let path = loop {
            self.takes += 1;
            let candidate = take_path(&self.recordings_dir, self.takes);
            if !candidate.exists() {
                break candidate;
            }
        };
        take.write_wav(&path)?;
        log::info!("saved mic take {} ({:.2}s)", path.display(), take.duration_secs());
        Ok(path)
    }
}

fn take_path(dir: &Path, n: u32) -> PathBuf {
    dir.join(format!("mic-{n}.wav"))
}
