// Records a mix of the arrangement on a bus parallel to the speakers, then
// keeps the result as an in-memory WAV until it's downloaded.
use std::path::{Path, PathBuf};

use crate::audio::{Route, SampleBuffer, VoiceId, next_voice_id};
use crate::audio_api::{AudioGraph, VoiceStart};
use crate::error::{SequencerError, SequencerResult};
use crate::loader::sample_bank::SampleBank;

use super::arrangement::Arrangement;
use super::session::{Playable, resolve};

#[derive(Clone, Debug, PartialEq)]
pub struct MixdownBlob {
    pub bytes: Vec<u8>,
    pub duration: f64,
}

#[derive(Debug, Default)]
pub struct MixdownRecorder {
    recording: bool,
    voices: Vec<VoiceId>, // sources feeding the bus, stopped with it
    blob: Option<MixdownBlob>,
}

impl MixdownRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    // Every clip starts right away at unity gain, whatever its position or
    // volume. Returns false if the bus could not be opened.
    pub fn start<G: AudioGraph>(
        &mut self,
        arrangement: &Arrangement,
        bank: &SampleBank,
        graph: &mut G,
    ) -> bool {
        if self.recording {
            return true;
        }
        if let Err(e) = graph.open_mix_bus() {
            log::warn!("mixdown not started: {e}");
            return false;
        }

        let now = graph.now();
        for (_, clip) in arrangement.clips() {
            match resolve(&clip.source, bank) {
                Some(Playable::Buffer { buffer, .. }) => {
                    let voice = next_voice_id();
                    graph.start_voice(VoiceStart {
                        voice,
                        buffer,
                        when: now,
                        gain: 1.0,
                        looping: false,
                        route: Route::Mixdown,
                    });
                    self.voices.push(voice);
                }
                Some(Playable::Element { element, .. }) => graph.tap_element(element),
                None => {}
            }
        }
        self.recording = true;
        log::info!("mixdown recording started ({} sources)", self.voices.len());
        true
    }

    pub fn stop<G: AudioGraph>(&mut self, graph: &mut G) {
        if !self.recording {
            return;
        }
        for voice in self.voices.drain(..) {
            graph.stop_voice(voice);
        }
        graph.close_mix_bus();
        self.recording = false;
        log::info!("mixdown recording stopped");
    }

    // The bus contents, once the engine hands them back
    pub fn finish(&mut self, mix: &SampleBuffer) -> anyhow::Result<()> {
        let bytes = mix.encode_wav()?;
        log::info!("mixdown captured: {:.2}s, {} bytes", mix.duration_secs(), bytes.len());
        self.blob = Some(MixdownBlob {
            bytes,
            duration: mix.duration_secs(),
        });
        Ok(())
    }

    pub fn blob(&self) -> Option<&MixdownBlob> {
        self.blob.as_ref()
    }

    pub fn download(&self, dir: &Path, file_name: &str) -> SequencerResult<PathBuf> {
        let blob = self.blob.as_ref().ok_or(SequencerError::NoRecordingAvailable)?;
        let path = dir.join(file_name);
        std::fs::create_dir_all(dir)
            .and_then(|_| std::fs::write(&path, &blob.bytes))
            .map_err(|e| SequencerError::Export {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        log::info!("mixdown written to {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ElementId, StereoFrame};
    use crate::pipeline::arrangement::ClipSource;
    use crate::pipeline::instrument::SampleId;
    use crate::pipeline::recording::RecordedAudio;
    use crate::test_support::{FakeGraph, bank_with};

    fn arrangement() -> Arrangement {
        let mut arr = Arrangement::with_tracks(2);
        let (t0, t1) = (arr.tracks()[0].id, arr.tracks()[1].id);
        let late = arr.add_clip(t0, ClipSource::Sample(SampleId::Piano), 600.0, 60.0).unwrap();
        arr.set_clip_volume(late, 0.3);
        arr.toggle_loop(t0);
        let rec = RecordedAudio::new(PathBuf::from("mic-1.wav"), ElementId(3), 1.0);
        arr.add_clip(t1, ClipSource::Recording(rec), 120.0, 100.0);
        arr
    }

    #[test]
    fn start_routes_every_clip_to_the_bus_immediately() {
        let mut graph = FakeGraph::new();
        graph.advance(4.0);
        let bank = bank_with(&[(SampleId::Piano, 3.0)]);
        let mut rec = MixdownRecorder::new();

        assert!(rec.start(&arrangement(), &bank, &mut graph));
        assert!(rec.is_recording() && graph.mix_bus_open);
        let voices = graph.live_voices();
        assert_eq!(voices.len(), 1);
        let v = voices[0];
        assert_eq!(v.start.when, 4.0);
        assert_eq!(v.start.gain, 1.0);
        assert!(!v.start.looping);
        assert_eq!(v.start.route, Route::Mixdown);
        assert!(graph.element(ElementId(3)).tapped);
    }

    #[test]
    fn unavailable_bus_stays_idle() {
        let mut graph = FakeGraph::new();
        graph.mix_bus_fails = true;
        let mut rec = MixdownRecorder::new();
        assert!(!rec.start(&arrangement(), &bank_with(&[]), &mut graph));
        assert!(!rec.is_recording());
        assert!(graph.voices.is_empty());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[(SampleId::Piano, 3.0)]);
        let mut rec = MixdownRecorder::new();
        rec.stop(&mut graph);
        assert_eq!(graph.mix_bus_closes, 0);

        rec.start(&arrangement(), &bank, &mut graph);
        rec.stop(&mut graph);
        rec.stop(&mut graph);
        assert_eq!(graph.mix_bus_closes, 1);
        assert!(graph.live_voices().is_empty());
    }

    #[test]
    fn download_without_recording_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let rec = MixdownRecorder::new();
        let err = rec.download(dir.path(), "final-mix.mp3").unwrap_err();
        assert!(matches!(err, SequencerError::NoRecordingAvailable));
        assert_eq!(err.to_string(), "No recorded audio available. Please record first.");
    }

    #[test]
    fn captured_mix_downloads_as_wav() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = MixdownRecorder::new();
        let mix = SampleBuffer::from_frames(vec![StereoFrame::mono(0.25); 4410], 44100);
        rec.finish(&mix).unwrap();
        assert!((rec.blob().unwrap().duration - 0.1).abs() < 1e-9);

        let path = rec.download(dir.path(), "final-mix.mp3").unwrap();
        assert_eq!(path, dir.path().join("final-mix.mp3"));
        let back = SampleBuffer::load_wav(&path, 44100).unwrap();
        assert_eq!(back.len(), 4410);
    }
}
