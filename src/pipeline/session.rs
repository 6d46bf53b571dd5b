// One run of the transport: every clip scheduled against the audio clock,
// the sources that are live because of it, and what is still waiting to fire.
// A session outlives the transport when playback finishes on its own: its
// sources ring out and late element triggers still fire until the next stop.
use std::collections::HashMap;

use crate::audio::{BufferId, ElementId, Route, VoiceId, next_voice_id};
use crate::audio_api::{AudioGraph, VoiceStart};
use crate::loader::sample_bank::SampleBank;

use super::arrangement::{Arrangement, ClipId, ClipSource};
use super::playhead::CancelToken;
use super::timeline::Timeline;

// How a clip can actually be heard right now
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Playable {
    Buffer { buffer: BufferId, duration: f64 },
    // a mic take that hasn't been decoded yet; streams from its element
    Element { element: ElementId, duration: f64 },
}

// None for a clip whose sample never loaded: it stays silent
pub fn resolve(source: &ClipSource, bank: &SampleBank) -> Option<Playable> {
    match source {
        ClipSource::Sample(id) => bank.get(*id).map(|s| Playable::Buffer {
            buffer: s.buffer,
            duration: s.duration,
        }),
        ClipSource::Recording(rec) => Some(match rec.decoded {
            Some(buffer) => Playable::Buffer {
                buffer,
                duration: rec.duration,
            },
            None => Playable::Element {
                element: rec.element,
                duration: rec.duration,
            },
        }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveSource {
    Buffer { voice: VoiceId },
    Element { voice: VoiceId, element: ElementId },
}

impl ActiveSource {
    pub fn voice(&self) -> VoiceId {
        match self {
            ActiveSource::Buffer { voice } | ActiveSource::Element { voice, .. } => *voice,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PendingTrigger {
    element: ElementId,
    fire_at: f64,
    looping: bool,
}

#[derive(Debug)]
pub struct PlaybackSession {
    started_at: f64,
    active: HashMap<ClipId, ActiveSource>,
    max_end_time: f64,
    has_loop: bool,
    pending: Vec<PendingTrigger>,
    token: CancelToken,
    finished: bool,
}

impl PlaybackSession {
    pub fn schedule<G: AudioGraph>(
        arrangement: &Arrangement,
        bank: &SampleBank,
        timeline: &Timeline,
        graph: &mut G,
    ) -> Self {
        let started_at = graph.now();
        let mut session = Self {
            started_at,
            active: HashMap::new(),
            max_end_time: 0.0,
            has_loop: arrangement.any_looping(),
            pending: Vec::new(),
            token: CancelToken::new(),
            finished: false,
        };

        for (track, clip) in arrangement.clips() {
            let clip_start = timeline.pixel_to_time(clip.start_px);
            let delay = (clip_start - (graph.now() - started_at)).max(0.0);
            let gain = track.effective_gain(clip);

            let Some(playable) = resolve(&clip.source, bank) else {
                log::debug!("clip {:?}: {} not loaded, skipped", clip.id, clip.source.sample_id().key());
                continue;
            };

            let voice = next_voice_id();
            match playable {
                Playable::Buffer { buffer, duration } => {
                    graph.start_voice(VoiceStart {
                        voice,
                        buffer,
                        when: started_at + delay,
                        gain,
                        looping: track.looping,
                        route: Route::Output,
                    });
                    session.active.insert(clip.id, ActiveSource::Buffer { voice });
                    session.max_end_time = session.max_end_time.max(clip_start + duration);
                }
                Playable::Element { element, duration } => {
                    graph.connect_element(voice, element, gain);
                    session.pending.push(PendingTrigger {
                        element,
                        fire_at: started_at + delay,
                        looping: track.looping,
                    });
                    session.active.insert(clip.id, ActiveSource::Element { voice, element });
                    session.max_end_time = session.max_end_time.max(clip_start + duration);
                }
            }
            log::debug!("clip {:?} scheduled at +{delay:.3}s, gain {gain:.2}", clip.id);
        }

        log::info!(
            "playback started: {} sources, ends at {:.2}s{}",
            session.active.len(),
            session.max_end_time,
            if session.has_loop { " (looping)" } else { "" }
        );
        session
    }

    // Start every element whose delay has run out; returns how many fired
    pub fn fire_due<G: AudioGraph>(&mut self, graph: &mut G) -> usize {
        let now = graph.now();
        let mut fired = 0;
        self.pending.retain(|trigger| {
            if trigger.fire_at > now {
                return true;
            }
            graph.play_element(trigger.element, trigger.looping);
            fired += 1;
            false
        });
        fired
    }

    // Live gain change, no restart
    pub fn apply_gain<G: AudioGraph>(&self, clip: ClipId, gain: f32, graph: &mut G) {
        if let Some(source) = self.active.get(&clip) {
            graph.set_gain(source.voice(), gain);
        }
    }

    // The clip left the arrangement while playing
    pub fn release_clip<G: AudioGraph>(&mut self, clip: ClipId, graph: &mut G) {
        let Some(source) = self.active.remove(&clip) else {
            return;
        };
        stop_source(source, graph);
        if let ActiveSource::Element { element, .. } = source {
            self.pending.retain(|t| t.element != element);
        }
    }

    // Natural end: the transport stops, nothing that is sounding or still
    // due is touched
    pub fn finish(&mut self) {
        self.token.cancel();
        self.finished = true;
        log::info!(
            "playback finished, {} sources ringing out, {} triggers due",
            self.active.len(),
            self.pending.len()
        );
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn teardown<G: AudioGraph>(mut self, graph: &mut G) {
        self.token.cancel();
        self.pending.clear();
        for (_, source) in self.active.drain() {
            stop_source(source, graph);
        }
        log::info!("playback stopped");
    }

    pub fn started_at(&self) -> f64 {
        self.started_at
    }

    pub fn max_end_time(&self) -> f64 {
        self.max_end_time
    }

    pub fn has_loop(&self) -> bool {
        self.has_loop
    }

    pub fn active(&self) -> &HashMap<ClipId, ActiveSource> {
        &self.active
    }

    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }
}

fn stop_source<G: AudioGraph>(source: ActiveSource, graph: &mut G) {
    match source {
        ActiveSource::Buffer { voice } => graph.stop_voice(voice),
        ActiveSource::Element { voice, element } => {
            // pausing rewinds; stopping the voice disconnects its gain
            graph.pause_element(element);
            graph.stop_voice(voice);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::instrument::SampleId;
    use crate::pipeline::recording::RecordedAudio;
    use crate::test_support::{FakeGraph, bank_with};
    use std::path::PathBuf;

    const TIMELINE: Timeline = Timeline {
        duration: 310.0,
        width: 800.0,
    };

    #[test]
    fn single_clip_at_origin() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[(SampleId::Piano, 3.0), (SampleId::StrangeBeat, 300.0)]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        let clip = arr.add_clip(t, ClipSource::Sample(SampleId::Piano), 120.0, 60.0).unwrap();

        let session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        let voice = session.active()[&clip].voice();
        let v = graph.voice(voice);
        assert_eq!(v.start.when, 0.0);
        assert_eq!(v.start.gain, 1.0);
        assert!(!v.start.looping);
        assert_eq!(v.start.route, Route::Output);
        assert!((session.max_end_time() - 3.0).abs() < 1e-9);
        assert!(!session.has_loop());
    }

    #[test]
    fn delay_is_relative_to_session_start() {
        let mut graph = FakeGraph::new();
        graph.advance(12.0);
        let bank = bank_with(&[(SampleId::Bass, 2.0)]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        let x = TIMELINE.time_to_pixel(5.0);
        let clip = arr.add_clip(t, ClipSource::Sample(SampleId::Bass), x, 40.0).unwrap();

        let session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        let v = graph.voice(session.active()[&clip].voice());
        assert!((v.start.when - 17.0).abs() < 1e-9);
        assert!((session.max_end_time() - 7.0).abs() < 1e-9);
        assert_eq!(session.started_at(), 12.0);
    }

    #[test]
    fn looping_track_loops_every_source() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[(SampleId::Drums, 1.0), (SampleId::Guitar, 2.0)]);
        let mut arr = Arrangement::with_tracks(2);
        let t = arr.tracks()[0].id;
        arr.add_clip(t, ClipSource::Sample(SampleId::Drums), 120.0, 20.0);
        arr.add_clip(t, ClipSource::Sample(SampleId::Guitar), TIMELINE.time_to_pixel(5.0), 40.0);
        arr.toggle_loop(t);

        let session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        assert!(session.has_loop());
        assert_eq!(graph.live_voices().len(), 2);
        assert!(graph.live_voices().iter().all(|v| v.start.looping));
    }

    #[test]
    fn gain_is_clip_times_track_and_updates_live() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[(SampleId::Violin, 4.0)]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        let clip = arr.add_clip(t, ClipSource::Sample(SampleId::Violin), 120.0, 80.0).unwrap();
        arr.set_clip_volume(clip, 0.5);
        arr.set_track_volume(t, 0.8);

        let session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        let voice = session.active()[&clip].voice();
        assert!((graph.voice(voice).gain - 0.4).abs() < 1e-6);

        let gain = arr.set_clip_volume(clip, 0.25).unwrap();
        session.apply_gain(clip, gain, &mut graph);
        let v = graph.voice(voice);
        assert!((v.gain - 0.2).abs() < 1e-6);
        assert!(!v.stopped);
        assert_eq!(graph.voices.len(), 1); // not restarted
    }

    #[test]
    fn unloaded_samples_stay_silent() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        arr.add_clip(t, ClipSource::Sample(SampleId::Silence), 120.0, 20.0);

        let session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        assert!(session.active().is_empty());
        assert!(graph.voices.is_empty());
        assert_eq!(session.max_end_time(), 0.0);
    }

    #[test]
    fn element_triggers_wait_for_their_delay() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        let rec = RecordedAudio::new(PathBuf::from("mic-1.wav"), ElementId(42), 1.5);
        let clip = arr
            .add_clip(t, ClipSource::Recording(rec), TIMELINE.time_to_pixel(2.0), 100.0)
            .unwrap();

        let mut session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        assert!(matches!(session.active()[&clip], ActiveSource::Element { .. }));
        assert!(graph.element(ElementId(42)).connected.is_some());
        // the take's captured length counts before it is decoded
        assert!((session.max_end_time() - 3.5).abs() < 1e-9);

        graph.advance(1.0);
        assert_eq!(session.fire_due(&mut graph), 0);
        graph.advance(1.5);
        assert_eq!(session.fire_due(&mut graph), 1);
        assert_eq!(session.fire_due(&mut graph), 0);
        assert_eq!(graph.element(ElementId(42)).plays, 1);
    }

    #[test]
    fn decoded_recording_plays_from_its_buffer() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        let mut rec = RecordedAudio::new(PathBuf::from("mic-1.wav"), ElementId(5), 1.4);
        rec.mark_decoded(BufferId(77), 1.5);
        let clip = arr.add_clip(t, ClipSource::Recording(rec), 120.0, 15.0).unwrap();

        let session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        let voice = session.active()[&clip].voice();
        assert_eq!(graph.voice(voice).start.buffer, BufferId(77));
        assert!((session.max_end_time() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn teardown_stops_everything_and_cancels() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[(SampleId::Piano, 3.0)]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        arr.add_clip(t, ClipSource::Sample(SampleId::Piano), TIMELINE.time_to_pixel(30.0), 60.0);
        let rec = RecordedAudio::new(PathBuf::from("mic-1.wav"), ElementId(9), 2.0);
        arr.add_clip(t, ClipSource::Recording(rec), TIMELINE.time_to_pixel(20.0), 100.0);

        let session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        let token = session.token();

        // stop before anything has started sounding
        session.teardown(&mut graph);
        assert!(token.is_cancelled());
        assert!(graph.live_voices().is_empty());
        let el = graph.element(ElementId(9));
        assert!(el.connected.is_none());
        assert!(!el.playing);
        assert_eq!(el.plays, 0);
    }

    #[test]
    fn finishing_leaves_sources_and_late_triggers_alone() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[(SampleId::Piano, 3.0)]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        let clip = arr.add_clip(t, ClipSource::Sample(SampleId::Piano), 120.0, 60.0).unwrap();
        let rec = RecordedAudio::new(PathBuf::from("mic-1.wav"), ElementId(6), 1.0);
        arr.add_clip(t, ClipSource::Recording(rec), TIMELINE.time_to_pixel(5.0), 100.0);

        let mut session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        let token = session.token();
        graph.advance(3.0);
        session.finish();
        assert!(token.is_cancelled());
        assert!(session.is_finished());
        assert!(!graph.voice(session.active()[&clip].voice()).stopped);
        assert!(graph.element(ElementId(6)).connected.is_some());

        graph.advance(2.1);
        assert_eq!(session.fire_due(&mut graph), 1);
        assert!(graph.element(ElementId(6)).playing);

        // an explicit stop afterwards still silences everything
        session.teardown(&mut graph);
        assert!(graph.live_voices().is_empty());
        assert!(!graph.element(ElementId(6)).playing);
    }

    #[test]
    fn released_clip_leaves_no_entry() {
        let mut graph = FakeGraph::new();
        let bank = bank_with(&[(SampleId::Piano, 3.0)]);
        let mut arr = Arrangement::with_tracks(1);
        let t = arr.tracks()[0].id;
        let clip = arr.add_clip(t, ClipSource::Sample(SampleId::Piano), 120.0, 60.0).unwrap();

        let mut session = PlaybackSession::schedule(&arr, &bank, &TIMELINE, &mut graph);
        let voice = session.active()[&clip].voice();
        session.release_clip(clip, &mut graph);
        assert!(session.active().is_empty());
        assert!(graph.voice(voice).stopped);
        // releasing twice is harmless
        session.release_clip(clip, &mut graph);
    }
}
