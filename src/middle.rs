// The middle layer: owns the arrangement and every piece of playback state,
// turns InputEvents into core operations against the audio graph, and hands
// the TUI a DisplayState each frame.
use crate::audio::{BufferId, SampleBuffer, next_buffer_id, next_element_id};
use crate::audio_api::{AudioGraph, EngineEvent};
use crate::config::Config;
use crate::loader::sample_bank::{DecodedSample, SampleBank};
use crate::loader::sample_loader::{LoadRequest, LoadResult};
use crate::pipeline::arrangement::{Arrangement, ClipSource, Direction, TrackId};
use crate::pipeline::instrument::SampleId;
use crate::pipeline::mixdown::MixdownRecorder;
use crate::pipeline::playhead::{PlayheadDriver, PlayheadEvent};
use crate::pipeline::recording::{
    MIC_PLACEHOLDER_WIDTH_PX, MIC_PX_PER_SEC, MicRecorder, RecordedAudio,
};
use crate::pipeline::session::PlaybackSession;
use crate::pipeline::timeline::{TRACK_ORIGIN_PX, Timeline};
use crate::shared::{ClipView, DisplayState, InputEvent, LaneView};

pub const SAMPLE_PX_PER_SEC: f64 = 20.0;
const DEFAULT_WIDTH_PX: f64 = 800.0; // until the TUI reports its size

pub struct Middle<G: AudioGraph> {
    graph: G,
    config: Config,
    arrangement: Arrangement,
    bank: SampleBank,
    timeline: Timeline,
    session: Option<PlaybackSession>,
    playhead: PlayheadDriver,
    mixdown: MixdownRecorder,
    mic: MicRecorder,
    cursor_px: f64,
    status: String,
    alert: Option<String>,
}

impl<G: AudioGraph> Middle<G> {
    pub fn new(config: Config, graph: G) -> Self {
        let bank = SampleBank::new();
        Self {
            arrangement: Arrangement::with_tracks(config.initial_tracks),
            timeline: Timeline::new(bank.timeline_duration(config.lookahead_secs), DEFAULT_WIDTH_PX),
            playhead: PlayheadDriver::new(config.poll_interval_ms),
            mic: MicRecorder::new(config.recordings_dir.clone()),
            mixdown: MixdownRecorder::new(),
            session: None,
            cursor_px: TRACK_ORIGIN_PX,
            status: String::from("loading samples"),
            alert: None,
            bank,
            config,
            graph,
        }
    }

    pub fn graph_mut(&mut self) -> &mut G {
        &mut self.graph
    }

    // A session that finished on its own may still be ringing out
    pub fn is_playing(&self) -> bool {
        self.session.as_ref().is_some_and(|s| !s.is_finished())
    }

    // Width of the lane area, in columns. Clip and playhead pixels map onto
    // these same columns, so this must be the width handed to the lane grid.
    pub fn set_view_width(&mut self, columns: u16) {
        let width = columns as f64 * self.config.cell_px;
        if width != self.timeline.width {
            self.timeline.width = width;
            self.cursor_px = self.cursor_px.min(width.max(TRACK_ORIGIN_PX));
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        self.alert = None;
        match event {
            InputEvent::TogglePlay => self.play(),
            InputEvent::Stop => self.stop(),
            InputEvent::ToggleRecord => self.toggle_record(),
            InputEvent::ToggleMic => self.toggle_mic(),
            InputEvent::Download => self.download(),
            InputEvent::DeleteSelected => self.delete_selected(),
            InputEvent::SelectTrack(direction) => self.select_track(direction),
            InputEvent::MoveClip(direction) => self.move_selected_clip(direction),
            InputEvent::Nudge(cells) => self.nudge(cells),
            InputEvent::DropSample(id) => self.drop_sample(id),
            InputEvent::NextClip => {
                self.arrangement.select_next_clip();
            }
            InputEvent::ClearClipSelection => self.arrangement.select_clip(None),
            InputEvent::ToggleLoop => self.toggle_loop(),
            InputEvent::AddTrack => {
                let track = self.arrangement.add_track();
                self.arrangement.select_track_id(track);
            }
            InputEvent::ClipVolume(delta) => self.adjust_clip_volume(delta),
            InputEvent::TrackVolume(delta) => self.adjust_track_volume(delta),
            InputEvent::Quit => self.shutdown(),
        }
    }

    // ── transport ─────────────────────────────────────────────────

    // Play while playing is a stop
    pub fn play(&mut self) {
        if self.is_playing() {
            self.stop();
            return;
        }
        // leftovers of a run that finished on its own
        if let Some(old) = self.session.take() {
            old.teardown(&mut self.graph);
        }
        let mut session =
            PlaybackSession::schedule(&self.arrangement, &self.bank, &self.timeline, &mut self.graph);
        self.playhead.start(session.token(), self.graph.now());
        // zero-delay elements go out straight away
        session.fire_due(&mut self.graph);
        self.session = Some(session);
        self.status = String::from("playing");
    }

    // Fine to call when nothing is playing
    pub fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.teardown(&mut self.graph);
            self.status = String::from("stopped");
        }
        self.playhead.cancel();
    }

    // Called every frame from the UI loop
    pub fn tick(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        // late element triggers fire even after the transport has finished
        session.fire_due(&mut self.graph);
        if session.is_finished() {
            return;
        }
        match self.playhead.poll(self.graph.now(), session, &self.timeline) {
            Some(PlayheadEvent::Finished(_)) => {
                // the playhead stays pinned where it ended; sources ring out
                session.finish();
                self.status = String::from("finished");
            }
            Some(PlayheadEvent::Moved(_)) | None => {}
        }
    }

    // ── recording ─────────────────────────────────────────────────

    pub fn toggle_record(&mut self) {
        if self.mixdown.is_recording() {
            self.mixdown.stop(&mut self.graph);
            self.status = String::from("mixdown stopped");
        } else if self
            .mixdown
            .start(&self.arrangement, &self.bank, &mut self.graph)
        {
            self.status = String::from("recording mixdown");
        }
    }

    pub fn toggle_mic(&mut self) {
        if self.mic.is_recording() {
            self.mic.stop(&mut self.graph);
            self.status = String::from("mic stopped");
            return;
        }
        match self.mic.start(&mut self.graph) {
            Ok(()) => self.status = String::from("recording mic"),
            Err(e) => {
                log::warn!("{e}");
                self.alert = Some(e.to_string());
            }
        }
    }

    pub fn download(&mut self) {
        match self
            .mixdown
            .download(&self.config.output_dir, &self.config.mixdown_file_name)
        {
            Ok(path) => self.status = format!("saved {}", path.display()),
            Err(e) => {
                log::warn!("download failed: {e}");
                self.alert = Some(e.to_string());
            }
        }
    }

    // Returns a decode job when a mic take has to be read back
    pub fn on_engine_event(&mut self, event: EngineEvent) -> Option<LoadRequest> {
        match event {
            EngineEvent::MixdownCaptured(mix) => {
                if let Err(e) = self.mixdown.finish(&mix) {
                    log::error!("could not encode mixdown: {e:#}");
                    self.alert = Some(String::from("mixdown could not be encoded"));
                } else {
                    self.status = format!("mixdown ready ({:.1}s)", mix.duration_secs());
                }
                None
            }
            EngineEvent::MicCaptured(take) => {
                if take.is_empty() {
                    log::warn!("mic take is empty, discarded");
                    return None;
                }
                let path = match self.mic.save_take(&take) {
                    Ok(path) => path,
                    Err(e) => {
                        log::error!("could not save mic take: {e:#}");
                        self.alert = Some(String::from("mic take could not be saved"));
                        return None;
                    }
                };
                let duration = take.duration_secs();
                let element = next_element_id();
                self.graph.attach_element(element, take);

                let track = self.recording_target();
                let source =
                    ClipSource::Recording(RecordedAudio::new(path.clone(), element, duration));
                self.arrangement.add_clip(
                    track,
                    source,
                    self.playhead.resting_px(),
                    MIC_PLACEHOLDER_WIDTH_PX,
                );
                self.status = String::from("mic take added");
                Some(LoadRequest::Recording { element, path })
            }
        }
    }

    // The selected track, or a fresh one when none is selected
    fn recording_target(&mut self) -> TrackId {
        match self.arrangement.selected_track() {
            Some(track) => track,
            None => {
                let track = self.arrangement.add_track();
                self.arrangement.select_track_id(track);
                track
            }
        }
    }

    pub fn on_load_result(&mut self, result: LoadResult) {
        match result {
            LoadResult::Sample { id, buffer } => {
                let duration = buffer.duration_secs();
                let buffer_id = self.register(buffer);
                if self.bank.insert(
                    id,
                    DecodedSample {
                        buffer: buffer_id,
                        duration,
                    },
                ) {
                    self.timeline.duration = self.bank.timeline_duration(self.config.lookahead_secs);
                    log::info!("loaded {} ({duration:.2}s)", id.key());
                }
                self.status = format!("{} samples loaded", self.bank.len());
            }
            LoadResult::Recording { element, buffer } => {
                // the take may have been deleted while it was decoding
                if self.arrangement.recording_clip_mut(element).is_none() {
                    log::debug!("decoded take {element:?} no longer has a clip");
                    return;
                }
                let duration = buffer.duration_secs();
                let buffer_id = self.register(buffer);
                self.arrangement.mark_recording_decoded(
                    element,
                    buffer_id,
                    duration,
                    duration * MIC_PX_PER_SEC,
                );
            }
            LoadResult::Failed(e) => log::warn!("{e}"),
        }
    }

    fn register(&mut self, buffer: SampleBuffer) -> BufferId {
        let id = next_buffer_id();
        self.graph.register_buffer(id, buffer);
        id
    }

    // ── editing ───────────────────────────────────────────────────

    pub fn select_track(&mut self, direction: Direction) {
        self.arrangement.select_track(direction);
        self.arrangement.select_clip(None);
    }

    // Re-drop the selected clip on the neighbouring track, same position
    pub fn move_selected_clip(&mut self, direction: Direction) {
        let Some(id) = self.arrangement.selected_clip() else {
            return;
        };
        let Some((from, clip)) = self.arrangement.find_clip(id) else {
            return;
        };
        let (from, start_px) = (from.id, clip.start_px);
        let tracks = self.arrangement.tracks();
        let Some(idx) = tracks.iter().position(|t| t.id == from) else {
            return;
        };
        let to = match direction {
            Direction::Up if idx > 0 => tracks[idx - 1].id,
            Direction::Down if idx + 1 < tracks.len() => tracks[idx + 1].id,
            _ => return,
        };
        if self.arrangement.move_clip(id, to, start_px) {
            self.arrangement.select_track_id(to);
        }
    }

    pub fn delete_selected(&mut self) {
        let deleted = self.arrangement.delete_selected();
        for clip in deleted.clips() {
            if let Some(session) = self.session.as_mut() {
                session.release_clip(clip.id, &mut self.graph);
            }
            if let ClipSource::Recording(rec) = &clip.source {
                log::debug!("releasing take {}", rec.path.display());
                self.graph.release_element(rec.element);
                if let Some(buffer) = rec.decoded {
                    self.graph.release_buffer(buffer);
                }
            }
        }
    }

    // Drop an instrument at the cursor on the selected track
    pub fn drop_sample(&mut self, id: SampleId) {
        let Some(track) = self.arrangement.selected_track() else {
            self.alert = Some(String::from("Select a track first"));
            return;
        };
        let width = self
            .bank
            .get(id)
            .map(|s| s.duration * SAMPLE_PX_PER_SEC)
            .unwrap_or(0.0);
        if let Some(clip) = self
            .arrangement
            .add_clip(track, ClipSource::Sample(id), self.cursor_px, width)
        {
            log::debug!("dropped {} as {clip:?} at {:.0}px", id.key(), self.cursor_px);
        }
    }

    pub fn nudge(&mut self, cells: i32) {
        let delta = cells as f64 * self.config.cell_px;
        match self.arrangement.selected_clip() {
            Some(id) => {
                if let Some(clip) = self.arrangement.clip_mut(id) {
                    clip.start_px = (clip.start_px + delta).max(TRACK_ORIGIN_PX);
                }
            }
            None => {
                let right = self.timeline.width.max(TRACK_ORIGIN_PX);
                self.cursor_px = (self.cursor_px + delta).clamp(TRACK_ORIGIN_PX, right);
            }
        }
    }

    pub fn toggle_loop(&mut self) {
        if let Some(track) = self.arrangement.selected_track() {
            self.arrangement.toggle_loop(track);
        }
    }

    pub fn adjust_clip_volume(&mut self, delta: f32) {
        let Some(id) = self.arrangement.selected_clip() else {
            return;
        };
        let Some((_, clip)) = self.arrangement.find_clip(id) else {
            return;
        };
        let volume = clip.volume + delta;
        if let Some(gain) = self.arrangement.set_clip_volume(id, volume) {
            if let Some(session) = self.session.as_ref() {
                session.apply_gain(id, gain, &mut self.graph);
            }
        }
    }

    pub fn adjust_track_volume(&mut self, delta: f32) {
        let Some(id) = self.arrangement.selected_track() else {
            return;
        };
        let Some(track) = self.arrangement.track(id) else {
            return;
        };
        let volume = track.volume + delta;
        for (clip, gain) in self.arrangement.set_track_volume(id, volume) {
            if let Some(session) = self.session.as_ref() {
                session.apply_gain(clip, gain, &mut self.graph);
            }
        }
    }

    // Stop everything that is still running before the app exits
    pub fn shutdown(&mut self) {
        self.stop();
        self.mixdown.stop(&mut self.graph);
        self.mic.stop(&mut self.graph);
    }

    // ── display ───────────────────────────────────────────────────

    pub fn display_state(&self) -> DisplayState {
        let selected_clip = self.arrangement.selected_clip();
        let lanes = self
            .arrangement
            .tracks()
            .iter()
            .enumerate()
            .map(|(i, track)| LaneView {
                number: i + 1,
                selected: self.arrangement.is_selected(track.id),
                looping: track.looping,
                volume: track.volume,
                clips: track
                    .clips
                    .iter()
                    .map(|clip| ClipView {
                        label: clip.source.sample_id().label(),
                        start_px: clip.start_px,
                        width_px: clip.width_px,
                        volume: clip.volume,
                        selected: selected_clip == Some(clip.id),
                        sounding: self
                            .session
                            .as_ref()
                            .is_some_and(|s| s.active().contains_key(&clip.id)),
                        decoding: matches!(&clip.source, ClipSource::Recording(r) if r.decoded.is_none()),
                    })
                    .collect(),
            })
            .collect();

        DisplayState {
            lanes,
            timeline: self.timeline,
            cell_px: self.config.cell_px,
            playhead_px: self.playhead.position_px(),
            cursor_px: self.cursor_px,
            playing: self.is_playing(),
            recording_mix: self.mixdown.is_recording(),
            recording_mic: self.mic.is_recording(),
            mix_secs: self.mixdown.blob().map(|b| b.duration),
            samples_loaded: self.bank.len(),
            status: self.status.clone(),
            alert: self.alert.clone(),
        }
    }
}
