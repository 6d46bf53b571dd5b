// The arrangement: tracks in display order, each holding clips in insertion
// order. Selection lives here too: at most one track and one clip.
use crate::audio::{BufferId, ElementId};

use super::instrument::SampleId;
use super::recording::RecordedAudio;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

#[derive(Clone, Debug, PartialEq)]
pub enum ClipSource {
    Sample(SampleId),
    Recording(RecordedAudio),
}

impl ClipSource {
    pub fn sample_id(&self) -> SampleId {
        match self {
            ClipSource::Sample(id) => *id,
            ClipSource::Recording(_) => SampleId::MicRecording,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Clip {
    pub id: ClipId,
    pub source: ClipSource,
    pub start_px: f64,
    pub width_px: f64, // visual only
    pub volume: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    pub id: TrackId,
    pub clips: Vec<Clip>,
    pub volume: f32,
    pub looping: bool,
}

impl Track {
    fn new(id: TrackId) -> Self {
        Self {
            id,
            clips: Vec::new(),
            volume: 1.0,
            looping: false,
        }
    }

    // what the clip's gain node should be set to
    pub fn effective_gain(&self, clip: &Clip) -> f32 {
        clip.volume * self.volume
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

// What `delete_selected` took out
#[derive(Clone, Debug, PartialEq)]
pub enum Deleted {
    Clip(Clip),
    Track(Track),
    Nothing,
}

impl Deleted {
    // every clip that left the arrangement
    pub fn clips(&self) -> Vec<&Clip> {
        match self {
            Deleted::Clip(clip) => vec![clip],
            Deleted::Track(track) => track.clips.iter().collect(),
            Deleted::Nothing => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Arrangement {
    tracks: Vec<Track>,
    selected_track: Option<TrackId>,
    selected_clip: Option<ClipId>,
    next_id: u64,
}

impl Arrangement {
    pub fn with_tracks(count: usize) -> Self {
        let mut arrangement = Self::default();
        for _ in 0..count {
            arrangement.add_track();
        }
        arrangement
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    fn track_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id == id)
    }

    pub fn add_track(&mut self) -> TrackId {
        let id = TrackId(self.next_id());
        self.tracks.push(Track::new(id));
        id
    }

    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        let idx = self.tracks.iter().position(|t| t.id == id)?;
        let track = self.tracks.remove(idx);
        if self.selected_track == Some(id) {
            self.selected_track = None;
        }
        if let Some(clip) = self.selected_clip {
            if track.clips.iter().any(|c| c.id == clip) {
                self.selected_clip = None;
            }
        }
        Some(track)
    }

    // ── clips ─────────────────────────────────────────────────────

    pub fn add_clip(
        &mut self,
        track: TrackId,
        source: ClipSource,
        start_px: f64,
        width_px: f64,
    ) -> Option<ClipId> {
        let id = ClipId(self.next_id());
        let track = self.track_mut(track)?;
        track.clips.push(Clip {
            id,
            source,
            start_px,
            width_px,
            volume: 1.0,
        });
        Some(id)
    }

    pub fn find_clip(&self, id: ClipId) -> Option<(&Track, &Clip)> {
        self.tracks
            .iter()
            .find_map(|t| t.clips.iter().find(|c| c.id == id).map(|c| (t, c)))
    }

    pub fn clip_mut(&mut self, id: ClipId) -> Option<&mut Clip> {
        self.tracks
            .iter_mut()
            .flat_map(|t| t.clips.iter_mut())
            .find(|c| c.id == id)
    }

    pub fn remove_clip(&mut self, id: ClipId) -> Option<Clip> {
        for track in self.tracks.iter_mut() {
            if let Some(idx) = track.clips.iter().position(|c| c.id == id) {
                if self.selected_clip == Some(id) {
                    self.selected_clip = None;
                }
                return Some(track.clips.remove(idx));
            }
        }
        None
    }

    // Re-drop an existing clip: it lands at the end of the target track
    pub fn move_clip(&mut self, id: ClipId, to: TrackId, start_px: f64) -> bool {
        if self.track(to).is_none() {
            return false;
        }
        let selected = self.selected_clip;
        let Some(mut clip) = self.remove_clip(id) else {
            return false;
        };
        clip.start_px = start_px;
        if let Some(track) = self.track_mut(to) {
            track.clips.push(clip);
        }
        self.selected_clip = selected;
        true
    }

    // every clip with its owning track, in scheduling order
    pub fn clips(&self) -> impl Iterator<Item = (&Track, &Clip)> {
        self.tracks
            .iter()
            .flat_map(|t| t.clips.iter().map(move |c| (t, c)))
    }

    // The clip playing a given mic take, if it is still on the timeline
    pub fn recording_clip_mut(&mut self, element: ElementId) -> Option<&mut Clip> {
        self.tracks
            .iter_mut()
            .flat_map(|t| t.clips.iter_mut())
            .find(|c| matches!(&c.source, ClipSource::Recording(r) if r.element == element))
    }

    // Record that a take has been decoded; its clip gets the real width
    pub fn mark_recording_decoded(
        &mut self,
        element: ElementId,
        buffer: BufferId,
        duration: f64,
        width_px: f64,
    ) -> bool {
        let Some(clip) = self.recording_clip_mut(element) else {
            return false;
        };
        if let ClipSource::Recording(rec) = &mut clip.source {
            rec.mark_decoded(buffer, duration);
        }
        clip.width_px = width_px;
        true
    }

    // ── volume / loop ─────────────────────────────────────────────

    // Returns the clip's new effective gain
    pub fn set_clip_volume(&mut self, id: ClipId, volume: f32) -> Option<f32> {
        let volume = volume.clamp(0.0, 1.0);
        for track in self.tracks.iter_mut() {
            if let Some(clip) = track.clips.iter_mut().find(|c| c.id == id) {
                clip.volume = volume;
                return Some(volume * track.volume);
            }
        }
        None
    }

    // Returns the new effective gain of every clip on the track
    pub fn set_track_volume(&mut self, id: TrackId, volume: f32) -> Vec<(ClipId, f32)> {
        let Some(track) = self.track_mut(id) else {
            return Vec::new();
        };
        track.volume = volume.clamp(0.0, 1.0);
        track
            .clips
            .iter()
            .map(|c| (c.id, track.effective_gain(c)))
            .collect()
    }

    pub fn toggle_loop(&mut self, id: TrackId) -> Option<bool> {
        let track = self.track_mut(id)?;
        track.looping = !track.looping;
        Some(track.looping)
    }

    pub fn any_looping(&self) -> bool {
        self.tracks.iter().any(|t| t.looping)
    }

    // ── selection ─────────────────────────────────────────────────

    pub fn selected_track(&self) -> Option<TrackId> {
        self.selected_track
    }

    pub fn is_selected(&self, id: TrackId) -> bool {
        self.selected_track == Some(id)
    }

    pub fn select_track_id(&mut self, id: TrackId) {
        if self.track(id).is_some() {
            self.selected_track = Some(id);
        }
    }

    // Arrow keys: move the selection one track, wrapping at both ends.
    // With nothing selected, Down picks the first track and Up the last.
    pub fn select_track(&mut self, direction: Direction) -> Option<TrackId> {
        let len = self.tracks.len();
        if len == 0 {
            return None;
        }
        let current = self
            .selected_track
            .and_then(|id| self.tracks.iter().position(|t| t.id == id));
        let idx = match (current, direction) {
            (Some(i), Direction::Up) => (i + len - 1) % len,
            (Some(i), Direction::Down) => (i + 1) % len,
            (None, Direction::Up) => len - 1,
            (None, Direction::Down) => 0,
        };
        let id = self.tracks[idx].id;
        self.selected_track = Some(id);
        Some(id)
    }

    pub fn selected_clip(&self) -> Option<ClipId> {
        self.selected_clip
    }

    pub fn select_clip(&mut self, id: Option<ClipId>) {
        self.selected_clip = id.filter(|&id| self.find_clip(id).is_some());
    }

    // Cycle through the clips of the selected track
    pub fn select_next_clip(&mut self) -> Option<ClipId> {
        let track = self.track(self.selected_track?)?;
        if track.clips.is_empty() {
            return None;
        }
        let next = match self
            .selected_clip
            .and_then(|id| track.clips.iter().position(|c| c.id == id))
        {
            Some(i) => (i + 1) % track.clips.len(),
            None => 0,
        };
        let id = track.clips[next].id;
        self.selected_clip = Some(id);
        Some(id)
    }

    // Delete key: the selected clip if there is one, else the selected track
    pub fn delete_selected(&mut self) -> Deleted {
        if let Some(clip) = self.selected_clip {
            if let Some(clip) = self.remove_clip(clip) {
                return Deleted::Clip(clip);
            }
            self.selected_clip = None;
        }
        match self.selected_track {
            Some(track) => self
                .remove_track(track)
                .map(Deleted::Track)
                .unwrap_or(Deleted::Nothing),
            None => Deleted::Nothing,
        }
    }
}
