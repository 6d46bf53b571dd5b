// What passes between the controller (middle.rs) and the TUI.
//
// The TUI never touches the arrangement: each frame it renders a
// `DisplayState` snapshot from `Middle::display_state()`, and it turns key
// presses into `InputEvent`s that the middle layer acts on.
//
// Key plan:
//   Space          //  TogglePlay
//   s              //  Stop
//   r              //  ToggleRecord (mixdown)
//   m              //  ToggleMic
//   d              //  Download
//   Delete / Bksp  //  DeleteSelected
//   Up / Down      //  SelectTrack
//   Shift+Up / Dn  //  MoveClip (selected clip to the next track)
//   Left / Right   //  Nudge (cursor, or the selected clip)
//   1 - 7          //  DropSample
//   Tab / Esc      //  NextClip / ClearClipSelection
//   l / a          //  ToggleLoop / AddTrack
//   [ / ]          //  ClipVolume(-0.05 / 0.05)
//   - / =          //  TrackVolume(-0.05 / 0.05)
//   ?              //  help overlay (TUI only)
//   q              //  Quit

use crate::pipeline::arrangement::Direction;
use crate::pipeline::instrument::SampleId;
use crate::pipeline::timeline::Timeline;

pub const VOLUME_STEP: f32 = 0.05;

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    TogglePlay,
    Stop,
    ToggleRecord,
    ToggleMic,
    Download,
    DeleteSelected,
    SelectTrack(Direction),
    MoveClip(Direction),
    Nudge(i32), // in terminal cells
    DropSample(SampleId),
    NextClip,
    ClearClipSelection,
    ToggleLoop,
    AddTrack,
    ClipVolume(f32), // delta
    TrackVolume(f32),
    Quit,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClipView {
    pub label: &'static str,
    pub start_px: f64,
    pub width_px: f64,
    pub volume: f32,
    pub selected: bool,
    pub sounding: bool, // has a source in the running session
    pub decoding: bool, // mic take not decoded yet
}

#[derive(Clone, Debug, PartialEq)]
pub struct LaneView {
    pub number: usize, // 1-based, as shown
    pub selected: bool,
    pub looping: bool,
    pub volume: f32,
    pub clips: Vec<ClipView>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DisplayState {
    pub lanes: Vec<LaneView>,
    pub timeline: Timeline,
    pub cell_px: f64, // timeline pixels per terminal column
    pub playhead_px: f64,
    pub cursor_px: f64,
    pub playing: bool,
    pub recording_mix: bool,
    pub recording_mic: bool,
    pub mix_secs: Option<f64>, // length of the captured mixdown
    pub samples_loaded: usize,
    pub status: String,
    pub alert: Option<String>, // shown until the next key press
}
