pub use crate::audio::{BufferId, ElementId, Route, SampleBuffer, VoiceId};
use crate::error::SequencerResult;

// A buffer source to start at `when` seconds on the audio clock. A `when`
// already in the past starts on the next block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoiceStart {
    pub voice: VoiceId,
    pub buffer: BufferId,
    pub when: f64,
    pub gain: f32,
    pub looping: bool,
    pub route: Route,
}

#[derive(Clone, Debug)]
pub enum AudioCommand {
    // The engine can't load files (interrupts thread), so buffers are decoded
    // elsewhere and handed over whole
    RegisterBuffer { id: BufferId, buffer: SampleBuffer },
    ReleaseBuffer { id: BufferId },
    AttachElement { id: ElementId, buffer: SampleBuffer },
    ReleaseElement { id: ElementId },

    StartVoice(VoiceStart),
    SetGain { voice: VoiceId, gain: f32 },
    StopVoice { voice: VoiceId },

    ConnectElement { voice: VoiceId, element: ElementId, gain: f32 },
    PlayElement { element: ElementId, looping: bool },
    PauseElement { element: ElementId },
    TapElement { element: ElementId },

    OpenMixBus,
    CloseMixBus,
}

// A finished capture, handed to the sequencer core
#[derive(Clone, Debug)]
pub enum EngineEvent {
    MicCaptured(SampleBuffer),
    MixdownCaptured(SampleBuffer),
}

// Everything the sequencer core needs from an audio graph. The real one
// forwards to the cpal engine; tests drive a fake with a manual clock.
pub trait AudioGraph {
    // audio clock, seconds
    fn now(&self) -> f64;
    fn sample_rate(&self) -> u32;

    fn register_buffer(&mut self, id: BufferId, buffer: SampleBuffer);
    fn release_buffer(&mut self, id: BufferId);
    fn attach_element(&mut self, id: ElementId, buffer: SampleBuffer);
    fn release_element(&mut self, id: ElementId);

    fn start_voice(&mut self, start: VoiceStart);
    fn set_gain(&mut self, voice: VoiceId, gain: f32);
    // also disconnects an element connected under this voice
    fn stop_voice(&mut self, voice: VoiceId);

    fn connect_element(&mut self, voice: VoiceId, element: ElementId, gain: f32);
    fn play_element(&mut self, element: ElementId, looping: bool);
    fn pause_element(&mut self, element: ElementId);
    fn tap_element(&mut self, element: ElementId);

    fn open_mix_bus(&mut self) -> SequencerResult<()>;
    fn close_mix_bus(&mut self);
    fn start_mic_capture(&mut self) -> SequencerResult<()>;
    fn stop_mic_capture(&mut self);
}
