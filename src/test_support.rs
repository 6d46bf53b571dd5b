// Test double for the audio graph: records every call and lets the test move
// the clock by hand.
use std::collections::HashMap;

use crate::audio_api::{
    AudioGraph, BufferId, ElementId, SampleBuffer, VoiceId, VoiceStart,
};
use crate::error::{SequencerError, SequencerResult};
use crate::loader::sample_bank::{DecodedSample, SampleBank};
use crate::pipeline::instrument::SampleId;

#[derive(Clone, Debug, PartialEq)]
pub struct FakeVoice {
    pub start: VoiceStart,
    pub gain: f32,
    pub stopped: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FakeElement {
    pub connected: Option<(VoiceId, f32)>,
    pub playing: bool,
    pub looping: bool,
    pub plays: u32, // how many times it was (re)started from zero
    pub tapped: bool,
    pub released: bool,
}

#[derive(Debug)]
pub struct FakeGraph {
    pub clock: f64,
    pub rate: u32,
    pub buffers: HashMap<BufferId, SampleBuffer>,
    pub voices: HashMap<VoiceId, FakeVoice>,
    pub elements: HashMap<ElementId, FakeElement>,
    pub mix_bus_open: bool,
    pub mix_bus_fails: bool,
    pub mix_bus_closes: u32,
    pub mic_available: bool,
    pub mic_capturing: bool,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self {
            clock: 0.0,
            rate: 44100,
            buffers: HashMap::new(),
            voices: HashMap::new(),
            elements: HashMap::new(),
            mix_bus_open: false,
            mix_bus_fails: false,
            mix_bus_closes: 0,
            mic_available: true,
            mic_capturing: false,
        }
    }

    pub fn advance(&mut self, secs: f64) {
        self.clock += secs;
    }

    pub fn live_voices(&self) -> Vec<&FakeVoice> {
        self.voices.values().filter(|v| !v.stopped).collect()
    }

    pub fn voice(&self, id: VoiceId) -> &FakeVoice {
        &self.voices[&id]
    }

    pub fn element(&self, id: ElementId) -> &FakeElement {
        &self.elements[&id]
    }
}

impl AudioGraph for FakeGraph {
    fn now(&self) -> f64 {
        self.clock
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn register_buffer(&mut self, id: BufferId, buffer: SampleBuffer) {
        self.buffers.insert(id, buffer);
    }

    fn attach_element(&mut self, id: ElementId, _buffer: SampleBuffer) {
        self.elements.insert(id, FakeElement::default());
    }

    fn release_element(&mut self, id: ElementId) {
        self.elements.entry(id).or_default().released = true;
    }

    fn release_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id);
    }

    fn start_voice(&mut self, start: VoiceStart) {
        self.voices.insert(
            start.voice,
            FakeVoice {
                start,
                gain: start.gain,
                stopped: false,
            },
        );
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) {
        if let Some(v) = self.voices.get_mut(&voice) {
            v.gain = gain;
        }
        for el in self.elements.values_mut() {
            if let Some((id, g)) = el.connected.as_mut() {
                if *id == voice {
                    *g = gain;
                }
            }
        }
    }

    fn stop_voice(&mut self, voice: VoiceId) {
        if let Some(v) = self.voices.get_mut(&voice) {
            v.stopped = true;
        }
        for el in self.elements.values_mut() {
            if matches!(el.connected, Some((id, _)) if id == voice) {
                el.connected = None;
            }
        }
    }

    fn connect_element(&mut self, voice: VoiceId, element: ElementId, gain: f32) {
        self.elements.entry(element).or_default().connected = Some((voice, gain));
    }

    fn play_element(&mut self, element: ElementId, looping: bool) {
        let el = self.elements.entry(element).or_default();
        el.playing = true;
        el.looping = looping;
        el.plays += 1;
    }

    fn pause_element(&mut self, element: ElementId) {
        if let Some(el) = self.elements.get_mut(&element) {
            el.playing = false;
        }
    }

    fn tap_element(&mut self, element: ElementId) {
        self.elements.entry(element).or_default().tapped = true;
    }

    fn open_mix_bus(&mut self) -> SequencerResult<()> {
        if self.mix_bus_fails {
            return Err(SequencerError::MixBusUnavailable("fake".to_string()));
        }
        self.mix_bus_open = true;
        Ok(())
    }

    fn close_mix_bus(&mut self) {
        self.mix_bus_open = false;
        self.mix_bus_closes += 1;
        for el in self.elements.values_mut() {
            el.tapped = false;
        }
    }

    fn start_mic_capture(&mut self) -> SequencerResult<()> {
        if !self.mic_available {
            return Err(SequencerError::DeviceAccessFailure("no mic".to_string()));
        }
        self.mic_capturing = true;
        Ok(())
    }

    fn stop_mic_capture(&mut self) {
        self.mic_capturing = false;
    }
}

// A bank where each listed instrument has its own buffer of the given length
pub fn bank_with(samples: &[(SampleId, f64)]) -> SampleBank {
    let mut bank = SampleBank::new();
    for (i, &(id, duration)) in samples.iter().enumerate() {
        bank.insert(
            id,
            DecodedSample {
                buffer: BufferId(1000 + i as u64),
                duration,
            },
        );
    }
    bank
}
