use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::Sender;

use crate::audio_api::{AudioCommand, VoiceStart};

use super::element::ElementPlayer;
use super::frame::StereoFrame;
use super::ids::{BufferId, ElementId};
use super::sample_buffer::SampleBuffer;
use super::voice::{Route, Voice};

const MAX_VOICES: usize = 256; // preallocated so scheduling rarely grows the vec
const MAX_BLOCK: usize = 8192;

// Lives inside the output callback. Owns every buffer, voice and element;
// the UI thread only talks to it through commands and the shared frame clock.
// Nothing here allocates or frees audio data: bus frames leave through a ring
// buffer, and released buffers are handed back to the UI thread to be dropped.
pub struct Engine {
    sample_rate: u32,
    clock: Arc<AtomicU64>, // frames rendered so far
    buffers: HashMap<BufferId, SampleBuffer>,
    voices: Vec<Voice>,
    elements: HashMap<ElementId, ElementPlayer>,
    bus_open: bool,
    bus_scratch: Vec<StereoFrame>,
    bus_tx: Option<rtrb::Producer<StereoFrame>>,
    bus_closed_tx: Option<Sender<()>>,
    retired_tx: Option<Sender<SampleBuffer>>,
}

impl Engine {
    pub fn new(sample_rate: u32, clock: Arc<AtomicU64>) -> Self {
        Self {
            sample_rate,
            clock,
            buffers: HashMap::new(),
            voices: Vec::with_capacity(MAX_VOICES),
            elements: HashMap::new(),
            bus_open: false,
            bus_scratch: Vec::with_capacity(MAX_BLOCK),
            bus_tx: None,
            bus_closed_tx: None,
            retired_tx: None,
        }
    }

    pub fn set_bus_tx(&mut self, tx: rtrb::Producer<StereoFrame>, closed: Sender<()>) {
        self.bus_tx = Some(tx);
        self.bus_closed_tx = Some(closed);
    }

    pub fn set_retired_tx(&mut self, tx: Sender<SampleBuffer>) {
        self.retired_tx = Some(tx);
    }

    pub fn handle_cmd(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::RegisterBuffer { id, buffer } => {
                if let Some(old) = self.buffers.insert(id, buffer) {
                    self.retire(old);
                }
            }
            AudioCommand::ReleaseBuffer { id } => {
                // voices still on it go quiet on the next block
                if let Some(buffer) = self.buffers.remove(&id) {
                    self.retire(buffer);
                }
            }
            AudioCommand::AttachElement { id, buffer } => {
                if let Some(old) = self.elements.insert(id, ElementPlayer::new(buffer)) {
                    self.retire(old.into_buffer());
                }
            }
            AudioCommand::ReleaseElement { id } => {
                if let Some(el) = self.elements.remove(&id) {
                    self.retire(el.into_buffer());
                }
            }
            AudioCommand::StartVoice(start) => self.start_voice(start),
            AudioCommand::SetGain { voice, gain } => {
                if let Some(v) = self.voices.iter_mut().find(|v| v.id == voice) {
                    v.gain = gain;
                }
                for el in self.elements.values_mut() {
                    if let Some((id, g)) = el.output.as_mut() {
                        if *id == voice {
                            *g = gain;
                        }
                    }
                }
            }
            AudioCommand::StopVoice { voice } => {
                // works whether or not the voice has started yet
                self.voices.retain(|v| v.id != voice);
                for el in self.elements.values_mut() {
                    if el.output.map(|(id, _)| id) == Some(voice) {
                        el.output = None;
                    }
                }
            }
            AudioCommand::ConnectElement { voice, element, gain } => {
                if let Some(el) = self.elements.get_mut(&element) {
                    el.output = Some((voice, gain));
                }
            }
            AudioCommand::PlayElement { element, looping } => {
                if let Some(el) = self.elements.get_mut(&element) {
                    el.play(looping);
                }
            }
            AudioCommand::PauseElement { element } => {
                if let Some(el) = self.elements.get_mut(&element) {
                    el.pause();
                }
            }
            AudioCommand::TapElement { element } => {
                if let Some(el) = self.elements.get_mut(&element) {
                    el.tapped = true;
                }
            }
            AudioCommand::OpenMixBus => self.bus_open = true,
            AudioCommand::CloseMixBus => {
                self.voices.retain(|v| v.route != Route::Mixdown);
                for el in self.elements.values_mut() {
                    el.tapped = false;
                }
                if self.bus_open {
                    self.bus_open = false;
                    // every bus frame is already in the ring when this lands
                    if let Some(tx) = &self.bus_closed_tx {
                        let _ = tx.try_send(());
                    }
                }
            }
        }
    }

    fn retire(&self, buffer: SampleBuffer) {
        if let Some(tx) = &self.retired_tx {
            let _ = tx.try_send(buffer);
        }
    }

    fn start_voice(&mut self, start: VoiceStart) {
        let start_frame = (start.when.max(0.0) * self.sample_rate as f64).round() as u64;
        self.voices.push(Voice::new(
            start.voice,
            start.buffer,
            start_frame,
            start.gain,
            start.looping,
            start.route,
        ));
    }

    pub fn render_block(&mut self, out: &mut [StereoFrame]) {
        out.fill(StereoFrame::zero());
        let block_start = self.clock.load(Ordering::Relaxed);

        let bus_open = self.bus_open;
        if bus_open {
            self.bus_scratch.clear();
            self.bus_scratch.resize(out.len(), StereoFrame::zero());
        }

        for voice in self.voices.iter_mut() {
            let Some(buffer) = self.buffers.get(&voice.buffer) else {
                voice.active = false;
                continue;
            };
            match voice.route {
                Route::Output => voice.render_into(buffer, block_start, out),
                Route::Mixdown if bus_open => {
                    voice.render_into(buffer, block_start, &mut self.bus_scratch)
                }
                Route::Mixdown => voice.active = false,
            }
        }
        self.voices.retain(|v| v.active);

        for el in self.elements.values_mut() {
            let bus = if bus_open { Some(&mut self.bus_scratch[..]) } else { None };
            el.render_into(out, bus);
        }

        if bus_open {
            if let Some(tx) = self.bus_tx.as_mut() {
                // a full ring drops the overflow; the UI thread drains it every frame
                for frame in &self.bus_scratch {
                    if tx.push(*frame).is_err() {
                        break;
                    }
                }
            }
        }

        self.clock.fetch_add(out.len() as u64, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ids::{VoiceId, next_buffer_id, next_element_id};
    use crossbeam_channel::Receiver;

    struct Taps {
        bus: rtrb::Consumer<StereoFrame>,
        closed: Receiver<()>,
        retired: Receiver<SampleBuffer>,
    }

    fn engine() -> (Engine, Arc<AtomicU64>, Taps) {
        let clock = Arc::new(AtomicU64::new(0));
        let (bus_tx, bus) = rtrb::RingBuffer::new(64);
        let (closed_tx, closed) = crossbeam_channel::bounded(4);
        let (retired_tx, retired) = crossbeam_channel::bounded(4);
        let mut engine = Engine::new(100, clock.clone());
        engine.set_bus_tx(bus_tx, closed_tx);
        engine.set_retired_tx(retired_tx);
        (engine, clock, Taps { bus, closed, retired })
    }

    fn register_ones(engine: &mut Engine, len: usize) -> BufferId {
        let id = next_buffer_id();
        let buffer = SampleBuffer::from_frames(vec![StereoFrame::mono(1.0); len], 100);
        engine.handle_cmd(AudioCommand::RegisterBuffer { id, buffer });
        id
    }

    fn start(voice: u64, buffer: BufferId, when: f64, route: Route) -> AudioCommand {
        AudioCommand::StartVoice(VoiceStart {
            voice: VoiceId(voice),
            buffer,
            when,
            gain: 1.0,
            looping: false,
            route,
        })
    }

    #[test]
    fn clock_advances_per_block() {
        let (mut engine, clock, _taps) = engine();
        let mut block = vec![StereoFrame::zero(); 64];
        engine.render_block(&mut block);
        engine.render_block(&mut block);
        assert_eq!(clock.load(Ordering::Relaxed), 128);
    }

    #[test]
    fn scheduled_voice_starts_on_its_frame() {
        let (mut engine, _clock, _taps) = engine();
        let buffer = register_ones(&mut engine, 100);
        // 0.1s at 100Hz = frame 10
        engine.handle_cmd(start(1, buffer, 0.1, Route::Output));

        let mut block = vec![StereoFrame::zero(); 16];
        engine.render_block(&mut block);
        assert_eq!(block[9].left, 0.0);
        assert_eq!(block[10].left, 1.0);
    }

    #[test]
    fn stop_before_start_silences_voice() {
        let (mut engine, _clock, _taps) = engine();
        let buffer = register_ones(&mut engine, 100);
        engine.handle_cmd(start(2, buffer, 0.5, Route::Output));
        engine.handle_cmd(AudioCommand::StopVoice { voice: VoiceId(2) });

        let mut block = vec![StereoFrame::zero(); 100];
        engine.render_block(&mut block);
        assert!(block.iter().all(|f| f.left == 0.0));
    }

    #[test]
    fn mixdown_voices_only_reach_the_bus() {
        let (mut engine, _clock, mut taps) = engine();
        let buffer = register_ones(&mut engine, 4);
        engine.handle_cmd(AudioCommand::OpenMixBus);
        engine.handle_cmd(start(3, buffer, 0.0, Route::Mixdown));

        let mut block = vec![StereoFrame::zero(); 8];
        engine.render_block(&mut block);
        assert!(block.iter().all(|f| f.left == 0.0));

        engine.handle_cmd(AudioCommand::CloseMixBus);
        assert!(taps.closed.try_recv().is_ok());
        let mut frames = Vec::new();
        while let Ok(frame) = taps.bus.pop() {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 8);
        assert_eq!(frames.iter().filter(|f| f.left == 1.0).count(), 4);

        // closed bus: nothing more reaches the ring
        engine.render_block(&mut block);
        assert!(taps.bus.pop().is_err());
        engine.handle_cmd(AudioCommand::CloseMixBus);
        assert!(taps.closed.try_recv().is_err());
    }

    #[test]
    fn released_buffers_go_back_to_be_dropped() {
        let (mut engine, _clock, taps) = engine();
        let buffer = register_ones(&mut engine, 6);
        engine.handle_cmd(start(4, buffer, 0.0, Route::Output));
        engine.handle_cmd(AudioCommand::ReleaseBuffer { id: buffer });
        assert_eq!(taps.retired.try_recv().unwrap().len(), 6);

        let mut block = vec![StereoFrame::zero(); 4];
        engine.render_block(&mut block);
        assert!(block.iter().all(|f| f.left == 0.0));

        let element = next_element_id();
        let take = SampleBuffer::from_frames(vec![StereoFrame::mono(0.5); 3], 100);
        engine.handle_cmd(AudioCommand::AttachElement { id: element, buffer: take });
        engine.handle_cmd(AudioCommand::ReleaseElement { id: element });
        assert_eq!(taps.retired.try_recv().unwrap().len(), 3);
    }

    #[test]
    fn element_plays_through_connected_gain() {
        let (mut engine, _clock, _taps) = engine();
        let element = next_element_id();
        let buffer = SampleBuffer::from_frames(vec![StereoFrame::mono(1.0); 4], 100);
        engine.handle_cmd(AudioCommand::AttachElement { id: element, buffer });
        engine.handle_cmd(AudioCommand::ConnectElement { voice: VoiceId(9), element, gain: 0.5 });
        engine.handle_cmd(AudioCommand::PlayElement { element, looping: false });
        engine.handle_cmd(AudioCommand::SetGain { voice: VoiceId(9), gain: 0.25 });

        let mut block = vec![StereoFrame::zero(); 4];
        engine.render_block(&mut block);
        assert_eq!(block[0].left, 0.25);

        engine.handle_cmd(AudioCommand::StopVoice { voice: VoiceId(9) });
        engine.handle_cmd(AudioCommand::PlayElement { element, looping: false });
        let mut block = vec![StereoFrame::zero(); 4];
        engine.render_block(&mut block);
        assert_eq!(block[0].left, 0.0);
    }
}
