use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::audio_api::{AudioCommand, AudioGraph, EngineEvent, VoiceStart};
use crate::error::{SequencerError, SequencerResult};

mod element;
mod engine;
mod frame;
mod ids;
mod sample_buffer;
mod voice;

pub use frame::StereoFrame;
pub use ids::{BufferId, ElementId, VoiceId, next_buffer_id, next_element_id, next_voice_id};
pub use sample_buffer::SampleBuffer;
pub use voice::Route;

use engine::Engine;

// Frames on their way out of the audio threads. Takes are assembled here,
// on the UI thread, so the callbacks never grow or free a buffer.
struct Captures {
    bus_rx: rtrb::Consumer<StereoFrame>,
    bus_closed_rx: Receiver<()>,
    input_rx: Receiver<Vec<StereoFrame>>,
    retired_rx: Receiver<SampleBuffer>,
    mix: Option<Vec<StereoFrame>>,
    mic: Option<Vec<StereoFrame>>,
    ready: VecDeque<EngineEvent>,
}

impl Captures {
    fn pump(&mut self, sample_rate: u32) {
        // buffers the engine let go of are freed here
        while self.retired_rx.try_recv().is_ok() {}

        self.drain_input();

        // close signal first: once seen, every bus frame is already queued
        let closed = self.bus_closed_rx.try_recv().is_ok();
        while let Ok(frame) = self.bus_rx.pop() {
            if let Some(mix) = self.mix.as_mut() {
                mix.push(frame);
            }
        }
        if closed {
            if let Some(frames) = self.mix.take() {
                let mix = SampleBuffer::from_frames(frames, sample_rate);
                self.ready.push_back(EngineEvent::MixdownCaptured(mix));
            }
        }
    }

    // mic blocks outside a take are dropped
    fn drain_input(&mut self) {
        while let Ok(frames) = self.input_rx.try_recv() {
            if let Some(take) = self.mic.as_mut() {
                take.extend_from_slice(&frames);
            }
        }
    }
}

// The process-wide audio graph: one output stream, one optional mic stream,
// one engine. Implements `AudioGraph` by forwarding commands.
pub struct AudioHandle {
    tx: Sender<AudioCommand>,
    captures: Captures,
    clock: Arc<AtomicU64>,
    sample_rate: u32,
    _output_stream: cpal::Stream,
    input_stream: Option<cpal::Stream>, // None when no mic available
}

impl AudioHandle {
    pub fn send(&self, cmd: AudioCommand) -> bool {
        self.tx.try_send(cmd).is_ok()
    }

    pub fn poll_event(&mut self) -> Option<EngineEvent> {
        self.captures.pump(self.sample_rate);
        self.captures.ready.pop_front()
    }

    fn send_or_log(&self, cmd: AudioCommand) {
        if !self.send(cmd) {
            log::warn!("audio command queue full, command dropped");
        }
    }
}

impl AudioGraph for AudioHandle {
    fn now(&self) -> f64 {
        self.clock.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn register_buffer(&mut self, id: BufferId, buffer: SampleBuffer) {
        self.send_or_log(AudioCommand::RegisterBuffer { id, buffer });
    }

    fn release_buffer(&mut self, id: BufferId) {
        self.send_or_log(AudioCommand::ReleaseBuffer { id });
    }

    fn attach_element(&mut self, id: ElementId, buffer: SampleBuffer) {
        self.send_or_log(AudioCommand::AttachElement { id, buffer });
    }

    fn release_element(&mut self, id: ElementId) {
        self.send_or_log(AudioCommand::ReleaseElement { id });
    }

    fn start_voice(&mut self, start: VoiceStart) {
        self.send_or_log(AudioCommand::StartVoice(start));
    }

    fn set_gain(&mut self, voice: VoiceId, gain: f32) {
        self.send_or_log(AudioCommand::SetGain { voice, gain });
    }

    fn stop_voice(&mut self, voice: VoiceId) {
        self.send_or_log(AudioCommand::StopVoice { voice });
    }

    fn connect_element(&mut self, voice: VoiceId, element: ElementId, gain: f32) {
        self.send_or_log(AudioCommand::ConnectElement { voice, element, gain });
    }

    fn play_element(&mut self, element: ElementId, looping: bool) {
        self.send_or_log(AudioCommand::PlayElement { element, looping });
    }

    fn pause_element(&mut self, element: ElementId) {
        self.send_or_log(AudioCommand::PauseElement { element });
    }

    fn tap_element(&mut self, element: ElementId) {
        self.send_or_log(AudioCommand::TapElement { element });
    }

    fn open_mix_bus(&mut self) -> SequencerResult<()> {
        self.tx
            .try_send(AudioCommand::OpenMixBus)
            .map_err(|e| SequencerError::MixBusUnavailable(e.to_string()))?;
        self.captures.mix = Some(Vec::new());
        Ok(())
    }

    fn close_mix_bus(&mut self) {
        self.send_or_log(AudioCommand::CloseMixBus);
    }

    fn start_mic_capture(&mut self) -> SequencerResult<()> {
        if self.input_stream.is_none() {
            return Err(SequencerError::DeviceAccessFailure(
                "no input stream".to_string(),
            ));
        }
        // whatever arrived before the take starts is not part of it
        self.captures.drain_input();
        self.captures.mic = Some(Vec::new());
        Ok(())
    }

    fn stop_mic_capture(&mut self) {
        self.captures.drain_input();
        if let Some(frames) = self.captures.mic.take() {
            let take = SampleBuffer::from_frames(frames, self.sample_rate);
            self.captures.ready.push_back(EngineEvent::MicCaptured(take));
        }
    }
}

pub fn start_audio() -> anyhow::Result<AudioHandle> {
    let (tx, rx) = crossbeam_channel::bounded::<AudioCommand>(1024);

    let host = cpal::default_host();
    let device = host.default_output_device().context("no default output device")?;
    let config = device.default_output_config().context("no default output config")?;

    let sample_rate = config.sample_rate();
    let channels = config.channels() as usize;

    let (input_tx, input_rx) = crossbeam_channel::bounded::<Vec<StereoFrame>>(2048);
    // two seconds of mixdown in flight between UI frames is plenty
    let (bus_tx, bus_rx) = rtrb::RingBuffer::<StereoFrame>::new(sample_rate as usize * 2);
    let (bus_closed_tx, bus_closed_rx) = crossbeam_channel::bounded::<()>(4);
    let (retired_tx, retired_rx) = crossbeam_channel::bounded::<SampleBuffer>(64);
    let clock = Arc::new(AtomicU64::new(0));

    match config.sample_format() {
        cpal::SampleFormat::F32 => {
            let mut engine = Engine::new(sample_rate, clock.clone());
            engine.set_bus_tx(bus_tx, bus_closed_tx);
            engine.set_retired_tx(retired_tx);

            let output_stream = build_output_stream_f32(&device, &config.into(), rx, engine, channels)?;
            output_stream.play().context("failed to play output stream")?;

            let input_stream = try_build_input_stream(&host, sample_rate, input_tx);
            log::info!(
                "audio started: {} Hz, {} channels, mic {}",
                sample_rate,
                channels,
                if input_stream.is_some() { "available" } else { "unavailable" }
            );

            Ok(AudioHandle {
                tx,
                captures: Captures {
                    bus_rx,
                    bus_closed_rx,
                    input_rx,
                    retired_rx,
                    mix: None,
                    mic: None,
                    ready: VecDeque::new(),
                },
                clock,
                sample_rate,
                _output_stream: output_stream,
                input_stream,
            })
        }
        _ => anyhow::bail!("unsupported sample format (only f32 supported for now)"),
    }
}

// ── Output stream ─────────────────────────────────────────────────

fn build_output_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    rx: Receiver<AudioCommand>,
    mut engine: Engine,
    channels: usize,
) -> anyhow::Result<cpal::Stream> {
    let mut block: Vec<StereoFrame> = Vec::with_capacity(4096);

    let err_fn = |err| log::error!("audio output stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [f32], _info| {
            while let Ok(cmd) = rx.try_recv() {
                engine.handle_cmd(cmd);
            }

            let n_frames = data.len() / channels.max(1);
            block.resize(n_frames, StereoFrame::zero());
            engine.render_block(&mut block);

            // fan the stereo block out to however many channels the device has
            for (out, frame) in data.chunks_exact_mut(channels.max(1)).zip(block.iter()) {
                match out.len() {
                    1 => out[0] = (frame.left + frame.right) * 0.5,
                    _ => {
                        out[0] = frame.left;
                        out[1] = frame.right;
                        for extra in out[2..].iter_mut() {
                            *extra = 0.0;
                        }
                    }
                }
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

fn try_build_input_stream(
    host: &cpal::Host,
    target_sample_rate: cpal::SampleRate,
    tx: Sender<Vec<StereoFrame>>,
) -> Option<cpal::Stream> {
    let device = match host.default_input_device() {
        Some(d) => d,
        None => {
            log::warn!("no default input device, mic recording disabled");
            return None;
        }
    };

    let supported = device.default_input_config().ok()?;
    let mut stream_config: cpal::StreamConfig = supported.into();
    stream_config.sample_rate = target_sample_rate;

    let in_channels = stream_config.channels as usize;

    let err_fn = |err| log::error!("audio input stream error: {err}");

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _info: &cpal::InputCallbackInfo| {
                let frames: Vec<StereoFrame> = if in_channels == 1 {
                    data.iter().map(|&s| StereoFrame::mono(s)).collect()
                } else {
                    data.chunks_exact(in_channels)
                        .map(|c| StereoFrame {
                            left: c[0],
                            right: c[1],
                        })
                        .collect()
                };

                let _ = tx.try_send(frames);
            },
            err_fn,
            None,
        )
        .ok()?;

    if let Err(e) = stream.play() {
        log::warn!("could not start input stream: {e}");
        return None;
    }

    Some(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Feeds {
        bus: rtrb::Producer<StereoFrame>,
        closed: Sender<()>,
        input: Sender<Vec<StereoFrame>>,
        retired: Sender<SampleBuffer>,
    }

    fn captures() -> (Captures, Feeds) {
        let (bus, bus_rx) = rtrb::RingBuffer::new(16);
        let (closed, bus_closed_rx) = crossbeam_channel::bounded(4);
        let (input, input_rx) = crossbeam_channel::bounded(4);
        let (retired, retired_rx) = crossbeam_channel::bounded(4);
        let captures = Captures {
            bus_rx,
            bus_closed_rx,
            input_rx,
            retired_rx,
            mix: None,
            mic: None,
            ready: VecDeque::new(),
        };
        (captures, Feeds { bus, closed, input, retired })
    }

    #[test]
    fn mixdown_is_assembled_once_the_bus_closes() {
        let (mut caps, mut feeds) = captures();
        caps.mix = Some(Vec::new());
        for _ in 0..3 {
            feeds.bus.push(StereoFrame::mono(0.5)).unwrap();
        }
        caps.pump(100);
        assert!(caps.ready.is_empty());

        feeds.bus.push(StereoFrame::mono(0.5)).unwrap();
        feeds.closed.send(()).unwrap();
        caps.pump(100);
        match caps.ready.pop_front() {
            Some(EngineEvent::MixdownCaptured(mix)) => assert_eq!(mix.len(), 4),
            other => panic!("unexpected {other:?}"),
        }
        assert!(caps.mix.is_none());
    }

    #[test]
    fn mic_blocks_outside_a_take_are_dropped() {
        let (mut caps, feeds) = captures();
        feeds.input.send(vec![StereoFrame::mono(0.1); 3]).unwrap();
        caps.pump(100);
        caps.mic = Some(Vec::new());
        feeds.input.send(vec![StereoFrame::mono(0.2); 5]).unwrap();
        feeds.retired.send(SampleBuffer::from_frames(vec![], 100)).unwrap();
        caps.pump(100);
        assert_eq!(caps.mic.as_ref().map(Vec::len), Some(5));
        assert!(caps.retired_rx.is_empty());
    }
}
