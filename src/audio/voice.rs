use super::frame::StereoFrame;
use super::ids::{BufferId, VoiceId};
use super::sample_buffer::SampleBuffer;

// Where a voice's output ends up
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Output,  // the speakers
    Mixdown, // only the mixdown capture bus
}

// A buffer source bound to a gain: starts at an absolute frame on the engine
// clock, plays once or loops, and can be stopped before it ever started.
#[derive(Clone, Debug)]
pub struct Voice {
    pub id: VoiceId,
    pub buffer: BufferId,
    pub start_frame: u64,
    pub gain: f32,
    pub looping: bool,
    pub route: Route,
    pub active: bool,
    pos: usize,
}

impl Voice {
    pub fn new(
        id: VoiceId,
        buffer: BufferId,
        start_frame: u64,
        gain: f32,
        looping: bool,
        route: Route,
    ) -> Self {
        Self {
            id,
            buffer,
            start_frame,
            gain,
            looping,
            route,
            active: true,
            pos: 0,
        }
    }

    // `out[0]` is absolute frame `block_start` on the engine clock
    pub fn render_into(&mut self, buffer: &SampleBuffer, block_start: u64, out: &mut [StereoFrame]) {
        if !self.active {
            return;
        }
        if buffer.is_empty() {
            self.active = false;
            return;
        }

        let skip = self.start_frame.saturating_sub(block_start);
        if skip >= out.len() as u64 {
            return; // scheduled for a later block
        }

        let data = &buffer.data;
        for frame in out[skip as usize..].iter_mut() {
            if self.pos >= data.len() {
                if self.looping {
                    self.pos = 0;
                } else {
                    self.active = false;
                    break;
                }
            }
            frame.mix_in(data[self.pos], self.gain);
            self.pos += 1;
        }

        if !self.looping && self.pos >= data.len() {
            self.active = false;
        }
    }
}
