use super::frame::StereoFrame;
use super::ids::VoiceId;
use super::sample_buffer::SampleBuffer;

// A mic recording played the way a media element is: it can't be scheduled,
// only told to play/pause right now. Its sound reaches the speakers only
// through a connected gain (a voice id), and optionally the mixdown bus.
#[derive(Clone, Debug)]
pub struct ElementPlayer {
    buffer: SampleBuffer,
    pos: usize,
    pub playing: bool,
    pub looping: bool,
    pub output: Option<(VoiceId, f32)>,
    pub tapped: bool,
}

impl ElementPlayer {
    pub fn new(buffer: SampleBuffer) -> Self {
        Self {
            buffer,
            pos: 0,
            playing: false,
            looping: false,
            output: None,
            tapped: false,
        }
    }

    pub fn into_buffer(self) -> SampleBuffer {
        self.buffer
    }

    // rewind and start
    pub fn play(&mut self, looping: bool) {
        self.pos = 0;
        self.looping = looping;
        self.playing = !self.buffer.is_empty();
    }

    // pause and rewind
    pub fn pause(&mut self) {
        self.playing = false;
        self.pos = 0;
    }

    pub fn render_into(&mut self, out: &mut [StereoFrame], mut bus: Option<&mut [StereoFrame]>) {
        if !self.playing {
            return;
        }
        let data = &self.buffer.data;
        for i in 0..out.len() {
            if self.pos >= data.len() {
                if self.looping {
                    self.pos = 0;
                } else {
                    self.playing = false;
                    self.pos = 0;
                    break;
                }
            }
            let sample = data[self.pos];
            if let Some((_, gain)) = self.output {
                out[i].mix_in(sample, gain);
            }
            if self.tapped {
                if let Some(bus) = bus.as_deref_mut() {
                    bus[i].mix_in(sample, 1.0);
                }
            }
            self.pos += 1;
        }
    }
}
