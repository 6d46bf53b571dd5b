use std::io::{Cursor, Read};
use std::path::Path;

use super::frame::StereoFrame;

#[derive(Clone, Debug)]
pub struct SampleBuffer {
    pub data: Vec<StereoFrame>, // the audio data array
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn from_frames(data: Vec<StereoFrame>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    // Load a WAV file from disk, resampled to the engine rate
    pub fn load_wav(path: &Path, target_rate: u32) -> anyhow::Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::decode_wav(std::io::BufReader::new(file), target_rate)
    }

    // Decode WAV bytes from any reader (a file, or an in-memory blob)
    pub fn decode_wav<R: Read>(source: R, target_rate: u32) -> anyhow::Result<Self> {
        let mut reader = hound::WavReader::new(source)?;
        let spec = reader.spec();
        let file_rate = spec.sample_rate;
        let file_channels = spec.channels.max(1) as usize;

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()?,
            hound::SampleFormat::Int => {
                let max = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|x| x as f32 / max))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        let mut frames: Vec<StereoFrame> = if file_channels == 1 {
            samples.into_iter().map(StereoFrame::mono).collect()
        } else {
            // anything past the first two channels is dropped
            samples
                .chunks_exact(file_channels)
                .map(|c| StereoFrame {
                    left: c[0],
                    right: c[1],
                })
                .collect()
        };

        if file_rate != target_rate {
            frames = resample_linear(&frames, file_rate, target_rate);
        }

        Ok(Self {
            data: frames,
            sample_rate: target_rate,
        })
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }

    // 16-bit stereo WAV, the only container we ever write
    pub fn write_wav(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = hound::WavWriter::create(path, self.wav_spec())?;
        self.write_frames(&mut writer)?;
        writer.finalize()?;
        Ok(())
    }

    // Same as write_wav, but into memory; this is the mixdown "blob"
    pub fn encode_wav(&self) -> anyhow::Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, self.wav_spec())?;
            self.write_frames(&mut writer)?;
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    fn wav_spec(&self) -> hound::WavSpec {
        hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        }
    }

    fn write_frames<W>(&self, writer: &mut hound::WavWriter<W>) -> anyhow::Result<()>
    where
        W: std::io::Write + std::io::Seek,
    {
        let scale = i16::MAX as f32;
        for f in &self.data {
            writer.write_sample((f.left.clamp(-1.0, 1.0) * scale) as i16)?;
            writer.write_sample((f.right.clamp(-1.0, 1.0) * scale) as i16)?;
        }
        Ok(())
    }
}

fn resample_linear(frames: &[StereoFrame], source_rate: u32, target_rate: u32) -> Vec<StereoFrame> {
    if source_rate == target_rate || source_rate == 0 {
        return frames.to_vec();
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let out_len = (frames.len() as f64 * ratio).ceil() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let src_pos = i as f64 / ratio; // ex. 3.7
        let idx = src_pos.floor() as usize; // ex. 3
        let frac = (src_pos - idx as f64) as f32; // ex. 0.7
        if idx >= frames.len().saturating_sub(1) {
            out.push(*frames.last().unwrap_or(&StereoFrame::zero()));
        } else {
            let a = frames[idx];
            let b = frames[idx + 1];
            out.push(StereoFrame {
                left: a.left * (1.0 - frac) + b.left * frac,
                right: a.right * (1.0 - frac) + b.right * frac,
            });
        }
    }
    out
}
