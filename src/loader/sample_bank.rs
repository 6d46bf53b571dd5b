use std::collections::HashMap;

use crate::audio::BufferId;
use crate::pipeline::instrument::SampleId;
use crate::pipeline::timeline;

// A sample that made it through decoding. The frames themselves live in the
// engine under `buffer`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodedSample {
    pub buffer: BufferId,
    pub duration: f64,
}

// Instrument sounds, filled once during startup and only read afterwards.
// An id that failed to load is simply absent.
#[derive(Debug, Default)]
pub struct SampleBank {
    samples: HashMap<SampleId, DecodedSample>,
}

impl SampleBank {
    pub fn new() -> Self {
        Self::default()
    }

    // First load wins; the mic sentinel never lives in the bank
    pub fn insert(&mut self, id: SampleId, sample: DecodedSample) -> bool {
        if !id.is_instrument() || self.samples.contains_key(&id) {
            return false;
        }
        self.samples.insert(id, sample);
        true
    }

    pub fn get(&self, id: SampleId) -> Option<&DecodedSample> {
        self.samples.get(&id)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn max_duration(&self) -> f64 {
        self.samples
            .values()
            .map(|s| s.duration)
            .fold(0.0, f64::max)
    }

    pub fn timeline_duration(&self, lookahead_secs: f64) -> f64 {
        timeline::timeline_duration(self.max_duration(), lookahead_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoded(secs: f64) -> DecodedSample {
        DecodedSample {
            buffer: BufferId(0),
            duration: secs,
        }
    }

    #[test]
    fn duration_follows_longest_sample() {
        let mut bank = SampleBank::new();
        assert_eq!(bank.timeline_duration(10.0), 10.0);
        bank.insert(SampleId::Piano, decoded(4.0));
        bank.insert(SampleId::StrangeBeat, decoded(300.0));
        assert_eq!(bank.timeline_duration(10.0), 310.0);
    }

    #[test]
    fn loaded_once_and_never_replaced() {
        let mut bank = SampleBank::new();
        assert!(bank.insert(SampleId::Bass, decoded(2.0)));
        assert!(!bank.insert(SampleId::Bass, decoded(9.0)));
        assert_eq!(bank.get(SampleId::Bass).unwrap().duration, 2.0);
    }

    #[test]
    fn mic_sentinel_is_rejected() {
        let mut bank = SampleBank::new();
        assert!(!bank.insert(SampleId::MicRecording, decoded(1.0)));
        assert_eq!(bank.len(), 0);
        assert!(bank.get(SampleId::MicRecording).is_none());
    }
}
