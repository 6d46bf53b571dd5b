use serde::{Deserialize, Serialize};

// Every sound a clip can reference: the bank instruments, plus the sentinel
// for clips that carry their own mic recording.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleId {
    Piano,
    Guitar,
    Drums,
    Bass,
    Violin,
    Silence,
    StrangeBeat,
    MicRecording,
}

impl SampleId {
    pub const INSTRUMENTS: [SampleId; 7] = [
        SampleId::Piano,
        SampleId::Guitar,
        SampleId::Drums,
        SampleId::Bass,
        SampleId::Violin,
        SampleId::Silence,
        SampleId::StrangeBeat,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SampleId::Piano => "piano",
            SampleId::Guitar => "guitar",
            SampleId::Drums => "drums",
            SampleId::Bass => "bass",
            SampleId::Violin => "violin",
            SampleId::Silence => "silence",
            SampleId::StrangeBeat => "strange-beat",
            SampleId::MicRecording => "mic-recording",
        }
    }

    // what a clip shows as its label
    pub fn label(self) -> &'static str {
        match self {
            SampleId::MicRecording => "Mic",
            other => other.key(),
        }
    }

    pub fn is_instrument(self) -> bool {
        self != SampleId::MicRecording
    }

    // number keys 1-7 pick an instrument
    pub fn from_slot(slot: u8) -> Option<SampleId> {
        Self::INSTRUMENTS.get(slot as usize).copied()
    }
}
