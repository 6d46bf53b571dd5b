use std::path::PathBuf;

use thiserror::Error;

/// Failures of the sequencer core. None of them is fatal: each one degrades
/// a single feature and the session carries on.
#[derive(Error, Debug)]
pub enum SequencerError {
    /// A sample failed to read or decode; it stays absent from the bank
    #[error("failed to load sample {name}: {reason}")]
    LoadFailure { name: String, reason: String },

    /// No microphone, or the mic stream could not be started
    #[error("microphone unavailable: {0}")]
    DeviceAccessFailure(String),

    /// The engine could not open a mixdown bus
    #[error("mixdown bus unavailable: {0}")]
    MixBusUnavailable(String),

    /// Download requested before anything was mixed down
    #[error("No recorded audio available. Please record first.")]
    NoRecordingAvailable,

    /// Writing the mixdown blob to disk failed
    #[error("failed to export mix to {path}: {reason}")]
    Export { path: PathBuf, reason: String },
}

pub type SequencerResult<T> = Result<T, SequencerError>;
