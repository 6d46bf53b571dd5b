use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_VOICE_ID: AtomicU64 = AtomicU64::new(0);
static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(0);

// A decoded buffer registered with the engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u64);

// One source + gain pair living in the engine (a "voice")
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VoiceId(pub u64);

// A streamed, unscheduled player for a mic recording (like a media element)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementId(pub u64);

// atomic counters so the loader thread can mint ids too
pub fn next_buffer_id() -> BufferId {
    BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn next_voice_id() -> VoiceId {
    VoiceId(NEXT_VOICE_ID.fetch_add(1, Ordering::Relaxed))
}

pub fn next_element_id() -> ElementId {
    ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed))
}
