//! Pixel <-> time mapping for the track area.
//!
//! The track area begins with a fixed gutter for the track controls; its right
//! edge is where time 0 sits and where the playhead rests. Everything to the
//! right of it spans the whole timeline duration.

/// Left edge of time 0, and the playhead's resting baseline
pub const TRACK_ORIGIN_PX: f64 = 120.0;

/// Extra time past the longest sample so the timeline doesn't end too soon
pub const LOOKAHEAD_SECS: f64 = 10.0;

/// Total timeline duration for the longest known sample
pub fn timeline_duration(max_sample_secs: f64, lookahead_secs: f64) -> f64 {
    max_sample_secs.max(0.0) + lookahead_secs
}

/// Seconds from the timeline start to a pixel offset within the track area
pub fn time_to_pixel(t: f64, total_duration: f64, track_area_width: f64) -> f64 {
    let span = track_area_width - TRACK_ORIGIN_PX;
    if span <= 0.0 || total_duration <= 0.0 {
        return TRACK_ORIGIN_PX;
    }
    TRACK_ORIGIN_PX + t / total_duration * span
}

/// Inverse of [`time_to_pixel`]; pixels left of the origin give negative times
pub fn pixel_to_time(x: f64, total_duration: f64, track_area_width: f64) -> f64 {
    let span = track_area_width - TRACK_ORIGIN_PX;
    if span <= 0.0 || total_duration <= 0.0 {
        return 0.0;
    }
    (x - TRACK_ORIGIN_PX) / span * total_duration
}

/// The two inputs of the mapping, captured together
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timeline {
    pub duration: f64,
    pub width: f64,
}

impl Timeline {
    pub fn new(duration: f64, width: f64) -> Self {
        Self { duration, width }
    }

    pub fn time_to_pixel(&self, t: f64) -> f64 {
        time_to_pixel(t, self.duration, self.width)
    }

    pub fn pixel_to_time(&self, x: f64) -> f64 {
        pixel_to_time(x, self.duration, self.width)
    }
}
