// Moves the playhead while a session runs. It's a cooperative task: the UI
// loop calls `poll` every frame and the driver decides whether a tick is due.
use std::cell::Cell;
use std::rc::Rc;

use super::session::PlaybackSession;
use super::timeline::{TRACK_ORIGIN_PX, Timeline};

// Shared between a session and its poll task. Once cancelled, the task that
// holds it never publishes again.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PlayheadEvent {
    Moved(f64),
    // playback ran past the last clip; the playhead is pinned here
    Finished(f64),
}

#[derive(Debug)]
struct PollTask {
    token: CancelToken,
    next_due: f64,
}

#[derive(Debug)]
pub struct PlayheadDriver {
    interval: f64, // seconds between ticks
    task: Option<PollTask>,
    position_px: f64,
    resting_px: f64,
}

impl PlayheadDriver {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval: interval_ms.max(1) as f64 / 1000.0,
            task: None,
            position_px: TRACK_ORIGIN_PX,
            resting_px: TRACK_ORIGIN_PX,
        }
    }

    pub fn start(&mut self, token: CancelToken, now: f64) {
        if let Some(old) = self.task.take() {
            old.token.cancel();
        }
        self.task = Some(PollTask {
            token,
            next_due: now + self.interval,
        });
        self.position_px = TRACK_ORIGIN_PX;
    }

    #[cfg(test)]
    fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|t| !t.token.is_cancelled())
    }

    pub fn poll(
        &mut self,
        now: f64,
        session: &PlaybackSession,
        timeline: &Timeline,
    ) -> Option<PlayheadEvent> {
        let task = self.task.as_mut()?;
        if task.token.is_cancelled() {
            self.task = None;
            return None;
        }
        if now < task.next_due {
            return None;
        }
        task.next_due = now + self.interval;

        let elapsed = now - session.started_at();
        if !session.has_loop() && elapsed >= session.max_end_time() {
            let end = timeline.time_to_pixel(session.max_end_time());
            self.task = None;
            self.position_px = end;
            self.resting_px = end;
            return Some(PlayheadEvent::Finished(end));
        }

        // with a looping track this keeps going past the right edge
        self.position_px = timeline.time_to_pixel(elapsed);
        Some(PlayheadEvent::Moved(self.position_px))
    }

    // Explicit stop: back to the baseline
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.token.cancel();
        }
        self.position_px = TRACK_ORIGIN_PX;
        self.resting_px = TRACK_ORIGIN_PX;
    }

    pub fn position_px(&self) -> f64 {
        self.position_px
    }

    // Where new mic takes land
    pub fn resting_px(&self) -> f64 {
        self.resting_px
    }
}
