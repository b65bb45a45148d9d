//! Time-based frame cursor
//!
//! The cursor only advances when a full frame interval (`1 / fps`) has
//! elapsed since the last advance, no matter how often it is ticked. Ticking
//! at 60Hz or at 5Hz yields the same frame at the same wall-clock time
//! (modulo tick granularity).

use std::time::Duration;

use tokio::time::Instant;

/// Result of a single tick
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing changed
    Hold,
    /// Moved to the given frame
    Advanced(usize),
    /// Wrapped back to frame 0
    Wrapped,
    /// Reached the end of a non-looping animation; reported once
    Ended(usize),
}

impl TickOutcome {
    /// Whether the visible frame changed
    #[must_use]
    pub fn frame_changed(self) -> bool {
        matches!(self, Self::Advanced(_) | Self::Wrapped)
    }
}

/// Frame index plus the timestamp of the last advance
#[derive(Clone, Debug)]
pub struct FrameCursor {
    index: usize,
    frame_count: usize,
    interval: Option<Duration>,
    looping: bool,
    last_advance: Option<Instant>,
    ended: bool,
}

impl FrameCursor {
    /// Cursor at frame 0
    #[must_use]
    pub fn new(frame_count: usize, fps: f32, looping: bool) -> Self {
        Self {
            index: 0,
            frame_count,
            interval: frame_interval(fps),
            looping,
            last_advance: None,
            ended: false,
        }
    }

    /// Current frame index
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Number of frames in the sequence
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Time between advances, `None` if the fps cannot animate
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Whether a non-looping sequence has reached its last frame
    #[must_use]
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Start over at frame 0 with a new sequence length
    pub fn reset(&mut self, frame_count: usize) {
        self.index = 0;
        self.frame_count = frame_count;
        self.last_advance = None;
        self.ended = false;
    }

    /// Change speed or loop mode without moving the cursor
    pub fn set_timing(&mut self, fps: f32, looping: bool) {
        self.interval = frame_interval(fps);
        if looping && !self.looping {
            self.ended = false;
        }
        self.looping = looping;
    }

    /// Forget the reference timestamp so the next tick re-seeds it
    ///
    /// Used after a pause so the paused time is not counted.
    pub fn rearm(&mut self) {
        self.last_advance = None;
    }

    /// Advance if a full interval elapsed since the last advance
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let Some(interval) = self.interval else {
            return TickOutcome::Hold;
        };
        if self.frame_count == 0 {
            return TickOutcome::Hold;
        }

        let Some(last) = self.last_advance else {
            self.last_advance = Some(now);
            return TickOutcome::Hold;
        };

        if now.saturating_duration_since(last) < interval {
            return TickOutcome::Hold;
        }
        self.last_advance = Some(now);

        let next = self.index + 1;
        if next < self.frame_count {
            self.index = next;
            return TickOutcome::Advanced(next);
        }

        if self.looping {
            self.index = 0;
            TickOutcome::Wrapped
        } else if self.ended {
            TickOutcome::Hold
        } else {
            self.ended = true;
            TickOutcome::Ended(self.index)
        }
    }

    /// Time left until the next advance
    #[must_use]
    pub fn time_to_next_frame(&self, now: Instant) -> Option<Duration> {
        let interval = self.interval?;
        if self.ended {
            return None;
        }
        Some(match self.last_advance {
            Some(last) => interval.saturating_sub(now.saturating_duration_since(last)),
            None => interval,
        })
    }
}

/// `1 / fps` as a duration; `None` for zero, negative, or non-finite rates
fn frame_interval(fps: f32) -> Option<Duration> {
    if fps > 0.0 && fps.is_finite() {
        Duration::try_from_secs_f64(1.0 / f64::from(fps)).ok()
    } else {
        None
    }
}
