//! Clocks used to measure playback progress.
//!
//! `AudioClock` is the monotonic time source a transport reads (seconds,
//! arbitrary origin). `PlaybackClock` is the two-field playhead built on top
//! of it: an anchor while running, a frozen offset while stopped or paused.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub trait AudioClock: Send + Sync {
    /// Seconds since an arbitrary, fixed origin. Never decreases.
    fn now(&self) -> f64;
}

/// Monotonic wall clock.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioClock for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Clock advanced explicitly by its owner.
///
/// Useful for offline rendering and for driving the engine deterministically.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, seconds: f64) {
        self.bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now() + seconds);
    }
}

impl AudioClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Playhead position derived from an anchor and an accumulated offset.
///
/// Running: `position = now - anchor`. Frozen: `position = offset`.
/// Resuming re-anchors at `now - offset`, so time spent frozen never counts.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackClock {
    anchor: Option<f64>,
    offset: f64,
}

impl PlaybackClock {
    /// Start running from `offset` seconds.
    pub fn start(&mut self, now: f64, offset: f64) {
        self.offset = offset;
        self.anchor = Some(now - offset);
    }

    /// Stop the clock at its current position and return that position.
    pub fn freeze(&mut self, now: f64) -> f64 {
        if let Some(anchor) = self.anchor.take() {
            self.offset = (now - anchor).max(0.0);
        }
        self.offset
    }

    /// Continue running from the frozen position.
    pub fn resume(&mut self, now: f64) {
        if self.anchor.is_none() {
            self.anchor = Some(now - self.offset);
        }
    }

    /// Move a frozen clock to `offset` without starting it.
    pub fn cue(&mut self, offset: f64) {
        self.anchor = None;
        self.offset = offset;
    }

    pub fn reset(&mut self) {
        self.cue(0.0);
    }

    pub fn position(&self, now: f64) -> f64 {
        match self.anchor {
            Some(anchor) => (now - anchor).max(0.0),
            None => self.offset,
        }
    }

    /// The frozen offset (position at the last freeze or cue).
    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn is_running(&self) -> bool {
        self.anchor.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn running_position_tracks_clock() {
        let mut clock = PlaybackClock::default();
        clock.start(100.0, 0.0);
        assert!(approx(clock.position(102.5), 2.5));
    }

    #[test]
    fn start_with_offset_counts_from_offset() {
        let mut clock = PlaybackClock::default();
        clock.start(10.0, 4.0);
        assert!(approx(clock.position(10.0), 4.0));
        assert!(approx(clock.position(11.0), 5.0));
    }

    #[test]
    fn frozen_position_does_not_move() {
        let mut clock = PlaybackClock::default();
        clock.start(0.0, 0.0);
        assert!(approx(clock.freeze(3.0), 3.0));
        assert!(approx(clock.position(50.0), 3.0));
        assert!(!clock.is_running());
    }

    #[test]
    fn resume_after_long_pause_is_continuous() {
        let mut clock = PlaybackClock::default();
        clock.start(1_000.0, 0.0);
        clock.freeze(1_003.0);
        // Pause for an hour
        clock.resume(4_603.0);
        assert!(approx(clock.position(4_605.0), 5.0));
    }

    #[test]
    fn repeated_pause_resume_accumulates() {
        let mut clock = PlaybackClock::default();
        let mut now = 0.0;
        clock.start(now, 0.0);
        for _ in 0..5 {
            now += 1.0;
            clock.freeze(now);
            now += 7.0;
            clock.resume(now);
        }
        assert!(approx(clock.position(now), 5.0));
    }

    #[test]
    fn resume_on_running_clock_keeps_anchor() {
        let mut clock = PlaybackClock::default();
        clock.start(0.0, 0.0);
        clock.resume(5.0);
        assert!(approx(clock.position(6.0), 6.0));
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new();
        assert!(approx(clock.now(), 0.0));
        clock.advance(1.5);
        clock.advance(0.25);
        assert!(approx(clock.now(), 1.75));
    }
}
