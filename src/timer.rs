//! Owned, cancellable interval timers.
//!
//! A `Timer` never schedules anything on its own: the owner polls it with the
//! current clock reading and learns how many periods have elapsed since the
//! last poll. Dropping the timer cancels it. Suspended time does not count.

use crate::clock::PlaybackClock;

#[derive(Debug, Clone, PartialEq)]
pub struct Timer {
    period: f64,
    limit: Option<usize>,
    fired: usize,
    elapsed: PlaybackClock,
}

impl Timer {
    /// Fires every `period` seconds until dropped.
    ///
    /// `None` when the period is not a positive, finite number of seconds.
    pub fn repeating(period: f64, now: f64) -> Option<Self> {
        Self::build(period, None, now)
    }

    /// Fires `count` times, `period` seconds apart, then goes quiet.
    pub fn counted(period: f64, count: usize, now: f64) -> Option<Self> {
        if count == 0 {
            return None;
        }
        Self::build(period, Some(count), now)
    }

    fn build(period: f64, limit: Option<usize>, now: f64) -> Option<Self> {
        if !period.is_finite() || period <= 0.0 {
            return None;
        }
        let mut elapsed = PlaybackClock::default();
        elapsed.start(now, 0.0);
        Some(Self {
            period,
            limit,
            fired: 0,
            elapsed,
        })
    }

    /// Number of firings due since the previous poll.
    pub fn poll(&mut self, now: f64) -> usize {
        let mut due = (self.elapsed.position(now) / self.period).floor() as usize;
        if let Some(limit) = self.limit {
            due = due.min(limit);
        }
        let new = due.saturating_sub(self.fired);
        self.fired = self.fired.max(due);
        new
    }

    /// Total firings so far.
    pub fn fired(&self) -> usize {
        self.fired
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn is_exhausted(&self) -> bool {
        self.limit.is_some_and(|limit| self.fired >= limit)
    }

    pub fn suspend(&mut self, now: f64) {
        self.elapsed.freeze(now);
    }

    pub fn resume(&mut self, now: f64) {
        self.elapsed.resume(now);
    }

    pub fn is_suspended(&self) -> bool {
        !self.elapsed.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_periods_yield_no_timer() {
        assert!(Timer::repeating(0.0, 0.0).is_none());
        assert!(Timer::repeating(-1.0, 0.0).is_none());
        assert!(Timer::repeating(f64::NAN, 0.0).is_none());
        assert!(Timer::counted(0.5, 0, 0.0).is_none());
    }

    #[test]
    fn repeating_timer_reports_missed_periods() {
        let mut timer = Timer::repeating(0.1, 10.0).unwrap();
        assert_eq!(timer.poll(10.05), 0);
        assert_eq!(timer.poll(10.15), 1);
        assert_eq!(timer.poll(10.55), 4);
        assert_eq!(timer.fired(), 5);
        assert!(!timer.is_exhausted());
    }

    #[test]
    fn counted_timer_stops_at_its_limit() {
        let mut timer = Timer::counted(1.0, 3, 0.0).unwrap();
        assert_eq!(timer.poll(1.5), 1);
        assert_eq!(timer.poll(60.0), 2);
        assert_eq!(timer.poll(120.0), 0);
        assert_eq!(timer.fired(), 3);
        assert!(timer.is_exhausted());
    }

    #[test]
    fn suspended_time_is_not_counted() {
        let mut timer = Timer::counted(1.0, 10, 0.0).unwrap();
        assert_eq!(timer.poll(1.5), 1);
        timer.suspend(1.5);
        assert!(timer.is_suspended());
        assert_eq!(timer.poll(100.0), 0);
        timer.resume(100.0);
        assert_eq!(timer.poll(100.4), 0);
        assert_eq!(timer.poll(100.6), 1);
    }
}
