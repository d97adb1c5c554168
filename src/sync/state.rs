//! The state published to observers, and the time → segment mapping.

/// Normalized playback state, identical for both transports.
///
/// At most one of `is_playing` / `is_paused` is set; both clear means idle.
/// `current_segment_index` is -1 when no segment is being spoken.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub current_time: f64,
    pub duration: f64,
    pub current_segment_index: i32,
}

impl TransportState {
    pub const fn idle() -> Self {
        Self {
            is_playing: false,
            is_paused: false,
            current_time: 0.0,
            duration: 0.0,
            current_segment_index: -1,
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_playing && !self.is_paused
    }

    /// "m:ss / m:ss" progress label.
    pub fn progress_label(&self) -> String {
        format!("{} / {}", format_time(self.current_time), format_time(self.duration))
    }
}

impl Default for TransportState {
    fn default() -> Self {
        Self::idle()
    }
}

/// Segment being spoken at `current_time` of `duration`, spreading `count`
/// segments evenly over the duration. -1 when there is nothing to highlight.
pub fn segment_index_for(current_time: f64, duration: f64, count: usize) -> i32 {
    if count == 0 || duration.is_nan() || duration <= 0.0 || !current_time.is_finite() {
        return -1;
    }
    let raw = (current_time.max(0.0) / duration * count as f64).floor();
    raw.min((count - 1) as f64) as i32
}

/// Format seconds as "m:ss".
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
