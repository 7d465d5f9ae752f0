// # Adaptive Frame Pacing
//
// Self-correcting delay computation for a fetch loop.
//
// The pacer keeps the wall-clock durations of the last N fetches. After each
// fetch the next delay is `max(0, period - average)`, so the effective frame
// period approaches `period` instead of `fetch time + fixed delay`. When
// fetches take longer than the period the delay floors at zero and the loop
// runs back-to-back.

use std::collections::VecDeque;
use std::time::Duration;

/// Sliding-window pacer for a target frame rate.
#[derive(Debug, Clone)]
pub struct FramePacer {
    period: Duration,
    window: VecDeque<Duration>,
    capacity: usize,
}

impl FramePacer {
    /// `target_fps` of zero is treated as one frame per second.
    pub fn new(target_fps: u32, capacity: usize) -> Self {
        Self {
            period: Duration::from_nanos(1_000_000_000 / target_fps.max(1) as u64),
            window: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Record a fetch duration and return the delay before the next fetch.
    pub fn record(&mut self, fetch: Duration) -> Duration {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(fetch);
        self.period.saturating_sub(self.average())
    }

    pub fn average(&self) -> Duration {
        if self.window.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.window.iter().sum();
        total / self.window.len() as u32
    }
}
