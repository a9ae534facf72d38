#[cfg(test)]
use std::collections::VecDeque;

use crate::monitor::MonitorError;

/// Something that delivers frame timestamps (seconds) in order.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<f64>, MonitorError>;
}

/// Evenly spaced frames, used for headless rendering.
pub struct FixedRateFrames {
    interval: f64,
    next: u64,
    total: u64,
}

impl FixedRateFrames {
    pub fn new(fps: f64, seconds: f64) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 60.0 };
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        Self {
            interval: 1.0 / fps,
            next: 0,
            // One extra frame: the first only primes the clock.
            total: (fps * seconds).round() as u64 + 1,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.total - self.next
    }
}

impl FrameSource for FixedRateFrames {
    fn next_frame(&mut self) -> Result<Option<f64>, MonitorError> {
        if self.next >= self.total {
            return Ok(None);
        }
        let ts = self.next as f64 * self.interval;
        self.next += 1;
        Ok(Some(ts))
    }
}

/// Scripted timestamps for tests.
#[cfg(test)]
pub struct ManualFrames {
    queue: VecDeque<f64>,
}

#[cfg(test)]
impl ManualFrames {
    pub fn new(timestamps: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: timestamps.into_iter().collect(),
        }
    }
}

#[cfg(test)]
impl FrameSource for ManualFrames {
    fn next_frame(&mut self) -> Result<Option<f64>, MonitorError> {
        Ok(self.queue.pop_front())
    }
}
