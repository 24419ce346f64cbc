//! Thread CPU time accounting.
//!
//! An async request may hop between worker threads, so CPU time is metered per
//! poll: the meter is resumed before the handler future is polled and suspended
//! right after, accumulating only the time spent on the current thread.

use std::time::Duration;

/// Read the calling thread's CPU clock, if the platform exposes one.
#[cfg(unix)]
pub fn thread_cpu_time() -> Option<Duration> {
    use rustix::time::{clock_gettime, ClockId};

    let ts = clock_gettime(ClockId::ThreadCPUTime);
    let secs = u64::try_from(ts.tv_sec).ok()?;
    let nanos = u32::try_from(ts.tv_nsec).ok()?;
    Some(Duration::new(secs, nanos))
}

#[cfg(not(unix))]
pub fn thread_cpu_time() -> Option<Duration> {
    None
}

/// Accumulates CPU time across resume/suspend windows.
#[derive(Debug, Default)]
pub struct CpuMeter {
    consumed: Duration,
    mark: Option<Duration>,
}

impl CpuMeter {
    /// Create a meter that is already running from `reading`.
    pub fn running_from(reading: Option<Duration>) -> Self {
        Self {
            consumed: Duration::ZERO,
            mark: reading,
        }
    }

    /// Start a measuring window on the current thread.
    pub fn resume(&mut self) {
        self.mark = thread_cpu_time();
    }

    /// Close the current window, if any, and add it to the total.
    pub fn suspend(&mut self) {
        if let (Some(mark), Some(now)) = (self.mark.take(), thread_cpu_time()) {
            self.consumed += now.saturating_sub(mark);
        }
    }

    pub fn is_running(&self) -> bool {
        self.mark.is_some()
    }

    /// Total CPU time of all closed windows.
    pub fn consumed(&self) -> Duration {
        self.consumed
    }
}
