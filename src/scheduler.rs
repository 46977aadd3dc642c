//! Frame and timer scheduling.
//!
//! The visualizer runs one frame at a time from a [`FrameScheduler`]; the
//! handle of the pending frame is the only way to stop it. Interval and
//! one-shot timers live in [`Timers`] so every started interval has a
//! matching `clear` and leaks show up in [`Timers::active_intervals`].

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Handle of a requested animation frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(u64);

/// Source of "next animation frame" callbacks.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    /// Returns `false` for stale or unknown handles.
    fn cancel_frame(&mut self, handle: FrameHandle) -> bool;
}

/// Frame scheduler driven by the terminal loop.
///
/// Every pending request becomes due on the next [`FrameLoop::take_due`].
#[derive(Debug, Default)]
pub struct FrameLoop {
    next_id: u64,
    pending: Vec<FrameHandle>,
}

impl FrameLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the frames due now.
    pub fn take_due(&mut self) -> Vec<FrameHandle> {
        std::mem::take(&mut self.pending)
    }

    /// Requested frames that have neither run nor been cancelled.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for FrameLoop {
    fn request_frame(&mut self) -> FrameHandle {
        self.next_id += 1;
        let handle = FrameHandle(self.next_id);
        self.pending.push(handle);
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|&h| h != handle);
        before != self.pending.len()
    }
}

/// Identifier of an interval or timeout in [`Timers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Timer {
    due: Instant,
    period: Option<Duration>,
}

/// Interval and timeout registry polled by the main loop.
#[derive(Debug, Default)]
pub struct Timers {
    next_id: u64,
    timers: BTreeMap<TimerId, Timer>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire every `period` starting one period after `now`.
    pub fn start_interval(&mut self, period: Duration, now: Instant) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.insert(Timer { due: now + period, period: Some(period) })
    }

    /// Fire once after `delay`.
    pub fn start_timeout(&mut self, delay: Duration, now: Instant) -> TimerId {
        self.insert(Timer { due: now + delay, period: None })
    }

    fn insert(&mut self, timer: Timer) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(id, timer);
        id
    }

    /// Cancel a timer. Returns `false` if it already fired or was cleared.
    pub fn clear(&mut self, id: TimerId) -> bool {
        self.timers.remove(&id).is_some()
    }

    pub fn is_active(&self, id: TimerId) -> bool {
        self.timers.contains_key(&id)
    }

    pub fn active_intervals(&self) -> usize {
        self.timers.values().filter(|t| t.period.is_some()).count()
    }

    pub fn active_timeouts(&self) -> usize {
        self.timers.values().filter(|t| t.period.is_none()).count()
    }

    /// Collect every firing up to `now`, in due order.
    ///
    /// Intervals that fell behind fire once per missed period.
    pub fn poll(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired: Vec<(Instant, TimerId)> = Vec::new();
        let mut finished = Vec::new();

        for (&id, timer) in self.timers.iter_mut() {
            while timer.due <= now {
                fired.push((timer.due, id));
                match timer.period {
                    Some(period) => timer.due += period,
                    None => {
                        finished.push(id);
                        break;
                    }
                }
            }
        }
        for id in finished {
            self.timers.remove(&id);
        }

        fired.sort();
        fired.into_iter().map(|(_, id)| id).collect()
    }
}
