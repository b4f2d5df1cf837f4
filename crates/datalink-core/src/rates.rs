//! Byte accounting for the down-link and up-link.
//!
//! "Down" is data the server sends to clients, "up" is data clients send
//! to the server. Each direction keeps a lifetime total in an atomic and a
//! rolling window of time buckets, so reported rates follow current
//! throughput instead of a since-start average.
//!
//! Recording is safe from any number of I/O tasks; rate queries take the
//! same short lock and can run from the simulation thread.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Default length of the trailing rate window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Default bucket width inside the window.
pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    slot: u64,
    bytes: u64,
}

/// One direction's counters.
#[derive(Debug, Default)]
struct Channel {
    total: AtomicU64,
    buckets: Mutex<VecDeque<Bucket>>,
}

impl Channel {
    fn record(&self, slot: u64, slots: u64, bytes: u64) {
        // The closure never returns None, so the update cannot fail.
        let _ = self
            .total
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
                Some(t.saturating_add(bytes))
            });

        let mut buckets = self.lock();
        match buckets.back_mut() {
            // A racing recorder may hold an older slot; fold it into the newest bucket.
            Some(last) if last.slot >= slot => last.bytes = last.bytes.saturating_add(bytes),
            _ => buckets.push_back(Bucket { slot, bytes }),
        }
        prune(&mut buckets, slot, slots);
    }

    fn windowed(&self, slot: u64, slots: u64) -> u64 {
        let mut buckets = self.lock();
        prune(&mut buckets, slot, slots);
        buckets
            .iter()
            .fold(0_u64, |sum, b| sum.saturating_add(b.bytes))
    }

    fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Bucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Drop buckets older than the window ending at `slot`.
fn prune(buckets: &mut VecDeque<Bucket>, slot: u64, slots: u64) {
    let oldest = slot.saturating_sub(slots.saturating_sub(1));
    while buckets.front().is_some_and(|b| b.slot < oldest) {
        buckets.pop_front();
    }
}

/// Monotonic byte counters with a trailing-window rate.
#[derive(Debug)]
pub struct RateTracker {
    origin: Instant,
    window: Duration,
    resolution_ms: u64,
    slots: u64,
    down: Channel,
    up: Channel,
}

impl RateTracker {
    /// Tracker with the default 5 s window in 100 ms buckets.
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW, DEFAULT_RESOLUTION)
    }

    /// Tracker with a custom window and bucket width.
    ///
    /// The bucket width is at least 1 ms and the window at least one bucket.
    pub fn with_window(window: Duration, resolution: Duration) -> Self {
        let resolution_ms = u64::try_from(resolution.as_millis())
            .unwrap_or(u64::MAX)
            .max(1);
        let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        let slots = window_ms.checked_div(resolution_ms).unwrap_or(1).max(1);
        Self {
            origin: Instant::now(),
            window: Duration::from_millis(slots.saturating_mul(resolution_ms)),
            resolution_ms,
            slots,
            down: Channel::default(),
            up: Channel::default(),
        }
    }

    /// Record bytes sent to a client.
    pub fn record_down(&self, bytes: u64) {
        self.down.record(self.slot(Instant::now()), self.slots, bytes);
    }

    /// Record bytes received from a client.
    pub fn record_up(&self, bytes: u64) {
        self.up.record(self.slot(Instant::now()), self.slots, bytes);
    }

    /// Down-link bytes per second over the trailing window.
    pub fn down_rate(&self) -> f64 {
        self.rate_at(&self.down, Instant::now())
    }

    /// Up-link bytes per second over the trailing window.
    pub fn up_rate(&self) -> f64 {
        self.rate_at(&self.up, Instant::now())
    }

    /// Total bytes ever sent.
    pub fn total_down(&self) -> u64 {
        self.down.total()
    }

    /// Total bytes ever received.
    pub fn total_up(&self) -> u64 {
        self.up.total()
    }

    /// The effective window length.
    pub const fn window(&self) -> Duration {
        self.window
    }

    fn slot(&self, now: Instant) -> u64 {
        let elapsed_ms =
            u64::try_from(now.saturating_duration_since(self.origin).as_millis()).unwrap_or(u64::MAX);
        elapsed_ms.checked_div(self.resolution_ms).unwrap_or(0)
    }

    #[allow(clippy::cast_precision_loss)]
    fn rate_at(&self, channel: &Channel, now: Instant) -> f64 {
        let bytes = channel.windowed(self.slot(now), self.slots);
        bytes as f64 / self.window.as_secs_f64()
    }
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new()
    }
}
