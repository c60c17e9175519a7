//! Download progress tracking with sliding-window throughput

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use parking_lot::Mutex;

use crate::events::{DownloadProgress, EventBus, InstallPhase, LauncherEvent};

/// Span of byte samples the speed is averaged over
const SPEED_WINDOW: Duration = Duration::from_secs(3);

/// Minimum gap between byte-level progress events
const EMIT_INTERVAL: Duration = Duration::from_millis(100);

/// Shared by every download task of one install
pub struct ProgressTracker {
    events: EventBus,
    total: AtomicUsize,
    downloaded: AtomicUsize,
    bytes: AtomicU64,
    phase: Mutex<InstallPhase>,
    current_file: Mutex<Option<String>>,
    samples: Mutex<VecDeque<(Instant, u64)>>,
    last_emit: Mutex<Option<Instant>>,
}

impl ProgressTracker {
    pub fn new(events: EventBus) -> Self {
        Self {
            events,
            total: AtomicUsize::new(0),
            downloaded: AtomicUsize::new(0),
            bytes: AtomicU64::new(0),
            phase: Mutex::new(InstallPhase::Preparing),
            current_file: Mutex::new(None),
            samples: Mutex::new(VecDeque::new()),
            last_emit: Mutex::new(None),
        }
    }

    /// Enter a phase and announce it
    pub fn set_phase(&self, phase: InstallPhase, total: usize) {
        *self.phase.lock() = phase;
        self.total.store(total, Ordering::SeqCst);
        tracing::info!("Install phase: {:?} ({} files)", phase, total);
        self.emit();
    }

    /// A file started transferring
    pub fn start_file(&self, label: &str) {
        *self.current_file.lock() = Some(label.to_string());
        self.emit();
    }

    /// Bytes arrived for the file in flight
    pub fn add_bytes(&self, n: u64) {
        self.add_bytes_at(n, Instant::now());
    }

    fn add_bytes_at(&self, n: u64, now: Instant) {
        let total = self.bytes.fetch_add(n, Ordering::SeqCst) + n;
        {
            let mut samples = self.samples.lock();
            samples.push_back((now, total));
            while samples.len() > 1 && samples.front().is_some_and(|(t, _)| now.duration_since(*t) > SPEED_WINDOW) {
                samples.pop_front();
            }
        }

        let due = {
            let mut last = self.last_emit.lock();
            let due = last.map_or(true, |t| now.duration_since(t) >= EMIT_INTERVAL);
            if due {
                *last = Some(now);
            }
            due
        };
        if due {
            self.emit();
        }
    }

    /// A file finished (or was already present)
    pub fn finish_file(&self) {
        self.downloaded.fetch_add(1, Ordering::SeqCst);
        self.emit();
    }

    /// Throughput over the recent window, in bytes per second
    pub fn speed_bps(&self) -> u64 {
        self.speed_bps_at(Instant::now())
    }

    fn speed_bps_at(&self, now: Instant) -> u64 {
        let samples = self.samples.lock();
        let (Some(&(first_at, first_bytes)), Some(&(last_at, last_bytes))) = (samples.front(), samples.back()) else {
            return 0;
        };
        if now.duration_since(last_at) > SPEED_WINDOW {
            return 0;
        }
        let elapsed = now.duration_since(first_at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0;
        }
        ((last_bytes - first_bytes) as f64 / elapsed) as u64
    }

    /// Current snapshot
    pub fn snapshot(&self) -> DownloadProgress {
        DownloadProgress {
            phase: *self.phase.lock(),
            downloaded: self.downloaded.load(Ordering::SeqCst),
            total: self.total.load(Ordering::SeqCst),
            bytes_downloaded: self.bytes.load(Ordering::SeqCst),
            speed_bps: self.speed_bps(),
            current_file: self.current_file.lock().clone(),
        }
    }

    pub fn bytes_downloaded(&self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }

    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Push the current snapshot to subscribers
    pub fn emit(&self) {
        self.events.emit(LauncherEvent::ModpackDownloadProgress(self.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_bytes_accumulate() {
        let tracker = ProgressTracker::new(EventBus::new());
        tracker.set_phase(InstallPhase::Downloading, 2);
        tracker.start_file("a.jar");
        tracker.add_bytes(100);
        tracker.finish_file();

        let snap = tracker.snapshot();
        assert_eq!(snap.phase, InstallPhase::Downloading);
        assert_eq!(snap.downloaded, 1);
        assert_eq!(snap.total, 2);
        assert_eq!(snap.bytes_downloaded, 100);
        assert_eq!(snap.current_file.as_deref(), Some("a.jar"));
    }

    #[test]
    fn test_speed_uses_recent_window_only() {
        let tracker = ProgressTracker::new(EventBus::new());
        let start = Instant::now();

        // A burst long ago must not inflate the current speed
        tracker.add_bytes_at(1_000_000, start);
        tracker.add_bytes_at(1_000, start + Duration::from_secs(10));
        tracker.add_bytes_at(1_000, start + Duration::from_secs(11));
        tracker.add_bytes_at(1_000, start + Duration::from_secs(12));

        let speed = tracker.speed_bps_at(start + Duration::from_secs(12));
        assert!(speed < 10_000, "speed {} should ignore the old burst", speed);
        assert!(speed > 0);
    }

    #[test]
    fn test_no_samples_means_zero_speed() {
        let tracker = ProgressTracker::new(EventBus::new());
        assert_eq!(tracker.speed_bps(), 0);
    }

    #[tokio::test]
    async fn test_progress_events_reach_subscribers() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let tracker = ProgressTracker::new(bus);
        tracker.set_phase(InstallPhase::Preparing, 3);

        match rx.recv().await.unwrap() {
            LauncherEvent::ModpackDownloadProgress(p) => assert_eq!(p.total, 3),
            other => panic!("unexpected event {}", other.name()),
        }
    }
}
