//! Time-windowed cache of the last audio snapshot.

use std::time::{Duration, Instant};

use controldeck_core::CommandRunner;
use tracing::trace;

use super::{AudioSnapshot, VolumeControl};

const REFRESH_WINDOW: Duration = Duration::from_secs(1);

/// Time source for the cache window.
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Holds the last audio snapshot and refreshes it at most once per window,
/// so rendering many volume widgets costs one pactl round per second.
pub struct AudioStateCache<C: Clock = SystemClock> {
    clock: C,
    window: Duration,
    snapshot: AudioSnapshot,
    refreshed_at: Option<Instant>,
}

impl<C: Clock> AudioStateCache<C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            window: REFRESH_WINDOW,
            snapshot: AudioSnapshot::default(),
            refreshed_at: None,
        }
    }

    pub fn snapshot(
        &mut self,
        backend: &dyn VolumeControl,
        runner: &dyn CommandRunner,
    ) -> &AudioSnapshot {
        let now = self.clock.now();
        let fresh = self
            .refreshed_at
            .map(|at| now.saturating_duration_since(at) <= self.window)
            .unwrap_or(false);
        if !fresh {
            trace!(backend = backend.name(), "refreshing audio snapshot");
            self.snapshot = backend.snapshot(runner);
            self.refreshed_at = Some(now);
        }
        &self.snapshot
    }

    /// Force the next read to query the audio server.
    pub fn invalidate(&mut self) {
        self.refreshed_at = None;
    }
}

impl Default for AudioStateCache<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::audio::PactlJson;
    use crate::testing::RecordingRunner;

    #[derive(Clone)]
    struct ManualClock {
        start: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                start: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().expect("clock lock") += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + *self.offset.lock().expect("clock lock")
        }
    }

    // One snapshot issues three list probes.
    const PROBES_PER_SNAPSHOT: usize = 3;

    #[test]
    fn reads_within_the_window_share_one_query() {
        let clock = ManualClock::new();
        let mut cache = AudioStateCache::new(clock.clone());
        let runner = RecordingRunner::default();
        cache.snapshot(&PactlJson, &runner);
        clock.advance(Duration::from_millis(250));
        cache.snapshot(&PactlJson, &runner);
        clock.advance(Duration::from_millis(250));
        cache.snapshot(&PactlJson, &runner);
        assert_eq!(runner.probes().len(), PROBES_PER_SNAPSHOT);
    }

    #[test]
    fn reads_after_the_window_refresh() {
        let clock = ManualClock::new();
        let mut cache = AudioStateCache::new(clock.clone());
        let runner = RecordingRunner::default();
        cache.snapshot(&PactlJson, &runner);
        clock.advance(Duration::from_millis(1500));
        cache.snapshot(&PactlJson, &runner);
        assert_eq!(runner.probes().len(), 2 * PROBES_PER_SNAPSHOT);
    }

    #[test]
    fn invalidate_forces_a_refresh() {
        let clock = ManualClock::new();
        let mut cache = AudioStateCache::new(clock);
        let runner = RecordingRunner::default();
        cache.snapshot(&PactlJson, &runner);
        cache.invalidate();
        cache.snapshot(&PactlJson, &runner);
        assert_eq!(runner.probes().len(), 2 * PROBES_PER_SNAPSHOT);
    }
}
