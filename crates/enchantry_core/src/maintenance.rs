//! # Background Maintenance
//!
//! One low-priority thread that periodically sweeps expired cache entries.
//!
//! ```text
//!   start() ──► thread: loop {
//!                   recv_timeout(interval) on stop channel
//!                     timeout  ─► sweep every target, adapt interval
//!                     stop/closed ─► exit, signal done
//!               }
//!   stop()  ──► send stop, wait for done up to the timeout
//!                     done    ─► join
//!                     timeout ─► warn, detach
//! ```
//!
//! A sweep only reclaims space; skipping one never changes an answer.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::cache::CacheStats;
use crate::error::{EngineError, EngineResult};

/// Something the maintenance thread can sweep.
pub trait Sweep: Send + Sync {
    /// Drops expired entries, returning how many were removed.
    fn sweep(&self) -> usize;

    /// Current counters, used to adapt the sweep interval.
    fn stats(&self) -> CacheStats;
}

/// Hit rate above which sweeps slow down.
pub const HIGH_HIT_RATE: f64 = 0.9;
/// Hit rate below which sweeps speed up.
pub const LOW_HIT_RATE: f64 = 0.5;

/// Interval before the next sweep given the overall hit rate.
///
/// `2x` base above [`HIGH_HIT_RATE`], `0.6x` base below [`LOW_HIT_RATE`],
/// base otherwise or when `adaptive` is off.
#[must_use]
pub fn next_interval(base: Duration, hit_rate: f64, adaptive: bool) -> Duration {
    if !adaptive {
        return base;
    }
    if hit_rate > HIGH_HIT_RATE {
        base * 2
    } else if hit_rate < LOW_HIT_RATE {
        base * 3 / 5
    } else {
        base
    }
}

/// Parameters of the maintenance thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanupSchedule {
    /// Base sweep interval.
    pub interval: Duration,
    /// Adapt the interval to the hit rate.
    pub adaptive: bool,
    /// How long `stop` waits for the thread.
    pub shutdown_timeout: Duration,
}

struct Running {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: JoinHandle<()>,
}

/// Handle to the sweep thread. At most one thread runs per handle.
pub struct CleanupTask {
    schedule: CleanupSchedule,
    targets: Vec<Arc<dyn Sweep>>,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for CleanupTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupTask")
            .field("schedule", &self.schedule)
            .field("targets", &self.targets.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl CleanupTask {
    /// Creates a stopped task over `targets`.
    #[must_use]
    pub fn new(schedule: CleanupSchedule, targets: Vec<Arc<dyn Sweep>>) -> Self {
        Self {
            schedule,
            targets,
            running: Mutex::new(None),
        }
    }

    /// Whether the thread is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// Sweeps every target once on the calling thread.
    pub fn run_once(&self) -> usize {
        sweep_all(&self.targets)
    }

    /// Starts the thread. Returns `false` if it is already running.
    ///
    /// # Errors
    ///
    /// `MaintenanceSpawn` if the OS refuses the thread.
    pub fn start(&self) -> EngineResult<bool> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(false);
        }

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (done_tx, done_rx) = bounded::<()>(1);
        let targets = self.targets.clone();
        let schedule = self.schedule.clone();

        let handle = thread::Builder::new()
            .name("enchantry-cleanup".to_string())
            .spawn(move || {
                Self::cleanup_loop(&stop_rx, &targets, &schedule);
                let _ = done_tx.send(());
            })
            .map_err(|e| EngineError::MaintenanceSpawn(e.to_string()))?;

        info!(
            interval_ms = millis(self.schedule.interval),
            adaptive = self.schedule.adaptive,
            "cache maintenance started"
        );
        *running = Some(Running {
            stop_tx,
            done_rx,
            handle,
        });
        Ok(true)
    }

    fn cleanup_loop(stop_rx: &Receiver<()>, targets: &[Arc<dyn Sweep>], schedule: &CleanupSchedule) {
        let mut interval = schedule.interval;
        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    let removed = sweep_all(targets);
                    let stats = targets
                        .iter()
                        .map(|t| t.stats())
                        .fold(CacheStats::default(), CacheStats::merge);
                    debug!(removed, hit_rate = stats.hit_rate, "cache sweep finished");

                    let next = next_interval(schedule.interval, stats.hit_rate, schedule.adaptive);
                    if next != interval {
                        debug!(
                            from_ms = millis(interval),
                            to_ms = millis(next),
                            "sweep interval adjusted"
                        );
                        interval = next;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
    }

    /// Stops the thread, waiting at most the shutdown timeout.
    ///
    /// Returns `true` if the thread was joined or was not running. On
    /// timeout the thread is detached and `false` is returned.
    pub fn stop(&self) -> bool {
        let Some(running) = self.running.lock().take() else {
            return true;
        };

        let _ = running.stop_tx.send(());
        match running.done_rx.recv_timeout(self.schedule.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if running.handle.join().is_err() {
                    error!("cache maintenance thread panicked");
                }
                info!("cache maintenance stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = millis(self.schedule.shutdown_timeout),
                    "cache maintenance did not stop in time, detaching"
                );
                false
            }
        }
    }
}

impl Drop for CleanupTask {
    fn drop(&mut self) {
        self.stop();
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn sweep_all(targets: &[Arc<dyn Sweep>]) -> usize {
    targets.iter().map(|t| t.sweep()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TwoTierCache;
    use crate::config::{CacheConfig, TierConfig};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn schedule(interval_ms: u64, timeout_ms: u64) -> CleanupSchedule {
        CleanupSchedule {
            interval: Duration::from_millis(interval_ms),
            adaptive: false,
            shutdown_timeout: Duration::from_millis(timeout_ms),
        }
    }

    struct SlowSweep {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Sweep for SlowSweep {
        fn sweep(&self) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            0
        }

        fn stats(&self) -> CacheStats {
            CacheStats::default()
        }
    }

    #[test]
    fn test_next_interval() {
        let base = Duration::from_secs(300);
        assert_eq!(next_interval(base, 0.95, true), Duration::from_secs(600));
        assert_eq!(next_interval(base, 0.2, true), Duration::from_secs(180));
        assert_eq!(next_interval(base, 0.7, true), base);
        assert_eq!(next_interval(base, 0.95, false), base);
        assert_eq!(next_interval(base, 0.9, true), base);
        assert_eq!(next_interval(base, 0.5, true), base);
    }

    #[test]
    fn test_sweeps_expired_entries() {
        let config = CacheConfig {
            hot: TierConfig {
                capacity: 16,
                ttl_ms: 10,
            },
            cold: TierConfig {
                capacity: 16,
                ttl_ms: 10,
            },
            ..CacheConfig::default()
        };
        let cache: Arc<TwoTierCache<u32, u32>> = Arc::new(TwoTierCache::new(&config).unwrap());
        for i in 0..8 {
            cache.put(i, i);
        }

        let task = CleanupTask::new(schedule(20, 1000), vec![cache.clone() as Arc<dyn Sweep>]);
        assert!(task.start().unwrap());

        let deadline = Instant::now() + Duration::from_secs(2);
        while !cache.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert!(cache.is_empty());
        assert!(task.stop());
    }

    #[test]
    fn test_never_started_twice() {
        let task = CleanupTask::new(schedule(1000, 1000), Vec::new());
        assert!(task.start().unwrap());
        assert!(!task.start().unwrap());
        assert!(task.is_running());
        assert!(task.stop());
        assert!(!task.is_running());
    }

    #[test]
    fn test_stop_is_idempotent_and_prompt() {
        let task = CleanupTask::new(schedule(60_000, 1000), Vec::new());
        assert!(task.stop());
        task.start().unwrap();

        let start = Instant::now();
        assert!(task.stop());
        assert!(task.stop());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_stop_gives_up_after_timeout() {
        let slow = Arc::new(SlowSweep {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(600),
        });
        let task = CleanupTask::new(schedule(5, 50), vec![slow.clone() as Arc<dyn Sweep>]);
        task.start().unwrap();

        while slow.calls.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(1));
        }

        let start = Instant::now();
        assert!(!task.stop());
        assert!(start.elapsed() < Duration::from_millis(400));
        assert!(!task.is_running());
    }

    #[test]
    fn test_run_once() {
        let slow = Arc::new(SlowSweep {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
        });
        let task = CleanupTask::new(schedule(1000, 1000), vec![slow.clone() as Arc<dyn Sweep>]);
        assert_eq!(task.run_once(), 0);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }
}
