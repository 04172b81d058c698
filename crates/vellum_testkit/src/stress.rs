//! Stress tests for Vellum.
//!
//! These harnesses hammer the per-key critical sections from many threads
//! and report how many calls succeeded, plus what the store looks like
//! afterwards.

use crate::fixtures::{body, ALICE, HOME};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};
use vellum_core::{
    AcquireOutcome, CoreError, Language, NewObject, ObjectId, Repository, SaveOptions,
    TranslateRequest, UserId,
};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Operations rejected with an expected conflict.
    pub conflicts: usize,
    /// Operations that failed unexpectedly.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, conflicts: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + conflicts + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            conflicts,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Conflicts: {}", self.conflicts);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of concurrent threads.
    pub threads: usize,
    /// Operations per thread.
    pub operations_per_thread: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            threads: 8,
            operations_per_thread: 50,
        }
    }
}

#[derive(Default)]
struct Counters {
    successful: AtomicUsize,
    conflicts: AtomicUsize,
    failed: AtomicUsize,
}

impl Counters {
    fn record<T>(&self, outcome: &Result<T, CoreError>) {
        let counter = match outcome {
            Ok(_) => &self.successful,
            Err(CoreError::LockConflict { .. } | CoreError::NotLockOwner { .. }) => {
                &self.conflicts
            }
            Err(e) if e.is_retryable() => &self.conflicts,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn finish(&self, start: Instant) -> StressTestResult {
        StressTestResult::new(
            self.successful.load(Ordering::Relaxed),
            self.conflicts.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
            start.elapsed(),
        )
    }
}

/// Outcome of [`stress_concurrent_translate`].
#[derive(Debug, Clone)]
pub struct TranslateStress {
    /// Call statistics.
    pub result: StressTestResult,
    /// Distinct object IDs returned across all calls.
    pub returned_ids: BTreeSet<ObjectId>,
}

/// Fires `threads` simultaneous translations of `source` into `language`.
///
/// All threads are released together by a barrier; every call must return
/// the same variant.
pub fn stress_concurrent_translate(
    repo: Arc<Repository>,
    source: ObjectId,
    language: &str,
    config: &StressConfig,
) -> TranslateStress {
    let counters = Arc::new(Counters::default());
    let barrier = Arc::new(Barrier::new(config.threads));
    let language = Language::new(language);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let counters = Arc::clone(&counters);
            let barrier = Arc::clone(&barrier);
            let language = language.clone();
            thread::spawn(move || {
                barrier.wait();
                let outcome = repo.translate(&TranslateRequest::new(source, language, ALICE));
                counters.record(&outcome);
                outcome.ok().map(|o| o.id)
            })
        })
        .collect();

    let returned_ids = handles
        .into_iter()
        .filter_map(|h| h.join().ok().flatten())
        .collect();

    TranslateStress {
        result: counters.finish(start),
        returned_ids,
    }
}

/// Many editors competing for one object's lock.
///
/// Each operation is acquire, save a unique body, release. Losers see
/// `LockConflict` and count as conflicts.
pub fn stress_lock_contention(
    repo: Arc<Repository>,
    object: ObjectId,
    config: &StressConfig,
) -> StressTestResult {
    let counters = Arc::new(Counters::default());
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let repo = Arc::clone(&repo);
            let counters = Arc::clone(&counters);
            let ops = config.operations_per_thread;
            let user = UserId::new(100 + t as u32);

            thread::spawn(move || {
                for i in 0..ops {
                    let outcome = repo.acquire(object, user).and_then(|_| {
                        let draft = body(&format!("editor {t} edit {i}"));
                        let saved = repo.save(object, user, &draft, SaveOptions::minor());
                        repo.release(object, user, SaveOptions::draft_only())?;
                        saved
                    });
                    counters.record(&outcome);
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }
    counters.finish(start)
}

/// Outcome of [`stress_lock_takeover`].
#[derive(Debug, Clone)]
pub struct TakeoverStress {
    /// Call statistics.
    pub result: StressTestResult,
    /// How many callers reported taking the lock over.
    pub takeovers: usize,
}

/// Many editors racing to take over one expired lock.
///
/// The caller sets up the expired lock. Exactly one thread should win the
/// takeover; the rest see the winner's fresh lock.
pub fn stress_lock_takeover(
    repo: Arc<Repository>,
    object: ObjectId,
    config: &StressConfig,
) -> TakeoverStress {
    let counters = Arc::new(Counters::default());
    let takeovers = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(config.threads));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let repo = Arc::clone(&repo);
            let counters = Arc::clone(&counters);
            let takeovers = Arc::clone(&takeovers);
            let barrier = Arc::clone(&barrier);
            let user = UserId::new(300 + t as u32);

            thread::spawn(move || {
                barrier.wait();
                let outcome = repo.acquire(object, user);
                if let Ok(AcquireOutcome::TakenOver { .. }) = outcome {
                    takeovers.fetch_add(1, Ordering::Relaxed);
                }
                counters.record(&outcome);
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }
    TakeoverStress {
        result: counters.finish(start),
        takeovers: takeovers.load(Ordering::Relaxed),
    }
}

/// Creates objects concurrently and edits each one from its creator thread.
pub fn stress_concurrent_edits(repo: Arc<Repository>, config: &StressConfig) -> StressTestResult {
    let counters = Arc::new(Counters::default());
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let repo = Arc::clone(&repo);
            let counters = Arc::clone(&counters);
            let ops = config.operations_per_thread;
            let user = UserId::new(200 + t as u32);

            thread::spawn(move || {
                let created = repo.create(NewObject::page(HOME, body("start"), user));
                counters.record(&created);
                let Ok(object) = created else {
                    return;
                };
                for i in 0..ops {
                    let outcome = repo.acquire(object.id, user).and_then(|_| {
                        repo.save(object.id, user, &body(&format!("{i}")), SaveOptions::minor())?;
                        repo.release(object.id, user, SaveOptions::draft_only())
                    });
                    counters.record(&outcome);
                }
            })
        })
        .collect();

    for handle in handles {
        let _ = handle.join();
    }
    counters.finish(start)
}
