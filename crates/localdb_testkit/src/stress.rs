//! Stress tests for localdb.
//!
//! These helpers run concurrent readers and writers against one database
//! and count reads that observed stale data.

use localdb_core::{AddOptions, LocalDb, Record, RecordPatch, StoreName};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Reads that returned an older value than one already committed by
    /// the reading thread.
    pub stale_reads: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Operations per second.
    pub fn ops_per_second(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.total_ops as f64 / secs
        } else {
            0.0
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Stale reads: {}", self.stale_reads);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second());
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Updates each writer performs.
    pub operations: usize,
    /// Number of writer threads.
    pub threads: usize,
    /// Store the writers update.
    pub store: StoreName,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            store: StoreName::Wallet,
        }
    }
}

fn counter(record: &Record) -> Option<u64> {
    record.get("counter").and_then(Value::as_u64)
}

/// Each writer owns one record, bumps its counter and immediately reads it
/// back through the cached read path. Any read older than the writer's own
/// committed value is counted as stale.
///
/// A second group of threads reads every writer's record concurrently so
/// the cache is refilled while writes are in flight.
///
/// # Panics
///
/// Panics if the seed records cannot be written.
pub fn stress_cache_coherence(db: &LocalDb, config: &StressConfig) -> StressTestResult {
    let store = config.store;
    let seeds: Vec<Record> = (0..config.threads)
        .map(|t| Record::new(format!("stress-{t}")).with("counter", json!(0)))
        .collect();
    db.add(store, seeds, AddOptions::skip_if_exists())
        .expect("Failed to seed stress records");

    let successful = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);
    let stale = AtomicUsize::new(0);
    let start = Instant::now();

    thread::scope(|scope| {
        for t in 0..config.threads {
            let (successful, failed, stale) = (&successful, &failed, &stale);
            scope.spawn(move || {
                let id = [format!("stress-{t}")];
                for i in 1..=config.operations as u64 {
                    let patch = RecordPatch::new().set("counter", json!(i));
                    if db.patch(store, &id, &patch).is_err() {
                        failed.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    match db.get(store, &id[0]) {
                        Ok(record) if counter(&record).is_some_and(|c| c >= i) => {
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(_) => {
                            stale.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
        for _ in 0..config.threads {
            let failed = &failed;
            scope.spawn(move || {
                for _ in 0..config.operations {
                    for t in 0..config.threads {
                        if db.get(store, &format!("stress-{t}")).is_err() {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            });
        }
    });

    let successful = successful.into_inner();
    let failed = failed.into_inner();
    let stale_reads = stale.into_inner();
    StressTestResult {
        total_ops: successful + failed + stale_reads,
        successful_ops: successful,
        failed_ops: failed,
        stale_reads,
        duration: start.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestDb;
    use localdb_core::Config;
    use localdb_storage::InMemoryBackend;
    use std::sync::Arc;

    #[test]
    fn test_cache_coherence_under_load() {
        let db = TestDb::memory();
        let config = StressConfig {
            operations: 50,
            threads: 3,
            ..StressConfig::default()
        };
        let result = stress_cache_coherence(&db, &config);
        assert_eq!(result.stale_reads, 0);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, 150);

        for t in 0..3 {
            let record = db.get(StoreName::Wallet, &format!("stress-{t}")).unwrap();
            assert_eq!(counter(&record), Some(50));
        }
    }

    #[test]
    #[should_panic(expected = "Failed to seed stress records")]
    fn test_seed_failure_is_reported() {
        let config = Config::default().create_missing_stores(false);
        let db = LocalDb::open(Arc::new(InMemoryBackend::new()), config).unwrap();
        stress_cache_coherence(&db, &StressConfig::default());
    }
}
