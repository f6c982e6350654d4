//! Stress tests for ArcVault.
//!
//! These run heavy or concurrent workloads against a repository and
//! report throughput. The functions are also used with small configs
//! from unit tests to check correctness under contention.

use crate::fixtures::html_page;
use arcvault_core::{ArtifactPredicate, ArtifactSpec, Repository};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
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
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {name} ===");
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of operations per run.
    pub operations: usize,
    /// Number of concurrent threads.
    pub threads: usize,
    /// Size of each page body in bytes.
    pub body_size: usize,
    /// Number of distinct URIs.
    pub uri_count: usize,
    /// Number of distinct archival units.
    pub au_count: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            body_size: 2048,
            uri_count: 500,
            au_count: 8,
        }
    }
}

fn ingest_commit(repo: &Repository, au: usize, uri: usize, body: &str) -> bool {
    let spec = ArtifactSpec::new(
        "stress",
        format!("au-{au}"),
        format!("http://example.com/{uri}"),
        Cursor::new(html_page(body)),
    );
    match repo.ingest(spec) {
        Ok(artifact) => repo.commit(&artifact.id).is_ok(),
        Err(_) => false,
    }
}

/// Ingests and commits pages from one thread.
pub fn stress_sequential_ingest(repo: &Repository, config: &StressConfig) -> StressTestResult {
    let body = "x".repeat(config.body_size);
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for i in 0..config.operations {
        if ingest_commit(repo, i % config.au_count, i % config.uri_count, &body) {
            successful += 1;
        } else {
            failed += 1;
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Ingests and commits pages from several threads at once.
///
/// Threads write into overlapping AUs and URIs, so per-log writer locks
/// and version assignment are contended.
pub fn stress_concurrent_ingest(repo: Arc<Repository>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let ops_per_thread = config.operations / config.threads.max(1);
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let repo = Arc::clone(&repo);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let config = config.clone();

            thread::spawn(move || {
                let body = "y".repeat(config.body_size);
                for i in 0..ops_per_thread {
                    let n = t * ops_per_thread + i;
                    if ingest_commit(&repo, n % config.au_count, n % config.uri_count, &body) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Queries while other threads ingest.
///
/// Returns the result of the reader threads only.
pub fn stress_queries_during_ingest(repo: Arc<Repository>, config: &StressConfig) -> StressTestResult {
    let writers = {
        let repo = Arc::clone(&repo);
        let config = config.clone();
        thread::spawn(move || stress_sequential_ingest(&repo, &config))
    };

    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let readers: Vec<_> = (0..config.threads)
        .map(|_| {
            let repo = Arc::clone(&repo);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let operations = config.operations / config.threads.max(1);
            thread::spawn(move || {
                let predicate = ArtifactPredicate::new().collection("stress").committed(true);
                for _ in 0..operations {
                    match repo.query(&predicate) {
                        // Consume part of the cursor, then drop it.
                        Ok(cursor) => {
                            let _ = cursor.take(50).count();
                            successful.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
        })
        .collect();

    for handle in readers {
        handle.join().expect("Thread panicked");
    }
    writers.join().expect("Writer panicked");

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> StressConfig {
        StressConfig {
            operations: 200,
            threads: 4,
            body_size: 64,
            uri_count: 10,
            au_count: 3,
        }
    }

    #[test]
    fn sequential_ingest_succeeds() {
        let repo = Repository::open_in_memory().unwrap();
        let result = stress_sequential_ingest(&repo, &small());
        assert_eq!(result.failed_ops, 0);
        assert_eq!(repo.stats().committed, 200);
    }

    #[test]
    fn concurrent_ingest_keeps_versions_dense() {
        let config = small();
        let repo = Arc::new(Repository::open_in_memory().unwrap());
        let result = stress_concurrent_ingest(Arc::clone(&repo), &config);
        assert_eq!(result.failed_ops, 0);

        // Every (au, uri) stem has versions 1..=n with no gaps.
        for au in 0..config.au_count {
            for uri in 0..config.uri_count {
                let versions: Vec<u32> = repo
                    .artifact_versions("stress", &format!("au-{au}"), &format!("http://example.com/{uri}"))
                    .unwrap()
                    .map(|e| e.identifier.version)
                    .collect();
                let n = versions.len() as u32;
                assert_eq!(versions, (1..=n).rev().collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn queries_do_not_block_ingest() {
        let result = stress_queries_during_ingest(Arc::new(Repository::open_in_memory().unwrap()), &small());
        assert_eq!(result.failed_ops, 0);
    }
}
