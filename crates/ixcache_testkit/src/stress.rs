//! Stress helpers for concurrent node access.

use crate::fixtures::{key_of, keyed_item, save};
use ixcache_core::IndexId;
use ixcache_protocol::{RangeQuery, Request, Response};
use ixcache_server::CacheNode;
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

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Saves per writer thread.
    pub operations: usize,
    /// Writer threads.
    pub threads: usize,
    /// Entries per save.
    pub batch_size: usize,
    /// Distinct indexes written to.
    pub indexes: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 200,
            threads: 4,
            batch_size: 8,
            indexes: 3,
        }
    }
}

impl StressConfig {
    /// Entries written over the whole run; ids never repeat.
    pub fn total_entries(&self) -> usize {
        self.operations * self.threads * self.batch_size
    }
}

fn index_of(n: usize) -> IndexId {
    IndexId::from(i32::try_from(n).unwrap_or(i32::MAX) + 1)
}

/// Concurrent saves from `config.threads` writers, each writing entries
/// with unique ids round-robin over `config.indexes` indexes.
pub fn stress_concurrent_saves(node: &Arc<CacheNode>, config: &StressConfig) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let handles: Vec<_> = (0..config.threads)
        .map(|thread_id| {
            let node = Arc::clone(node);
            let config = config.clone();
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || {
                for op in 0..config.operations {
                    let base = (thread_id * config.operations + op) * config.batch_size;
                    let items = (base..base + config.batch_size)
                        .map(|n| {
                            let id = u32::try_from(n).unwrap_or(u32::MAX);
                            keyed_item(id, i32::try_from(n).unwrap_or(i32::MAX))
                        })
                        .collect();
                    let result = save(&node, index_of(op % config.indexes.max(1)), items);
                    if result.is_ok() {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

/// Readers page through index 1 while writers save into it. A read fails
/// when its page is out of order.
pub fn stress_reads_during_saves(node: &Arc<CacheNode>, config: &StressConfig) -> StressTestResult {
    let writers_done = Arc::new(AtomicUsize::new(0));
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();

    let writers: Vec<_> = (0..config.threads)
        .map(|thread_id| {
            let node = Arc::clone(node);
            let config = config.clone();
            let done = Arc::clone(&writers_done);
            thread::spawn(move || {
                for op in 0..config.operations {
                    let n = thread_id * config.operations + op;
                    let id = u32::try_from(n).unwrap_or(u32::MAX);
                    let _ = save(&node, index_of(0), vec![keyed_item(id, i32::try_from(n).unwrap_or(0))]);
                }
                done.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    let readers: Vec<_> = (0..config.threads)
        .map(|_| {
            let node = Arc::clone(node);
            let threads = config.threads;
            let done = Arc::clone(&writers_done);
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            thread::spawn(move || loop {
                let finished = done.load(Ordering::SeqCst) == threads;
                let reply = node.handle_request(Request::Range(RangeQuery::new(index_of(0), 1, 50)));
                let ordered = match reply {
                    Response::Range(result) => {
                        let keys: Vec<i32> = result.items.iter().filter_map(key_of).collect();
                        keys.windows(2).all(|w| w[0] >= w[1])
                    }
                    _ => false,
                };
                if ordered {
                    successful.fetch_add(1, Ordering::Relaxed);
                } else {
                    failed.fetch_add(1, Ordering::Relaxed);
                }
                if finished {
                    break;
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().expect("stress thread panicked");
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestNode;

    fn small() -> StressConfig {
        StressConfig {
            operations: 25,
            threads: 4,
            batch_size: 4,
            indexes: 3,
        }
    }

    #[test]
    fn concurrent_saves_keep_every_entry() {
        let node = TestNode::new();
        let config = small();
        let result = stress_concurrent_saves(&node.node, &config);
        assert_eq!(result.failed_ops, 0);
        assert_eq!(result.successful_ops, config.operations * config.threads);

        let stored: i32 = (0..config.indexes)
            .map(|i| {
                match node.handle_request(Request::Range(RangeQuery::new(index_of(i), 1, 1))) {
                    Response::Range(r) => r.summary.index_size,
                    other => panic!("unexpected reply {}", other.name()),
                }
            })
            .sum();
        assert_eq!(stored as usize, config.total_entries());
    }

    #[test]
    fn reads_stay_ordered_during_saves() {
        let node = TestNode::new();
        let result = stress_reads_during_saves(&node.node, &small());
        assert_eq!(result.failed_ops, 0);
        assert!(result.successful_ops >= small().threads);
    }
}
