use crossbeam::channel::{Receiver, Sender, bounded};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, trace};

use super::core::{DEFAULT_MAX_THREADS, Dispatch, Outcome, Task, order_results, panic_message};
use super::error::ExecutorError;

/// Bounded pool of scoped worker threads.
///
/// Workers live only for the duration of one [`map`](Self::map) call and are
/// joined before it returns, so borrowed closures are fine. No locking is
/// done on behalf of the task: shared state it touches is its own business.
#[derive(Debug, Clone)]
pub struct ThreadPool {
    max_workers: usize,
    /// Channel buffer size multiplier (buffer = workers * multiplier)
    channel_buffer_multiplier: usize,
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_THREADS)
    }
}

impl ThreadPool {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            channel_buffer_multiplier: 2,
        }
    }

    /// Number of threads spawned for a batch of `work_count` items
    pub fn calculate_workers(&self, work_count: usize) -> usize {
        // Don't create more workers than work items
        std::cmp::min(self.max_workers, work_count.max(1))
    }

    /// Apply `func` to every item in parallel, returning results in input order
    pub fn map<A, R, F>(&self, func: F, work_items: Vec<A>) -> Result<Vec<R>, ExecutorError>
    where
        A: Send,
        R: Send,
        F: Fn(A) -> anyhow::Result<R> + Sync,
    {
        let work_count = work_items.len();
        if work_count == 0 {
            return Ok(Vec::new());
        }

        let workers = self.calculate_workers(work_count);
        debug!(workers, items = work_count, "starting thread pool");

        let (work_tx, work_rx): (Sender<(usize, A)>, Receiver<(usize, A)>) =
            bounded(workers * self.channel_buffer_multiplier);
        let (result_tx, result_rx): (Sender<(usize, Outcome<R>)>, Receiver<(usize, Outcome<R>)>) =
            bounded(workers * self.channel_buffer_multiplier * 2);
        let func = &func;

        let indexed = crossbeam::thread::scope(|s| {
            for worker_id in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();

                s.spawn(move |_| {
                    while let Ok((index, args)) = work_rx.recv() {
                        let outcome = invoke(func, args);
                        if result_tx.send((index, outcome)).is_err() {
                            break; // Collector dropped
                        }
                    }
                    trace!(worker_id, "thread worker finished");
                });
            }

            // Producer: feed work to workers, closing the channel when done
            s.spawn(move |_| {
                for item in work_items.into_iter().enumerate() {
                    if work_tx.send(item).is_err() {
                        break; // Workers dropped
                    }
                }
            });

            // Drop our copies so the channels close once the threads are done
            drop(work_rx);
            drop(result_tx);

            collect_results(result_rx, work_count)
        })
        .map_err(|_| ExecutorError::PoolPanicked)?;

        order_results(indexed, work_count)
    }
}

impl<A: Send, R: Send> Dispatch<A, R> for ThreadPool {
    fn dispatch(&self, task: &Task<A, R>, batch: Vec<A>) -> Result<Vec<R>, ExecutorError> {
        self.map(|args| task.call(args), batch)
    }
}

fn invoke<A, R, F>(func: &F, args: A) -> Outcome<R>
where
    F: Fn(A) -> anyhow::Result<R>,
{
    panic::catch_unwind(AssertUnwindSafe(|| func(args)))
        .unwrap_or_else(|payload| Err(anyhow::anyhow!(panic_message(payload))))
}

/// Collect results from workers
fn collect_results<R>(
    result_rx: Receiver<(usize, Outcome<R>)>,
    total_work: usize,
) -> Vec<(usize, Outcome<R>)> {
    let mut results = Vec::with_capacity(total_work);

    while let Ok(result) = result_rx.recv() {
        results.push(result);

        // Break when all work is processed
        if results.len() >= total_work {
            break;
        }
    }

    results
}
