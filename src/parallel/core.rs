use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::error::ExecutorError;
use super::processes::ProcessPool;
use super::threads::ThreadPool;

/// Default upper bound on worker threads in [`ExecutionMode::Thread`]
pub const DEFAULT_MAX_THREADS: usize = 32;

/// Concurrency strategy used by a [`ParallelExecutor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One OS process per logical CPU, each with its own memory
    #[default]
    Process,
    /// A bounded pool of threads sharing the caller's memory
    Thread,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Process => write!(f, "process"),
            ExecutionMode::Thread => write!(f, "thread"),
        }
    }
}

type TaskFn<A, R> = dyn Fn(A) -> anyhow::Result<R> + Send + Sync;

/// A named callable that can run on either pool.
///
/// Thread pools call the closure directly. Process pools only send the name
/// across; the worker process looks the same task up in its
/// [`TaskRegistry`](super::TaskRegistry).
pub struct Task<A, R> {
    name: String,
    func: Arc<TaskFn<A, R>>,
}

impl<A, R> Task<A, R> {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(A) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: A) -> anyhow::Result<R> {
        (self.func)(args)
    }
}

impl<A, R> Clone for Task<A, R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            func: Arc::clone(&self.func),
        }
    }
}

impl<A, R> fmt::Debug for Task<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}

/// Runs a whole batch of invocations and hands back results in submission order
pub trait Dispatch<A, R> {
    fn dispatch(&self, task: &Task<A, R>, batch: Vec<A>) -> Result<Vec<R>, ExecutorError>;
}

/// Collects argument tuples for one task and runs them all at once.
///
/// An executor is single-use: [`run`](Self::run) consumes it.
///
/// ```rust
/// use toolbox::parallel::{ExecutionMode, ParallelExecutor, Task};
///
/// let task = Task::new("add", |(a, b): (i64, i64)| Ok(a + b));
/// let mut executor = ParallelExecutor::new(task, ExecutionMode::Thread);
/// executor.submit((1, 2));
/// executor.submit((3, 4));
/// assert_eq!(executor.run().unwrap(), vec![3, 7]);
/// ```
///
/// [`new`](Self::new) needs JSON-serializable arguments and results so the
/// batch can go to worker processes. Use [`threaded`](Self::threaded) for
/// anything else.
pub struct ParallelExecutor<A, R> {
    task: Task<A, R>,
    backend: Backend<A, R>,
    max_threads: usize,
    batch: Vec<A>,
}

type ProcessDispatch<A, R> = fn(&Task<A, R>, Vec<A>) -> Result<Vec<R>, ExecutorError>;

/// Pool picked at construction, where the serde bounds are still known
enum Backend<A, R> {
    Threads,
    Processes(ProcessDispatch<A, R>),
}

fn dispatch_on_processes<A, R>(task: &Task<A, R>, batch: Vec<A>) -> Result<Vec<R>, ExecutorError>
where
    A: Serialize,
    R: DeserializeOwned,
{
    ProcessPool::new()?.dispatch(task, batch)
}

impl<A, R> ParallelExecutor<A, R>
where
    A: Serialize,
    R: DeserializeOwned,
{
    pub fn new(task: Task<A, R>, mode: ExecutionMode) -> Self {
        let backend = match mode {
            ExecutionMode::Process => Backend::Processes(dispatch_on_processes::<A, R>),
            ExecutionMode::Thread => Backend::Threads,
        };
        Self::with_backend(task, backend)
    }
}

impl<A, R> ParallelExecutor<A, R> {
    /// Thread-mode executor with no serialization requirements, so borrowed
    /// or otherwise unserializable arguments and results work too
    pub fn threaded(task: Task<A, R>) -> Self {
        Self::with_backend(task, Backend::Threads)
    }

    fn with_backend(task: Task<A, R>, backend: Backend<A, R>) -> Self {
        Self {
            task,
            backend,
            max_threads: DEFAULT_MAX_THREADS,
            batch: Vec::new(),
        }
    }

    /// Bound the number of worker threads used in thread mode
    pub fn max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads.max(1);
        self
    }

    /// Append one argument tuple to the pending batch
    pub fn submit(&mut self, args: A) {
        self.batch.push(args);
    }

    pub fn mode(&self) -> ExecutionMode {
        match self.backend {
            Backend::Threads => ExecutionMode::Thread,
            Backend::Processes(_) => ExecutionMode::Process,
        }
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Run the batch on a caller-provided dispatcher instead of the one
    /// selected by the execution mode
    pub fn run_with(self, dispatcher: &dyn Dispatch<A, R>) -> Result<Vec<R>, ExecutorError> {
        debug!(task = %self.task.name(), items = self.batch.len(), "dispatching batch");
        dispatcher.dispatch(&self.task, self.batch)
    }
}

impl<A: Send, R: Send> ParallelExecutor<A, R> {
    /// Execute every submitted invocation and wait for all of them.
    ///
    /// Results line up with submission order. If any invocation fails the
    /// whole run fails and no results are returned.
    pub fn run(self) -> Result<Vec<R>, ExecutorError> {
        match self.backend {
            Backend::Processes(dispatch) => {
                debug!(task = %self.task.name(), items = self.batch.len(), "dispatching batch");
                dispatch(&self.task, self.batch)
            }
            Backend::Threads => {
                let pool = ThreadPool::new(self.max_threads);
                self.run_with(&pool)
            }
        }
    }
}

impl<A, R> fmt::Debug for ParallelExecutor<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParallelExecutor")
            .field("task", &self.task)
            .field("mode", &self.mode())
            .field("max_threads", &self.max_threads)
            .field("pending", &self.batch.len())
            .finish()
    }
}

/// Outcome of one invocation as seen by a collector
pub(crate) type Outcome<R> = Result<R, anyhow::Error>;

/// Put indexed outcomes back into submission order.
///
/// The earliest failed invocation wins; a hole in the results means a worker
/// went away without reporting.
pub(crate) fn order_results<R>(
    indexed: Vec<(usize, Outcome<R>)>,
    total: usize,
) -> Result<Vec<R>, ExecutorError> {
    let mut slots: Vec<Option<Outcome<R>>> = (0..total).map(|_| None).collect();
    for (index, outcome) in indexed {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(outcome);
        }
    }

    let mut results = Vec::with_capacity(total);
    let mut missing = 0;
    for (index, slot) in slots.into_iter().enumerate() {
        match slot {
            Some(Ok(result)) => results.push(result),
            Some(Err(source)) => return Err(ExecutorError::Invocation { index, source }),
            None => missing += 1,
        }
    }

    if missing > 0 {
        return Err(ExecutorError::Protocol(format!(
            "{missing} of {total} invocations produced no result"
        )));
    }
    Ok(results)
}

/// Turn a caught panic payload into something printable
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}
