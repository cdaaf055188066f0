use crossbeam::channel::{Receiver, Sender, unbounded};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use tracing::{debug, trace, warn};

use super::core::{Dispatch, Outcome, Task, order_results};
use super::error::ExecutorError;
use super::worker::{Job, JobOutcome, REPLY_PREFIX, Reply, WORKER_TASK_ENV};

/// Program and arguments used to start a worker process
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    /// Re-launch the running executable
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: Vec::new(),
        })
    }
}

/// Pool of worker processes, one per logical CPU by default.
///
/// The pool only sends a task's name to its workers. The program it starts
/// must call [`serve_if_requested`](super::serve_if_requested) with a
/// registry containing that task.
#[derive(Debug, Clone)]
pub struct ProcessPool {
    command: WorkerCommand,
    workers: usize,
}

impl ProcessPool {
    /// Pool of `num_cpus::get()` copies of the current executable
    pub fn new() -> Result<Self, ExecutorError> {
        refuse_inside_worker()?;
        let command = WorkerCommand::current_exe().map_err(|source| ExecutorError::Spawn {
            program: "<current executable>".to_string(),
            source,
        })?;
        Ok(Self::with_command(command))
    }

    pub fn with_command(command: WorkerCommand) -> Self {
        Self {
            command,
            workers: num_cpus::get().max(1),
        }
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Number of processes started for a batch of `work_count` items
    pub fn calculate_workers(&self, work_count: usize) -> usize {
        std::cmp::min(self.workers, work_count.max(1))
    }

    /// Run already-encoded jobs for `task_name`, returning raw JSON results
    fn run_encoded(
        &self,
        task_name: &str,
        jobs: Vec<Value>,
    ) -> Result<Vec<(usize, Outcome<Value>)>, ExecutorError> {
        refuse_inside_worker()?;
        let work_count = jobs.len();
        let workers = self.calculate_workers(work_count);
        debug!(task = task_name, workers, items = work_count, "starting process pool");

        // Every job is queued up front; workers pull the next one when idle
        let (job_tx, job_rx): (Sender<(usize, Value)>, Receiver<(usize, Value)>) = unbounded();
        for job in jobs.into_iter().enumerate() {
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded();

        let (indexed, worker_errors) = crossbeam::thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|worker_id| {
                    let job_rx = job_rx.clone();
                    let result_tx = result_tx.clone();
                    s.spawn(move |_| self.drive_worker(worker_id, task_name, job_rx, result_tx))
                })
                .collect();

            drop(result_tx);
            let indexed: Vec<(usize, Outcome<Value>)> = result_rx.iter().collect();

            let worker_errors: Vec<ExecutorError> = handles
                .into_iter()
                .filter_map(|handle| match handle.join() {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e),
                    Err(_) => Some(ExecutorError::PoolPanicked),
                })
                .collect();

            (indexed, worker_errors)
        })
        .map_err(|_| ExecutorError::PoolPanicked)?;

        // Invocation failures are what the caller asked about; infrastructure
        // errors only matter when nothing else explains the missing results
        let failed = indexed.iter().any(|(_, outcome)| outcome.is_err());
        if !failed && indexed.len() < work_count {
            if let Some(error) = worker_errors.into_iter().next() {
                return Err(error);
            }
        }
        Ok(indexed)
    }

    /// Feed jobs to one worker process until the queue is empty
    fn drive_worker(
        &self,
        worker_id: usize,
        task_name: &str,
        job_rx: Receiver<(usize, Value)>,
        result_tx: Sender<(usize, Outcome<Value>)>,
    ) -> Result<(), ExecutorError> {
        let mut worker = WorkerProcess::spawn(&self.command, task_name)?;
        trace!(worker_id, pid = worker.id(), "worker process started");

        while let Ok((index, args)) = job_rx.recv() {
            match worker.call(index, args) {
                Ok(outcome) => {
                    if result_tx.send((index, outcome)).is_err() {
                        break; // Collector dropped
                    }
                }
                Err(e) => {
                    // The job that broke the worker is the one that failed
                    let message = match worker.terminate() {
                        Ok(status) => format!("worker process failed during the call ({status}): {e}"),
                        Err(_) => format!("worker process failed during the call: {e}"),
                    };
                    warn!(worker_id, index, "{message}");
                    let _ = result_tx.send((index, Err(anyhow::anyhow!(message))));
                    return Ok(());
                }
            }
        }

        let status = worker.shutdown().map_err(|e| {
            ExecutorError::Protocol(format!("failed to wait for worker process: {e}"))
        })?;
        if !status.success() {
            warn!(worker_id, %status, "worker process exited abnormally");
        }
        trace!(worker_id, "worker process finished");
        Ok(())
    }
}

impl<A, R> Dispatch<A, R> for ProcessPool
where
    A: Serialize,
    R: DeserializeOwned,
{
    fn dispatch(&self, task: &Task<A, R>, batch: Vec<A>) -> Result<Vec<R>, ExecutorError> {
        let work_count = batch.len();
        if work_count == 0 {
            return Ok(Vec::new());
        }

        let jobs = batch
            .into_iter()
            .enumerate()
            .map(|(index, args)| {
                serde_json::to_value(args).map_err(|source| ExecutorError::Encode { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut indexed = Vec::with_capacity(work_count);
        for (index, outcome) in self.run_encoded(task.name(), jobs)? {
            let outcome = match outcome {
                Ok(value) => Ok(serde_json::from_value(value)
                    .map_err(|source| ExecutorError::Decode { index, source })?),
                Err(e) => Err(e),
            };
            indexed.push((index, outcome));
        }

        order_results(indexed, work_count)
    }
}

/// One running worker process.
///
/// Dropping it without [`shutdown`](Self::shutdown) kills the child, so no
/// exit path leaves a process behind.
struct WorkerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
    reaped: bool,
}

impl WorkerProcess {
    fn spawn(command: &WorkerCommand, task_name: &str) -> Result<Self, ExecutorError> {
        let spawn_error = |source| ExecutorError::Spawn {
            program: command.program.display().to_string(),
            source,
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .env(WORKER_TASK_ENV, task_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = Self::kill_child(&mut child);
            return Err(spawn_error(io::Error::other("worker pipes were not captured")));
        };

        Ok(Self {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
            reaped: false,
        })
    }

    fn id(&self) -> u32 {
        self.child.id()
    }

    /// Send one job and wait for its reply
    fn call(&mut self, index: usize, args: Value) -> io::Result<Outcome<Value>> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "worker stdin already closed"))?;

        let line = serde_json::to_string(&Job { index, args })?;
        writeln!(stdin, "{line}")?;
        stdin.flush()?;

        let mut buffer = String::new();
        loop {
            buffer.clear();
            if self.stdout.read_line(&mut buffer)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "worker closed its output before replying",
                ));
            }

            // Ignore whatever else the worker binary prints
            let Some(payload) = reply_payload(&buffer) else {
                continue;
            };

            let reply: Reply = serde_json::from_str(payload)?;
            if reply.index != index {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("expected reply for job {index}, got {}", reply.index),
                ));
            }

            return Ok(match reply.outcome {
                JobOutcome::Ok(value) => Ok(value),
                JobOutcome::Err(message) => Err(anyhow::anyhow!(message)),
            });
        }
    }

    /// Close stdin so the worker exits, then reap it
    fn shutdown(&mut self) -> io::Result<ExitStatus> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        self.reaped = true;
        Ok(status)
    }

    /// Stop a worker that may be dead or wedged, returning its exit status
    fn terminate(&mut self) -> io::Result<ExitStatus> {
        drop(self.stdin.take());
        let status = match self.child.try_wait()? {
            Some(status) => status,
            None => Self::kill_child(&mut self.child)?,
        };
        self.reaped = true;
        Ok(status)
    }

    fn kill(&mut self) {
        if !self.reaped {
            let _ = Self::kill_child(&mut self.child);
            self.reaped = true;
        }
    }

    fn kill_child(child: &mut Child) -> io::Result<ExitStatus> {
        let _ = child.kill();
        child.wait()
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        drop(self.stdin.take());
        self.kill();
    }
}

/// Workers inherit [`WORKER_TASK_ENV`], so a pool started from one would
/// re-launch itself without end
fn refuse_inside_worker() -> Result<(), ExecutorError> {
    if std::env::var_os(WORKER_TASK_ENV).is_some() {
        return Err(ExecutorError::Protocol(
            "process pool started inside a worker; call serve_if_requested first".to_string(),
        ));
    }
    Ok(())
}

/// JSON part of a reply line, wherever the marker sits in it
fn reply_payload(line: &str) -> Option<&str> {
    line.trim_end().split_once(REPLY_PREFIX).map(|(_, payload)| payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_payload_at_line_start() {
        let line = format!("{REPLY_PREFIX}{{\"index\":0}}\n");
        assert_eq!(reply_payload(&line), Some("{\"index\":0}"));
    }

    #[test]
    fn test_reply_payload_after_unterminated_output() {
        let line = format!("progress 1...{REPLY_PREFIX}{{\"index\":3}}\n");
        assert_eq!(reply_payload(&line), Some("{\"index\":3}"));
    }

    #[test]
    fn test_reply_payload_ignores_noise() {
        assert_eq!(reply_payload("some task output\n"), None);
        assert_eq!(reply_payload("\n"), None);
    }

    #[test]
    fn test_calculate_workers() {
        let pool = ProcessPool::with_command(WorkerCommand {
            program: PathBuf::from("worker"),
            args: Vec::new(),
        })
        .workers(4);
        assert_eq!(pool.calculate_workers(2), 2);
        assert_eq!(pool.calculate_workers(100), 4);
        assert_eq!(pool.calculate_workers(0), 1);
    }
}
