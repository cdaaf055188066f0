//! Worker side of the process pool
//!
//! A worker is the current executable started again with
//! [`WORKER_TASK_ENV`] set. It reads one JSON job per line on stdin, runs the
//! named task and answers with one marked JSON line per job on stdout, until
//! stdin is closed.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::panic::{self, AssertUnwindSafe};

use super::core::{Task, panic_message};

/// Environment variable naming the task a worker process should serve
pub const WORKER_TASK_ENV: &str = "TOOLBOX_WORKER_TASK";

/// Prefix of every reply line, anything else on the worker's stdout is noise
pub(crate) const REPLY_PREFIX: &str = "@@toolbox-worker@@ ";

type ErasedTask = Box<dyn Fn(Value) -> Result<Value> + Send + Sync>;

/// Tasks a worker process is able to run, looked up by name
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, ErasedTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under its own name, replacing any previous one
    pub fn register<A, R>(&mut self, task: Task<A, R>) -> &mut Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        let name = task.name().to_string();
        let erased: ErasedTask = Box::new(move |args: Value| {
            let args: A = serde_json::from_value(args).context("failed to decode task arguments")?;
            let result = task.call(args)?;
            serde_json::to_value(result).context("failed to encode task result")
        });
        self.tasks.insert(name, erased);
        self
    }

    pub fn with_task<A, R>(mut self, task: Task<A, R>) -> Self
    where
        A: DeserializeOwned + 'static,
        R: Serialize + 'static,
    {
        self.register(task);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn invoke(&self, name: &str, args: Value) -> JobOutcome {
        let Some(task) = self.tasks.get(name) else {
            return JobOutcome::Err(format!("task '{name}' is not registered in this worker"));
        };

        match panic::catch_unwind(AssertUnwindSafe(|| task(args))) {
            Ok(Ok(value)) => JobOutcome::Ok(value),
            Ok(Err(e)) => JobOutcome::Err(format!("{e:#}")),
            Err(payload) => JobOutcome::Err(panic_message(payload)),
        }
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Job {
    pub index: usize,
    pub args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Reply {
    pub index: usize,
    pub outcome: JobOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum JobOutcome {
    Ok(Value),
    Err(String),
}

/// Serve worker jobs if this process was launched as a pool worker.
///
/// Call this first thing in `main`. Returns `Ok(true)` once the worker
/// session is over, at which point the process should simply exit.
pub fn serve_if_requested(registry: &TaskRegistry) -> Result<bool> {
    let Ok(task_name) = std::env::var(WORKER_TASK_ENV) else {
        return Ok(false);
    };

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    serve(registry, &task_name, stdin.lock(), stdout.lock())?;
    Ok(true)
}

/// Run jobs for `task_name` read from `input` until it is exhausted
pub fn serve<R: BufRead, W: Write>(
    registry: &TaskRegistry,
    task_name: &str,
    input: R,
    mut output: W,
) -> Result<()> {
    for line in input.lines() {
        let line = line.context("failed to read job from parent")?;
        if line.trim().is_empty() {
            continue;
        }

        let job: Job = serde_json::from_str(&line).context("malformed job line")?;
        let reply = Reply {
            index: job.index,
            outcome: registry.invoke(task_name, job.args),
        };

        let encoded = serde_json::to_string(&reply).context("failed to encode reply")?;
        // Start on a fresh line in case the task printed without a newline
        writeln!(output, "\n{REPLY_PREFIX}{encoded}").context("failed to write reply")?;
        output.flush().context("failed to flush reply")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn registry() -> TaskRegistry {
        TaskRegistry::new()
            .with_task(Task::new("increment", |(x,): (i64,)| Ok(x + 1)))
            .with_task(Task::new("fail", |_: ()| -> Result<()> {
                Err(anyhow::anyhow!("inner cause")).context("outer context")
            }))
            .with_task(Task::new("explode", |_: ()| -> Result<()> { panic!("worker blew up") }))
    }

    fn run_jobs(task: &str, jobs: &str) -> Vec<Reply> {
        let mut out = Vec::new();
        serve(&registry(), task, Cursor::new(jobs.to_string()), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .filter(|line| !line.is_empty())
            .map(|line| serde_json::from_str(line.strip_prefix(REPLY_PREFIX).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn test_serve_answers_every_job() {
        let replies = run_jobs(
            "increment",
            "{\"index\":0,\"args\":[1]}\n\n{\"index\":7,\"args\":[41]}\n",
        );
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].index, 7);
        match &replies[1].outcome {
            JobOutcome::Ok(value) => assert_eq!(value, &serde_json::json!(42)),
            JobOutcome::Err(e) => panic!("unexpected failure: {e}"),
        }
    }

    #[test]
    fn test_replies_start_on_a_fresh_line() {
        let mut out = Vec::new();
        serve(&registry(), "increment", Cursor::new("{\"index\":0,\"args\":[1]}\n"), &mut out).unwrap();
        let raw = String::from_utf8(out).unwrap();
        assert!(raw.starts_with(&format!("\n{REPLY_PREFIX}")), "{raw:?}");
    }

    #[test]
    fn test_serve_reports_full_error_chain() {
        let replies = run_jobs("fail", "{\"index\":0,\"args\":null}\n");
        match &replies[0].outcome {
            JobOutcome::Err(message) => {
                assert!(message.contains("outer context"));
                assert!(message.contains("inner cause"));
            }
            JobOutcome::Ok(_) => panic!("expected failure"),
        }
    }

    #[test]
    fn test_serve_turns_panics_into_errors() {
        let replies = run_jobs("explode", "{\"index\":3,\"args\":null}\n");
        assert!(matches!(&replies[0].outcome, JobOutcome::Err(m) if m.contains("worker blew up")));
    }

    #[test]
    fn test_unknown_task_and_bad_arguments_are_job_errors() {
        let replies = run_jobs("missing", "{\"index\":0,\"args\":[1]}\n");
        assert!(matches!(&replies[0].outcome, JobOutcome::Err(m) if m.contains("not registered")));

        let replies = run_jobs("increment", "{\"index\":0,\"args\":\"nope\"}\n");
        assert!(matches!(&replies[0].outcome, JobOutcome::Err(m) if m.contains("decode")));
    }

    #[test]
    fn test_malformed_job_line_aborts_the_session() {
        let mut out = Vec::new();
        let result = serve(&registry(), "increment", Cursor::new("not json\n"), &mut out);
        assert!(result.is_err());
    }

    #[test]
    fn test_registry_lists_names() {
        let registry = registry();
        assert!(registry.contains("increment"));
        assert_eq!(registry.names(), vec!["explode", "fail", "increment"]);
    }
}
