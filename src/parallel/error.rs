use std::io;

/// Errors surfaced by [`ParallelExecutor::run`](super::ParallelExecutor::run)
/// and the pool dispatchers.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// A single invocation of the task failed, returned an error or panicked.
    ///
    /// When several invocations fail, the one submitted first is reported.
    #[error("task invocation #{index} failed")]
    Invocation {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to spawn worker process `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode arguments of invocation #{index}")]
    Encode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode result of invocation #{index}")]
    Decode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("worker protocol error: {0}")]
    Protocol(String),

    #[error("thread panic occurred during parallel processing")]
    PoolPanicked,
}

impl ExecutorError {
    /// Index of the failed invocation, if this error is an invocation failure.
    pub fn failed_index(&self) -> Option<usize> {
        match self {
            Self::Invocation { index, .. } => Some(*index),
            _ => None,
        }
    }
}
