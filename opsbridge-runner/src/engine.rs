//! Execution engine seam
//!
//! The runner drives remote executions through the [`ExecutionEngine`] trait
//! rather than a concrete engine binding:
//! - [`EngineRequest`] carries everything one run needs (inventory text,
//!   workload, knobs)
//! - [`EngineHooks`] is how the engine talks back (events, cancel polling,
//!   status transitions, terminal state)
//!
//! The devkit ships a scripted stub implementation for tests.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::event::ExecutionEvent;

/// What a run executes: an ad-hoc module invocation or a playbook file
#[derive(Debug, Clone)]
pub enum Workload {
    Module { name: String, args: String },
    Playbook { file: String },
}

/// Privilege escalation settings forwarded to the engine
#[derive(Debug, Clone)]
pub struct PrivilegeEscalation {
    pub method: String,
    pub user: String,
    pub password: Option<String>,
}

/// Pre-split SSH argument lists for the transport layers
#[derive(Debug, Clone, Default)]
pub struct SshArgv {
    pub common: Vec<String>,
    pub extra: Vec<String>,
    pub sftp: Vec<String>,
    pub scp: Vec<String>,
}

/// Everything the engine needs for one run. Read-only during execution.
#[derive(Debug, Clone)]
pub struct EngineRequest {
    /// Per-run ident stamped on log lines
    pub ident: String,
    /// Working directory for engine artifacts
    pub private_data_dir: PathBuf,
    /// Host pattern for module runs; playbooks target their own plays
    pub host_pattern: Option<String>,
    /// Rendered inventory text
    pub inventory: String,
    pub workload: Workload,
    pub extra_vars: Option<Map<String, Value>>,
    pub forks: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub verbosity: u8,
    pub ssh_args: SshArgv,
    pub escalation: Option<PrivilegeEscalation>,
}

/// Terminal state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    Successful,
    Failed,
    Timeout,
    Canceled,
}

impl std::fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Canceled => "canceled",
        };
        write!(f, "{}", label)
    }
}

/// Completed run handle
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub status: EngineStatus,
}

/// Engine launch/execution faults
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("engine failed to start: {0}")]
    Startup(String),
    #[error("engine fault while running: {0}")]
    Execution(String),
}

/// Callbacks the engine drives during a run. Called from the engine's own
/// task or thread context; implementations must not assume reentrancy into
/// runner state.
pub trait EngineHooks: Send + Sync {
    /// One call per emitted event, in engine order
    fn on_event(&self, event: &ExecutionEvent);

    /// Polled between units of work; `true` aborts the run
    fn should_cancel(&self) -> bool {
        false
    }

    /// Transient phase transitions ("starting", "running", ...)
    fn on_status(&self, status: &str) {
        let _ = status;
    }

    /// Invoked exactly once when the run reaches a terminal state
    fn on_finished(&self, status: EngineStatus);
}

/// A remote-execution engine the runner can delegate to
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn run(
        &self,
        request: EngineRequest,
        hooks: Arc<dyn EngineHooks>,
    ) -> Result<EngineRun, EngineError>;
}
