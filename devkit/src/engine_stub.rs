/*!
Scripted execution engine.

[`StubEngine`] stands in for a real remote-execution backend so runner
flows can be exercised without SSH or a single reachable host:
- replays a canned event script through the runner's hooks, in order
- records every request it receives for later assertions
- can be told to fail at startup or to finish with any terminal status
*/

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use opsbridge_runner::{
    EngineError, EngineHooks, EngineRequest, EngineRun, EngineStatus, ExecutionEngine,
    ExecutionEvent,
};
use serde_json::{Map, Value};

use crate::fixtures::EventPayloads;

/// Snapshot of one request as the stub saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: EngineRequest,
    /// Whether the working directory existed when the run started
    pub data_dir_existed: bool,
}

/// Scripted [`ExecutionEngine`] double.
///
/// Clones share the request recording, so a test can keep one handle and
/// hand another to the runner.
#[derive(Clone)]
pub struct StubEngine {
    script: Vec<Map<String, Value>>,
    statuses: Vec<String>,
    terminal: EngineStatus,
    fail_start: Option<String>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self {
            script: Vec::new(),
            statuses: vec!["starting".to_string(), "running".to_string()],
            terminal: EngineStatus::Successful,
            fail_start: None,
            recorded: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine replaying one stdout event per line
    pub fn with_stdout_lines(lines: &[&str]) -> Self {
        lines
            .iter()
            .fold(Self::new(), |engine, line| engine.stdout_line(*line))
    }

    /// Append one stdout event to the script
    pub fn stdout_line<S: Into<String>>(mut self, text: S) -> Self {
        self.script.push(EventPayloads::stdout(text));
        self
    }

    /// Append an arbitrary event payload to the script
    pub fn script_event(mut self, payload: Map<String, Value>) -> Self {
        self.script.push(payload);
        self
    }

    /// Terminal status reported once the script runs out
    pub fn terminal_status(mut self, status: EngineStatus) -> Self {
        self.terminal = status;
        self
    }

    /// Refuse to start, the way a missing backend would
    pub fn fail_startup<S: Into<String>>(mut self, reason: S) -> Self {
        self.fail_start = Some(reason.into());
        self
    }

    /// Every request this engine has received, oldest first
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.recorded.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ExecutionEngine for StubEngine {
    async fn run(
        &self,
        request: EngineRequest,
        hooks: Arc<dyn EngineHooks>,
    ) -> Result<EngineRun, EngineError> {
        self.recorded.lock().unwrap().push(RecordedRequest {
            data_dir_existed: request.private_data_dir.exists(),
            request: request.clone(),
        });

        if let Some(reason) = &self.fail_start {
            log::warn!("🎬 [STUB] refusing to start run {}: {}", request.ident, reason);
            return Err(EngineError::Startup(reason.clone()));
        }

        for phase in &self.statuses {
            hooks.on_status(phase);
        }
        for payload in &self.script {
            if hooks.should_cancel() {
                log::info!("🎬 [STUB] run {} canceled mid-script", request.ident);
                hooks.on_finished(EngineStatus::Canceled);
                return Ok(EngineRun {
                    status: EngineStatus::Canceled,
                });
            }
            hooks.on_event(&ExecutionEvent::from_payload(payload.clone()));
        }

        log::info!(
            "🎬 [STUB] run {} replayed {} event(s), finishing {}",
            request.ident,
            self.script.len(),
            self.terminal
        );
        hooks.on_finished(self.terminal);
        Ok(EngineRun {
            status: self.terminal,
        })
    }
}
