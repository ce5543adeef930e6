//! Fleet runner
//!
//! [`FleetRunner`] is the execution orchestrator: it renders the inventory,
//! stages a working directory, assembles the [`EngineRequest`] and drives
//! the engine with hooks that forward every event to the bound sink.
//!
//! Both entry points are quiet-failure surfaces: engine faults are logged
//! (and, for playbooks, forwarded through the sink) instead of raised, so a
//! control-plane caller never has to guard against errors from a run that
//! went wrong.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{ConfigError, RunnerConfig};
use crate::engine::{
    EngineHooks, EngineRequest, EngineStatus, ExecutionEngine, PrivilegeEscalation, Workload,
};
use crate::event::ExecutionEvent;
use crate::inventory::HostList;
use crate::sink::{EventSink, OutputBinding};

/// Caller-supplied cancellation probe, polled by the engine between units
/// of work
pub type CancelCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Drives module and playbook runs against one sink destination
pub struct FleetRunner {
    engine: Arc<dyn ExecutionEngine>,
    sink: Arc<dyn EventSink>,
    config: RunnerConfig,
    cancel_check: Option<CancelCheck>,
}

impl FleetRunner {
    /// A runner bound to one engine and one output destination
    pub fn new(engine: Arc<dyn ExecutionEngine>, binding: OutputBinding) -> Self {
        Self {
            engine,
            sink: binding.into_sink(),
            config: RunnerConfig::default(),
            cancel_check: None,
        }
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// Attach a cancellation probe; without one the answer is always
    /// "continue"
    pub fn with_cancel_check<F>(mut self, check: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        self.cancel_check = Some(Arc::new(check));
        self
    }

    /// Run one module invocation across the host list. Faults are logged,
    /// never raised; the scratch directory is released on every exit path.
    pub async fn run_module(&self, hosts: &HostList, module_name: &str, module_args: &str) {
        let run_id = Uuid::new_v4().to_string();
        let inventory = match hosts.render_inventory(&self.config.inventory_group) {
            Ok(inventory) => inventory,
            Err(e) => {
                error!("[{}] host list rejected: {}", run_id, e);
                return;
            }
        };
        let scratch = match TempDir::new() {
            Ok(scratch) => scratch,
            Err(e) => {
                error!("[{}] could not stage working directory: {}", run_id, e);
                return;
            }
        };
        let request = match self.build_request(
            &run_id,
            scratch.path().to_path_buf(),
            Some(self.config.pattern.clone()),
            inventory,
            Workload::Module {
                name: module_name.to_string(),
                args: module_args.to_string(),
            },
            None,
        ) {
            Ok(request) => request,
            Err(e) => {
                error!("[{}] bad run configuration: {}", run_id, e);
                return;
            }
        };

        info!(
            "[{}] module run '{}' starting -> {}",
            run_id,
            module_name,
            self.sink.target()
        );
        match self.engine.run(request, self.hooks()).await {
            Ok(run) => info!("[{}] module run finished: {}", run_id, run.status),
            Err(e) => error!("[{}] module run failed: {}", run_id, e),
        }
        // scratch drops here and removes the working directory
    }

    /// Run a playbook across the host list. The working directory is the
    /// playbook's parent so relative references keep resolving. Returns
    /// false on any fault, forwarding the error text through the sink.
    pub async fn run_playbook(
        &self,
        hosts: &HostList,
        playbook_path: &Path,
        extra_vars: Option<Map<String, Value>>,
    ) -> bool {
        let run_id = Uuid::new_v4().to_string();
        let inventory = match hosts.render_inventory(&self.config.inventory_group) {
            Ok(inventory) => inventory,
            Err(e) => {
                error!("[{}] host list rejected: {}", run_id, e);
                return false;
            }
        };
        let Some(file) = playbook_path.file_name().and_then(|f| f.to_str()) else {
            let message = format!("playbook path has no file name: {}", playbook_path.display());
            error!("[{}] {}", run_id, message);
            self.report_failure(&run_id, &message);
            return false;
        };
        let data_dir = match playbook_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let request = match self.build_request(
            &run_id,
            data_dir,
            None,
            inventory,
            Workload::Playbook {
                file: file.to_string(),
            },
            extra_vars,
        ) {
            Ok(request) => request,
            Err(e) => {
                error!("[{}] bad run configuration: {}", run_id, e);
                self.report_failure(&run_id, &e.to_string());
                return false;
            }
        };

        info!(
            "[{}] playbook run '{}' starting -> {}",
            run_id,
            file,
            self.sink.target()
        );
        match self.engine.run(request, self.hooks()).await {
            Ok(run) => {
                info!("[{}] playbook run finished: {}", run_id, run.status);
                true
            }
            Err(e) => {
                error!("[{}] playbook run failed: {}", run_id, e);
                self.report_failure(&run_id, &e.to_string());
                false
            }
        }
    }

    fn hooks(&self) -> Arc<dyn EngineHooks> {
        Arc::new(RunnerHooks {
            sink: Arc::clone(&self.sink),
            cancel_check: self.cancel_check.clone(),
        })
    }

    fn build_request(
        &self,
        run_id: &str,
        private_data_dir: PathBuf,
        host_pattern: Option<String>,
        inventory: String,
        workload: Workload,
        extra_vars: Option<Map<String, Value>>,
    ) -> Result<EngineRequest, ConfigError> {
        let escalation = self.config.escalation.enabled.then(|| PrivilegeEscalation {
            method: self.config.escalation.method.clone(),
            user: self.config.escalation.user.clone(),
            password: self.config.escalation.cached_password.clone(),
        });
        Ok(EngineRequest {
            ident: run_id.to_string(),
            private_data_dir,
            host_pattern,
            inventory,
            workload,
            extra_vars,
            forks: self.config.forks,
            timeout_secs: self.config.timeout_secs,
            verbosity: self.config.verbosity,
            ssh_args: self.config.ssh.to_argv()?,
            escalation,
        })
    }

    /// Best-effort error reporting through the bound sink
    fn report_failure(&self, run_id: &str, message: &str) {
        if let Err(e) = self.sink.deliver(message) {
            warn!(
                "[{}] could not report failure to {}: {}",
                run_id,
                self.sink.target(),
                e
            );
        }
    }
}

/// Hook bridge between the engine and the bound sink
struct RunnerHooks {
    sink: Arc<dyn EventSink>,
    cancel_check: Option<CancelCheck>,
}

impl EngineHooks for RunnerHooks {
    fn on_event(&self, event: &ExecutionEvent) {
        // delivery failures are logged, never propagated into the engine
        if let Err(e) = self.sink.accept(event) {
            warn!("event delivery to {} failed: {}", self.sink.target(), e);
        }
    }

    fn should_cancel(&self) -> bool {
        self.cancel_check
            .as_ref()
            .map(|check| check())
            .unwrap_or(false)
    }

    fn on_status(&self, status: &str) {
        debug!("engine status: {}", status);
    }

    fn on_finished(&self, status: EngineStatus) {
        info!("engine finished: {}", status);
    }
}
