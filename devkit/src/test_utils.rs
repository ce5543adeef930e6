/*!
Ready-wired test harness.

[`RunnerHarness`] bundles a scripted engine with both output doubles so a
test can run modules and playbooks end to end and assert on what was
streamed or stored, with nothing external in the loop.
*/

use std::sync::Arc;

use opsbridge_runner::{FleetRunner, HostList, HostSpec, OutputBinding};

use crate::engine_stub::{RecordedRequest, StubEngine};
use crate::sink_stubs::{MemoryJobStore, RecordingChannel};

/// One-host credential list for quick tests
pub fn single_host<S: Into<String>>(ip: S) -> HostList {
    HostList::specs(vec![HostSpec {
        ip: ip.into(),
        username: "ansible".to_string(),
        password: "ansible".to_string(),
    }])
}

/// Scripted engine plus both output doubles, wired for one test
pub struct RunnerHarness {
    pub engine: StubEngine,
    pub channel: RecordingChannel,
    pub store: MemoryJobStore,
}

impl RunnerHarness {
    /// Harness around a configured [`StubEngine`]
    pub fn new(engine: StubEngine) -> Self {
        env_logger::try_init().ok(); // logging for tests, first caller wins
        Self {
            engine,
            channel: RecordingChannel::new(),
            store: MemoryJobStore::new(),
        }
    }

    /// Runner streaming to the recording channel under one correlation id
    pub fn live_runner<S: Into<String>>(&self, correlation_id: S) -> FleetRunner {
        FleetRunner::new(
            Arc::new(self.engine.clone()),
            OutputBinding::live(Arc::new(self.channel.clone()), correlation_id),
        )
    }

    /// Runner writing to the in-memory job store under one job id
    pub fn background_runner<S: Into<String>>(&self, job_id: S) -> FleetRunner {
        FleetRunner::new(
            Arc::new(self.engine.clone()),
            OutputBinding::background(Arc::new(self.store.clone()), job_id),
        )
    }

    /// Texts streamed over the live channel, in delivery order
    pub fn streamed_texts(&self) -> Vec<String> {
        self.channel.texts()
    }

    /// Texts stored for one background job, oldest first
    pub fn stored_texts(&self, job_id: &str) -> Vec<String> {
        self.store.texts_for(job_id)
    }

    /// Last request the engine received, if any run got that far
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.engine.last_request()
    }

    /// Bail-style check that the live channel saw exactly these texts
    pub fn expect_streamed(&self, expected: &[&str]) -> anyhow::Result<()> {
        let actual = self.streamed_texts();
        if actual.iter().map(String::as_str).collect::<Vec<_>>() != expected {
            anyhow::bail!(
                "live channel mismatch: expected {:?}, got {:?}",
                expected,
                actual
            );
        }
        Ok(())
    }

    /// Bail-style check that one job's record holds exactly these texts
    pub fn expect_stored(&self, job_id: &str, expected: &[&str]) -> anyhow::Result<()> {
        let actual = self.stored_texts(job_id);
        if actual.iter().map(String::as_str).collect::<Vec<_>>() != expected {
            anyhow::bail!(
                "job {} record mismatch: expected {:?}, got {:?}",
                job_id,
                expected,
                actual
            );
        }
        Ok(())
    }
}
