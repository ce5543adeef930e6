/*!
Development kit for the opsbridge runner.

Everything in here runs entirely in memory, so runner integrations can be
developed and tested without Ansible, a broker or a database anywhere:
- [`engine_stub::StubEngine`]: scripted engine that replays canned events
- [`sink_stubs::RecordingChannel`] / [`sink_stubs::MemoryJobStore`]: output
  doubles that record what the runner delivered
- [`fixtures`]: canned fact documents and engine event payloads
- [`test_utils::RunnerHarness`]: the above, pre-wired for one test
*/

pub mod engine_stub;
pub mod fixtures;
pub mod sink_stubs;
pub mod test_utils;

pub use engine_stub::{RecordedRequest, StubEngine};
pub use fixtures::{sample_fact_bag, EventPayloads, FactDocumentBuilder};
pub use sink_stubs::{MemoryJobStore, RecordedMessage, RecordingChannel, StoredResult};
pub use test_utils::{single_host, RunnerHarness};
