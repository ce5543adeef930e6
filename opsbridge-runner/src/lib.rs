/*!
Opsbridge runner - fleet execution control plane

Drives module and playbook runs over a pluggable execution engine, streams
per-event output to a configurable sink (live connection or background job
record), and normalizes fact-gathering output into flat CMDB records.

Quick tour:
- [`FleetRunner`] orchestrates runs against one [`EventSink`] destination
- [`OutputBinding`] picks that destination (live channel / job store)
- [`FactNormalizer`] and [`HardwareFactNormalizer`] flatten result documents
- [`MqttLiveChannel`] is the shipped live-channel transport
*/

pub mod config;
pub mod engine;
pub mod event;
pub mod facts;
pub mod inventory;
pub mod mqtt;
pub mod runner;
pub mod sink;

pub use config::{ConfigError, EscalationConfig, RunnerConfig, SshConfig};
pub use engine::{
    EngineError, EngineHooks, EngineRequest, EngineRun, EngineStatus, ExecutionEngine,
    PrivilegeEscalation, SshArgv, Workload,
};
pub use event::{EventKind, ExecutionEvent};
pub use facts::{
    FactNormalizer, FactsError, HardwareFactNormalizer, HardwareRecord, HostStatus,
    InterfaceRecord, NormalizedHostRecord,
};
pub use inventory::{HostEntry, HostList, HostSpec, InventoryError, DEFAULT_GROUP};
pub use mqtt::{MqttLiveChannel, OUTPUT_TOPIC};
pub use runner::{CancelCheck, FleetRunner};
pub use sink::{
    BackgroundSink, EventSink, JobStore, LiveChannel, LiveSink, OutputBinding, SinkError,
};
