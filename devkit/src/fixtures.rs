/*!
Canned fact documents and engine event payloads.

A fact-gathering run hands the normalizer a three-group result document
(success / failed / unreachable). [`FactDocumentBuilder`] assembles such
documents host by host, and [`sample_fact_bag`] provides one realistic
per-host result so most tests never write raw fact JSON by hand.
*/

use serde_json::{json, Map, Value};

/// One realistic per-host result object, fact bag included.
///
/// Shaped like the `setup` output of a small KVM guest: one virtio disk
/// counted at 50 binary gigabytes, one NIC, selinux disabled.
pub fn sample_fact_bag() -> Value {
    json!({
        "ansible_facts": {
            "ansible_processor": ["0", "AuthenticAMD", "AMD EPYC 7302 16-Core Processor"],
            "ansible_processor_count": 1,
            "ansible_processor_vcpus": 8,
            "ansible_processor_cores": 8,
            "ansible_devices": {
                "vda": {"sectors": "104857600", "sectorsize": "512"},
                "dm-0": {"sectors": "104849408", "sectorsize": "512"}
            },
            "ansible_product_serial": "QEMU-7f3a 00 11",
            "ansible_product_name": "Standard PC (Q35 + ICH9, 2009)",
            "ansible_system_vendor": "QEMU",
            "ansible_memtotal_mb": 16000,
            "ansible_swaptotal_mb": 2000,
            "ansible_distribution": "Debian",
            "ansible_distribution_version": "12.5",
            "ansible_userspace_bits": "64",
            "ansible_selinux": {"status": "disabled"},
            "ansible_hostname": "worker-3",
            "ansible_kernel": "6.1.0-18-amd64",
            "ansible_ens3": {
                "device": "ens3",
                "ipv4": {"address": "192.168.122.37"},
                "macaddress": "52:54:00:12:34:56",
                "module": "virtio_net",
                "mtu": 1500,
                "active": true
            }
        }
    })
}

/// Builds three-group result documents for normalizer tests and demos
#[derive(Debug, Clone, Default)]
pub struct FactDocumentBuilder {
    success: Map<String, Value>,
    failed: Map<String, Value>,
    unreachable: Map<String, Value>,
}

impl FactDocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reachable host carrying the canned [`sample_fact_bag`]
    pub fn success_host<S: Into<String>>(self, ip: S) -> Self {
        self.success_host_with(ip, sample_fact_bag())
    }

    /// Reachable host with a caller-provided result object
    pub fn success_host_with<S: Into<String>>(mut self, ip: S, result: Value) -> Self {
        self.success.insert(ip.into(), result);
        self
    }

    /// Host whose task failed; the normalizer drops these
    pub fn failed_host<S: Into<String>>(mut self, ip: S, msg: &str) -> Self {
        self.failed.insert(ip.into(), json!({"msg": msg}));
        self
    }

    /// Host the engine could not reach over SSH
    pub fn unreachable_host<S: Into<String>>(mut self, ip: S) -> Self {
        self.unreachable.insert(
            ip.into(),
            json!({
                "msg": "Failed to connect to the host via ssh",
                "unreachable": true
            }),
        );
        self
    }

    /// Assemble the result document
    pub fn build(self) -> Value {
        json!({
            "success": self.success,
            "failed": self.failed,
            "unreachable": self.unreachable
        })
    }
}

/// Canned engine event payloads, shaped like the real thing
pub struct EventPayloads;

impl EventPayloads {
    /// Payload carrying one line of command output
    pub fn stdout<S: Into<String>>(text: S) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("event".to_string(), Value::from("runner_on_ok"));
        payload.insert("stdout".to_string(), Value::from(text.into()));
        payload
    }

    /// Payload marking a phase transition
    pub fn status<S: Into<String>>(phase: S) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("status".to_string(), Value::from(phase.into()));
        payload
    }

    /// Payload with neither output nor status, carried through untouched
    pub fn counter(counter: u64) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert("counter".to_string(), Value::from(counter));
        payload
    }
}
