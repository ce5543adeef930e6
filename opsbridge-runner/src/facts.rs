//! CMDB fact normalization
//!
//! A fact-gathering run returns a nested result document:
//!
//! ```text
//! { "success":     { "<ip>": { "ansible_facts": { ... } }, ... },
//!   "failed":      { "<ip>": { ... }, ... },
//!   "unreachable": { "<ip>": { ... }, ... } }
//! ```
//!
//! [`FactNormalizer`] flattens it into one [`NormalizedHostRecord`] per
//! success/unreachable host. Extraction is defensive: every field degrades
//! independently when the bag is missing or mistyped, and no single host can
//! abort the batch. [`HardwareFactNormalizer`] is the narrow sibling that
//! lifts the detailed memory/disk blocks verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Block-device key prefixes that count toward disk capacity
const BLOCK_DEVICE_PREFIXES: [&str; 4] = ["sd", "hd", "ss", "vd"];

/// NIC fact keys look like `ansible_` + prefix + digits (`ansible_eth0`)
const NIC_PREFIXES: [&str; 5] = ["eth", "bind", "eno", "ens", "em"];

const FACTS_KEY: &str = "ansible_facts";
const GROUP_SUCCESS: &str = "success";
const GROUP_FAILED: &str = "failed";
const GROUP_UNREACHABLE: &str = "unreachable";

/// Fallback when an interface carries no usable IPv4 address
const ADDRESS_UNKNOWN: &str = "unknown";

/// Result document problems that prevent normalization entirely
#[derive(Debug, thiserror::Error)]
pub enum FactsError {
    #[error("result document is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("result document root must be an object")]
    NotAnObject,
}

/// Reachability of a host in the result document, serialized as 0/1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    Reachable,
    Unreachable,
}

impl HostStatus {
    pub fn code(self) -> u8 {
        match self {
            Self::Reachable => 0,
            Self::Unreachable => 1,
        }
    }
}

impl Serialize for HostStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for HostStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Self::Reachable),
            1 => Ok(Self::Unreachable),
            other => Err(serde::de::Error::custom(format!(
                "invalid host status code {}",
                other
            ))),
        }
    }
}

/// One network interface from the fact bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    /// IPv4 address, or the literal "unknown" when the bag has none
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macaddress: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtu: Option<u64>,
    pub active: bool,
}

/// Flat inventory record for one host. Degraded fields are omitted from the
/// serialized form rather than emitted as nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedHostRecord {
    pub ip: String,
    pub status: HostStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
    /// Memory in decimal gigabytes (megabytes / 1000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_total: Option<f64>,
    /// Whole binary gigabytes across block devices, truncated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcpu_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_core: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selinux: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub swap: Option<f64>,
    #[serde(rename = "networkInterfaces", default, skip_serializing_if = "Vec::is_empty")]
    pub network_interfaces: Vec<InterfaceRecord>,
}

impl NormalizedHostRecord {
    /// Minimal record for a host the engine could not reach
    fn unreachable<S: Into<String>>(ip: S) -> Self {
        Self {
            ip: ip.into(),
            status: HostStatus::Unreachable,
            serial: None,
            cpu: None,
            ram_total: None,
            disk_total: None,
            system: None,
            model: None,
            cpu_number: None,
            vcpu_number: None,
            cpu_core: None,
            hostname: None,
            kernel: None,
            manufacturer: None,
            selinux: None,
            swap: None,
            network_interfaces: Vec::new(),
        }
    }
}

/// Flattens raw fact documents into inventory records
pub struct FactNormalizer;

impl FactNormalizer {
    /// Parse JSON text first, then normalize
    pub fn normalize_str(raw: &str) -> Result<Vec<NormalizedHostRecord>, FactsError> {
        let document: Value = serde_json::from_str(raw)?;
        Self::normalize(&document)
    }

    /// One record per success/unreachable host; failed hosts yield none
    pub fn normalize(document: &Value) -> Result<Vec<NormalizedHostRecord>, FactsError> {
        let groups = document.as_object().ok_or(FactsError::NotAnObject)?;
        let mut records = Vec::new();
        for (group, hosts) in groups {
            let Some(hosts) = hosts.as_object() else {
                debug!("skipping non-object result group '{}'", group);
                continue;
            };
            match group.as_str() {
                GROUP_SUCCESS => {
                    for (ip, result) in hosts {
                        records.push(Self::reachable_record(ip, result));
                    }
                }
                GROUP_UNREACHABLE => {
                    for ip in hosts.keys() {
                        records.push(NormalizedHostRecord::unreachable(ip.as_str()));
                    }
                }
                GROUP_FAILED => {
                    debug!("dropping {} failed host(s) from normalization", hosts.len());
                }
                other => {
                    debug!("ignoring unknown result group '{}'", other);
                }
            }
        }
        Ok(records)
    }

    fn reachable_record(ip: &str, result: &Value) -> NormalizedHostRecord {
        let bag = FactBag::from_result(result);
        NormalizedHostRecord {
            ip: ip.to_string(),
            status: HostStatus::Reachable,
            serial: bag.str_value("ansible_product_serial").and_then(first_token),
            cpu: bag.processor_label(),
            ram_total: bag.u64_value("ansible_memtotal_mb").map(mb_to_decimal_gb),
            disk_total: bag.disk_total_gb(),
            system: bag.system_label(),
            model: bag.str_value("ansible_product_name").map(before_colon),
            cpu_number: bag.u64_value("ansible_processor_count"),
            vcpu_number: bag.u64_value("ansible_processor_vcpus"),
            cpu_core: bag.u64_value("ansible_processor_cores"),
            hostname: bag.str_value("ansible_hostname").map(str::to_string),
            kernel: bag.stringified("ansible_kernel"),
            manufacturer: bag.str_value("ansible_system_vendor").map(str::to_string),
            selinux: Some(bag.selinux_status()),
            swap: bag.u64_value("ansible_swaptotal_mb").map(mb_to_decimal_gb),
            network_interfaces: bag.network_interfaces(),
        }
    }
}

/// Verbatim detailed memory/disk blocks for one reachable host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareRecord {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_info: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_info: Option<Value>,
}

/// Narrow extractor for the pre-aggregated hardware detail blocks
pub struct HardwareFactNormalizer;

impl HardwareFactNormalizer {
    /// Parse JSON text first, then normalize
    pub fn normalize_str(raw: &str) -> Result<Vec<HardwareRecord>, FactsError> {
        let document: Value = serde_json::from_str(raw)?;
        Self::normalize(&document)
    }

    /// Success hosts only; absent blocks are omitted rather than null
    pub fn normalize(document: &Value) -> Result<Vec<HardwareRecord>, FactsError> {
        let groups = document.as_object().ok_or(FactsError::NotAnObject)?;
        let mut records = Vec::new();
        let Some(hosts) = groups.get(GROUP_SUCCESS).and_then(Value::as_object) else {
            return Ok(records);
        };
        for (ip, result) in hosts {
            let bag = FactBag::from_result(result);
            records.push(HardwareRecord {
                ip: ip.to_string(),
                mem_info: bag.get("ansible_mem_detailed_info").cloned(),
                disk_info: bag.get("ansible_disk_detailed_info").cloned(),
            });
        }
        Ok(records)
    }
}

/// Per-field defensive accessor over one host's fact bag
struct FactBag<'a> {
    facts: Option<&'a Map<String, Value>>,
}

impl<'a> FactBag<'a> {
    fn from_result(result: &'a Value) -> Self {
        let facts = result.get(FACTS_KEY).and_then(Value::as_object);
        if facts.is_none() {
            debug!("host result carries no fact bag");
        }
        Self { facts }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.facts?.get(key)
    }

    fn str_value(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Unsigned integers that may arrive as numbers or numeric strings
    fn u64_value(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(value_as_u64)
    }

    /// Strings pass through, numbers stringify
    fn stringified(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    /// Last entry of the processor list with the `@` frequency marker removed
    fn processor_label(&self) -> Option<String> {
        let processors = self.get("ansible_processor")?.as_array()?;
        let label = processors.last()?.as_str()?;
        Some(label.replace('@', ""))
    }

    /// `distribution version userspace_bits`, all three parts required
    fn system_label(&self) -> Option<String> {
        let distribution = self.str_value("ansible_distribution")?;
        let version = self.str_value("ansible_distribution_version")?;
        let bits = self.str_value("ansible_userspace_bits")?;
        Some(format!("{} {} {}", distribution, version, bits))
    }

    /// Selinux status string, or "disabled" when the field is absent/falsy
    fn selinux_status(&self) -> String {
        match self.get("ansible_selinux") {
            Some(value) if value_truthy(value) => value
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("disabled")
                .to_string(),
            _ => "disabled".to_string(),
        }
    }

    /// Whole binary gigabytes across matching block devices, truncated once
    fn disk_total_gb(&self) -> Option<u64> {
        let devices = self.get("ansible_devices")?.as_object()?;
        let mut bytes: u64 = 0;
        for (name, device) in devices {
            if !BLOCK_DEVICE_PREFIXES.iter().any(|p| name.starts_with(p)) {
                continue;
            }
            let sectors = device.get("sectors").and_then(value_as_u64);
            let sector_size = device.get("sectorsize").and_then(value_as_u64);
            match (sectors, sector_size) {
                (Some(sectors), Some(sector_size)) => {
                    bytes = bytes.saturating_add(sectors.saturating_mul(sector_size));
                }
                _ => debug!("device '{}' has no usable sector geometry", name),
            }
        }
        Some(bytes / (1024 * 1024 * 1024))
    }

    /// NIC records in fact-bag discovery order
    fn network_interfaces(&self) -> Vec<InterfaceRecord> {
        let Some(facts) = self.facts else {
            return Vec::new();
        };
        let mut interfaces = Vec::new();
        for (key, value) in facts {
            if !is_nic_key(key) {
                continue;
            }
            let Some(nic) = value.as_object() else {
                debug!("skipping non-object interface fact '{}'", key);
                continue;
            };
            interfaces.push(InterfaceRecord {
                device: nic.get("device").and_then(Value::as_str).map(str::to_string),
                address: nic
                    .get("ipv4")
                    .and_then(|v| v.get("address"))
                    .and_then(Value::as_str)
                    .unwrap_or(ADDRESS_UNKNOWN)
                    .to_string(),
                macaddress: nic
                    .get("macaddress")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                module: nic.get("module").and_then(Value::as_str).map(str::to_string),
                mtu: nic.get("mtu").and_then(value_as_u64),
                active: nic.get("active").map(value_truthy).unwrap_or(false),
            });
        }
        interfaces
    }
}

/// Python-style truthiness: null, false, zero, empty strings and empty
/// containers are falsy
fn value_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(members) => !members.is_empty(),
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn first_token(text: &str) -> Option<String> {
    text.split_whitespace().next().map(str::to_string)
}

fn before_colon(text: &str) -> String {
    match text.split_once(':') {
        Some((head, _)) => head.to_string(),
        None => text.to_string(),
    }
}

fn mb_to_decimal_gb(mb: u64) -> f64 {
    mb as f64 / 1000.0
}

fn is_nic_key(key: &str) -> bool {
    let Some(rest) = key.strip_prefix("ansible_") else {
        return false;
    };
    NIC_PREFIXES.iter().any(|prefix| {
        rest.strip_prefix(prefix)
            .map(|tail| tail.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_bag() -> Value {
        json!({
            "ansible_processor": ["0", "GenuineIntel", "Intel(R) Xeon(R) CPU E5-2680 v4 @ 2.40GHz"],
            "ansible_devices": {
                "sda": {"sectors": "2097152", "sectorsize": "512"},
                "sdb": {"sectors": 2097152, "sectorsize": 512},
                "dm-0": {"sectors": "999999999", "sectorsize": "512"}
            },
            "ansible_product_serial": "VMware-42 1a f0 99",
            "ansible_product_name": "VMware Virtual Platform: v2",
            "ansible_memtotal_mb": 8000,
            "ansible_swaptotal_mb": 0,
            "ansible_distribution": "CentOS",
            "ansible_distribution_version": "7.9",
            "ansible_userspace_bits": "64",
            "ansible_selinux": {"status": "enabled"},
            "ansible_processor_count": 2,
            "ansible_processor_vcpus": 4,
            "ansible_processor_cores": 2,
            "ansible_hostname": "cmdb-probe-1",
            "ansible_kernel": "3.10.0-1160.el7.x86_64",
            "ansible_system_vendor": "VMware, Inc.",
            "ansible_env": {"HOME": "/root"},
            "ansible_eth0": {
                "device": "eth0",
                "ipv4": {"address": "10.0.0.1"},
                "macaddress": "00:50:56:aa:bb:cc",
                "module": "vmxnet3",
                "mtu": 1500,
                "active": true
            },
            "ansible_eth1": {
                "device": "eth1",
                "macaddress": "00:50:56:aa:bb:cd",
                "module": "vmxnet3",
                "mtu": 1500,
                "active": false
            }
        })
    }

    fn document_with(bag: Value) -> Value {
        json!({
            "success": {"10.0.0.1": {"ansible_facts": bag}},
            "unreachable": {"10.0.0.2": {}}
        })
    }

    #[test]
    fn test_success_and_unreachable_counts() {
        let document = json!({
            "success": {
                "10.0.0.1": {"ansible_facts": full_bag()},
                "10.0.0.3": {"ansible_facts": full_bag()}
            },
            "failed": {"10.0.0.4": {"msg": "auth failure"}},
            "unreachable": {"10.0.0.2": {}}
        });
        let records = FactNormalizer::normalize(&document).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(
            records
                .iter()
                .filter(|r| r.status == HostStatus::Reachable)
                .count(),
            2
        );
        assert!(records.iter().all(|r| r.ip != "10.0.0.4"));
    }

    #[test]
    fn test_full_field_extraction() {
        let records = FactNormalizer::normalize(&document_with(full_bag())).unwrap();
        let host = records.iter().find(|r| r.ip == "10.0.0.1").unwrap();

        assert_eq!(host.status, HostStatus::Reachable);
        assert_eq!(
            host.cpu.as_deref(),
            Some("Intel(R) Xeon(R) CPU E5-2680 v4  2.40GHz")
        );
        assert_eq!(host.serial.as_deref(), Some("VMware-42"));
        assert_eq!(host.model.as_deref(), Some("VMware Virtual Platform"));
        assert_eq!(host.system.as_deref(), Some("CentOS 7.9 64"));
        assert_eq!(host.ram_total, Some(8.0));
        assert_eq!(host.swap, Some(0.0));
        assert_eq!(host.disk_total, Some(2));
        assert_eq!(host.selinux.as_deref(), Some("enabled"));
        assert_eq!(host.cpu_number, Some(2));
        assert_eq!(host.vcpu_number, Some(4));
        assert_eq!(host.cpu_core, Some(2));
        assert_eq!(host.hostname.as_deref(), Some("cmdb-probe-1"));
        assert_eq!(host.kernel.as_deref(), Some("3.10.0-1160.el7.x86_64"));
        assert_eq!(host.manufacturer.as_deref(), Some("VMware, Inc."));
    }

    #[test]
    fn test_interfaces_keep_discovery_order_and_fall_back() {
        let records = FactNormalizer::normalize(&document_with(full_bag())).unwrap();
        let host = records.iter().find(|r| r.ip == "10.0.0.1").unwrap();

        assert_eq!(host.network_interfaces.len(), 2);
        let eth0 = &host.network_interfaces[0];
        assert_eq!(eth0.device.as_deref(), Some("eth0"));
        assert_eq!(eth0.address, "10.0.0.1");
        assert!(eth0.active);
        let eth1 = &host.network_interfaces[1];
        assert_eq!(eth1.device.as_deref(), Some("eth1"));
        assert_eq!(eth1.address, "unknown");
        assert!(!eth1.active);
    }

    #[test]
    fn test_unreachable_record_is_minimal() {
        let records = FactNormalizer::normalize(&document_with(full_bag())).unwrap();
        let host = records.iter().find(|r| r.ip == "10.0.0.2").unwrap();

        assert_eq!(host.status, HostStatus::Unreachable);
        let value = serde_json::to_value(host).unwrap();
        assert_eq!(value, json!({"ip": "10.0.0.2", "status": 1}));
    }

    #[test]
    fn test_missing_processor_list_degrades_field_only() {
        let mut broken = full_bag();
        broken.as_object_mut().unwrap().remove("ansible_processor");
        let document = json!({
            "success": {
                "10.0.0.1": {"ansible_facts": broken},
                "10.0.0.3": {"ansible_facts": full_bag()}
            }
        });

        let records = FactNormalizer::normalize(&document).unwrap();
        assert_eq!(records.len(), 2);
        let degraded = records.iter().find(|r| r.ip == "10.0.0.1").unwrap();
        assert!(degraded.cpu.is_none());
        assert_eq!(degraded.ram_total, Some(8.0));
        let intact = records.iter().find(|r| r.ip == "10.0.0.3").unwrap();
        assert!(intact.cpu.is_some());
    }

    #[test]
    fn test_selinux_fallbacks() {
        let mut bag = full_bag();
        bag.as_object_mut().unwrap().remove("ansible_selinux");
        let records = FactNormalizer::normalize(&document_with(bag)).unwrap();
        let host = records.iter().find(|r| r.ip == "10.0.0.1").unwrap();
        assert_eq!(host.selinux.as_deref(), Some("disabled"));

        let mut bag = full_bag();
        bag.as_object_mut()
            .unwrap()
            .insert("ansible_selinux".to_string(), json!({}));
        let records = FactNormalizer::normalize(&document_with(bag)).unwrap();
        let host = records.iter().find(|r| r.ip == "10.0.0.1").unwrap();
        assert_eq!(host.selinux.as_deref(), Some("disabled"));
    }

    #[test]
    fn test_empty_result_keeps_host_with_defaults() {
        let document = json!({"success": {"10.0.0.9": {}}});
        let records = FactNormalizer::normalize(&document).unwrap();

        assert_eq!(records.len(), 1);
        let host = &records[0];
        assert_eq!(host.ip, "10.0.0.9");
        assert_eq!(host.status, HostStatus::Reachable);
        assert!(host.cpu.is_none());
        assert!(host.disk_total.is_none());
        assert_eq!(host.selinux.as_deref(), Some("disabled"));
        assert!(host.network_interfaces.is_empty());
    }

    #[test]
    fn test_document_must_be_an_object() {
        assert!(matches!(
            FactNormalizer::normalize(&json!([1, 2])),
            Err(FactsError::NotAnObject)
        ));
        assert!(matches!(
            FactNormalizer::normalize_str("not json"),
            Err(FactsError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_nic_key_matching() {
        assert!(is_nic_key("ansible_eth0"));
        assert!(is_nic_key("ansible_ens192"));
        assert!(is_nic_key("ansible_eno16777736"));
        assert!(is_nic_key("ansible_em1"));
        assert!(is_nic_key("ansible_bind0"));
        assert!(!is_nic_key("ansible_env"));
        assert!(!is_nic_key("ansible_ens"));
        assert!(!is_nic_key("ansible_lo"));
        assert!(!is_nic_key("eth0"));
    }

    #[test]
    fn test_hardware_blocks_are_lifted_verbatim() {
        let mem = json!({"MemTotal": "8011588 kB", "SwapTotal": "0 kB"});
        let disk = json!({"sda": {"size": "20G", "vendor": "VMware"}});
        let document = json!({
            "success": {
                "10.0.0.1": {"ansible_facts": {
                    "ansible_mem_detailed_info": mem.clone(),
                    "ansible_disk_detailed_info": disk.clone()
                }},
                "10.0.0.5": {"ansible_facts": {}}
            },
            "unreachable": {"10.0.0.2": {}}
        });

        let records = HardwareFactNormalizer::normalize(&document).unwrap();
        assert_eq!(records.len(), 2);
        let detailed = records.iter().find(|r| r.ip == "10.0.0.1").unwrap();
        assert_eq!(detailed.mem_info.as_ref(), Some(&mem));
        assert_eq!(detailed.disk_info.as_ref(), Some(&disk));
        let bare = records.iter().find(|r| r.ip == "10.0.0.5").unwrap();
        assert!(bare.mem_info.is_none());
        assert!(bare.disk_info.is_none());
    }
}
