//! Host lists and inventory rendering
//!
//! A run targets either a single raw host token or a sequence of entries,
//! each a credentialed spec or a bare token. The list renders to the
//! inventory text the engine consumes:
//!
//! ```text
//! [module]
//! 10.0.0.1 ansible_ssh_user=deploy ansible_ssh_pass=secret
//! 10.0.0.2
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default inventory group name
pub const DEFAULT_GROUP: &str = "module";

/// Malformed or empty host material. The run does not proceed.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("host list must be a host token or a sequence of host entries: {0}")]
    HostFormat(String),
    #[error("host list is empty")]
    Empty,
    #[error("host token is blank")]
    BlankToken,
}

/// One credentialed target host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub ip: String,
    pub username: String,
    pub password: String,
}

/// A host-list entry: full credentials or a raw pattern token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostEntry {
    Spec(HostSpec),
    Token(String),
}

/// Duck-typed host list: one token, or a sequence of entries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostList {
    Single(String),
    Many(Vec<HostEntry>),
}

impl HostList {
    /// Parse a host list from loose JSON (API payloads, job parameters)
    pub fn from_value(value: &Value) -> Result<Self, InventoryError> {
        serde_json::from_value(value.clone()).map_err(|e| InventoryError::HostFormat(e.to_string()))
    }

    /// Convenience list of credentialed specs
    pub fn specs(specs: Vec<HostSpec>) -> Self {
        Self::Many(specs.into_iter().map(HostEntry::Spec).collect())
    }

    /// Convenience list of raw tokens
    pub fn tokens<S: Into<String>>(tokens: Vec<S>) -> Self {
        Self::Many(tokens.into_iter().map(|t| HostEntry::Token(t.into())).collect())
    }

    /// Render the inventory text the engine consumes. Deterministic for a
    /// given list: same input, same bytes.
    pub fn render_inventory(&self, group: &str) -> Result<String, InventoryError> {
        let mut text = format!("[{}]\n", group);
        match self {
            Self::Single(token) => {
                push_token(&mut text, token)?;
            }
            Self::Many(entries) => {
                if entries.is_empty() {
                    return Err(InventoryError::Empty);
                }
                for entry in entries {
                    match entry {
                        HostEntry::Spec(spec) => {
                            text.push_str(&format!(
                                "{} ansible_ssh_user={} ansible_ssh_pass={}\n",
                                spec.ip, spec.username, spec.password
                            ));
                        }
                        HostEntry::Token(token) => push_token(&mut text, token)?,
                    }
                }
            }
        }
        Ok(text)
    }
}

impl From<Vec<HostSpec>> for HostList {
    fn from(specs: Vec<HostSpec>) -> Self {
        Self::specs(specs)
    }
}

fn push_token(text: &mut String, token: &str) -> Result<(), InventoryError> {
    if token.trim().is_empty() {
        return Err(InventoryError::BlankToken);
    }
    text.push_str(token);
    text.push('\n');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn two_specs() -> HostList {
        HostList::specs(vec![
            HostSpec {
                ip: "10.0.0.1".into(),
                username: "deploy".into(),
                password: "secret".into(),
            },
            HostSpec {
                ip: "10.0.0.2".into(),
                username: "ops".into(),
                password: "hunter2".into(),
            },
        ])
    }

    #[test]
    fn test_credentialed_rendering() {
        let text = two_specs().render_inventory(DEFAULT_GROUP).unwrap();
        assert_eq!(
            text,
            "[module]\n\
             10.0.0.1 ansible_ssh_user=deploy ansible_ssh_pass=secret\n\
             10.0.0.2 ansible_ssh_user=ops ansible_ssh_pass=hunter2\n"
        );
    }

    #[test]
    fn test_rendering_is_idempotent() {
        let list = two_specs();
        let first = list.render_inventory(DEFAULT_GROUP).unwrap();
        let second = list.render_inventory(DEFAULT_GROUP).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_token_lines_and_single_token() {
        let list = HostList::tokens(vec!["127.0.0.1", "172.17.32.6"]);
        assert_eq!(
            list.render_inventory("lab").unwrap(),
            "[lab]\n127.0.0.1\n172.17.32.6\n"
        );

        let single = HostList::Single("web[01:04].example.net".to_string());
        assert_eq!(
            single.render_inventory(DEFAULT_GROUP).unwrap(),
            "[module]\nweb[01:04].example.net\n"
        );
    }

    #[test]
    fn test_mixed_entries_from_json() {
        let value = json!([
            {"ip": "10.0.0.1", "username": "deploy", "password": "secret"},
            "badge-printer.lan"
        ]);
        let list = HostList::from_value(&value).unwrap();
        let text = list.render_inventory(DEFAULT_GROUP).unwrap();
        assert!(text.contains("10.0.0.1 ansible_ssh_user=deploy"));
        assert!(text.ends_with("badge-printer.lan\n"));
    }

    #[test]
    fn test_malformed_lists_are_rejected() {
        assert!(matches!(
            HostList::from_value(&json!(17)),
            Err(InventoryError::HostFormat(_))
        ));
        assert!(matches!(
            HostList::from_value(&json!([{"ip": "10.0.0.1"}])),
            Err(InventoryError::HostFormat(_))
        ));
        assert!(matches!(
            HostList::Many(vec![]).render_inventory(DEFAULT_GROUP),
            Err(InventoryError::Empty)
        ));
        assert!(matches!(
            HostList::Single("   ".to_string()).render_inventory(DEFAULT_GROUP),
            Err(InventoryError::BlankToken)
        ));
    }
}
