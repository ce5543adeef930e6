/*!
In-memory output destinations.

[`RecordingChannel`] stands in for the live MQTT channel and
[`MemoryJobStore`] for the background job table. Both record what the
runner delivered, and both can be flipped into a failing state to
exercise the delivery-error paths.
*/

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use opsbridge_runner::{JobStore, LiveChannel, SinkError};
use serde::Serialize;

/// One message a [`RecordingChannel`] accepted
#[derive(Debug, Clone, Serialize)]
pub struct RecordedMessage {
    pub correlation_id: String,
    pub text: String,
}

/// Live-channel double that records instead of publishing.
///
/// Clones share the recording, so a test can keep one handle and hand
/// another to the runner.
#[derive(Clone, Default)]
pub struct RecordingChannel {
    messages: Arc<Mutex<Vec<RecordedMessage>>>,
    closed: Arc<AtomicBool>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later send fail, the way a dropped connection would
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<RecordedMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Delivered texts only, in delivery order
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.text.clone())
            .collect()
    }
}

impl LiveChannel for RecordingChannel {
    fn send_message(&self, text: &str, correlation_id: &str) -> Result<(), SinkError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SinkError::Channel("connection closed".to_string()));
        }
        self.messages.lock().unwrap().push(RecordedMessage {
            correlation_id: correlation_id.to_string(),
            text: text.to_string(),
        });
        log::info!("📡 [STUB] live message for {}: {} bytes", correlation_id, text.len());
        Ok(())
    }
}

/// One stored result row with its insertion time
#[derive(Debug, Clone, Serialize)]
pub struct StoredResult {
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Job-store double keeping result rows per job id.
///
/// Clones share the rows, same as [`RecordingChannel`].
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    entries: Arc<Mutex<HashMap<String, Vec<StoredResult>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later insert fail, the way a lost database would
    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub fn results_for(&self, job_id: &str) -> Vec<StoredResult> {
        self.entries
            .lock()
            .unwrap()
            .get(job_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored texts for one job, oldest first
    pub fn texts_for(&self, job_id: &str) -> Vec<String> {
        self.results_for(job_id)
            .into_iter()
            .map(|r| r.text)
            .collect()
    }

    pub fn job_ids(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }
}

impl JobStore for MemoryJobStore {
    fn insert_result(&self, job_id: &str, text: &str) -> Result<(), SinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SinkError::Store {
                job_id: job_id.to_string(),
                reason: "writes disabled".to_string(),
            });
        }
        self.entries
            .lock()
            .unwrap()
            .entry(job_id.to_string())
            .or_default()
            .push(StoredResult {
                text: text.to_string(),
                at: Utc::now(),
            });
        log::info!("🗄️ [STUB] stored result for job {}", job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_records_text_with_correlation() {
        let channel = RecordingChannel::new();
        channel.send_message("line one", "conv-1").unwrap();
        channel.send_message("line two", "conv-1").unwrap();

        let messages = channel.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].correlation_id, "conv-1");
        assert_eq!(channel.texts(), vec!["line one", "line two"]);
    }

    #[test]
    fn test_closed_channel_rejects_sends() {
        let channel = RecordingChannel::new();
        channel.close();

        let err = channel.send_message("lost", "conv-2").unwrap_err();
        assert!(err.to_string().contains("connection closed"));
        assert!(channel.messages().is_empty());
    }

    #[test]
    fn test_store_keeps_rows_per_job() {
        let store = MemoryJobStore::new();
        store.insert_result("job-1", "first").unwrap();
        store.insert_result("job-1", "second").unwrap();
        store.insert_result("job-2", "other").unwrap();

        assert_eq!(store.texts_for("job-1"), vec!["first", "second"]);
        assert_eq!(store.texts_for("job-2"), vec!["other"]);
        assert!(store.texts_for("job-3").is_empty());
        assert_eq!(store.job_ids().len(), 2);
        assert!(store.results_for("job-1")[0].at <= Utc::now());
    }

    #[test]
    fn test_failing_store_names_the_job() {
        let store = MemoryJobStore::new();
        store.fail_writes();

        let err = store.insert_result("job-9", "dropped").unwrap_err();
        assert!(err.to_string().contains("job-9"));
        assert!(store.texts_for("job-9").is_empty());
    }
}
