//! Event sinks
//!
//! The runner routes every engine event through exactly one sink, chosen at
//! construction via [`OutputBinding`]:
//! - [`LiveSink`] streams output text to a live connection, tagged with the
//!   conversation's correlation id
//! - [`BackgroundSink`] appends output text to a durable record keyed by a
//!   background job id
//!
//! Sinks only care about output text. The default [`EventSink::accept`]
//! filters stdout events into [`EventSink::deliver`] and ignores the rest;
//! status and finished information is the runner's concern, not the sink's.

use std::sync::Arc;

use crate::event::ExecutionEvent;

/// Delivery failure at a sink destination. Logged by the caller, never fatal
/// to a running execution.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("live channel rejected message: {0}")]
    Channel(String),
    #[error("job store rejected write for job {job_id}: {reason}")]
    Store { job_id: String, reason: String },
}

/// Live connection collaborator. Implementations serialize their own writes.
pub trait LiveChannel: Send + Sync {
    fn send_message(&self, text: &str, correlation_id: &str) -> Result<(), SinkError>;
}

/// Durable job record collaborator. Implementations serialize their own writes.
pub trait JobStore: Send + Sync {
    fn insert_result(&self, job_id: &str, text: &str) -> Result<(), SinkError>;
}

/// Destination for the output text of a running execution
pub trait EventSink: Send + Sync {
    /// Destination label for log lines, e.g. `live:conv-7` or `job:42`
    fn target(&self) -> String;

    /// Push one piece of output text to the destination
    fn deliver(&self, text: &str) -> Result<(), SinkError>;

    /// Route one engine event: stdout payloads are delivered, everything
    /// else is ignored at this layer
    fn accept(&self, event: &ExecutionEvent) -> Result<(), SinkError> {
        match event.stdout_text() {
            Some(text) => self.deliver(&text),
            None => Ok(()),
        }
    }
}

/// Streams output to an open live connection
pub struct LiveSink {
    channel: Arc<dyn LiveChannel>,
    correlation_id: String,
}

impl LiveSink {
    pub fn new<S: Into<String>>(channel: Arc<dyn LiveChannel>, correlation_id: S) -> Self {
        Self {
            channel,
            correlation_id: correlation_id.into(),
        }
    }
}

impl EventSink for LiveSink {
    fn target(&self) -> String {
        format!("live:{}", self.correlation_id)
    }

    fn deliver(&self, text: &str) -> Result<(), SinkError> {
        self.channel.send_message(text, &self.correlation_id)
    }
}

/// Appends output to a durable record keyed by job id
pub struct BackgroundSink {
    store: Arc<dyn JobStore>,
    job_id: String,
}

impl BackgroundSink {
    pub fn new<S: Into<String>>(store: Arc<dyn JobStore>, job_id: S) -> Self {
        Self {
            store,
            job_id: job_id.into(),
        }
    }
}

impl EventSink for BackgroundSink {
    fn target(&self) -> String {
        format!("job:{}", self.job_id)
    }

    fn deliver(&self, text: &str) -> Result<(), SinkError> {
        self.store.insert_result(&self.job_id, text)
    }
}

/// Output destination descriptor, fixed once per runner
pub enum OutputBinding {
    Live {
        channel: Arc<dyn LiveChannel>,
        correlation_id: String,
    },
    Background {
        store: Arc<dyn JobStore>,
        job_id: String,
    },
}

impl OutputBinding {
    pub fn live<S: Into<String>>(channel: Arc<dyn LiveChannel>, correlation_id: S) -> Self {
        Self::Live {
            channel,
            correlation_id: correlation_id.into(),
        }
    }

    pub fn background<S: Into<String>>(store: Arc<dyn JobStore>, job_id: S) -> Self {
        Self::Background {
            store,
            job_id: job_id.into(),
        }
    }

    /// Materialize the sink this binding describes
    pub fn into_sink(self) -> Arc<dyn EventSink> {
        match self {
            Self::Live {
                channel,
                correlation_id,
            } => Arc::new(LiveSink::new(channel, correlation_id)),
            Self::Background { store, job_id } => Arc::new(BackgroundSink::new(store, job_id)),
        }
    }
}
