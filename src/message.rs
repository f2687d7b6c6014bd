//! Messages and routing sinks.
//!
//! A [`Message`] is what arrives at the pipeline: an originator, a string
//! metadata map the name patterns are substituted against, and an opaque
//! JSON payload. After processing, the pipeline hands the message to a
//! [`MessageSink`] exactly once, on either the success or the failure path.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityRef;
use crate::error::PipelineError;

/// String key/value metadata attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    /// Empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value for `key`, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Metadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A message flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: Uuid,
    /// Message type, opaque to this crate.
    pub msg_type: String,
    /// The entity that produced the message.
    pub originator: EntityRef,
    /// String metadata the name patterns are substituted against.
    #[serde(default)]
    pub metadata: Metadata,
    /// Opaque payload.
    #[serde(default)]
    pub data: serde_json::Value,
    /// When the message was created.
    pub ts: DateTime<Utc>,
}

impl Message {
    /// A new message with a fresh id and no payload.
    #[must_use]
    pub fn new(msg_type: impl Into<String>, originator: EntityRef, metadata: Metadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            msg_type: msg_type.into(),
            originator,
            metadata,
            data: serde_json::Value::Null,
            ts: Utc::now(),
        }
    }

    /// Attach a JSON payload.
    #[must_use]
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Where a message goes once processing is over.
pub trait MessageSink: Send + Sync {
    /// The action reported success.
    fn route_success(&self, msg: Message);

    /// Processing failed. `error` is `None` when the action completed cleanly
    /// with a negative outcome.
    fn route_failure(&self, msg: Message, error: Option<PipelineError>);
}

/// The routing decision for one message.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Routed to the success continuation.
    Success(Message),
    /// Routed to the failure continuation.
    Failure {
        msg: Message,
        error: Option<PipelineError>,
    },
}

impl Route {
    /// The routed message.
    #[must_use]
    pub const fn message(&self) -> &Message {
        match self {
            Self::Success(msg) | Self::Failure { msg, .. } => msg,
        }
    }

    /// Returns true for the success path.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The failure error, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&PipelineError> {
        match self {
            Self::Success(_) => None,
            Self::Failure { error, .. } => error.as_ref(),
        }
    }
}

/// A sink that forwards every routing decision over a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Route>,
}

impl ChannelSink {
    /// A sink and the receiver its routes arrive on.
    #[must_use]
    pub fn channel() -> (Self, RouteReceiver) {
        let (tx, rx) = unbounded();
        (Self { tx }, RouteReceiver { rx })
    }
}

impl MessageSink for ChannelSink {
    fn route_success(&self, msg: Message) {
        let _ = self.tx.send(Route::Success(msg));
    }

    fn route_failure(&self, msg: Message, error: Option<PipelineError>) {
        let _ = self.tx.send(Route::Failure { msg, error });
    }
}

/// Receiving end of a [`ChannelSink`].
#[derive(Debug, Clone)]
pub struct RouteReceiver {
    rx: Receiver<Route>,
}

impl RouteReceiver {
    /// Wait for the next route.
    ///
    /// Returns `None` on timeout or when every sink has been dropped.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Route> {
        match self.rx.recv_timeout(timeout) {
            Ok(route) => Some(route),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Next route if one is already waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<Route> {
        self.rx.try_recv().ok()
    }
}
