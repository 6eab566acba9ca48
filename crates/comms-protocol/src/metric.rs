//! Derived metric samples produced from events.

use crate::ids::{ChannelId, ConversationId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Closed set of metric kinds the recorder can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    MessageCreated,
    ConversationStarted,
    ConversationAssigned,
    ConversationClosed,
    MaintenanceEvent,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::MessageCreated => "message_created",
            MetricType::ConversationStarted => "conversation_started",
            MetricType::ConversationAssigned => "conversation_assigned",
            MetricType::ConversationClosed => "conversation_closed",
            MetricType::MaintenanceEvent => "maintenance_event",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded measurement. This is a counting pipeline: samples default to
/// a unit value of `1.0`.
///
/// A channel identifier is required — events without one are dropped by the
/// recorder before a sample is ever constructed, so the requirement is
/// encoded in the type rather than checked downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric_type: MetricType,
    pub value: f64,
    pub channel_id: ChannelId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl MetricSample {
    /// A unit-count sample stamped with the current time.
    pub fn unit(metric_type: MetricType, channel_id: ChannelId) -> Self {
        Self {
            metric_type,
            value: 1.0,
            channel_id,
            conversation_id: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_conversation(mut self, conversation_id: ConversationId) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
