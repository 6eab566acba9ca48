//! Event taxonomy for the communication module.
//!
//! The taxonomy is a closed enum: new event kinds are added as enum members,
//! never as free-form strings, so dispatch stays exhaustive and a typo'd type
//! is a compile error rather than a subscription that silently never fires.

use crate::ids::{ChannelId, ConversationId, MessageId};
use crate::state::{ComponentName, SystemState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A domain event together with its type-specific payload fields.
///
/// Wire form uses the dotted names (`message.created`, …) under a `type` tag;
/// payload identifiers are optional because upstream producers do not always
/// resolve every identifier before publishing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "message.created")]
    MessageCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<ChannelId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<MessageId>,
    },
    #[serde(rename = "conversation.created")]
    ConversationCreated {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<ChannelId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
    },
    #[serde(rename = "conversation.assigned")]
    ConversationAssigned {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<ChannelId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assignee: Option<String>,
    },
    #[serde(rename = "conversation.closed")]
    ConversationClosed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel_id: Option<ChannelId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation_id: Option<ConversationId>,
    },
    #[serde(rename = "system.maintenance")]
    SystemMaintenance {
        action: MaintenanceAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        component: Option<ComponentName>,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous_state: Option<SystemState>,
    },
}

impl EventKind {
    /// The fieldless discriminant used as a subscription key.
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::MessageCreated { .. } => EventType::MessageCreated,
            EventKind::ConversationCreated { .. } => EventType::ConversationCreated,
            EventKind::ConversationAssigned { .. } => EventType::ConversationAssigned,
            EventKind::ConversationClosed { .. } => EventType::ConversationClosed,
            EventKind::SystemMaintenance { .. } => EventType::SystemMaintenance,
        }
    }

    /// Channel attribution, when the producer resolved one.
    /// `system.maintenance` events are never channel-scoped.
    pub fn channel_id(&self) -> Option<&ChannelId> {
        match self {
            EventKind::MessageCreated { channel_id, .. }
            | EventKind::ConversationCreated { channel_id, .. }
            | EventKind::ConversationAssigned { channel_id, .. }
            | EventKind::ConversationClosed { channel_id, .. } => channel_id.as_ref(),
            EventKind::SystemMaintenance { .. } => None,
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        match self {
            EventKind::MessageCreated {
                conversation_id, ..
            }
            | EventKind::ConversationCreated {
                conversation_id, ..
            }
            | EventKind::ConversationAssigned {
                conversation_id, ..
            }
            | EventKind::ConversationClosed {
                conversation_id, ..
            } => conversation_id.as_ref(),
            EventKind::SystemMaintenance { .. } => None,
        }
    }
}

/// Subscription key: one member per event kind, no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "message.created")]
    MessageCreated,
    #[serde(rename = "conversation.created")]
    ConversationCreated,
    #[serde(rename = "conversation.assigned")]
    ConversationAssigned,
    #[serde(rename = "conversation.closed")]
    ConversationClosed,
    #[serde(rename = "system.maintenance")]
    SystemMaintenance,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::MessageCreated,
        EventType::ConversationCreated,
        EventType::ConversationAssigned,
        EventType::ConversationClosed,
        EventType::SystemMaintenance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::MessageCreated => "message.created",
            EventType::ConversationCreated => "conversation.created",
            EventType::ConversationAssigned => "conversation.assigned",
            EventType::ConversationClosed => "conversation.closed",
            EventType::SystemMaintenance => "system.maintenance",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The administrative action a `system.maintenance` event reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaintenanceAction {
    SystemInitialized,
    SystemReinitialized,
    ComponentReinitialized,
}

/// Free-text origin tag carried on every event. Diagnostics only; the bus
/// never routes on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventSource(String);

impl EventSource {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn api() -> Self {
        Self("api".to_owned())
    }

    pub fn system() -> Self {
        Self("system".to_owned())
    }

    pub fn ui() -> Self {
        Self("ui".to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable published event. The timestamp is assigned by the bus at
/// publish time and is monotonic non-decreasing within a process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
}

impl Event {
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}
