//! Process-wide initialization lifecycle state.
//!
//! `InitializationState` is deliberately never persisted: a process restart
//! always resets it to `NotInitialized`, and callers must re-run
//! initialization explicitly.

use crate::error::CoreError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of independently initializable subsystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentName {
    Events,
    Metrics,
    ChannelMetrics,
    Middleware,
    Channels,
    Monitoring,
}

impl ComponentName {
    /// All components, in dependency order. The events subsystem comes first
    /// because every other component subscribes through it.
    pub const ALL: [ComponentName; 6] = [
        ComponentName::Events,
        ComponentName::Metrics,
        ComponentName::ChannelMetrics,
        ComponentName::Middleware,
        ComponentName::Channels,
        ComponentName::Monitoring,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentName::Events => "events",
            ComponentName::Metrics => "metrics",
            ComponentName::ChannelMetrics => "channel_metrics",
            ComponentName::Middleware => "middleware",
            ComponentName::Channels => "channels",
            ComponentName::Monitoring => "monitoring",
        }
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComponentName::ALL
            .into_iter()
            .find(|component| component.as_str() == s)
            .ok_or_else(|| CoreError::UnknownComponent(s.to_owned()))
    }
}

/// Aggregate lifecycle state of the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemState {
    NotInitialized,
    Initializing,
    Initialized,
    /// The events prerequisite started but one or more dependent components
    /// did not. The system stays available and recoverable.
    PartiallyInitialized,
}

impl SystemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemState::NotInitialized => "not_initialized",
            SystemState::Initializing => "initializing",
            SystemState::Initialized => "initialized",
            SystemState::PartiallyInitialized => "partially_initialized",
        }
    }
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide initialization snapshot: aggregate state plus per-component
/// readiness, in registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationState {
    pub state: SystemState,
    pub components: IndexMap<ComponentName, bool>,
}

impl InitializationState {
    /// Whether the aggregate system completed its bootstrap at least once and
    /// has not been torn down. `PartiallyInitialized` counts: the events
    /// prerequisite is up, so the system is degraded but serving.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.state,
            SystemState::Initialized | SystemState::PartiallyInitialized
        )
    }

    pub fn component_ready(&self, component: ComponentName) -> bool {
        self.components.get(&component).copied().unwrap_or(false)
    }
}

impl Default for InitializationState {
    fn default() -> Self {
        Self {
            state: SystemState::NotInitialized,
            components: IndexMap::new(),
        }
    }
}
