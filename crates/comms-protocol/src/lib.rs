//! # comms-protocol — shared vocabulary for the communication-module core
//!
//! Defines the types every other crate in the workspace depends on. It is
//! intentionally dependency-light (no tokio, no axum) so it can serve as a
//! pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (ChannelId, ConversationId, MessageId)
//! - [`event`] — Event, EventKind, EventType (closed taxonomy), EventSource
//! - [`metric`] — MetricType, MetricSample (derived counting samples)
//! - [`state`] — ComponentName, SystemState, InitializationState
//! - [`error`] — CoreError, CoreResult

pub mod error;
pub mod event;
pub mod ids;
pub mod metric;
pub mod state;

pub use error::{CoreError, CoreResult};
pub use event::{Event, EventKind, EventSource, EventType, MaintenanceAction};
pub use ids::{ChannelId, ConversationId, MessageId};
pub use metric::{MetricSample, MetricType};
pub use state::{ComponentName, InitializationState, SystemState};
