//! Named, independently invocable bootstrap routines for each subsystem of
//! the communication module.
//!
//! Every initializer follows the same contract: it performs its one-time
//! setup (typically registering handlers on the event bus), converts any
//! internal failure into a `success = false` outcome plus a logged
//! diagnostic, and hands the subscription handles it created back to the
//! orchestrator so reinitialization replaces them instead of stacking
//! duplicates.

mod collaborators;
mod components;
mod rollup;

pub use collaborators::{DataStore, InMemoryDataStore, MiddlewareProcessor, NoopMiddleware};
pub use components::{
    ChannelMetricsInitializer, ChannelsInitializer, DOMAIN_EVENT_TYPES, EventsInitializer,
    MetricsInitializer, MiddlewareInitializer, MonitoringInitializer, default_initializers,
};
pub use rollup::{ChannelActivity, EventCounters};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use comms_events::{EventBus, SubscriptionHandle};
use comms_metrics::MetricStore;
use comms_protocol::ComponentName;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

/// Collaborators injected into every initializer. Constructed once by the
/// kernel builder; initializers never reach for globals.
#[derive(Clone)]
pub struct InitContext {
    pub bus: Arc<EventBus>,
    pub metric_store: Arc<dyn MetricStore>,
    pub data_store: Arc<dyn DataStore>,
    pub middleware: Arc<dyn MiddlewareProcessor>,
    pub counters: Arc<EventCounters>,
    pub channel_activity: Arc<ChannelActivity>,
    pub background: Arc<BackgroundTasks>,
}

/// What one initializer run reports back to the orchestrator.
#[derive(Debug)]
pub struct InitOutcome {
    pub success: bool,
    pub subscriptions: Vec<SubscriptionHandle>,
}

impl InitOutcome {
    pub fn ok(subscriptions: Vec<SubscriptionHandle>) -> Self {
        Self {
            success: true,
            subscriptions,
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            subscriptions: Vec::new(),
        }
    }
}

/// A named bootstrap routine for one subsystem.
#[async_trait]
pub trait ComponentInitializer: Send + Sync {
    fn name(&self) -> ComponentName;

    /// Fallible but not exceptional: internal errors become a `failed()`
    /// outcome with a logged diagnostic, never a panic or an `Err` past this
    /// boundary.
    async fn initialize(&self, ctx: &InitContext) -> InitOutcome;
}

/// Registry of detached background work spawned by initializers (middleware
/// reprocessing). Tasks log their own failures; shutdown drains them with a
/// bounded wait instead of leaving them unobserved.
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    handles: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: &'static str, work: F)
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            if let Err(cause) = work.await {
                warn!(task = name, %cause, "background task failed");
            }
        });
        self.handles.lock().push((name, handle));
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Wait for every registered task, aborting any that outlives `timeout`.
    pub async fn drain(&self, timeout: Duration) {
        let drained: Vec<_> = self.handles.lock().drain(..).collect();
        for (name, mut handle) in drained {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    warn!(task = name, "background task did not finish in time; aborting");
                    handle.abort();
                }
            }
        }
    }
}
