use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use comms_events::{EventBus, EventHandler, SubscriptionHandle};
use comms_protocol::{Event, EventType, MetricSample, MetricType};
use parking_lot::Mutex;
use tracing::{debug, error};

/// Opaque metrics persistence collaborator.
#[async_trait]
pub trait MetricStore: Send + Sync {
    async fn record_metric(&self, sample: MetricSample) -> Result<()>;
}

/// In-memory store used by tests and the demo daemon.
#[derive(Default)]
pub struct InMemoryMetricStore {
    samples: Mutex<Vec<MetricSample>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self) -> Vec<MetricSample> {
        self.samples.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn record_metric(&self, sample: MetricSample) -> Result<()> {
        self.samples.lock().push(sample);
        Ok(())
    }
}

/// Static mapping from event type to the metric it counts.
///
/// `system.maintenance` is included so that administration of the system is
/// itself observable; such events carry no channel identifier and therefore
/// never produce a sample under the drop rule, but the listener still runs.
pub const METRIC_MAPPINGS: [(EventType, MetricType); 5] = [
    (EventType::MessageCreated, MetricType::MessageCreated),
    (EventType::ConversationCreated, MetricType::ConversationStarted),
    (
        EventType::ConversationAssigned,
        MetricType::ConversationAssigned,
    ),
    (EventType::ConversationClosed, MetricType::ConversationClosed),
    (EventType::SystemMaintenance, MetricType::MaintenanceEvent),
];

/// Derived, side-effecting subscriber set: one counting listener per entry in
/// [`METRIC_MAPPINGS`]. Holds no state beyond its subscriptions.
pub struct MetricRecorder {
    store: Arc<dyn MetricStore>,
}

impl MetricRecorder {
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self { store }
    }

    /// Register one listener per mapping entry and return the handles so the
    /// caller can replace them on reinitialization instead of stacking
    /// duplicates.
    pub fn attach(&self, bus: &EventBus) -> Vec<SubscriptionHandle> {
        METRIC_MAPPINGS
            .iter()
            .map(|(event_type, metric_type)| {
                bus.subscribe(
                    *event_type,
                    Arc::new(MetricListener {
                        name: format!("metric_recorder.{metric_type}"),
                        metric_type: *metric_type,
                        store: self.store.clone(),
                    }),
                )
            })
            .collect()
    }
}

struct MetricListener {
    name: String,
    metric_type: MetricType,
    store: Arc<dyn MetricStore>,
}

#[async_trait]
impl EventHandler for MetricListener {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        // A channel identifier is required for a sample to be meaningful;
        // events without one are dropped by policy, not treated as errors.
        let Some(channel_id) = event.kind.channel_id() else {
            debug!(
                event_type = %event.event_type(),
                metric_type = %self.metric_type,
                "event has no resolvable channel id; no sample recorded"
            );
            return Ok(());
        };

        let mut sample = MetricSample::unit(self.metric_type, channel_id.clone())
            .with_metadata("event_type", event.event_type().as_str())
            .with_metadata("source", event.source.as_str());
        sample.timestamp = event.timestamp;
        if let Some(conversation_id) = event.kind.conversation_id() {
            sample = sample.with_conversation(conversation_id.clone());
        }

        // At-most-once metrics: a store failure is logged with the sample's
        // identifiers and the sample is dropped, never retried.
        if let Err(cause) = self.store.record_metric(sample).await {
            error!(
                metric_type = %self.metric_type,
                channel_id = %channel_id,
                conversation_id = ?event.kind.conversation_id(),
                %cause,
                "metrics store rejected sample; dropping"
            );
        }
        Ok(())
    }
}
