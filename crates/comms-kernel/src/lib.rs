use std::sync::Arc;

use comms_events::{EventBus, PublishResult};
use comms_init::{
    BackgroundTasks, ChannelActivity, DataStore, EventCounters, InMemoryDataStore, InitContext,
    MiddlewareProcessor, NoopMiddleware, default_initializers,
};
use comms_metrics::{InMemoryMetricStore, MetricStore};
use comms_protocol::{CoreResult, EventKind, EventSource, InitializationState};
use tracing::instrument;

mod orchestrator;

pub use orchestrator::{Orchestrator, StatusSnapshot};

/// Wires the event bus, collaborators, and the component registry into a
/// kernel. Collaborators default to the in-memory implementations so tests
/// and the demo daemon need no external services.
#[derive(Clone)]
pub struct CommsKernelBuilder {
    metric_store: Arc<dyn MetricStore>,
    data_store: Arc<dyn DataStore>,
    middleware: Arc<dyn MiddlewareProcessor>,
}

impl CommsKernelBuilder {
    pub fn new() -> Self {
        Self {
            metric_store: Arc::new(InMemoryMetricStore::new()),
            data_store: Arc::new(InMemoryDataStore::new()),
            middleware: Arc::new(NoopMiddleware),
        }
    }

    pub fn metric_store(mut self, store: Arc<dyn MetricStore>) -> Self {
        self.metric_store = store;
        self
    }

    pub fn data_store(mut self, store: Arc<dyn DataStore>) -> Self {
        self.data_store = store;
        self
    }

    pub fn middleware(mut self, middleware: Arc<dyn MiddlewareProcessor>) -> Self {
        self.middleware = middleware;
        self
    }

    pub fn build(self) -> CommsKernel {
        let bus = Arc::new(EventBus::new());
        let ctx = InitContext {
            bus: bus.clone(),
            metric_store: self.metric_store,
            data_store: self.data_store,
            middleware: self.middleware,
            counters: Arc::new(EventCounters::new()),
            channel_activity: Arc::new(ChannelActivity::new()),
            background: Arc::new(BackgroundTasks::new()),
        };
        CommsKernel {
            orchestrator: Arc::new(Orchestrator::new(ctx, default_initializers())),
            bus,
        }
    }
}

impl Default for CommsKernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Façade over the orchestrator and the bus. Cheap to clone; all clones
/// share the same process-wide instance.
#[derive(Clone)]
pub struct CommsKernel {
    orchestrator: Arc<Orchestrator>,
    bus: Arc<EventBus>,
}

impl CommsKernel {
    #[instrument(skip(self))]
    pub async fn initialize_system(&self) -> bool {
        self.orchestrator.initialize_system().await
    }

    #[instrument(skip(self))]
    pub async fn force_reinitialize(&self) -> bool {
        self.orchestrator.force_reinitialize().await
    }

    #[instrument(skip(self))]
    pub async fn reinitialize_component(&self, name: &str) -> CoreResult<bool> {
        self.orchestrator.reinitialize_component(name).await
    }

    pub fn is_system_initialized(&self) -> bool {
        self.orchestrator.is_system_initialized()
    }

    pub fn snapshot(&self) -> InitializationState {
        self.orchestrator.snapshot()
    }

    pub fn status(&self) -> StatusSnapshot {
        self.orchestrator.status()
    }

    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await;
    }

    /// The process-wide bus, for domain collaborators that publish or for
    /// ops tooling that wants to observe events directly.
    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Publish a domain event through the bus.
    #[instrument(skip(self, kind), fields(event_type = %kind.event_type()))]
    pub async fn publish_event(
        &self,
        kind: EventKind,
        source: EventSource,
    ) -> CoreResult<PublishResult> {
        self.bus.publish(kind, source).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use comms_events::EventHandler;
    use comms_init::MiddlewareProcessor;
    use comms_metrics::InMemoryMetricStore;
    use comms_protocol::{
        ChannelId, ComponentName, ConversationId, CoreError, Event, EventKind, EventSource,
        EventType, MaintenanceAction, MetricType, SystemState,
    };
    use parking_lot::Mutex;
    use serde_json::Value;

    use crate::CommsKernelBuilder;

    struct CaptureHandler {
        events: Arc<Mutex<Vec<Event>>>,
    }

    #[async_trait]
    impl EventHandler for CaptureHandler {
        fn name(&self) -> &str {
            "test.capture"
        }

        async fn handle(&self, event: &Event) -> Result<()> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    struct FailingMiddleware;

    #[async_trait]
    impl MiddlewareProcessor for FailingMiddleware {
        async fn pending_items(&self) -> Result<Vec<Value>> {
            bail!("middleware queue unreachable")
        }

        async fn process(&self, _item: Value) -> Result<()> {
            Ok(())
        }
    }

    fn capture_maintenance(kernel: &crate::CommsKernel) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        kernel.bus().subscribe(
            EventType::SystemMaintenance,
            Arc::new(CaptureHandler {
                events: events.clone(),
            }),
        );
        events
    }

    #[tokio::test]
    async fn system_starts_not_initialized_and_completes_bootstrap() {
        let kernel = CommsKernelBuilder::new().build();
        assert!(!kernel.is_system_initialized());

        assert!(kernel.initialize_system().await);
        assert!(kernel.is_system_initialized());

        let snapshot = kernel.snapshot();
        assert_eq!(snapshot.state, SystemState::Initialized);
        for component in ComponentName::ALL {
            assert!(snapshot.component_ready(component), "{component} not ready");
        }
    }

    #[tokio::test]
    async fn repeated_initialize_is_a_no_op_without_resubscription() {
        let kernel = CommsKernelBuilder::new().build();
        assert!(kernel.initialize_system().await);
        let after_first = kernel.bus().total_subscriptions();

        assert!(kernel.initialize_system().await);
        assert_eq!(kernel.bus().total_subscriptions(), after_first);
    }

    #[tokio::test]
    async fn unknown_component_fails_fast_with_no_side_effects() {
        let kernel = CommsKernelBuilder::new().build();
        assert!(kernel.initialize_system().await);

        let before = kernel.snapshot();
        let err = kernel
            .reinitialize_component("nonexistent")
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::UnknownComponent("nonexistent".to_owned()));
        assert_eq!(kernel.snapshot(), before);
    }

    #[tokio::test]
    async fn component_reinit_publishes_exactly_one_maintenance_event() {
        let kernel = CommsKernelBuilder::new().build();
        assert!(kernel.initialize_system().await);
        let subscriptions_before = kernel.bus().total_subscriptions();
        let captured = capture_maintenance(&kernel);

        let success = kernel
            .reinitialize_component("metrics")
            .await
            .expect("metrics is a known component");
        assert!(success);

        let events = captured.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            EventKind::SystemMaintenance {
                action: MaintenanceAction::ComponentReinitialized,
                component: Some(ComponentName::Metrics),
                success: true,
                ..
            }
        ));
        // Old metric subscriptions were replaced, not stacked; the capture
        // handler accounts for the one extra registration.
        assert_eq!(
            kernel.bus().total_subscriptions(),
            subscriptions_before + 1
        );
    }

    #[tokio::test]
    async fn failed_component_reinit_still_publishes_the_maintenance_event() {
        let kernel = CommsKernelBuilder::new()
            .middleware(Arc::new(FailingMiddleware))
            .build();
        assert!(!kernel.initialize_system().await);
        let captured = capture_maintenance(&kernel);

        let success = kernel
            .reinitialize_component("middleware")
            .await
            .expect("middleware is a known component");
        assert!(!success);

        let events = captured.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            EventKind::SystemMaintenance {
                action: MaintenanceAction::ComponentReinitialized,
                component: Some(ComponentName::Middleware),
                success: false,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn non_events_failure_degrades_but_keeps_the_system_serving() {
        let kernel = CommsKernelBuilder::new()
            .middleware(Arc::new(FailingMiddleware))
            .build();

        assert!(!kernel.initialize_system().await);
        let snapshot = kernel.snapshot();
        assert_eq!(snapshot.state, SystemState::PartiallyInitialized);
        assert!(kernel.is_system_initialized());
        assert!(!snapshot.component_ready(ComponentName::Middleware));
        assert!(snapshot.component_ready(ComponentName::Events));
    }

    #[tokio::test]
    async fn events_failure_leaves_the_system_not_initialized() {
        let kernel = CommsKernelBuilder::new().build();
        kernel.bus().close();

        assert!(!kernel.initialize_system().await);
        assert!(!kernel.is_system_initialized());
        assert_eq!(kernel.snapshot().state, SystemState::NotInitialized);
    }

    #[tokio::test]
    async fn force_reinitialize_reports_the_previous_state() {
        let kernel = CommsKernelBuilder::new().build();
        assert!(kernel.initialize_system().await);
        let captured = capture_maintenance(&kernel);

        assert!(kernel.force_reinitialize().await);

        let events = captured.lock();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].kind,
            EventKind::SystemMaintenance {
                action: MaintenanceAction::SystemReinitialized,
                success: true,
                previous_state: Some(SystemState::Initialized),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn conversation_created_records_one_conversation_started_sample() -> Result<()> {
        let store = Arc::new(InMemoryMetricStore::new());
        let kernel = CommsKernelBuilder::new().metric_store(store.clone()).build();
        assert!(kernel.initialize_system().await);
        // The bootstrap's maintenance event has no channel, so nothing is
        // recorded yet.
        assert!(store.is_empty());

        kernel
            .publish_event(
                EventKind::ConversationCreated {
                    channel_id: Some(ChannelId::new("c1")),
                    conversation_id: Some(ConversationId::new("cv1")),
                },
                EventSource::api(),
            )
            .await?;

        let samples = store.samples();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].metric_type, MetricType::ConversationStarted);
        assert_eq!(samples[0].channel_id, ChannelId::new("c1"));
        Ok(())
    }

    #[tokio::test]
    async fn status_reflects_counters_and_components() -> Result<()> {
        let kernel = CommsKernelBuilder::new().build();
        assert!(kernel.initialize_system().await);

        kernel
            .publish_event(
                EventKind::MessageCreated {
                    channel_id: Some(ChannelId::new("c1")),
                    conversation_id: None,
                    message_id: None,
                },
                EventSource::ui(),
            )
            .await?;

        let status = kernel.status();
        assert!(status.initialized);
        assert_eq!(status.state, SystemState::Initialized);
        assert_eq!(status.components.len(), ComponentName::ALL.len());
        assert_eq!(status.event_counts["message.created"], 1);
        // The bootstrap's own maintenance event is counted too.
        assert_eq!(status.event_counts["system.maintenance"], 1);
        assert!(status.subscription_count > 0);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_closes_the_bus() {
        let kernel = CommsKernelBuilder::new().build();
        assert!(kernel.initialize_system().await);
        kernel.shutdown().await;

        let err = kernel
            .publish_event(
                EventKind::ConversationClosed {
                    channel_id: Some(ChannelId::new("c1")),
                    conversation_id: None,
                },
                EventSource::api(),
            )
            .await
            .unwrap_err();
        assert_eq!(err, CoreError::BusClosed);
    }
}
