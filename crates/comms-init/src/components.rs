//! The six named component initializers.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use comms_events::EventHandler;
use comms_metrics::MetricRecorder;
use comms_protocol::{ChannelId, ComponentName, Event, EventType};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::rollup::{ChannelActivity, EventCounters};
use crate::{ComponentInitializer, InitContext, InitOutcome};

/// Event types that carry channel-scoped domain payloads
/// (everything except `system.maintenance`).
pub const DOMAIN_EVENT_TYPES: [EventType; 4] = [
    EventType::MessageCreated,
    EventType::ConversationCreated,
    EventType::ConversationAssigned,
    EventType::ConversationClosed,
];

/// All initializers in dependency order: events first (everything else
/// subscribes through it), then metrics, then the domain components.
pub fn default_initializers() -> Vec<Arc<dyn ComponentInitializer>> {
    vec![
        Arc::new(EventsInitializer),
        Arc::new(MetricsInitializer),
        Arc::new(ChannelMetricsInitializer),
        Arc::new(MiddlewareInitializer),
        Arc::new(ChannelsInitializer),
        Arc::new(MonitoringInitializer),
    ]
}

/// Hard prerequisite for everything else: verifies the bus accepts traffic
/// and registers the diagnostic event logger.
pub struct EventsInitializer;

#[async_trait]
impl ComponentInitializer for EventsInitializer {
    fn name(&self) -> ComponentName {
        ComponentName::Events
    }

    async fn initialize(&self, ctx: &InitContext) -> InitOutcome {
        if ctx.bus.is_closed() {
            warn!("event bus is closed; events component cannot start");
            return InitOutcome::failed();
        }
        let logger = Arc::new(EventLogger);
        let subscriptions = EventType::ALL
            .into_iter()
            .map(|event_type| ctx.bus.subscribe(event_type, logger.clone()))
            .collect();
        InitOutcome::ok(subscriptions)
    }
}

struct EventLogger;

#[async_trait]
impl EventHandler for EventLogger {
    fn name(&self) -> &str {
        "events.logger"
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        debug!(event_type = %event.event_type(), source = %event.source, "event observed");
        Ok(())
    }
}

/// Attaches the metric recorder's counting subscriptions.
pub struct MetricsInitializer;

#[async_trait]
impl ComponentInitializer for MetricsInitializer {
    fn name(&self) -> ComponentName {
        ComponentName::Metrics
    }

    async fn initialize(&self, ctx: &InitContext) -> InitOutcome {
        let recorder = MetricRecorder::new(ctx.metric_store.clone());
        InitOutcome::ok(recorder.attach(&ctx.bus))
    }
}

/// Per-channel rollup counters fed by domain events.
pub struct ChannelMetricsInitializer;

#[async_trait]
impl ComponentInitializer for ChannelMetricsInitializer {
    fn name(&self) -> ComponentName {
        ComponentName::ChannelMetrics
    }

    async fn initialize(&self, ctx: &InitContext) -> InitOutcome {
        let listener = Arc::new(ChannelRollupListener {
            activity: ctx.channel_activity.clone(),
        });
        let subscriptions = DOMAIN_EVENT_TYPES
            .into_iter()
            .map(|event_type| ctx.bus.subscribe(event_type, listener.clone()))
            .collect();
        InitOutcome::ok(subscriptions)
    }
}

struct ChannelRollupListener {
    activity: Arc<ChannelActivity>,
}

#[async_trait]
impl EventHandler for ChannelRollupListener {
    fn name(&self) -> &str {
        "channel_metrics.rollup"
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        if let Some(channel_id) = event.kind.channel_id() {
            self.activity.record(channel_id);
        }
        Ok(())
    }
}

/// Scans the middleware collaborator for previously-failed work and
/// reprocesses it as a detached background task. The scan is awaited (a
/// failed scan fails the component); the reprocessing is not — its failures
/// are only logged.
pub struct MiddlewareInitializer;

#[async_trait]
impl ComponentInitializer for MiddlewareInitializer {
    fn name(&self) -> ComponentName {
        ComponentName::Middleware
    }

    async fn initialize(&self, ctx: &InitContext) -> InitOutcome {
        let pending = match ctx.middleware.pending_items().await {
            Ok(pending) => pending,
            Err(cause) => {
                warn!(%cause, "failed to scan middleware queue for pending items");
                return InitOutcome::failed();
            }
        };
        if pending.is_empty() {
            debug!("no pending middleware items to reprocess");
            return InitOutcome::ok(Vec::new());
        }

        debug!(count = pending.len(), "reprocessing pending middleware items in the background");
        let middleware = ctx.middleware.clone();
        ctx.background.spawn("middleware.reprocess", async move {
            for item in pending {
                if let Err(cause) = middleware.process(item).await {
                    warn!(%cause, "pending middleware item failed to reprocess");
                }
            }
            Ok(())
        });
        InitOutcome::ok(Vec::new())
    }
}

/// Loads the configured channel cache from the data store and keeps it warm
/// from observed traffic.
pub struct ChannelsInitializer;

#[async_trait]
impl ComponentInitializer for ChannelsInitializer {
    fn name(&self) -> ComponentName {
        ComponentName::Channels
    }

    async fn initialize(&self, ctx: &InitContext) -> InitOutcome {
        let rows = match ctx
            .data_store
            .query("channels", json!({"active": true}))
            .await
        {
            Ok(rows) => rows,
            Err(cause) => {
                warn!(%cause, "failed to load channel configuration");
                return InitOutcome::failed();
            }
        };
        for row in &rows {
            if let Some(id) = row.get("id").and_then(Value::as_str) {
                ctx.channel_activity.note_known_channel(ChannelId::new(id));
            }
        }
        debug!(channels = rows.len(), "channel cache loaded");

        let listener = Arc::new(ChannelCacheListener {
            activity: ctx.channel_activity.clone(),
        });
        let subscriptions = DOMAIN_EVENT_TYPES
            .into_iter()
            .map(|event_type| ctx.bus.subscribe(event_type, listener.clone()))
            .collect();
        InitOutcome::ok(subscriptions)
    }
}

struct ChannelCacheListener {
    activity: Arc<ChannelActivity>,
}

#[async_trait]
impl EventHandler for ChannelCacheListener {
    fn name(&self) -> &str {
        "channels.cache"
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        if let Some(channel_id) = event.kind.channel_id()
            && !self.activity.is_known(channel_id)
        {
            debug!(channel_id = %channel_id, "observed traffic for unconfigured channel; caching");
            self.activity.note_known_channel(channel_id.clone());
        }
        Ok(())
    }
}

/// Aggregate per-event-type counters for the status surface.
pub struct MonitoringInitializer;

#[async_trait]
impl ComponentInitializer for MonitoringInitializer {
    fn name(&self) -> ComponentName {
        ComponentName::Monitoring
    }

    async fn initialize(&self, ctx: &InitContext) -> InitOutcome {
        let listener = Arc::new(CounterListener {
            counters: ctx.counters.clone(),
        });
        let subscriptions = EventType::ALL
            .into_iter()
            .map(|event_type| ctx.bus.subscribe(event_type, listener.clone()))
            .collect();
        InitOutcome::ok(subscriptions)
    }
}

struct CounterListener {
    counters: Arc<EventCounters>,
}

#[async_trait]
impl EventHandler for CounterListener {
    fn name(&self) -> &str {
        "monitoring.counter"
    }

    async fn handle(&self, event: &Event) -> Result<()> {
        self.counters.record(event.event_type());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use comms_events::EventBus;
    use comms_metrics::{InMemoryMetricStore, METRIC_MAPPINGS};
    use comms_protocol::{
        ChannelId, ComponentName, ConversationId, EventKind, EventSource, EventType,
    };
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::collaborators::{InMemoryDataStore, MiddlewareProcessor, NoopMiddleware};
    use crate::components::{
        ChannelsInitializer, EventsInitializer, MetricsInitializer, MiddlewareInitializer,
        MonitoringInitializer, default_initializers,
    };
    use crate::rollup::{ChannelActivity, EventCounters};
    use crate::{BackgroundTasks, ComponentInitializer, InitContext};

    fn test_context() -> InitContext {
        InitContext {
            bus: Arc::new(EventBus::new()),
            metric_store: Arc::new(InMemoryMetricStore::new()),
            data_store: Arc::new(InMemoryDataStore::new()),
            middleware: Arc::new(NoopMiddleware),
            counters: Arc::new(EventCounters::new()),
            channel_activity: Arc::new(ChannelActivity::new()),
            background: Arc::new(BackgroundTasks::new()),
        }
    }

    struct QueueMiddleware {
        pending: Vec<Value>,
        processed: Arc<Mutex<Vec<Value>>>,
        scan_fails: bool,
    }

    #[async_trait]
    impl MiddlewareProcessor for QueueMiddleware {
        async fn pending_items(&self) -> Result<Vec<Value>> {
            if self.scan_fails {
                bail!("middleware queue unavailable");
            }
            Ok(self.pending.clone())
        }

        async fn process(&self, item: Value) -> Result<()> {
            self.processed.lock().push(item);
            Ok(())
        }
    }

    #[tokio::test]
    async fn registry_covers_every_component_in_dependency_order() {
        let names: Vec<ComponentName> = default_initializers()
            .iter()
            .map(|initializer| initializer.name())
            .collect();
        assert_eq!(names, ComponentName::ALL);
        assert_eq!(names[0], ComponentName::Events);
    }

    #[tokio::test]
    async fn events_initializer_fails_when_the_bus_is_closed() {
        let ctx = test_context();
        ctx.bus.close();
        let outcome = EventsInitializer.initialize(&ctx).await;
        assert!(!outcome.success);
        assert!(outcome.subscriptions.is_empty());
    }

    #[tokio::test]
    async fn metrics_initializer_registers_one_listener_per_mapping() {
        let ctx = test_context();
        let outcome = MetricsInitializer.initialize(&ctx).await;
        assert!(outcome.success);
        assert_eq!(outcome.subscriptions.len(), METRIC_MAPPINGS.len());
    }

    #[tokio::test]
    async fn channels_initializer_loads_active_channels_and_caches_observed_ones() -> Result<()> {
        let ctx = InitContext {
            data_store: Arc::new(InMemoryDataStore::new().with_collection(
                "channels",
                vec![
                    json!({"id": "c1", "active": true}),
                    json!({"id": "c2", "active": false}),
                ],
            )),
            ..test_context()
        };

        let outcome = ChannelsInitializer.initialize(&ctx).await;
        assert!(outcome.success);
        assert!(ctx.channel_activity.is_known(&ChannelId::new("c1")));
        assert!(!ctx.channel_activity.is_known(&ChannelId::new("c2")));

        ctx.bus
            .publish(
                EventKind::ConversationCreated {
                    channel_id: Some(ChannelId::new("c7")),
                    conversation_id: Some(ConversationId::new("cv1")),
                },
                EventSource::api(),
            )
            .await?;
        assert!(ctx.channel_activity.is_known(&ChannelId::new("c7")));
        Ok(())
    }

    #[tokio::test]
    async fn middleware_initializer_reprocesses_pending_items_detached() -> Result<()> {
        let processed = Arc::new(Mutex::new(Vec::new()));
        let ctx = InitContext {
            middleware: Arc::new(QueueMiddleware {
                pending: vec![json!({"id": 1}), json!({"id": 2})],
                processed: processed.clone(),
                scan_fails: false,
            }),
            ..test_context()
        };

        let outcome = MiddlewareInitializer.initialize(&ctx).await;
        assert!(outcome.success);
        assert!(outcome.subscriptions.is_empty());
        assert_eq!(ctx.background.len(), 1);

        ctx.background.drain(Duration::from_secs(1)).await;
        assert_eq!(processed.lock().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn middleware_initializer_fails_when_the_scan_fails() {
        let ctx = InitContext {
            middleware: Arc::new(QueueMiddleware {
                pending: Vec::new(),
                processed: Arc::new(Mutex::new(Vec::new())),
                scan_fails: true,
            }),
            ..test_context()
        };
        let outcome = MiddlewareInitializer.initialize(&ctx).await;
        assert!(!outcome.success);
        assert!(ctx.background.is_empty());
    }

    #[tokio::test]
    async fn monitoring_counters_track_published_events() -> Result<()> {
        let ctx = test_context();
        let outcome = MonitoringInitializer.initialize(&ctx).await;
        assert!(outcome.success);

        for _ in 0..3 {
            ctx.bus
                .publish(
                    EventKind::MessageCreated {
                        channel_id: Some(ChannelId::new("c1")),
                        conversation_id: None,
                        message_id: None,
                    },
                    EventSource::api(),
                )
                .await?;
        }

        assert_eq!(ctx.counters.count(EventType::MessageCreated), 3);
        assert_eq!(ctx.counters.count(EventType::ConversationClosed), 0);
        Ok(())
    }
}
