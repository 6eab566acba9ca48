use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use comms_protocol::{CoreError, Event, EventKind, EventSource, EventType};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, instrument};

/// A subscriber invoked for every published event of the type it registered
/// for. Handlers report failures through their `Result`; the bus contains
/// them and they never reach the publisher.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable handler identity, used when logging dispatch failures.
    fn name(&self) -> &str;

    async fn handle(&self, event: &Event) -> Result<()>;
}

/// Identifies one registration on the bus. Registering the same handler twice
/// yields two distinct handles (and double invocation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    event_type: EventType,
    id: u64,
}

impl SubscriptionHandle {
    pub fn event_type(&self) -> EventType {
        self.event_type
    }
}

/// Outcome of a publish: the constructed event plus dispatch accounting.
/// Handler failures are informational — they are already contained and
/// logged by the time the publisher sees this.
#[derive(Debug, Clone)]
pub struct PublishResult {
    pub event: Event,
    pub handlers_invoked: usize,
    pub handler_failures: usize,
}

struct Registration {
    id: u64,
    handler: Arc<dyn EventHandler>,
}

/// Process-wide typed publish/subscribe bus.
///
/// Constructed once at process start and injected by reference into every
/// collaborator that publishes or subscribes; there is deliberately no global
/// instance. Dispatch for one event type is in registration order, and a
/// failing handler never blocks the handlers after it.
pub struct EventBus {
    subscriptions: RwLock<HashMap<EventType, Vec<Registration>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
    // Last issued timestamp; publish clamps against it so event timestamps
    // are monotonic non-decreasing even if the wall clock steps backwards.
    clock: Mutex<DateTime<Utc>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            clock: Mutex::new(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Register `handler` for every future publish of `event_type`.
    ///
    /// Never fails. Registering an identical handler a second time is allowed
    /// and results in double invocation; de-duplication is the caller's
    /// concern (the orchestrator tracks handles per component for this).
    pub fn subscribe(
        &self,
        event_type: EventType,
        handler: Arc<dyn EventHandler>,
    ) -> SubscriptionHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(%event_type, handler = handler.name(), id, "handler subscribed");
        self.subscriptions
            .write()
            .entry(event_type)
            .or_default()
            .push(Registration { id, handler });
        SubscriptionHandle { event_type, id }
    }

    /// Remove one registration. Returns `false` if the handle was already
    /// removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let Some(registrations) = subscriptions.get_mut(&handle.event_type) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|registration| registration.id != handle.id);
        before != registrations.len()
    }

    /// Construct an event, stamp it, and dispatch it to every subscriber of
    /// its type in registration order.
    ///
    /// Each handler runs isolated: an error is caught and logged with the
    /// event type and handler identity, and the remaining handlers still run.
    /// The only publisher-visible failure is `BusClosed`.
    #[instrument(skip(self, kind, source), fields(event_type = %kind.event_type(), source = %source))]
    pub async fn publish(
        &self,
        kind: EventKind,
        source: EventSource,
    ) -> Result<PublishResult, CoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(CoreError::BusClosed);
        }

        let event_type = kind.event_type();
        let event = Event {
            kind,
            timestamp: self.next_timestamp(),
            source,
        };

        // Snapshot under the read lock, dispatch after releasing it, so a
        // concurrent subscribe never tears an in-flight fan-out.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .subscriptions
            .read()
            .get(&event_type)
            .map(|registrations| {
                registrations
                    .iter()
                    .map(|registration| registration.handler.clone())
                    .collect()
            })
            .unwrap_or_default();

        let handlers_invoked = handlers.len();
        let mut handler_failures = 0;
        for handler in handlers {
            if let Err(cause) = handler.handle(&event).await {
                handler_failures += 1;
                error!(
                    %event_type,
                    handler = handler.name(),
                    %cause,
                    "event handler failed; continuing with remaining handlers"
                );
            }
        }

        debug!(handlers_invoked, handler_failures, "event dispatched");
        Ok(PublishResult {
            event,
            handlers_invoked,
            handler_failures,
        })
    }

    /// Stop accepting publishes. Subscriptions are retained; the bus has
    /// process-wide lifetime and is never reopened.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of live registrations for one event type.
    pub fn subscription_count(&self, event_type: EventType) -> usize {
        self.subscriptions
            .read()
            .get(&event_type)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Number of live registrations across all event types.
    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.read().values().map(Vec::len).sum()
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock();
        let stamp = Utc::now().max(*last);
        *last = stamp;
        stamp
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{Result, bail};
    use async_trait::async_trait;
    use comms_protocol::{ChannelId, ConversationId, Event, EventKind, EventSource, EventType};
    use parking_lot::Mutex;

    use crate::{EventBus, EventHandler};

    struct RecordingHandler {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                log,
                fail: false,
            })
        }

        fn failing(name: &str, log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_owned(),
                log,
                fail: true,
            })
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, _event: &Event) -> Result<()> {
            self.log.lock().push(self.name.clone());
            if self.fail {
                bail!("handler {} rejected the event", self.name);
            }
            Ok(())
        }
    }

    fn message_created() -> EventKind {
        EventKind::MessageCreated {
            channel_id: Some(ChannelId::new("c1")),
            conversation_id: Some(ConversationId::new("cv1")),
            message_id: None,
        }
    }

    #[tokio::test]
    async fn fan_out_runs_all_handlers_in_registration_order() -> Result<()> {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            bus.subscribe(
                EventType::MessageCreated,
                RecordingHandler::new(name, log.clone()),
            );
        }

        let result = bus
            .publish(message_created(), EventSource::api())
            .await?;

        assert_eq!(result.handlers_invoked, 3);
        assert_eq!(result.handler_failures, 0);
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        Ok(())
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_later_handlers() -> Result<()> {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(
            EventType::MessageCreated,
            RecordingHandler::new("first", log.clone()),
        );
        bus.subscribe(
            EventType::MessageCreated,
            RecordingHandler::failing("broken", log.clone()),
        );
        bus.subscribe(
            EventType::MessageCreated,
            RecordingHandler::new("last", log.clone()),
        );

        let result = bus
            .publish(message_created(), EventSource::api())
            .await?;

        assert_eq!(result.handlers_invoked, 3);
        assert_eq!(result.handler_failures, 1);
        assert_eq!(*log.lock(), vec!["first", "broken", "last"]);
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_registration_double_invokes() -> Result<()> {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler = RecordingHandler::new("dup", log.clone());
        bus.subscribe(EventType::ConversationCreated, handler.clone());
        bus.subscribe(EventType::ConversationCreated, handler);

        let kind = EventKind::ConversationCreated {
            channel_id: None,
            conversation_id: None,
        };
        let result = bus.publish(kind, EventSource::system()).await?;

        assert_eq!(result.handlers_invoked, 2);
        assert_eq!(log.lock().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_the_given_registration() -> Result<()> {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let keep = bus.subscribe(
            EventType::MessageCreated,
            RecordingHandler::new("keep", log.clone()),
        );
        let dropped = bus.subscribe(
            EventType::MessageCreated,
            RecordingHandler::new("drop", log.clone()),
        );

        assert!(bus.unsubscribe(&dropped));
        assert!(!bus.unsubscribe(&dropped));
        assert_eq!(bus.subscription_count(EventType::MessageCreated), 1);

        let result = bus
            .publish(message_created(), EventSource::ui())
            .await?;
        assert_eq!(result.handlers_invoked, 1);
        assert_eq!(*log.lock(), vec!["keep"]);

        assert!(bus.unsubscribe(&keep));
        assert_eq!(bus.subscription_count(EventType::MessageCreated), 0);
        Ok(())
    }

    #[tokio::test]
    async fn publish_after_close_is_rejected() {
        let bus = EventBus::new();
        bus.close();
        let err = bus
            .publish(message_created(), EventSource::api())
            .await
            .unwrap_err();
        assert_eq!(err, comms_protocol::CoreError::BusClosed);
    }

    #[tokio::test]
    async fn timestamps_are_monotonic_non_decreasing() -> Result<()> {
        let bus = EventBus::new();
        let mut previous = None;
        for _ in 0..50 {
            let result = bus
                .publish(message_created(), EventSource::api())
                .await?;
            if let Some(previous) = previous {
                assert!(result.event.timestamp >= previous);
            }
            previous = Some(result.event.timestamp);
        }
        Ok(())
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() -> Result<()> {
        let bus = EventBus::new();
        let result = bus
            .publish(message_created(), EventSource::api())
            .await?;
        assert_eq!(result.handlers_invoked, 0);
        assert_eq!(result.handler_failures, 0);
        Ok(())
    }
}
