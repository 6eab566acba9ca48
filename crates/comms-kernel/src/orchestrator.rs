//! Process-wide initialization state machine.
//!
//! `NotInitialized → Initializing → Initialized`, with a degraded
//! `PartiallyInitialized` state when the events prerequisite started but a
//! dependent component did not. Every transition publishes a
//! `system.maintenance` event through the bus itself, so administration of
//! the system is observable through the system.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use comms_events::SubscriptionHandle;
use comms_init::{ComponentInitializer, InitContext};
use comms_protocol::{
    ComponentName, CoreError, CoreResult, EventKind, EventSource, EventType, InitializationState,
    MaintenanceAction, SystemState,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Read-only view served by the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub initialized: bool,
    pub state: SystemState,
    pub components: IndexMap<ComponentName, bool>,
    pub event_counts: IndexMap<String, u64>,
    pub total_events: u64,
    pub subscription_count: usize,
}

pub struct Orchestrator {
    ctx: InitContext,
    registry: IndexMap<ComponentName, Arc<dyn ComponentInitializer>>,
    state: Mutex<InitializationState>,
    subscriptions: Mutex<HashMap<ComponentName, Vec<SubscriptionHandle>>>,
    // Serializes initialize/reinitialize critical sections; a tokio mutex
    // because initializer futures are awaited while it is held. State reads
    // never take it, so polling the status surface stays cheap.
    init_lock: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        ctx: InitContext,
        initializers: Vec<Arc<dyn ComponentInitializer>>,
    ) -> Self {
        let registry = initializers
            .into_iter()
            .map(|initializer| (initializer.name(), initializer))
            .collect();
        Self {
            ctx,
            registry,
            state: Mutex::new(InitializationState::default()),
            subscriptions: Mutex::new(HashMap::new()),
            init_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Run every component initializer in dependency order.
    ///
    /// Idempotent at the aggregate level: when the system is already fully
    /// `Initialized` this is a no-op returning `true` and performs no
    /// re-subscription. Returns `true` only when every component succeeded;
    /// a degraded start returns `false` while leaving the system serving.
    #[instrument(skip(self))]
    pub async fn initialize_system(&self) -> bool {
        let _guard = self.init_lock.lock().await;
        if self.state.lock().state == SystemState::Initialized {
            debug!("system already initialized; nothing to do");
            return true;
        }
        self.run_full_initialization(None).await
    }

    /// Unconditionally re-run full system initialization, replacing every
    /// component's subscriptions.
    #[instrument(skip(self))]
    pub async fn force_reinitialize(&self) -> bool {
        let _guard = self.init_lock.lock().await;
        let previous = self.state.lock().state;
        self.run_full_initialization(Some(previous)).await
    }

    /// Re-run a single named initializer. An unknown name fails immediately
    /// with no side effects; a known one always results in exactly one
    /// `system.maintenance` event, whatever the initializer returned.
    #[instrument(skip(self))]
    pub async fn reinitialize_component(&self, name: &str) -> CoreResult<bool> {
        let component: ComponentName = name.parse()?;
        let initializer = self
            .registry
            .get(&component)
            .cloned()
            .ok_or_else(|| CoreError::UnknownComponent(name.to_owned()))?;

        let _guard = self.init_lock.lock().await;
        self.drop_subscriptions(component);
        let outcome = initializer.initialize(&self.ctx).await;
        if !outcome.success {
            warn!(component = %component, "component reinitialization failed");
        }
        self.subscriptions
            .lock()
            .insert(component, outcome.subscriptions);

        {
            let mut state = self.state.lock();
            state.components.insert(component, outcome.success);
            state.state = Self::aggregate_state(&self.registry, &state.components);
        }

        self.publish_maintenance(
            MaintenanceAction::ComponentReinitialized,
            Some(component),
            outcome.success,
            None,
        )
        .await;
        info!(component = %component, success = outcome.success, "component reinitialized");
        Ok(outcome.success)
    }

    /// Pure read of aggregate state; safe to poll frequently.
    pub fn is_system_initialized(&self) -> bool {
        self.state.lock().is_initialized()
    }

    /// Copy of the full initialization state.
    pub fn snapshot(&self) -> InitializationState {
        self.state.lock().clone()
    }

    pub fn status(&self) -> StatusSnapshot {
        let state = self.snapshot();
        let counts = self.ctx.counters.snapshot();
        let event_counts = EventType::ALL
            .into_iter()
            .map(|event_type| {
                (
                    event_type.as_str().to_owned(),
                    counts.get(&event_type).copied().unwrap_or(0),
                )
            })
            .collect();
        StatusSnapshot {
            initialized: state.is_initialized(),
            state: state.state,
            components: state.components,
            event_counts,
            total_events: self.ctx.counters.total(),
            subscription_count: self.ctx.bus.total_subscriptions(),
        }
    }

    /// Close the bus and drain detached background work.
    pub async fn shutdown(&self) {
        self.ctx.bus.close();
        self.ctx.background.drain(Duration::from_secs(5)).await;
        info!("orchestrator shut down");
    }

    async fn run_full_initialization(&self, previous_state: Option<SystemState>) -> bool {
        self.state.lock().state = SystemState::Initializing;
        for component in self.registry.keys().copied().collect::<Vec<_>>() {
            self.drop_subscriptions(component);
        }

        let mut results = IndexMap::new();
        for (component, initializer) in &self.registry {
            let outcome = initializer.initialize(&self.ctx).await;
            if outcome.success {
                debug!(component = %component, "component initialized");
            } else {
                warn!(component = %component, "component initializer failed; continuing");
            }
            self.subscriptions
                .lock()
                .insert(*component, outcome.subscriptions);
            results.insert(*component, outcome.success);
        }

        let all_ok = results.values().all(|ok| *ok);
        let new_state = Self::aggregate_state(&self.registry, &results);
        {
            let mut state = self.state.lock();
            state.components = results;
            state.state = new_state;
        }

        let action = if previous_state.is_some() {
            MaintenanceAction::SystemReinitialized
        } else {
            MaintenanceAction::SystemInitialized
        };
        self.publish_maintenance(action, None, all_ok, previous_state)
            .await;
        info!(state = %new_state, success = all_ok, "system initialization complete");
        all_ok
    }

    /// Aggregate rule: the events component is the hard prerequisite. With it
    /// up the system is at least `PartiallyInitialized`; without it the
    /// bootstrap did not happen.
    fn aggregate_state(
        registry: &IndexMap<ComponentName, Arc<dyn ComponentInitializer>>,
        components: &IndexMap<ComponentName, bool>,
    ) -> SystemState {
        let events_ok = components
            .get(&ComponentName::Events)
            .copied()
            .unwrap_or(false);
        let all_ok = !components.is_empty()
            && registry
                .keys()
                .all(|component| components.get(component) == Some(&true));
        if all_ok {
            SystemState::Initialized
        } else if events_ok {
            SystemState::PartiallyInitialized
        } else {
            SystemState::NotInitialized
        }
    }

    fn drop_subscriptions(&self, component: ComponentName) {
        let handles = self.subscriptions.lock().remove(&component);
        if let Some(handles) = handles {
            for handle in &handles {
                self.ctx.bus.unsubscribe(handle);
            }
        }
    }

    async fn publish_maintenance(
        &self,
        action: MaintenanceAction,
        component: Option<ComponentName>,
        success: bool,
        previous_state: Option<SystemState>,
    ) {
        let kind = EventKind::SystemMaintenance {
            action,
            component,
            success,
            previous_state,
        };
        if let Err(cause) = self.ctx.bus.publish(kind, EventSource::system()).await {
            warn!(%cause, "could not publish maintenance event");
        }
    }
}
