//! Shared in-process rollups fed by bus subscriptions and read by the
//! status surface.

use std::collections::{HashMap, HashSet};

use comms_protocol::{ChannelId, EventType};
use parking_lot::Mutex;

/// Aggregate per-event-type counters, maintained by the monitoring
/// component.
#[derive(Debug, Default)]
pub struct EventCounters {
    counts: Mutex<HashMap<EventType, u64>>,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event_type: EventType) {
        *self.counts.lock().entry(event_type).or_insert(0) += 1;
    }

    pub fn count(&self, event_type: EventType) -> u64 {
        self.counts.lock().get(&event_type).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    pub fn snapshot(&self) -> HashMap<EventType, u64> {
        self.counts.lock().clone()
    }
}

/// Per-channel rollup: the configured channel cache (loaded by the channels
/// component) plus per-channel event counts (maintained by channel_metrics).
#[derive(Debug, Default)]
pub struct ChannelActivity {
    known: Mutex<HashSet<ChannelId>>,
    counts: Mutex<HashMap<ChannelId, u64>>,
}

impl ChannelActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a channel as configured. Idempotent.
    pub fn note_known_channel(&self, channel_id: ChannelId) {
        self.known.lock().insert(channel_id);
    }

    pub fn is_known(&self, channel_id: &ChannelId) -> bool {
        self.known.lock().contains(channel_id)
    }

    pub fn known_channel_count(&self) -> usize {
        self.known.lock().len()
    }

    pub fn record(&self, channel_id: &ChannelId) {
        *self.counts.lock().entry(channel_id.clone()).or_insert(0) += 1;
    }

    pub fn count(&self, channel_id: &ChannelId) -> u64 {
        self.counts.lock().get(channel_id).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<ChannelId, u64> {
        self.counts.lock().clone()
    }
}
