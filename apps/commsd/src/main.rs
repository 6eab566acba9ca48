use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use comms_init::InMemoryDataStore;
use comms_kernel::CommsKernelBuilder;
use comms_metrics::InMemoryMetricStore;
use comms_protocol::{ChannelId, ConversationId, EventKind, EventSource, MessageId};
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "commsd")]
#[command(about = "Communication-module event core demo daemon")]
struct Cli {
    #[arg(long, default_value = "demo-channel")]
    channel: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();

    let metric_store = Arc::new(InMemoryMetricStore::new());
    let data_store = Arc::new(InMemoryDataStore::new().with_collection(
        "channels",
        vec![json!({"id": cli.channel, "kind": "demo", "active": true})],
    ));
    let kernel = CommsKernelBuilder::new()
        .metric_store(metric_store.clone())
        .data_store(data_store)
        .build();

    if !kernel.initialize_system().await {
        warn!("system initialized in degraded state");
    }
    info!(initialized = kernel.is_system_initialized(), "bootstrap complete");

    let channel = ChannelId::new(cli.channel);
    let conversation = ConversationId::new("cv-demo-1");

    kernel
        .publish_event(
            EventKind::ConversationCreated {
                channel_id: Some(channel.clone()),
                conversation_id: Some(conversation.clone()),
            },
            EventSource::api(),
        )
        .await?;
    kernel
        .publish_event(
            EventKind::MessageCreated {
                channel_id: Some(channel.clone()),
                conversation_id: Some(conversation.clone()),
                message_id: Some(MessageId::new("m-demo-1")),
            },
            EventSource::api(),
        )
        .await?;
    kernel
        .publish_event(
            EventKind::ConversationClosed {
                channel_id: Some(channel.clone()),
                conversation_id: Some(conversation),
            },
            EventSource::ui(),
        )
        .await?;

    let reinitialized = kernel.reinitialize_component("metrics").await?;
    info!(component = "metrics", success = reinitialized, "component reinitialized");

    for sample in metric_store.samples() {
        info!(
            metric = %sample.metric_type,
            channel = %sample.channel_id,
            value = sample.value,
            "sample recorded"
        );
    }

    let status = kernel.status();
    info!(
        state = %status.state,
        total_events = status.total_events,
        subscriptions = status.subscription_count,
        "final status"
    );

    kernel.shutdown().await;
    Ok(())
}
