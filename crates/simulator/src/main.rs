//! Multi-session coordination demo against the in-memory services.
//!
//! Spins up two tabs for one intake specialist plus a competing specialist,
//! then walks through claim, cross-tab convergence, contention, and release,
//! logging each observed snapshot.

use std::sync::Arc;
use std::time::Duration;

use intake_bus::{
    BroadcastChannel, ChangeFeedChannel, CrossTabHub, NotificationChannel, PubSubChannel,
    StorageSignalChannel,
};
use intake_core::{ChangeEvent, ChangeType, QueueConfig, RecordDisplay};
use intake_queue::{QueueSession, SessionServices};
use intake_store::{InMemoryLeaseStore, InMemoryQueueService, IntakeRecord, RecordCatalog};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "intake_simulator=info,intake_queue=debug,intake_bus=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = QueueConfig::from_env();
    tracing::info!(?config, "Simulator starting");

    // Shared server-side state.
    let catalog = RecordCatalog::new();
    for (id, name, priority) in [
        ("00Q001", "Garcia v. TransCo", 80),
        ("00Q002", "Okafor slip-and-fall", 65),
        ("00Q003", "Nguyen rear-end MVA", 40),
    ] {
        catalog
            .upsert(IntakeRecord::new(
                id,
                RecordDisplay {
                    name: name.to_string(),
                    status: "New".to_string(),
                    case_type: "MVA".to_string(),
                    phone: "555-0100".to_string(),
                },
                priority,
            ))
            .await;
    }
    let store = InMemoryLeaseStore::new(catalog.clone(), config.lease_ttl);
    let queue = InMemoryQueueService::new(catalog.clone(), store.clone());
    let hub = CrossTabHub::new();
    let (feed, _) = broadcast::channel::<ChangeEvent>(64);

    let services = |feed: &broadcast::Sender<ChangeEvent>| SessionServices {
        store: store.clone(),
        queue: queue.clone(),
        channels: {
            let channels: Vec<Arc<dyn NotificationChannel>> = vec![
                Arc::new(PubSubChannel::new()),
                Arc::new(BroadcastChannel::new(hub.clone())),
                Arc::new(StorageSignalChannel::new(hub.clone())),
                Arc::new(ChangeFeedChannel::connect(feed.subscribe())),
            ];
            channels
        },
    };

    let tab_a = QueueSession::start("ana".into(), services(&feed), config.clone()).await;
    let tab_a2 = QueueSession::start("ana".into(), services(&feed), config.clone()).await;
    let rival = QueueSession::start("ben".into(), services(&feed), config.clone()).await;

    // Ana claims the top lead from her first tab.
    let lease = tab_a.claim(None).await?;
    tracing::info!(record_id = %lease.record_id, "Ana claimed the top lead");

    // Her second tab converges through the cross-tab signal.
    let mut second = tab_a2.snapshot();
    while second.borrow().holder_lease.is_none() {
        second.changed().await?;
    }
    tracing::info!(
        record_id = %second.borrow().holder_lease.as_ref().map(|l| l.record_id.to_string()).unwrap_or_default(),
        "Ana's second tab agrees"
    );

    // Ben cannot take the same record, but claim-next hands him the next one.
    match rival.claim(Some(lease.record_id.clone())).await {
        Err(err) => tracing::info!(outcome = %err, "Ben's direct grab refused"),
        Ok(_) => unreachable!("record was already leased"),
    }
    let bens = rival.claim(None).await?;
    tracing::info!(record_id = %bens.record_id, "Ben claimed the next lead");

    // Give the hold timers a couple of ticks.
    tokio::time::sleep(Duration::from_secs(2)).await;
    for (label, session) in [("ana", &tab_a), ("ben", &rival)] {
        let elapsed_display = session.elapsed().borrow().clone();
        tracing::info!(holder = label, display = ?elapsed_display, "Elapsed hold display");
    }

    // A server-side edit to a relevant field forces Ana's lease away.
    store.force_release(&lease.record_id).await;
    let _ = feed.send(ChangeEvent {
        record_id: lease.record_id.clone(),
        change_type: ChangeType::Update,
        changed_fields: vec!["Status".to_string()],
    });
    let mut first = tab_a.snapshot();
    while first.borrow().has_assignment() {
        first.changed().await?;
    }
    tracing::info!("Ana's lease was force-released and both tabs reconciled");

    rival.release().await?;
    tracing::info!("Ben released; queue is fully unclaimed again");

    tab_a.teardown();
    tab_a2.teardown();
    rival.teardown();
    Ok(())
}
