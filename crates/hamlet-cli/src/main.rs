//! Headless Hamlet runner
//!
//! Stands up a local world with a small town map and a handful of
//! personality-profiled residents, then drives the tick loop against a
//! decision backend. Useful for exercising the orchestration loop without
//! a game client attached.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use hamlet_common::{BackendConfig, SimulationConfig, WorldPosition};
use hamlet_core::transport::{BackendClient, DecisionBackend};
use hamlet_core::world::local::{LocalWorld, LocalWorldConfig};
use hamlet_core::{
    AgentStore, DecisionDispatcher, LifecycleManager, LocationRegistry, TickScheduler,
};
use tracing::info;
use tracing_subscriber::FmtSubscriber;

/// Command-line arguments for the Hamlet runner
#[derive(Parser)]
#[command(name = "hamlet", about = "Headless runner for the Hamlet agent orchestrator")]
pub struct Args {
    /// Base URL of the decision backend
    #[clap(long, default_value = "http://127.0.0.1:5000")]
    backend_url: String,

    /// Number of ticks to run; omit to run until interrupted
    #[clap(short, long)]
    ticks: Option<u64>,

    /// Seconds between ticks
    #[clap(long, default_value_t = hamlet_common::DEFAULT_TICK_INTERVAL_SECS)]
    tick_interval: u64,

    /// Pause the scheduler when the backend goes unreachable
    #[clap(long)]
    pause_on_error: bool,

    /// Push an aggregated environment snapshot to the backend each tick
    #[clap(long)]
    push_environment: bool,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,
}

struct Resident {
    agent_id: &'static str,
    personality: &'static str,
    location: &'static str,
}

fn residents() -> Vec<Resident> {
    vec![
        Resident {
            agent_id: "maria",
            personality: "A retired schoolteacher who loves the library and long chats.",
            location: "library",
        },
        Resident {
            agent_id: "tom",
            personality: "A restless market vendor, always on the move.",
            location: "market",
        },
        Resident {
            agent_id: "sam",
            personality: "A quiet gardener who keeps to the park unless spoken to.",
            location: "park",
        },
    ]
}

fn town_locations() -> Vec<(String, WorldPosition)> {
    vec![
        ("home".to_string(), WorldPosition::new(0.0, 0.0, 0.0)),
        ("library".to_string(), WorldPosition::new(40.0, 0.0, 10.0)),
        ("market".to_string(), WorldPosition::new(-30.0, 0.0, 25.0)),
        ("plaza".to_string(), WorldPosition::new(10.0, 0.0, -35.0)),
        ("park".to_string(), WorldPosition::new(-15.0, 0.0, -20.0)),
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let sim_config = SimulationConfig {
        tick_interval_secs: args.tick_interval,
        pause_on_error: args.pause_on_error,
        push_environment: args.push_environment,
        ..SimulationConfig::default()
    };
    let backend_config = BackendConfig {
        base_url: args.backend_url.clone(),
        ..BackendConfig::default()
    };

    let backend: Arc<dyn DecisionBackend> = Arc::new(BackendClient::new(&backend_config)?);

    let (world, arrivals) = LocalWorld::new(LocalWorldConfig {
        detection_radius: sim_config.detection_radius,
        field_of_view_degrees: sim_config.field_of_view_degrees,
        line_of_sight: sim_config.line_of_sight,
        ..LocalWorldConfig::default()
    });
    let world = Arc::new(world);

    let locations = Arc::new(LocationRegistry::new());
    locations.seed(town_locations()).await;

    let store = Arc::new(AgentStore::new());
    let lifecycle = LifecycleManager::new(store.clone(), backend.clone(), sim_config.max_agents);
    let dispatcher = Arc::new(DecisionDispatcher::new(
        store.clone(),
        backend.clone(),
        world.clone(),
        world.clone(),
        world.clone(),
        locations.clone(),
        sim_config.clone(),
    ));
    let scheduler = TickScheduler::new(
        store.clone(),
        backend.clone(),
        dispatcher,
        sim_config.clone(),
        Some(arrivals),
    );

    info!("Seeding residents...");
    for resident in residents() {
        lifecycle
            .create_agent(resident.agent_id, resident.personality, resident.location)
            .await?;
        let spawn_at = locations
            .resolve(resident.location)
            .await
            .unwrap_or(WorldPosition::new(0.0, 0.0, 0.0));
        world.spawn_agent(resident.agent_id, spawn_at).await;
    }

    match args.ticks {
        Some(count) => {
            info!("Running {} manual ticks", count);
            for tick in 1..=count {
                scheduler.trigger_tick().await;
                // Give in-flight decisions a moment to land, then let the
                // world advance movement.
                tokio::time::sleep(Duration::from_secs(args.tick_interval.max(1))).await;
                world.advance().await;
                print_town(&store, tick).await;
            }
        }
        None => {
            info!("Running automatic ticks every {}s, Ctrl-C to stop", args.tick_interval);
            {
                let world = world.clone();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(1));
                    loop {
                        interval.tick().await;
                        world.advance().await;
                    }
                });
            }
            scheduler.run().await;
        }
    }

    Ok(())
}

async fn print_town(store: &Arc<AgentStore>, tick: u64) {
    println!("--- tick {} ---", tick);
    for agent_id in store.ids_in_order().await {
        if let Some(record) = store.get(&agent_id).await {
            let r = record.read().await;
            println!("{:>8}  {:<10} [{}]  {}", r.agent_id, r.location, r.phase, r.status);
        }
    }
}
