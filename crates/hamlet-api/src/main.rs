//! Hamlet control-surface server
//!
//! Exposes agent registration, manual actions, environment snapshots, and
//! scheduler control over HTTP. The simulation itself (a local world plus
//! the tick scheduler) runs in-process; decisions come from the configured
//! decision backend.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use clap::Parser;
use hamlet_common::{BackendConfig, SimulationConfig, WorldPosition};
use hamlet_core::transport::{BackendClient, DecisionBackend};
use hamlet_core::world::local::{LocalWorld, LocalWorldConfig};
use hamlet_core::{
    AgentStore, DecisionDispatcher, LifecycleManager, LocationRegistry, TickScheduler,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod api;

/// Command-line arguments for the Hamlet API server
#[derive(Parser, Debug)]
#[clap(name = "hamlet-api", about = "HTTP control surface for the Hamlet agent orchestrator")]
struct Args {
    /// Host to bind to
    #[clap(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[clap(short, long, default_value = "3000")]
    port: u16,

    /// Base URL of the decision backend
    #[clap(long, default_value = "http://127.0.0.1:5000")]
    backend_url: String,

    /// Maximum number of registered agents
    #[clap(long, default_value_t = hamlet_common::DEFAULT_MAX_AGENTS)]
    max_agents: usize,

    /// Seconds between automatic ticks
    #[clap(long, default_value_t = hamlet_common::DEFAULT_TICK_INTERVAL_SECS)]
    tick_interval: u64,

    /// Drive ticks automatically instead of waiting for POST /sim/tick
    #[clap(long)]
    auto_tick: bool,

    /// Pause the scheduler when the backend goes unreachable
    #[clap(long)]
    pause_on_error: bool,

    /// Push an aggregated environment snapshot to the backend each tick
    #[clap(long)]
    push_environment: bool,

    /// Conversation length in rounds
    #[clap(long, default_value_t = hamlet_common::DEFAULT_CONVERSATION_ROUNDS)]
    conversation_rounds: u32,
}

/// Built-in town map. The registry stays extensible at runtime.
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

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Hamlet API server...");
    info!("Decision backend: {}", args.backend_url);

    let backend_config = BackendConfig {
        base_url: args.backend_url.clone(),
        ..BackendConfig::default()
    };
    let sim_config = SimulationConfig {
        max_agents: args.max_agents,
        tick_interval_secs: args.tick_interval,
        auto_tick: args.auto_tick,
        pause_on_error: args.pause_on_error,
        push_environment: args.push_environment,
        conversation_rounds: args.conversation_rounds,
        ..SimulationConfig::default()
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
    let lifecycle = Arc::new(LifecycleManager::new(
        store.clone(),
        backend.clone(),
        sim_config.max_agents,
    ));
    let dispatcher = Arc::new(DecisionDispatcher::new(
        store.clone(),
        backend.clone(),
        world.clone(),
        world.clone(),
        world.clone(),
        locations.clone(),
        sim_config.clone(),
    ));
    let scheduler = Arc::new(TickScheduler::new(
        store.clone(),
        backend.clone(),
        dispatcher.clone(),
        sim_config.clone(),
        Some(arrivals),
    ));

    // Keep the world moving independently of decision ticks.
    {
        let world = world.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
            loop {
                interval.tick().await;
                world.advance().await;
            }
        });
    }

    if sim_config.auto_tick {
        let scheduler = scheduler.clone();
        tokio::spawn(async move {
            scheduler.run().await;
        });
        info!("Automatic ticks every {}s", sim_config.tick_interval_secs);
    }

    let state = api::AppState {
        store,
        lifecycle,
        dispatcher,
        scheduler,
        backend,
        world,
        locations,
    };

    let app = Router::new()
        .merge(api::agents::agent_routes(state.clone()))
        .merge(api::sim::sim_routes(state))
        .fallback(api::fallback)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", args.host, args.port);
    info!("Binding to address: {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
