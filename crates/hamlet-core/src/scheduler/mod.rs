//! Tick scheduling
//!
//! The scheduler owns the simulation heartbeat. Each tick drains pending
//! arrival events and then fires one decision request per active agent, in
//! registration order, without waiting for completions. The first tick runs
//! a priming batch so the backend has per-agent sessions ready; until
//! priming succeeds the scheduler stays idle and ticks are dropped.

use crate::agents::AgentStore;
use crate::decision::DecisionDispatcher;
use crate::transport::DecisionBackend;
use crate::world::ArrivalEvent;
use hamlet_common::{HamletError, Result, SimulationConfig};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Priming,
    Running,
    Paused,
    Stopped,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Priming => "priming",
            SchedulerState::Running => "running",
            SchedulerState::Paused => "paused",
            SchedulerState::Stopped => "stopped",
        };
        write!(f, "{}", s)
    }
}

pub struct TickScheduler {
    store: Arc<AgentStore>,
    backend: Arc<dyn DecisionBackend>,
    dispatcher: Arc<DecisionDispatcher>,
    config: SimulationConfig,
    state: RwLock<SchedulerState>,
    arrivals: Mutex<Option<mpsc::UnboundedReceiver<ArrivalEvent>>>,
    tick_count: AtomicU64,
}

impl TickScheduler {
    pub fn new(
        store: Arc<AgentStore>,
        backend: Arc<dyn DecisionBackend>,
        dispatcher: Arc<DecisionDispatcher>,
        config: SimulationConfig,
        arrivals: Option<mpsc::UnboundedReceiver<ArrivalEvent>>,
    ) -> Self {
        Self {
            store,
            backend,
            dispatcher,
            config,
            state: RwLock::new(SchedulerState::Idle),
            arrivals: Mutex::new(arrivals),
            tick_count: AtomicU64::new(0),
        }
    }

    pub async fn state(&self) -> SchedulerState {
        *self.state.read().await
    }

    pub fn ticks(&self) -> u64 {
        self.tick_count.load(Ordering::SeqCst)
    }

    /// Request one tick. The first successful trigger primes the backend;
    /// a failed priming attempt drops the tick and leaves the scheduler
    /// idle so the next trigger retries it.
    pub async fn trigger_tick(&self) {
        // Check-and-set under one lock: concurrent triggers (auto loop plus
        // a manual tick) must not both observe Idle and double-prime.
        let needs_priming = {
            let mut state = self.state.write().await;
            match *state {
                SchedulerState::Stopped => {
                    debug!("tick requested on a stopped scheduler, ignoring");
                    return;
                }
                SchedulerState::Paused => {
                    debug!("tick requested while paused, skipping");
                    return;
                }
                SchedulerState::Priming => {
                    debug!("priming already in flight, dropping tick");
                    return;
                }
                SchedulerState::Idle => {
                    *state = SchedulerState::Priming;
                    true
                }
                SchedulerState::Running => false,
            }
        };

        if needs_priming {
            let agent_ids = self.store.ids_in_order().await;
            match self.backend.prime(&agent_ids, false).await {
                Ok(()) => {
                    info!(agents = agent_ids.len(), "backend primed, scheduler running");
                    *self.state.write().await = SchedulerState::Running;
                }
                Err(err) => {
                    warn!(error = %err, "priming failed, dropping tick");
                    *self.state.write().await = SchedulerState::Idle;
                    return;
                }
            }
        }
        self.run_tick().await;
    }

    async fn run_tick(&self) {
        let tick = self.tick_count.fetch_add(1, Ordering::SeqCst) + 1;

        // Settle movement completions before building the next prompts.
        if let Some(receiver) = self.arrivals.lock().await.as_mut() {
            while let Ok(event) = receiver.try_recv() {
                self.dispatcher.handle_arrival(&event).await;
            }
        }

        if !self.backend.is_connected() && self.config.pause_on_error {
            warn!(tick, "backend disconnected, pausing scheduler");
            *self.state.write().await = SchedulerState::Paused;
            return;
        }

        let agent_ids = self.store.ids_in_order().await;
        debug!(tick, agents = agent_ids.len(), "dispatching decision wave");
        for agent_id in agent_ids {
            let dispatcher = self.dispatcher.clone();
            // Fire and forget: the tick boundary gates dispatch, not
            // completion. Slow responses land whenever they land.
            tokio::spawn(async move {
                dispatcher.request_decision(&agent_id).await;
            });
        }

        if self.config.push_environment {
            let update = self.dispatcher.environment_update().await;
            if let Err(err) = self.backend.push_environment(&update).await {
                warn!(tick, error = %err, "environment push failed");
                if self.config.pause_on_error {
                    *self.state.write().await = SchedulerState::Paused;
                }
            }
        }
    }

    pub async fn pause(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != SchedulerState::Running {
            return Err(HamletError::Generic(format!(
                "cannot pause while {}", *state
            )));
        }
        *state = SchedulerState::Paused;
        info!("scheduler paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<()> {
        let mut state = self.state.write().await;
        if *state != SchedulerState::Paused {
            return Err(HamletError::Generic(format!(
                "cannot resume while {}", *state
            )));
        }
        *state = SchedulerState::Running;
        info!("scheduler resumed");
        Ok(())
    }

    /// Terminal until [`TickScheduler::restart`].
    pub async fn stop(&self) {
        *self.state.write().await = SchedulerState::Stopped;
        info!("scheduler stopped");
    }

    /// Back to idle; the next trigger re-primes the backend.
    pub async fn restart(&self) {
        *self.state.write().await = SchedulerState::Idle;
        info!("scheduler reset, will re-prime on next tick");
    }

    /// Drive automatic ticks until stopped.
    pub async fn run(&self) {
        let mut interval =
            tokio::time::interval(std::time::Duration::from_secs(self.config.tick_interval_secs));
        loop {
            interval.tick().await;
            if *self.state.read().await == SchedulerState::Stopped {
                break;
            }
            self.trigger_tick().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentRecord;
    use crate::transport::{DecisionRequest, DecisionResponse, EnvironmentUpdate};
    use crate::world::local::{LocalWorld, LocalWorldConfig};
    use crate::world::LocationRegistry;
    use async_trait::async_trait;
    use hamlet_common::WorldPosition;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    /// Backend that counts calls and can be told to fail priming.
    struct CountingBackend {
        fail_prime: AtomicBool,
        prime_calls: AtomicU64,
        generate_calls: AtomicU64,
        connected: AtomicBool,
        prime_delay: Option<Duration>,
    }

    impl CountingBackend {
        fn new() -> Self {
            Self {
                fail_prime: AtomicBool::new(false),
                prime_calls: AtomicU64::new(0),
                generate_calls: AtomicU64::new(0),
                connected: AtomicBool::new(true),
                prime_delay: None,
            }
        }

        fn with_slow_prime(delay: Duration) -> Self {
            Self {
                prime_delay: Some(delay),
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl DecisionBackend for CountingBackend {
        async fn register_agent(&self, _agent_id: &str, _initial_location: &str) -> Result<()> {
            Ok(())
        }

        async fn deregister_agent(&self, _agent_id: &str) -> Result<()> {
            Ok(())
        }

        async fn generate(&self, request: &DecisionRequest) -> Result<DecisionResponse> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(DecisionResponse {
                agent_id: request.agent_id.clone(),
                text: "NOTHING:".to_string(),
                action: String::new(),
                location: String::new(),
            })
        }

        async fn prime(&self, _agent_ids: &[String], _force: bool) -> Result<()> {
            self.prime_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.prime_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_prime.load(Ordering::SeqCst) {
                Err(HamletError::Transport("prime refused".into()))
            } else {
                Ok(())
            }
        }

        async fn prime_profile(&self, _agent_id: &str, _force: bool) -> Result<()> {
            Ok(())
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }

        async fn push_environment(&self, _update: &EnvironmentUpdate) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }
    }

    async fn scheduler_with(
        backend: Arc<CountingBackend>,
        config: SimulationConfig,
    ) -> (TickScheduler, Arc<AgentStore>) {
        let (world, arrivals) = LocalWorld::new(LocalWorldConfig::default());
        let world = Arc::new(world);
        let store = Arc::new(AgentStore::new());
        store
            .insert(AgentRecord::new("a1", "quiet", "home"))
            .await
            .unwrap();
        world
            .spawn_agent("a1", WorldPosition::new(0.0, 0.0, 0.0))
            .await;
        let dispatcher = Arc::new(DecisionDispatcher::new(
            store.clone(),
            backend.clone(),
            world.clone(),
            world.clone(),
            world,
            Arc::new(LocationRegistry::new()),
            config.clone(),
        ));
        let scheduler = TickScheduler::new(
            store.clone(),
            backend,
            dispatcher,
            config,
            Some(arrivals),
        );
        (scheduler, store)
    }

    #[tokio::test]
    async fn failed_priming_drops_the_tick_and_stays_idle() {
        let backend = Arc::new(CountingBackend::new());
        backend.fail_prime.store(true, Ordering::SeqCst);
        let (scheduler, _store) = scheduler_with(backend.clone(), SimulationConfig::default()).await;

        scheduler.trigger_tick().await;

        assert_eq!(scheduler.state().await, SchedulerState::Idle);
        assert_eq!(scheduler.ticks(), 0);
        assert_eq!(backend.prime_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn first_successful_tick_primes_then_dispatches() {
        let backend = Arc::new(CountingBackend::new());
        let (scheduler, _store) = scheduler_with(backend.clone(), SimulationConfig::default()).await;

        scheduler.trigger_tick().await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(scheduler.state().await, SchedulerState::Running);
        assert_eq!(scheduler.ticks(), 1);
        assert_eq!(backend.prime_calls.load(Ordering::SeqCst), 1);
        assert_eq!(backend.generate_calls.load(Ordering::SeqCst), 1);

        // Second tick must not re-prime.
        scheduler.trigger_tick().await;
        assert_eq!(backend.prime_calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.ticks(), 2);
    }

    #[tokio::test]
    async fn concurrent_triggers_prime_only_once() {
        let backend = Arc::new(CountingBackend::with_slow_prime(Duration::from_millis(50)));
        let (scheduler, _store) = scheduler_with(backend.clone(), SimulationConfig::default()).await;
        let scheduler = Arc::new(scheduler);

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.trigger_tick().await })
        };
        let second = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.trigger_tick().await })
        };
        first.await.unwrap();
        second.await.unwrap();

        // One trigger primes and runs the tick; the other sees the priming
        // in flight and drops its tick.
        assert_eq!(backend.prime_calls.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.ticks(), 1);
        assert_eq!(scheduler.state().await, SchedulerState::Running);
    }

    #[tokio::test]
    async fn paused_scheduler_skips_ticks_until_resumed() {
        let backend = Arc::new(CountingBackend::new());
        let (scheduler, _store) = scheduler_with(backend.clone(), SimulationConfig::default()).await;
        scheduler.trigger_tick().await;

        scheduler.pause().await.unwrap();
        scheduler.trigger_tick().await;
        assert_eq!(scheduler.ticks(), 1);

        scheduler.resume().await.unwrap();
        scheduler.trigger_tick().await;
        assert_eq!(scheduler.ticks(), 2);
    }

    #[tokio::test]
    async fn pause_is_only_valid_while_running() {
        let backend = Arc::new(CountingBackend::new());
        let (scheduler, _store) = scheduler_with(backend, SimulationConfig::default()).await;
        assert!(scheduler.pause().await.is_err());
        assert!(scheduler.resume().await.is_err());
    }

    #[tokio::test]
    async fn restart_goes_through_priming_again() {
        let backend = Arc::new(CountingBackend::new());
        let (scheduler, _store) = scheduler_with(backend.clone(), SimulationConfig::default()).await;

        scheduler.trigger_tick().await;
        scheduler.stop().await;
        scheduler.trigger_tick().await;
        assert_eq!(scheduler.ticks(), 1);

        scheduler.restart().await;
        scheduler.trigger_tick().await;
        assert_eq!(backend.prime_calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.ticks(), 2);
    }

    #[tokio::test]
    async fn disconnected_backend_pauses_when_configured() {
        let backend = Arc::new(CountingBackend::new());
        let config = SimulationConfig {
            pause_on_error: true,
            ..SimulationConfig::default()
        };
        let (scheduler, _store) = scheduler_with(backend.clone(), config).await;

        scheduler.trigger_tick().await;
        assert_eq!(scheduler.state().await, SchedulerState::Running);

        backend.connected.store(false, Ordering::SeqCst);
        scheduler.trigger_tick().await;
        assert_eq!(scheduler.state().await, SchedulerState::Paused);
    }
}
