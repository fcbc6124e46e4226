//! Agent registration and teardown

use crate::agents::{AgentRecord, AgentStore};
use crate::transport::DecisionBackend;
use hamlet_common::{HamletError, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Creates and destroys agent records and keeps the backend informed.
///
/// Local state is authoritative: failing to register an agent with the
/// backend does not roll back local creation, it is only logged. The same
/// policy applies to deregistration.
pub struct LifecycleManager {
    store: Arc<AgentStore>,
    backend: Arc<dyn DecisionBackend>,
    max_agents: usize,
}

impl LifecycleManager {
    pub fn new(store: Arc<AgentStore>, backend: Arc<dyn DecisionBackend>, max_agents: usize) -> Self {
        Self {
            store,
            backend,
            max_agents,
        }
    }

    /// Create an agent, enforcing the capacity limit and id uniqueness
    /// before any side effect.
    pub async fn create_agent(
        &self,
        agent_id: &str,
        personality: &str,
        initial_location: &str,
    ) -> Result<()> {
        if self.store.len().await >= self.max_agents {
            return Err(HamletError::CapacityExceeded {
                limit: self.max_agents,
            });
        }
        if self.store.contains(agent_id).await {
            return Err(HamletError::DuplicateId(agent_id.to_string()));
        }

        self.store
            .insert(AgentRecord::new(agent_id, personality, initial_location))
            .await?;
        info!(agent_id = %agent_id, location = %initial_location, "agent created");

        // Best-effort backend registration; local state stays authoritative.
        // A registered agent also gets its profile primed so it has a
        // session ready even when it joins after the batch handshake.
        if let Err(err) = self.backend.register_agent(agent_id, initial_location).await {
            warn!(agent_id = %agent_id, error = %err, "backend registration failed, keeping local agent");
        } else if let Err(err) = self.backend.prime_profile(agent_id, false).await {
            warn!(agent_id = %agent_id, error = %err, "profile priming failed, next batch prime covers it");
        }

        Ok(())
    }

    /// Remove an agent, exiting any conversation it is in first.
    ///
    /// Returns false for an unknown id; that is a no-op, not an error.
    pub async fn remove_agent(&self, agent_id: &str) -> bool {
        let Some(record) = self.store.remove(agent_id).await else {
            return false;
        };

        // Clear the partner's half of the pairing so the symmetric-pairing
        // invariant is restored in the same step.
        let partner_id = record.read().await.conversation_partner_id.clone();
        if let Some(partner_id) = partner_id {
            if let Some(partner) = self.store.get(&partner_id).await {
                partner.write().await.end_conversation();
            }
        }

        if let Err(err) = self.backend.deregister_agent(agent_id).await {
            warn!(agent_id = %agent_id, error = %err, "backend deregistration failed");
        }
        info!(agent_id = %agent_id, "agent removed");
        true
    }

    pub fn store(&self) -> &Arc<AgentStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{
        DecisionRequest, DecisionResponse, EnvironmentUpdate,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Backend stub whose registration calls can be made to fail.
    struct FlakyBackend {
        fail_register: AtomicBool,
        registrations: AtomicUsize,
        deregistrations: AtomicUsize,
        profile_primes: AtomicUsize,
    }

    impl FlakyBackend {
        fn new() -> Self {
            Self {
                fail_register: AtomicBool::new(false),
                registrations: AtomicUsize::new(0),
                deregistrations: AtomicUsize::new(0),
                profile_primes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DecisionBackend for FlakyBackend {
        async fn register_agent(&self, _agent_id: &str, _initial_location: &str) -> Result<()> {
            self.registrations.fetch_add(1, Ordering::SeqCst);
            if self.fail_register.load(Ordering::SeqCst) {
                return Err(HamletError::Transport("backend down".into()));
            }
            Ok(())
        }

        async fn deregister_agent(&self, _agent_id: &str) -> Result<()> {
            self.deregistrations.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn generate(&self, _request: &DecisionRequest) -> Result<DecisionResponse> {
            Err(HamletError::Transport("not implemented".into()))
        }

        async fn prime(&self, _agent_ids: &[String], _force: bool) -> Result<()> {
            Ok(())
        }

        async fn prime_profile(&self, _agent_id: &str, _force: bool) -> Result<()> {
            self.profile_primes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn health(&self) -> Result<()> {
            Ok(())
        }

        async fn push_environment(&self, _update: &EnvironmentUpdate) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn manager(max_agents: usize) -> (LifecycleManager, Arc<FlakyBackend>) {
        let backend = Arc::new(FlakyBackend::new());
        let store = Arc::new(AgentStore::new());
        (
            LifecycleManager::new(store, backend.clone(), max_agents),
            backend,
        )
    }

    #[tokio::test]
    async fn capacity_limit_blocks_creation_without_mutation() {
        let (manager, backend) = manager(2);
        manager.create_agent("a1", "", "home").await.unwrap();
        manager.create_agent("a2", "", "home").await.unwrap();

        let result = manager.create_agent("a3", "", "home").await;
        assert!(matches!(result, Err(HamletError::CapacityExceeded { limit: 2 })));
        assert_eq!(manager.store().len().await, 2);
        // No backend side effect for the rejected agent.
        assert_eq!(backend.registrations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_before_backend_call() {
        let (manager, backend) = manager(8);
        manager.create_agent("a1", "", "home").await.unwrap();

        let result = manager.create_agent("a1", "", "plaza").await;
        assert!(matches!(result, Err(HamletError::DuplicateId(_))));
        assert_eq!(backend.registrations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn backend_failure_does_not_roll_back_local_creation() {
        let (manager, backend) = manager(8);
        backend.fail_register.store(true, Ordering::SeqCst);

        manager.create_agent("a1", "", "home").await.unwrap();
        assert!(manager.store().contains("a1").await);
        // No profile to prime when the registration never landed.
        assert_eq!(backend.profile_primes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn creation_primes_the_new_agents_profile() {
        let (manager, backend) = manager(8);
        manager.create_agent("a1", "", "home").await.unwrap();
        assert_eq!(backend.profile_primes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn removing_unknown_agent_returns_false() {
        let (manager, backend) = manager(8);
        assert!(!manager.remove_agent("ghost").await);
        assert_eq!(backend.deregistrations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn removal_clears_partner_pairing() {
        let (manager, _) = manager(8);
        manager.create_agent("a1", "", "plaza").await.unwrap();
        manager.create_agent("a2", "", "plaza").await.unwrap();

        {
            let store = manager.store();
            let a1 = store.get("a1").await.unwrap();
            a1.write().await.begin_conversation("a2", 3);
            let a2 = store.get("a2").await.unwrap();
            a2.write().await.begin_conversation("a1", 3);
        }

        assert!(manager.remove_agent("a1").await);
        let a2 = manager.store().get("a2").await.unwrap();
        let a2 = a2.read().await;
        assert!(!a2.is_in_conversation);
        assert!(a2.conversation_partner_id.is_none());
    }
}
