//! In-memory agent state store

use crate::agents::AgentRecord;
use hamlet_common::{HamletError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Type alias for agent storage
type AgentMap = Arc<RwLock<HashMap<String, Arc<RwLock<AgentRecord>>>>>;

/// Store of all registered agents, keyed by id.
///
/// Each record sits behind its own lock so in-flight decision tasks for
/// different agents never contend. A separate order list preserves
/// registration order, which is the dispatch order within a tick.
pub struct AgentStore {
    agents: AgentMap,
    order: RwLock<Vec<String>>,
}

impl AgentStore {
    pub fn new() -> Self {
        Self {
            agents: Arc::new(RwLock::new(HashMap::new())),
            order: RwLock::new(Vec::new()),
        }
    }

    /// Insert a new record. Fails with `DuplicateId` when the id is taken.
    pub async fn insert(&self, record: AgentRecord) -> Result<()> {
        let agent_id = record.agent_id.clone();
        let mut agents = self.agents.write().await;
        if agents.contains_key(&agent_id) {
            return Err(HamletError::DuplicateId(agent_id));
        }
        agents.insert(agent_id.clone(), Arc::new(RwLock::new(record)));
        self.order.write().await.push(agent_id.clone());
        debug!(agent_id = %agent_id, "agent record created");
        Ok(())
    }

    /// Remove a record, returning it so the caller can finish teardown.
    pub async fn remove(&self, agent_id: &str) -> Option<Arc<RwLock<AgentRecord>>> {
        let removed = self.agents.write().await.remove(agent_id);
        if removed.is_some() {
            self.order.write().await.retain(|id| id != agent_id);
            debug!(agent_id = %agent_id, "agent record removed");
        }
        removed
    }

    pub async fn get(&self, agent_id: &str) -> Option<Arc<RwLock<AgentRecord>>> {
        self.agents.read().await.get(agent_id).cloned()
    }

    pub async fn contains(&self, agent_id: &str) -> bool {
        self.agents.read().await.contains_key(agent_id)
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Agent ids in registration order; the per-tick dispatch order.
    pub async fn ids_in_order(&self) -> Vec<String> {
        self.order.read().await.clone()
    }

    /// Apply a movement-completion signal.
    ///
    /// The agent may have been deregistered while the move was in flight,
    /// so a missing record is a logged no-op, not an error.
    pub async fn complete_move(&self, agent_id: &str) -> bool {
        let Some(record) = self.get(agent_id).await else {
            warn!(agent_id = %agent_id, "arrival signal for unknown agent, ignoring");
            return false;
        };
        let mut record = record.write().await;
        record.complete_move();
        debug!(agent_id = %agent_id, location = %record.location, "agent arrived");
        true
    }
}

impl Default for AgentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = AgentStore::new();
        store
            .insert(AgentRecord::new("a1", "curious", "home"))
            .await
            .unwrap();

        let result = store.insert(AgentRecord::new("a1", "grumpy", "plaza")).await;
        assert!(matches!(result, Err(HamletError::DuplicateId(_))));
        assert_eq!(store.len().await, 1);

        // The original record is untouched.
        let record = store.get("a1").await.unwrap();
        assert_eq!(record.read().await.personality, "curious");
    }

    #[tokio::test]
    async fn order_follows_registration() {
        let store = AgentStore::new();
        for id in ["c", "a", "b"] {
            store.insert(AgentRecord::new(id, "", "home")).await.unwrap();
        }
        assert_eq!(store.ids_in_order().await, vec!["c", "a", "b"]);

        store.remove("a").await;
        assert_eq!(store.ids_in_order().await, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn arrival_for_removed_agent_is_a_noop() {
        let store = AgentStore::new();
        store
            .insert(AgentRecord::new("a1", "", "home"))
            .await
            .unwrap();
        store.remove("a1").await;
        assert!(!store.complete_move("a1").await);
    }

    #[tokio::test]
    async fn arrival_applies_pending_destination() {
        let store = AgentStore::new();
        store
            .insert(AgentRecord::new("a1", "", "home"))
            .await
            .unwrap();
        {
            let record = store.get("a1").await.unwrap();
            record.write().await.begin_move("library");
        }
        assert!(store.complete_move("a1").await);
        let record = store.get("a1").await.unwrap();
        let record = record.read().await;
        assert_eq!(record.location, "library");
        assert_eq!(record.desired_location, "");
        assert!(!record.is_moving);
    }
}
