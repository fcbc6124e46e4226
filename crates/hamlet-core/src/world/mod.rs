//! Seams to the world the agents inhabit
//!
//! Movement, perception, and presentation are external collaborators (a
//! game engine, in the original deployment). The orchestration core only
//! consumes the narrow traits here; [`LocalWorld`] is an in-process
//! implementation used by the headless runner and the tests.

pub mod local;

pub use local::LocalWorld;

use async_trait::async_trait;
use hamlet_common::WorldPosition;
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Emitted by the movement subsystem when an agent reaches its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalEvent {
    pub agent_id: String,
}

/// An entity visible to an observer, pre-filtered and distance-annotated.
#[derive(Debug, Clone, Serialize)]
pub struct NearbyEntity {
    pub id: String,
    pub distance: f32,
    /// Placement marker; entities tagged "Default" are excluded from
    /// snapshot narration
    pub tag: String,
}

/// Everything an agent currently perceives, sorted by ascending distance.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NearbyReport {
    pub agents: Vec<NearbyEntity>,
    pub objects: Vec<NearbyEntity>,
}

/// Movement collaborator: start moving an agent toward a world position.
#[async_trait]
pub trait MovementSystem: Send + Sync {
    /// Returns false when the agent is unknown to the movement subsystem.
    async fn move_to(&self, agent_id: &str, target: WorldPosition) -> bool;

    /// Last known position, if the movement subsystem tracks this agent.
    async fn position_of(&self, agent_id: &str) -> Option<WorldPosition>;
}

/// Perception collaborator: what does this agent currently see?
///
/// Implementations apply detection radius, field-of-view, and (optionally)
/// line-of-sight filtering, exclude the observer, and sort by distance.
#[async_trait]
pub trait Perception: Send + Sync {
    async fn nearby(&self, agent_id: &str) -> NearbyReport;
}

/// Presentation collaborator: speech bubbles and status lines.
#[async_trait]
pub trait Presentation: Send + Sync {
    async fn display_speech(&self, agent_id: &str, text: &str, duration_secs: u64);
    async fn update_status(&self, agent_id: &str, text: &str);
}

/// Mapping of symbolic place names to world positions.
///
/// Seeded at startup, extensible at runtime; the dispatcher only reads it.
pub struct LocationRegistry {
    places: RwLock<HashMap<String, WorldPosition>>,
}

impl LocationRegistry {
    pub fn new() -> Self {
        Self {
            places: RwLock::new(HashMap::new()),
        }
    }

    pub async fn seed<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, WorldPosition)>,
    {
        let mut places = self.places.write().await;
        for (name, position) in entries {
            places.insert(name, position);
        }
    }

    pub async fn add_known_location(&self, name: &str, position: WorldPosition) {
        self.places.write().await.insert(name.to_string(), position);
    }

    pub async fn resolve(&self, name: &str) -> Option<WorldPosition> {
        self.places.read().await.get(name).copied()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.places.read().await.contains_key(name)
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.places.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for LocationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_is_extensible_at_runtime() {
        let registry = LocationRegistry::new();
        registry
            .seed([("home".to_string(), WorldPosition::new(0.0, 0.0, 0.0))])
            .await;
        assert!(registry.contains("home").await);
        assert!(!registry.contains("library").await);

        registry
            .add_known_location("library", WorldPosition::new(5.0, 0.0, 5.0))
            .await;
        assert_eq!(
            registry.resolve("library").await,
            Some(WorldPosition::new(5.0, 0.0, 5.0))
        );
        assert_eq!(registry.names().await, vec!["home", "library"]);
    }
}
