//! In-process world adapter
//!
//! A minimal movement/perception/presentation implementation for the
//! headless runner and tests: constant-speed straight-line movement
//! advanced once per tick, radius/field-of-view/line-of-sight perception,
//! and speech/status lines kept in memory and logged.

use crate::world::{ArrivalEvent, MovementSystem, NearbyEntity, NearbyReport, Perception, Presentation};
use async_trait::async_trait;
use hamlet_common::WorldPosition;
use std::collections::HashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

/// A static object agents can perceive (a bench, a bookshelf, ...).
#[derive(Debug, Clone)]
pub struct WorldObject {
    pub id: String,
    pub position: WorldPosition,
    /// Objects tagged "Default" are placement scaffolding and are skipped
    /// in snapshot narration
    pub tag: String,
}

/// A spherical occluder used for line-of-sight checks.
#[derive(Debug, Clone, Copy)]
struct Occluder {
    center: WorldPosition,
    radius: f32,
}

#[derive(Debug, Clone)]
struct AgentBody {
    position: WorldPosition,
    /// Unit-ish vector of the last movement direction; crude facing
    facing: (f32, f32),
    target: Option<WorldPosition>,
}

struct WorldState {
    agents: HashMap<String, AgentBody>,
    objects: Vec<WorldObject>,
    occluders: Vec<Occluder>,
    speech_log: Vec<(String, String)>,
    status_lines: HashMap<String, String>,
}

/// Tuning knobs for the local world.
#[derive(Debug, Clone)]
pub struct LocalWorldConfig {
    pub detection_radius: f32,
    pub field_of_view_degrees: f32,
    pub line_of_sight: bool,
    /// World units an agent covers per call to [`LocalWorld::advance`]
    pub speed_per_tick: f32,
}

impl Default for LocalWorldConfig {
    fn default() -> Self {
        Self {
            detection_radius: hamlet_common::DEFAULT_DETECTION_RADIUS,
            field_of_view_degrees: hamlet_common::DEFAULT_FIELD_OF_VIEW_DEGREES,
            line_of_sight: false,
            speed_per_tick: 3.0,
        }
    }
}

pub struct LocalWorld {
    config: LocalWorldConfig,
    state: Mutex<WorldState>,
    arrivals: mpsc::UnboundedSender<ArrivalEvent>,
}

impl LocalWorld {
    /// Build a world plus the receiving end of its arrival signals.
    pub fn new(config: LocalWorldConfig) -> (Self, mpsc::UnboundedReceiver<ArrivalEvent>) {
        let (arrivals, rx) = mpsc::unbounded_channel();
        (
            Self {
                config,
                state: Mutex::new(WorldState {
                    agents: HashMap::new(),
                    objects: Vec::new(),
                    occluders: Vec::new(),
                    speech_log: Vec::new(),
                    status_lines: HashMap::new(),
                }),
                arrivals,
            },
            rx,
        )
    }

    pub async fn spawn_agent(&self, agent_id: &str, position: WorldPosition) {
        let mut state = self.state.lock().await;
        state.agents.insert(
            agent_id.to_string(),
            AgentBody {
                position,
                facing: (1.0, 0.0),
                target: None,
            },
        );
    }

    pub async fn remove_agent(&self, agent_id: &str) {
        self.state.lock().await.agents.remove(agent_id);
    }

    pub async fn place_object(&self, id: &str, position: WorldPosition, tag: &str) {
        self.state.lock().await.objects.push(WorldObject {
            id: id.to_string(),
            position,
            tag: tag.to_string(),
        });
    }

    pub async fn place_occluder(&self, center: WorldPosition, radius: f32) {
        self.state.lock().await.occluders.push(Occluder { center, radius });
    }

    /// Advance every moving agent one step; emits an [`ArrivalEvent`] for
    /// each agent that reaches its target this step.
    pub async fn advance(&self) {
        let mut state = self.state.lock().await;
        let speed = self.config.speed_per_tick;
        let mut arrived = Vec::new();

        for (id, body) in state.agents.iter_mut() {
            let Some(target) = body.target else { continue };
            let remaining = body.position.distance_to(&target);
            if remaining <= speed {
                body.position = target;
                body.target = None;
                arrived.push(id.clone());
            } else {
                let dx = (target.x - body.position.x) / remaining;
                let dz = (target.z - body.position.z) / remaining;
                body.position.x += dx * speed;
                body.position.y += (target.y - body.position.y) / remaining * speed;
                body.position.z += dz * speed;
                body.facing = (dx, dz);
            }
        }
        drop(state);

        for agent_id in arrived {
            debug!(agent_id = %agent_id, "agent reached its target");
            // Receiver dropped means nobody is consuming arrivals anymore.
            let _ = self.arrivals.send(ArrivalEvent { agent_id });
        }
    }

    /// Lines spoken so far, for tests and the headless runner's printout.
    pub async fn speech_log(&self) -> Vec<(String, String)> {
        self.state.lock().await.speech_log.clone()
    }

    pub async fn status_line(&self, agent_id: &str) -> Option<String> {
        self.state.lock().await.status_lines.get(agent_id).cloned()
    }

    fn in_field_of_view(&self, facing: (f32, f32), from: &WorldPosition, to: &WorldPosition) -> bool {
        let dx = to.x - from.x;
        let dz = to.z - from.z;
        let len = (dx * dx + dz * dz).sqrt();
        if len == 0.0 {
            return true;
        }
        let dot = (facing.0 * dx + facing.1 * dz) / len;
        let half_fov = (self.config.field_of_view_degrees / 2.0).to_radians();
        dot.clamp(-1.0, 1.0).acos() <= half_fov
    }

    fn has_line_of_sight(occluders: &[Occluder], from: &WorldPosition, to: &WorldPosition) -> bool {
        let seg = (to.x - from.x, to.y - from.y, to.z - from.z);
        let len_sq = seg.0 * seg.0 + seg.1 * seg.1 + seg.2 * seg.2;
        if len_sq == 0.0 {
            return true;
        }
        for occ in occluders {
            // Closest point on the segment to the occluder center.
            let rel = (
                occ.center.x - from.x,
                occ.center.y - from.y,
                occ.center.z - from.z,
            );
            let t = ((rel.0 * seg.0 + rel.1 * seg.1 + rel.2 * seg.2) / len_sq).clamp(0.0, 1.0);
            let closest = WorldPosition::new(
                from.x + seg.0 * t,
                from.y + seg.1 * t,
                from.z + seg.2 * t,
            );
            if closest.distance_to(&occ.center) < occ.radius {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl MovementSystem for LocalWorld {
    async fn move_to(&self, agent_id: &str, target: WorldPosition) -> bool {
        let mut state = self.state.lock().await;
        match state.agents.get_mut(agent_id) {
            Some(body) => {
                body.target = Some(target);
                true
            }
            None => false,
        }
    }

    async fn position_of(&self, agent_id: &str) -> Option<WorldPosition> {
        self.state
            .lock()
            .await
            .agents
            .get(agent_id)
            .map(|body| body.position)
    }
}

#[async_trait]
impl Perception for LocalWorld {
    async fn nearby(&self, agent_id: &str) -> NearbyReport {
        let state = self.state.lock().await;
        let Some(observer) = state.agents.get(agent_id) else {
            return NearbyReport::default();
        };
        let origin = observer.position;
        let facing = observer.facing;

        let visible = |position: &WorldPosition| -> Option<f32> {
            let distance = origin.distance_to(position);
            if distance > self.config.detection_radius {
                return None;
            }
            if !self.in_field_of_view(facing, &origin, position) {
                return None;
            }
            if self.config.line_of_sight
                && !Self::has_line_of_sight(&state.occluders, &origin, position)
            {
                return None;
            }
            Some(distance)
        };

        let mut agents: Vec<NearbyEntity> = state
            .agents
            .iter()
            .filter(|(id, _)| id.as_str() != agent_id)
            .filter_map(|(id, body)| {
                visible(&body.position).map(|distance| NearbyEntity {
                    id: id.clone(),
                    distance,
                    tag: String::new(),
                })
            })
            .collect();

        let mut objects: Vec<NearbyEntity> = state
            .objects
            .iter()
            .filter_map(|object| {
                visible(&object.position).map(|distance| NearbyEntity {
                    id: object.id.clone(),
                    distance,
                    tag: object.tag.clone(),
                })
            })
            .collect();

        agents.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        objects.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        NearbyReport { agents, objects }
    }
}

#[async_trait]
impl Presentation for LocalWorld {
    async fn display_speech(&self, agent_id: &str, text: &str, duration_secs: u64) {
        info!(agent_id = %agent_id, duration_secs, "{}", text);
        let mut state = self.state.lock().await;
        state.speech_log.push((agent_id.to_string(), text.to_string()));
    }

    async fn update_status(&self, agent_id: &str, text: &str) {
        let mut state = self.state.lock().await;
        state
            .status_lines
            .insert(agent_id.to_string(), text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> (LocalWorld, mpsc::UnboundedReceiver<ArrivalEvent>) {
        LocalWorld::new(LocalWorldConfig {
            detection_radius: 10.0,
            field_of_view_degrees: 360.0,
            line_of_sight: false,
            speed_per_tick: 3.0,
        })
    }

    #[tokio::test]
    async fn movement_emits_arrival_after_enough_ticks() {
        let (world, mut arrivals) = world();
        world.spawn_agent("a1", WorldPosition::new(0.0, 0.0, 0.0)).await;
        assert!(world.move_to("a1", WorldPosition::new(7.0, 0.0, 0.0)).await);

        world.advance().await;
        world.advance().await;
        assert!(arrivals.try_recv().is_err());

        world.advance().await;
        assert_eq!(
            arrivals.try_recv().unwrap(),
            ArrivalEvent { agent_id: "a1".to_string() }
        );
        assert_eq!(
            world.position_of("a1").await,
            Some(WorldPosition::new(7.0, 0.0, 0.0))
        );
    }

    #[tokio::test]
    async fn perception_excludes_observer_and_sorts_by_distance() {
        let (world, _rx) = world();
        world.spawn_agent("a1", WorldPosition::new(0.0, 0.0, 0.0)).await;
        world.spawn_agent("far", WorldPosition::new(8.0, 0.0, 0.0)).await;
        world.spawn_agent("near", WorldPosition::new(2.0, 0.0, 0.0)).await;
        world.spawn_agent("out_of_range", WorldPosition::new(50.0, 0.0, 0.0)).await;

        let report = world.nearby("a1").await;
        let ids: Vec<&str> = report.agents.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["near", "far"]);
    }

    #[tokio::test]
    async fn field_of_view_filters_entities_behind_observer() {
        let (world, _rx) = LocalWorld::new(LocalWorldConfig {
            field_of_view_degrees: 90.0,
            ..LocalWorldConfig::default()
        });
        // Facing defaults to +x.
        world.spawn_agent("a1", WorldPosition::new(0.0, 0.0, 0.0)).await;
        world.spawn_agent("ahead", WorldPosition::new(5.0, 0.0, 0.0)).await;
        world.spawn_agent("behind", WorldPosition::new(-5.0, 0.0, 0.0)).await;

        let report = world.nearby("a1").await;
        let ids: Vec<&str> = report.agents.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["ahead"]);
    }

    #[tokio::test]
    async fn occluders_block_line_of_sight() {
        let (world, _rx) = LocalWorld::new(LocalWorldConfig {
            line_of_sight: true,
            field_of_view_degrees: 360.0,
            ..LocalWorldConfig::default()
        });
        world.spawn_agent("a1", WorldPosition::new(0.0, 0.0, 0.0)).await;
        world.spawn_agent("hidden", WorldPosition::new(8.0, 0.0, 0.0)).await;
        world.place_occluder(WorldPosition::new(4.0, 0.0, 0.0), 1.0).await;

        let report = world.nearby("a1").await;
        assert!(report.agents.is_empty());
    }

    #[tokio::test]
    async fn objects_carry_their_tags() {
        let (world, _rx) = world();
        world.spawn_agent("a1", WorldPosition::new(0.0, 0.0, 0.0)).await;
        world
            .place_object("bench", WorldPosition::new(1.0, 0.0, 0.0), "")
            .await;
        world
            .place_object("scaffold", WorldPosition::new(2.0, 0.0, 0.0), "Default")
            .await;

        let report = world.nearby("a1").await;
        assert_eq!(report.objects.len(), 2);
        assert_eq!(report.objects[0].id, "bench");
        assert_eq!(report.objects[1].tag, "Default");
    }
}
