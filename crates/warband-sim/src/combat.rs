//! Toy combat resolver.
//!
//! Consumes the movement core's engage signals, counts ticks of contact, and
//! kills whoever takes enough. Reports deaths back to the core the way a real
//! combat system would: the victim's followers learn their leader died, and
//! attackers with nobody left to fight are told their enemies are dead.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};
use warband_ai::{
    AgentRegistry, MoveState, MovementEvent, NPCMovementManager, ObjectKind, World,
};
use warband_common::{planar_distance, EntityId};

/// Tracks engagements and applies contact damage.
#[derive(Debug, Clone)]
pub struct CombatResolver {
    hits_to_kill: u32,
    reach: f32,
    /// Attacker to NPC target
    engagements: BTreeMap<EntityId, EntityId>,
    damage: BTreeMap<EntityId, u32>,
    kills: Vec<EntityId>,
    player_hits: u32,
}

impl CombatResolver {
    /// Creates a resolver. `reach` is how close an attacker must stay to land hits.
    #[must_use]
    pub fn new(hits_to_kill: u32, reach: f32) -> Self {
        Self {
            hits_to_kill: hits_to_kill.max(1),
            reach,
            engagements: BTreeMap::new(),
            damage: BTreeMap::new(),
            kills: Vec::new(),
            player_hits: 0,
        }
    }

    /// NPCs killed so far, in order.
    #[must_use]
    pub fn kills(&self) -> &[EntityId] {
        &self.kills
    }

    /// Engage signals aimed at the player.
    #[must_use]
    pub fn player_hits(&self) -> u32 {
        self.player_hits
    }

    /// Records engage signals from this tick.
    pub fn observe(&mut self, events: &[MovementEvent]) {
        for event in events {
            if let MovementEvent::Engage {
                entity_id,
                target,
                player,
            } = *event
            {
                if player {
                    self.player_hits += 1;
                } else {
                    self.engagements.insert(entity_id, target);
                }
            }
        }
    }

    /// Applies one tick of contact damage and reports the fallout.
    pub fn resolve(&mut self, manager: &mut NPCMovementManager, world: &mut World) {
        let mut killed = BTreeSet::new();

        self.engagements.retain(|&attacker, &mut target| {
            let fighting = manager
                .get(attacker)
                .is_some_and(|npc| npc.current_state() == MoveState::MoveToEnemy);
            fighting && world.is_alive(attacker) && world.is_alive(target)
        });

        for (&attacker, &target) in &self.engagements {
            let (Some(a), Some(t)) = (world.position(attacker), world.position(target)) else {
                continue;
            };
            if planar_distance(a, t) > self.reach || killed.contains(&target) {
                continue;
            }
            let taken = self.damage.entry(target).or_insert(0);
            *taken += 1;
            if *taken >= self.hits_to_kill {
                killed.insert(target);
            }
        }

        for &target in &killed {
            info!("NPC {target} killed");
            manager.report_death(target, world);
            self.kills.push(target);
        }

        let radius = manager.config().engagement_radius;
        let orphaned: Vec<_> = self
            .engagements
            .iter()
            .filter(|(_, target)| killed.contains(*target))
            .map(|(&attacker, _)| attacker)
            .collect();
        for attacker in orphaned {
            self.engagements.remove(&attacker);
            if !Self::enemies_remain(world, attacker, radius) {
                if let Ok(false) | Err(_) = manager.report_enemies_dead(attacker) {
                    debug!("NPC {attacker} was not fighting when its enemies died");
                }
            }
        }
    }

    fn enemies_remain(world: &World, attacker: EntityId, radius: f32) -> bool {
        let Some(me) = world.object(attacker) else {
            return false;
        };
        world
            .overlapping(me.position, radius)
            .iter()
            .any(|o| o.kind == ObjectKind::Npc && o.alive && me.faction.opposes(o.faction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warband_ai::{MovementConfig, MovementEventBus, RecordingExecutor};
    use warband_common::{FactionId, Vec3};

    fn duel() -> (NPCMovementManager, World, EntityId, EntityId) {
        let mut world = World::new();
        let mut manager = NPCMovementManager::new(MovementConfig {
            default_state: MoveState::MoveToLocation,
            ..MovementConfig::default()
        });
        let red = manager.register_npc(&mut world, FactionId::new(2), Vec3::ZERO, true);
        let blue =
            manager.register_npc(&mut world, FactionId::new(3), Vec3::new(1.0, 0.0, 0.0), false);
        (manager, world, red, blue)
    }

    #[test]
    fn test_contact_kills_after_enough_hits() {
        let (mut manager, mut world, red, blue) = duel();
        manager.set_confrontation_allowed(red, true).expect("red");
        let mut exec = RecordingExecutor::new();
        let events = MovementEventBus::default();
        let mut combat = CombatResolver::new(3, 2.0);

        // Location -> battle -> enemy, engaging on the third tick.
        for _ in 0..3 {
            manager.sense(&world);
            manager.update(0.05, &mut world, &mut exec, &events);
            combat.observe(&events.drain());
        }
        assert_eq!(
            manager.get(red).map(|n| n.current_state()),
            Some(MoveState::MoveToEnemy)
        );

        for _ in 0..3 {
            combat.resolve(&mut manager, &mut world);
        }
        assert_eq!(combat.kills(), &[blue]);
        assert!(!world.is_alive(blue));
        assert!(manager.get(red).is_some_and(|n| n.context().enemies_are_dead));
    }

    #[test]
    fn test_idle_attacker_dropped() {
        let (mut manager, mut world, red, blue) = duel();
        let mut combat = CombatResolver::new(1, 2.0);
        combat.engagements.insert(red, blue);

        // Red is not fighting, so the engagement is dropped.
        combat.resolve(&mut manager, &mut world);
        assert!(combat.kills().is_empty());
        assert!(combat.engagements.is_empty());
    }

    #[test]
    fn test_observe_splits_player_hits() {
        let mut combat = CombatResolver::new(3, 2.0);
        let a = EntityId::new();
        let b = EntityId::new();
        combat.observe(&[
            MovementEvent::Engage { entity_id: a, target: b, player: false },
            MovementEvent::Engage { entity_id: b, target: a, player: true },
            MovementEvent::FleeCompleted { entity_id: a },
        ]);

        assert_eq!(combat.player_hits(), 1);
        assert_eq!(combat.engagements.get(&a), Some(&b));
        assert!(!combat.engagements.contains_key(&b));
    }
}
