//! Player-side enemy filtering.
//!
//! The player's attack pulls hostile NPCs in reach into `MoveToPlayer`. This
//! module only decides who is in reach; the caller forwards the result to
//! each NPC's `set_player_target`.

use crate::registry::{AgentRegistry, ObjectKind, WorldObject};
use warband_common::EntityId;

/// Hostile NPCs around the player, refreshed on each query.
#[derive(Debug, Clone, Default)]
pub struct PlayerTargeting {
    enemies: Vec<EntityId>,
}

impl PlayerTargeting {
    /// Creates empty targeting state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enemies from the last filter pass, in candidate order.
    #[must_use]
    pub fn enemies(&self) -> &[EntityId] {
        &self.enemies
    }

    /// Keeps live NPCs hostile to `player`.
    pub fn filter_enemies(&mut self, candidates: &[WorldObject], player: &WorldObject) {
        self.enemies = candidates
            .iter()
            .filter(|c| c.id != player.id && c.kind == ObjectKind::Npc && c.alive)
            .filter(|c| player.faction.opposes(c.faction))
            .map(|c| c.id)
            .collect();
    }

    /// NPCs within `radius` that the player's attack engages.
    pub fn engage_in_range(
        &mut self,
        player: &WorldObject,
        registry: &dyn AgentRegistry,
        radius: f32,
    ) -> Vec<EntityId> {
        let nearby = registry.overlapping(player.position, radius);
        self.filter_enemies(&nearby, player);
        self.enemies.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::World;
    use warband_common::{FactionId, Vec3};

    #[test]
    fn test_player_filter() {
        let mut world = World::new();
        let player = world.insert(WorldObject::player(Vec3::ZERO));
        let bandit = world.insert(WorldObject::npc(FactionId::new(4), Vec3::X));
        let villager = world.insert(WorldObject::npc(FactionId::NEUTRAL, Vec3::X));
        let guard = world.insert(WorldObject::npc(FactionId::PLAYER, Vec3::X));
        let corpse = world.insert(WorldObject::npc(FactionId::new(4), Vec3::Z));
        world.kill(corpse);

        let mut targeting = PlayerTargeting::new();
        let player_obj = world.object(player).expect("player");
        let candidates: Vec<_> = world.iter().collect();
        targeting.filter_enemies(&candidates, &player_obj);

        assert_eq!(targeting.enemies(), &[bandit]);
        for skipped in [player, villager, guard, corpse] {
            assert!(!targeting.enemies().contains(&skipped));
        }
    }

    #[test]
    fn test_engage_in_range() {
        let mut world = World::new();
        let player = world.insert(WorldObject::player(Vec3::ZERO));
        let near = world.insert(WorldObject::npc(FactionId::new(4), Vec3::new(2.0, 0.0, 0.0)));
        world.insert(WorldObject::npc(FactionId::new(4), Vec3::new(20.0, 0.0, 0.0)));

        let mut targeting = PlayerTargeting::new();
        let player_obj = world.object(player).expect("player");
        assert_eq!(targeting.engage_in_range(&player_obj, &world, 5.0), vec![near]);
    }
}
