//! Owns every NPC's movement state machine and ticks them in order.

use crate::config::MovementConfig;
use crate::error::{MovementError, MovementResult};
use crate::events::MovementEventBus;
use crate::executor::MovementExecutor;
use crate::formation::{FormationCoordinator, FormationSpawner};
use crate::movement::{NPCMovement, TickContext};
use crate::registry::{AgentRegistry, World, WorldObject};
use crate::state::MoveState;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use warband_common::{EntityId, FactionId, Vec3};

/// Manages all NPC movement.
#[derive(Debug)]
pub struct NPCMovementManager {
    npcs: HashMap<EntityId, NPCMovement>,
    /// Registration order; ticks run in this order
    order: Vec<EntityId>,
    formation: FormationCoordinator,
    config: Arc<MovementConfig>,
}

impl Default for NPCMovementManager {
    fn default() -> Self {
        Self::new(MovementConfig::default())
    }
}

impl NPCMovementManager {
    /// Creates a manager with the given tuning.
    #[must_use]
    pub fn new(config: MovementConfig) -> Self {
        Self {
            npcs: HashMap::new(),
            order: Vec::new(),
            formation: FormationCoordinator::new(config.formation),
            config: Arc::new(config),
        }
    }

    /// Shared tuning.
    #[must_use]
    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Formation slots.
    #[must_use]
    pub fn formation(&self) -> &FormationCoordinator {
        &self.formation
    }

    /// Places a new NPC in the world and starts managing it.
    pub fn register_npc(
        &mut self,
        world: &mut World,
        faction: FactionId,
        position: Vec3,
        is_leader: bool,
    ) -> EntityId {
        let mut object = WorldObject::npc(faction, position);
        object.is_leader = is_leader;
        let id = world.insert(object);
        self.insert(NPCMovement::new(id, position, is_leader, Arc::clone(&self.config)));
        id
    }

    /// Starts managing an NPC that is already in the world.
    pub fn register_existing(
        &mut self,
        world: &dyn AgentRegistry,
        id: EntityId,
    ) -> MovementResult<()> {
        if self.npcs.contains_key(&id) {
            return Err(MovementError::AlreadyRegistered(id));
        }
        let object = world.object(id).ok_or(MovementError::NotFound(id))?;
        self.insert(NPCMovement::new(
            id,
            object.position,
            object.is_leader,
            Arc::clone(&self.config),
        ));
        Ok(())
    }

    fn insert(&mut self, npc: NPCMovement) {
        debug!("Registered NPC {}", npc.id());
        self.order.push(npc.id());
        self.npcs.insert(npc.id(), npc);
    }

    /// Puts `follower` in the next free formation slot of `leader`.
    pub fn assign_follower(
        &mut self,
        leader: EntityId,
        follower: EntityId,
        spawner: &mut dyn FormationSpawner,
    ) -> MovementResult<usize> {
        let mut follower_npc = self
            .npcs
            .remove(&follower)
            .ok_or(MovementError::NotFound(follower))?;
        let result = match self.npcs.get_mut(&leader) {
            Some(leader_npc) => self.formation.assign_slot(
                leader_npc.context_mut(),
                follower_npc.context_mut(),
                spawner,
            ),
            None => Err(MovementError::NotFound(leader)),
        };
        self.npcs.insert(follower, follower_npc);
        result
    }

    /// Stops managing an NPC and removes it from the world along with its
    /// formation bookkeeping.
    pub fn despawn_npc(&mut self, id: EntityId, world: &mut World) -> MovementResult<()> {
        let npc = self.npcs.remove(&id).ok_or(MovementError::NotFound(id))?;
        self.order.retain(|&o| o != id);

        self.formation.release_follower(npc.context(), world);
        for follower in self.formation.release_leader(id) {
            let Some(follower) = self.npcs.get_mut(&follower) else {
                continue;
            };
            let ctx = follower.context_mut();
            ctx.formation_slot_index = None;
            if let Some(marker) = ctx.formation_slot_ref.take() {
                world.remove_marker(marker);
            }
            follower.report_leader_died();
        }
        world.remove(id);
        info!("Despawned NPC {id}");
        Ok(())
    }

    /// Marks an agent dead and tells its followers.
    pub fn report_death(&mut self, id: EntityId, world: &mut World) {
        world.kill(id);
        for follower in self.formation.followers_of(id) {
            if let Some(follower) = self.npcs.get_mut(&follower) {
                follower.report_leader_died();
            }
        }
    }

    /// Gets an NPC's state machine.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&NPCMovement> {
        self.npcs.get(&id)
    }

    /// Gets an NPC's state machine mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut NPCMovement> {
        self.npcs.get_mut(&id)
    }

    fn npc_mut(&mut self, id: EntityId) -> MovementResult<&mut NPCMovement> {
        self.npcs.get_mut(&id).ok_or(MovementError::NotFound(id))
    }

    /// Returns the number of managed NPCs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.npcs.len()
    }

    /// Returns whether no NPCs are managed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.npcs.is_empty()
    }

    /// NPC handles in registration order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.order.iter().copied()
    }

    /// Counts NPCs per movement state.
    #[must_use]
    pub fn state_counts(&self) -> HashMap<MoveState, usize> {
        let mut counts = HashMap::new();
        for npc in self.npcs.values() {
            *counts.entry(npc.current_state()).or_insert(0) += 1;
        }
        counts
    }

    // === Forwarded signals ===

    /// See [`NPCMovement::set_player_target`].
    pub fn set_player_target(&mut self, id: EntityId, player: EntityId) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.set_player_target(player))
    }

    /// See [`NPCMovement::assign_event`].
    pub fn assign_event(&mut self, id: EntityId, waypoint: Vec3) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.assign_event(waypoint))
    }

    /// See [`NPCMovement::assign_activity`].
    pub fn assign_activity(&mut self, id: EntityId, location: Vec3) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.assign_activity(location))
    }

    /// See [`NPCMovement::resume_activity`].
    pub fn resume_activity(&mut self, id: EntityId) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.resume_activity())
    }

    /// See [`NPCMovement::report_enemies_dead`].
    pub fn report_enemies_dead(&mut self, id: EntityId) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.report_enemies_dead())
    }

    /// See [`NPCMovement::set_confrontation_allowed`].
    pub fn set_confrontation_allowed(&mut self, id: EntityId, allowed: bool) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.set_confrontation_allowed(allowed))
    }

    /// See [`NPCMovement::set_route`].
    pub fn set_route(&mut self, id: EntityId, route: Vec<Vec3>) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.set_route(route))
    }

    /// See [`NPCMovement::set_default_state`].
    pub fn set_default_state(&mut self, id: EntityId, state: MoveState) -> MovementResult<bool> {
        Ok(self.npc_mut(id)?.set_default_state(state))
    }

    // === Per-tick ===

    /// Runs the overlap query for every NPC and feeds it to its filter.
    pub fn sense(&mut self, world: &dyn AgentRegistry) {
        let radius = self.config.engagement_radius;
        for id in &self.order {
            let (Some(npc), Some(me)) = (self.npcs.get_mut(id), world.object(*id)) else {
                continue;
            };
            if !me.alive {
                continue;
            }
            let nearby = world.overlapping(me.position, radius);
            npc.filter_enemies(&nearby, &me);
        }
    }

    /// Ticks every NPC once, in registration order. Each NPC's summary is
    /// published right after its own tick, so NPCs ticked later see it this
    /// update and earlier ones on the next.
    pub fn update(
        &mut self,
        delta_time: f32,
        world: &mut World,
        executor: &mut dyn MovementExecutor,
        events: &MovementEventBus,
    ) {
        for id in &self.order {
            let Some(npc) = self.npcs.get_mut(id) else {
                continue;
            };
            if !world.is_alive(*id) {
                continue;
            }
            let mut tick = TickContext {
                world: &*world,
                executor: &mut *executor,
                formation: &self.formation,
                events,
            };
            npc.move_ai(&mut tick, delta_time);
            world.publish(*id, npc.published());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{MoveTarget, RecordingExecutor};

    const RED: FactionId = FactionId::new(2);
    const BLUE: FactionId = FactionId::new(3);

    fn warband(manager: &mut NPCMovementManager, world: &mut World) -> (EntityId, Vec<EntityId>) {
        let leader = manager.register_npc(world, RED, Vec3::ZERO, true);
        let followers: Vec<_> = (0..3)
            .map(|i| manager.register_npc(world, RED, Vec3::new(i as f32, 0.0, -3.0), false))
            .collect();
        for &follower in &followers {
            manager
                .assign_follower(leader, follower, world)
                .expect("assign follower");
        }
        (leader, followers)
    }

    #[test]
    fn test_register_and_get() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::default();
        let id = manager.register_npc(&mut world, RED, Vec3::ZERO, false);

        assert_eq!(manager.len(), 1);
        assert_eq!(manager.get(id).map(NPCMovement::current_state), Some(MoveState::Null));
        assert!(world.is_alive(id));
    }

    #[test]
    fn test_register_existing_twice_rejected() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::default();
        let id = world.insert(WorldObject::npc(RED, Vec3::ZERO));

        manager.register_existing(&world, id).expect("first");
        let again = manager.register_existing(&world, id);
        assert!(matches!(again, Err(MovementError::AlreadyRegistered(_))));

        let missing = manager.register_existing(&world, EntityId::from_raw(u64::MAX));
        assert!(matches!(missing, Err(MovementError::NotFound(_))));
    }

    #[test]
    fn test_assign_follower_slots() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::default();
        let (leader, followers) = warband(&mut manager, &mut world);

        let slots: Vec<_> = followers
            .iter()
            .map(|&f| manager.get(f).and_then(|n| n.context().formation_slot_index))
            .collect();
        assert_eq!(slots, vec![Some(0), Some(1), Some(2)]);
        assert_eq!(manager.formation().followers_of(leader), followers);
        assert_eq!(
            manager.get(leader).and_then(|n| n.context().battle_follower),
            Some(followers[0])
        );
    }

    #[test]
    fn test_assign_follower_unknown() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::default();
        let follower = manager.register_npc(&mut world, RED, Vec3::ZERO, false);

        let result = manager.assign_follower(EntityId::from_raw(u64::MAX), follower, &mut world);
        assert!(matches!(result, Err(MovementError::NotFound(_))));
        assert!(manager.get(follower).is_some());
    }

    #[test]
    fn test_update_publishes_each_npc() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::new(MovementConfig {
            default_state: MoveState::Follow,
            ..MovementConfig::default()
        });
        let (leader, followers) = warband(&mut manager, &mut world);
        let mut exec = RecordingExecutor::new();
        let events = MovementEventBus::default();

        manager.update(0.1, &mut world, &mut exec, &events);

        for &follower in &followers {
            assert_eq!(
                world.published(follower).map(|p| p.state),
                Some(MoveState::Follow)
            );
            assert_eq!(exec.moves_for(follower).len(), 1);
        }
        assert_eq!(world.published(leader).map(|p| p.state), Some(MoveState::Follow));
    }

    #[test]
    fn test_despawned_leader_routs_followers() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::new(MovementConfig {
            default_state: MoveState::Follow,
            ..MovementConfig::default()
        });
        let (leader, followers) = warband(&mut manager, &mut world);
        let mut exec = RecordingExecutor::new();
        let events = MovementEventBus::default();
        manager.update(0.1, &mut world, &mut exec, &events);
        // Leader, three followers and their slot markers.
        assert_eq!(world.len(), 7);

        manager.despawn_npc(leader, &mut world).expect("despawn");
        manager.update(0.1, &mut world, &mut exec, &events);

        assert!(manager.get(leader).is_none());
        assert!(world.object(leader).is_none());
        assert_eq!(world.len(), followers.len());
        for follower in followers {
            let npc = manager.get(follower).expect("follower");
            assert_eq!(npc.current_state(), MoveState::Flee);
            assert!(npc.context().formation_slot_ref.is_none());
        }
    }

    #[test]
    fn test_sense_feeds_filter() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::default();
        let red = manager.register_npc(&mut world, RED, Vec3::ZERO, true);
        let blue = manager.register_npc(&mut world, BLUE, Vec3::new(10.0, 0.0, 0.0), true);

        manager.sense(&world);

        let red_ctx = manager.get(red).expect("red").context();
        assert_eq!(red_ctx.enemy_leader, Some(blue));
        assert_eq!(red_ctx.rendezvous(), Some(Vec3::new(5.0, 0.0, 0.0)));
        assert_eq!(manager.get(blue).and_then(|n| n.context().enemy_leader), Some(red));
    }

    #[test]
    fn test_forwarded_signals() {
        let mut world = World::new();
        let mut manager = NPCMovementManager::default();
        let id = manager.register_npc(&mut world, RED, Vec3::ZERO, false);
        let player = world.insert(WorldObject::player(Vec3::new(4.0, 0.0, 0.0)));
        let mut exec = RecordingExecutor::new();
        let events = MovementEventBus::default();

        assert_eq!(manager.set_player_target(id, player).ok(), Some(true));
        manager.update(0.1, &mut world, &mut exec, &events);

        assert_eq!(manager.get(id).map(NPCMovement::current_state), Some(MoveState::MoveToPlayer));
        assert_eq!(exec.moves_for(id), vec![MoveTarget::Agent(player)]);
        assert!(matches!(
            manager.assign_event(EntityId::from_raw(u64::MAX), Vec3::ZERO),
            Err(MovementError::NotFound(_))
        ));
        assert_eq!(manager.state_counts().get(&MoveState::MoveToPlayer), Some(&1));
    }
}
