//! Per-NPC movement context: state, targets, flags, and scratch geometry.

use crate::executor::MoveTarget;
use crate::state::MoveState;
use serde::{Deserialize, Serialize};
use warband_common::{EntityId, Vec3};

/// Everything the movement state machine knows about one NPC.
///
/// Handles to other agents are plain `EntityId`s; they may point at dead or
/// removed agents and are resolved through the registry before use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NPCMovementContext {
    /// This NPC's handle
    pub id: EntityId,
    /// Current movement state, changed only by the state machine
    pub(crate) current_state: MoveState,
    /// State to fall back to when no directive applies
    pub default_state: MoveState,

    // === Targets ===
    /// Enemy NPC this agent is fighting or closing on
    pub enemy_target: Option<EntityId>,
    /// Player who attacked this agent
    pub player_target: Option<EntityId>,
    /// Opposing leader paired with this leader for a rendezvous
    pub enemy_leader: Option<EntityId>,
    /// Midpoint between this leader and `enemy_leader`
    pub(crate) rendezvous_point: Vec3,
    /// Agent this NPC follows into battle
    pub follow_target: Option<EntityId>,
    /// Follower paired with this leader for battle
    pub battle_follower: Option<EntityId>,

    // === Group ===
    /// Whether this NPC leads a group
    pub is_leader: bool,
    /// Leader this NPC follows
    pub leader: Option<EntityId>,
    /// Index in the leader's slot table, set once
    pub formation_slot_index: Option<usize>,
    /// Marker standing in this NPC's formation slot
    pub formation_slot_ref: Option<EntityId>,

    // === Flags ===
    /// Set on reaching attack range; keeps the fight going through knockback
    pub has_seen_enemy: bool,
    /// Reported once the enemies this agent fights are dead
    pub enemies_are_dead: bool,
    /// A leader still has to order its followers in (once per combat)
    pub set_followers_move_to_enemy: bool,
    /// The rendezvous move has been issued for `issued_rendezvous`
    pub move_to_leader_issued: bool,
    /// The current scripted destination still needs a move command
    pub move_to_location_pending: bool,
    /// Arrived at the activity location and holding
    pub at_activity: bool,
    /// Follow moves allowed
    pub move_permitted: bool,
    /// Battles allowed
    pub confrontation_allowed: bool,

    // === Directives ===
    /// Spawn location; where a routed follower flees to
    pub origin: Vec3,
    /// Scripted destinations for a leader, visited in order
    pub scripted_route: Vec<Vec3>,
    /// Next entry of `scripted_route`
    pub route_index: usize,
    /// Scripted event waypoint
    pub event_waypoint: Option<Vec3>,
    /// Activity location
    pub activity_location: Option<Vec3>,
    /// Non-combat state to resume after fighting the player
    pub resume_state: Option<MoveState>,
    /// Leader death reported by the combat collaborator
    pub leader_died: bool,
    /// Activity scheduler asked this NPC to move on
    pub activity_resume_requested: bool,
    /// Redirect requested by an external signal, applied on the next tick
    pub(crate) pending_state: Option<MoveState>,

    // === Bookkeeping ===
    /// Rendezvous point the last rendezvous move was sent to
    pub(crate) issued_rendezvous: Option<Vec3>,
    /// Target of the last command sent to the executor in this state
    pub(crate) issued: Option<MoveTarget>,
    /// Target the last engage signal was sent for
    pub(crate) engaged_with: Option<EntityId>,
    /// Enemies from the last filter pass, in candidate order
    pub enemies_nearby: Vec<EntityId>,

    // === Scratch (recomputed each tick) ===
    /// Distance to whatever the current state measured against
    pub last_measured_distance: f32,
    /// Distance to the combat target
    pub target_distance: f32,
    /// Ground-plane direction to the current target
    pub move_direction: Vec3,
}

impl NPCMovementContext {
    /// Creates a context for an NPC spawned at `origin`.
    #[must_use]
    pub fn new(id: EntityId, origin: Vec3) -> Self {
        Self {
            id,
            current_state: MoveState::Null,
            default_state: MoveState::Null,
            enemy_target: None,
            player_target: None,
            enemy_leader: None,
            rendezvous_point: Vec3::ZERO,
            follow_target: None,
            battle_follower: None,
            is_leader: false,
            leader: None,
            formation_slot_index: None,
            formation_slot_ref: None,
            has_seen_enemy: false,
            enemies_are_dead: false,
            set_followers_move_to_enemy: true,
            move_to_leader_issued: false,
            move_to_location_pending: true,
            at_activity: false,
            move_permitted: true,
            confrontation_allowed: false,
            origin,
            scripted_route: Vec::new(),
            route_index: 0,
            event_waypoint: None,
            activity_location: None,
            resume_state: None,
            leader_died: false,
            activity_resume_requested: false,
            pending_state: None,
            issued_rendezvous: None,
            issued: None,
            engaged_with: None,
            enemies_nearby: Vec::new(),
            last_measured_distance: 0.0,
            target_distance: 0.0,
            move_direction: Vec3::ZERO,
        }
    }

    /// Current movement state.
    #[must_use]
    pub fn current_state(&self) -> MoveState {
        self.current_state
    }

    /// Rendezvous point, only while an enemy leader is paired.
    #[must_use]
    pub fn rendezvous(&self) -> Option<Vec3> {
        self.enemy_leader.map(|_| self.rendezvous_point)
    }

    /// Forgets the paired enemy leader and its rendezvous.
    pub fn clear_enemy_leader(&mut self) {
        self.enemy_leader = None;
        self.rendezvous_point = Vec3::ZERO;
        self.issued_rendezvous = None;
        self.move_to_leader_issued = false;
    }

    /// Next scripted destination, if the route is not finished.
    #[must_use]
    pub fn scripted_destination(&self) -> Option<Vec3> {
        self.scripted_route.get(self.route_index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let ctx = NPCMovementContext::new(EntityId::new(), Vec3::ZERO);

        assert_eq!(ctx.current_state(), MoveState::Null);
        assert!(!ctx.has_seen_enemy);
        assert!(!ctx.enemies_are_dead);
        assert!(ctx.set_followers_move_to_enemy);
        assert!(!ctx.move_to_leader_issued);
        assert!(ctx.move_to_location_pending);
        assert!(!ctx.at_activity);
        assert!(ctx.move_permitted);
        assert!(!ctx.confrontation_allowed);
    }

    #[test]
    fn test_rendezvous_only_with_enemy_leader() {
        let mut ctx = NPCMovementContext::new(EntityId::new(), Vec3::ZERO);
        ctx.rendezvous_point = Vec3::new(5.0, 0.0, 0.0);
        assert!(ctx.rendezvous().is_none());

        ctx.enemy_leader = Some(EntityId::new());
        assert_eq!(ctx.rendezvous(), Some(Vec3::new(5.0, 0.0, 0.0)));

        ctx.clear_enemy_leader();
        assert!(ctx.rendezvous().is_none());
    }

    #[test]
    fn test_scripted_route_progress() {
        let mut ctx = NPCMovementContext::new(EntityId::new(), Vec3::ZERO);
        ctx.scripted_route = vec![Vec3::X, Vec3::Z];

        assert_eq!(ctx.scripted_destination(), Some(Vec3::X));
        ctx.route_index = 2;
        assert_eq!(ctx.scripted_destination(), None);
    }
}
