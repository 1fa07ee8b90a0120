//! The per-NPC movement state machine.
//!
//! [`NPCMovement::move_ai`] is the single per-tick entry point. It advances
//! the throttle, applies any redirect requested by an external signal since
//! the last tick, dispatches to the handler for the current state and applies
//! the transition that handler returns. Handlers issue at most one command to
//! the [`MovementExecutor`] per tick and never write to another agent.

use crate::config::MovementConfig;
use crate::context::NPCMovementContext;
use crate::events::{MovementEvent, MovementEventBus};
use crate::executor::{MoveTarget, MovementExecutor};
use crate::formation::FormationCoordinator;
use crate::registry::{AgentRegistry, Published, WorldObject};
use crate::state::MoveState;
use crate::target_filter::{self, nearest_enemy};
use crate::throttle::MoveThrottle;
use std::sync::Arc;
use tracing::debug;
use warband_common::{planar_direction, planar_distance, EntityId, Vec3};

/// Collaborators one tick of the state machine works against.
pub struct TickContext<'a> {
    /// Registry every handle is resolved through
    pub world: &'a dyn AgentRegistry,
    /// Locomotion backend receiving move commands
    pub executor: &'a mut dyn MovementExecutor,
    /// Formation slots, read-only during ticks
    pub formation: &'a FormationCoordinator,
    /// Outgoing signals
    pub events: &'a MovementEventBus,
}

/// Destination a leader is working toward in `MoveToLocation`.
#[derive(Debug, Clone, Copy)]
enum Leg {
    Rendezvous(Vec3),
    Enemy(EntityId, Vec3),
    Route(Vec3),
}

impl Leg {
    fn point(self) -> Vec3 {
        match self {
            Self::Rendezvous(p) | Self::Enemy(_, p) | Self::Route(p) => p,
        }
    }

    fn target(self) -> MoveTarget {
        match self {
            Self::Rendezvous(p) | Self::Route(p) => MoveTarget::Location(p),
            Self::Enemy(id, _) => MoveTarget::Agent(id),
        }
    }
}

/// Movement state machine for one NPC.
#[derive(Debug, Clone)]
pub struct NPCMovement {
    ctx: NPCMovementContext,
    throttle: MoveThrottle,
    config: Arc<MovementConfig>,
}

impl NPCMovement {
    /// Creates the state machine for an NPC spawned at `origin`.
    #[must_use]
    pub fn new(id: EntityId, origin: Vec3, is_leader: bool, config: Arc<MovementConfig>) -> Self {
        let mut ctx = NPCMovementContext::new(id, origin);
        ctx.is_leader = is_leader;
        ctx.default_state = config.default_state;
        Self {
            ctx,
            throttle: MoveThrottle::new(config.follow_throttle, config.location_timeout_ticks),
            config,
        }
    }

    /// This NPC's handle.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.ctx.id
    }

    /// Current movement state.
    #[must_use]
    pub fn current_state(&self) -> MoveState {
        self.ctx.current_state
    }

    /// Whether the NPC is holding at its activity location.
    #[must_use]
    pub fn at_activity(&self) -> bool {
        self.ctx.at_activity
    }

    /// Read access to the full context.
    #[must_use]
    pub fn context(&self) -> &NPCMovementContext {
        &self.ctx
    }

    pub(crate) fn context_mut(&mut self) -> &mut NPCMovementContext {
        &mut self.ctx
    }

    /// Throttle state.
    #[must_use]
    pub fn throttle(&self) -> &MoveThrottle {
        &self.throttle
    }

    /// Summary other agents may read after this NPC's tick.
    #[must_use]
    pub fn published(&self) -> Published {
        let ordering = self.ctx.is_leader
            && !self.ctx.set_followers_move_to_enemy
            && self.ctx.current_state == MoveState::MoveToEnemy;
        Published {
            state: self.ctx.current_state,
            enemy_target: self.ctx.enemy_target,
            engage_order: if ordering { self.ctx.enemy_target } else { None },
        }
    }

    // ========================================================================
    // External signals
    // ========================================================================

    /// Classifies an overlap result into this NPC's enemy list.
    pub fn filter_enemies(&mut self, candidates: &[WorldObject], me: &WorldObject) {
        target_filter::filter_enemies(&mut self.ctx, candidates, me, &self.config);
    }

    /// A player attacked this NPC. Ignored while fleeing.
    pub fn set_player_target(&mut self, player: EntityId) -> bool {
        let state = self.ctx.current_state;
        if state == MoveState::Flee {
            debug!("NPC {} ignored player {player} while fleeing", self.ctx.id);
            return false;
        }
        if state != MoveState::MoveToPlayer {
            self.ctx.resume_state = match state {
                MoveState::Null => Some(self.ctx.default_state),
                s if s.is_combat() => None,
                s => Some(s),
            };
        }
        self.ctx.player_target = Some(player);
        self.ctx.pending_state = Some(MoveState::MoveToPlayer);
        true
    }

    /// Drops the player target; `MoveToPlayer` winds down on the next tick.
    pub fn clear_player_target(&mut self) -> bool {
        self.ctx.player_target.take().is_some()
    }

    /// Sends the NPC to a scripted event waypoint.
    pub fn assign_event(&mut self, waypoint: Vec3) -> bool {
        if !self.accepts_directive() {
            return false;
        }
        self.ctx.event_waypoint = Some(waypoint);
        self.ctx.pending_state = Some(MoveState::MoveToEvent);
        true
    }

    /// Sends the NPC to an activity location, where it stays until resumed.
    pub fn assign_activity(&mut self, location: Vec3) -> bool {
        if !self.accepts_directive() {
            return false;
        }
        self.ctx.activity_location = Some(location);
        self.ctx.at_activity = false;
        self.ctx.activity_resume_requested = false;
        self.ctx.pending_state = Some(MoveState::MoveToActivity);
        true
    }

    /// Ends the current activity.
    pub fn resume_activity(&mut self) -> bool {
        if self.ctx.current_state != MoveState::MoveToActivity {
            return false;
        }
        self.ctx.activity_resume_requested = true;
        true
    }

    /// The combat collaborator reports every enemy this NPC fights is dead.
    pub fn report_enemies_dead(&mut self) -> bool {
        if !matches!(
            self.ctx.current_state,
            MoveState::MoveToEnemy | MoveState::MoveToBattle
        ) {
            return false;
        }
        self.ctx.enemies_are_dead = true;
        true
    }

    /// The combat collaborator reports this NPC's leader died.
    pub fn report_leader_died(&mut self) -> bool {
        if self.ctx.leader.is_none() {
            return false;
        }
        self.ctx.leader_died = true;
        true
    }

    /// Grants or revokes permission to start battles. Cannot be granted
    /// while fleeing.
    pub fn set_confrontation_allowed(&mut self, allowed: bool) -> bool {
        if allowed && self.ctx.current_state == MoveState::Flee {
            return false;
        }
        self.ctx.confrontation_allowed = allowed;
        true
    }

    /// Allows or holds follow moves.
    pub fn set_move_permitted(&mut self, permitted: bool) -> bool {
        self.ctx.move_permitted = permitted;
        true
    }

    /// Replaces the scripted route. Followers move by formation and refuse.
    pub fn set_route(&mut self, route: Vec<Vec3>) -> bool {
        if self.ctx.leader.is_some() {
            return false;
        }
        self.ctx.scripted_route = route;
        self.ctx.route_index = 0;
        self.ctx.move_to_location_pending = true;
        true
    }

    /// Changes the default state. Takes effect the next time a handler
    /// falls back to it.
    pub fn set_default_state(&mut self, state: MoveState) -> bool {
        if matches!(state, MoveState::Flee | MoveState::MoveToPlayer) {
            return false;
        }
        self.ctx.default_state = state;
        true
    }

    fn accepts_directive(&self) -> bool {
        self.ctx.current_state.accepts_directives()
            && self.ctx.pending_state != Some(MoveState::MoveToPlayer)
    }

    // ========================================================================
    // Tick
    // ========================================================================

    /// Runs one update.
    pub fn move_ai(&mut self, t: &mut TickContext<'_>, delta_time: f32) {
        self.throttle.tick(delta_time);

        if let Some(next) = self.ctx.pending_state.take() {
            if Self::reachable(self.ctx.current_state, next) {
                self.transition(next, t.events);
            } else {
                debug!(
                    "NPC {} dropped redirect {} -> {next}",
                    self.ctx.id, self.ctx.current_state
                );
            }
        }

        let Some(me) = t.world.object(self.ctx.id) else {
            return;
        };

        let from = self.ctx.current_state;
        if let Some(next) = self.dispatch(t, &me) {
            self.transition(next, t.events);
            // Leaving idle acts in the same tick.
            if from == MoveState::Null && self.ctx.current_state != MoveState::Null {
                if let Some(next) = self.dispatch(t, &me) {
                    self.transition(next, t.events);
                }
            }
        }
    }

    fn reachable(from: MoveState, to: MoveState) -> bool {
        match to {
            _ if from == MoveState::Flee => false,
            MoveState::MoveToEvent | MoveState::MoveToActivity => from.accepts_directives(),
            _ => true,
        }
    }

    fn dispatch(&mut self, t: &mut TickContext<'_>, me: &WorldObject) -> Option<MoveState> {
        match self.ctx.current_state {
            MoveState::Null => self.handle_null(),
            MoveState::MoveToLocation => self.handle_move_to_location(t, me),
            MoveState::Follow => self.handle_follow(t, me),
            MoveState::MoveToBattle => self.handle_move_to_battle(t, me),
            MoveState::MoveToEnemy => self.handle_move_to_enemy(t, me),
            MoveState::MoveToPlayer => self.handle_move_to_player(t, me),
            MoveState::MoveToEvent => self.handle_move_to_event(t, me),
            MoveState::MoveToActivity => self.handle_move_to_activity(t, me),
            MoveState::Flee => self.handle_flee(t, me),
        }
    }

    fn transition(&mut self, next: MoveState, events: &MovementEventBus) {
        let from = self.ctx.current_state;
        if from == next {
            return;
        }
        self.ctx.current_state = next;
        self.ctx.issued = None;
        self.throttle.reset_location_timeout();

        // Any way out of a fight ends it, including a player redirect.
        if Self::fighting(from) && !Self::fighting(next) {
            self.reset_combat();
        }

        match next {
            MoveState::MoveToLocation => {
                self.ctx.move_to_location_pending = true;
                self.ctx.move_to_leader_issued = false;
                self.ctx.issued_rendezvous = None;
            },
            MoveState::Flee => {
                self.ctx.confrontation_allowed = false;
                self.ctx.has_seen_enemy = false;
            },
            _ => {},
        }

        debug!("NPC {} movement {from} -> {next}", self.ctx.id);
        events.publish(MovementEvent::StateChanged {
            entity_id: self.ctx.id,
            from,
            to: next,
        });
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    fn handle_null(&self) -> Option<MoveState> {
        (self.ctx.default_state != MoveState::Null).then_some(self.ctx.default_state)
    }

    fn handle_move_to_location(
        &mut self,
        t: &mut TickContext<'_>,
        me: &WorldObject,
    ) -> Option<MoveState> {
        if self.ctx.leader.is_some() {
            return Some(MoveState::Follow);
        }
        if self.ctx.enemy_leader.is_some_and(|l| !t.world.is_alive(l)) {
            self.ctx.clear_enemy_leader();
        }
        if self.ctx.enemy_target.is_some_and(|e| !t.world.is_alive(e)) {
            self.ctx.enemy_target = None;
        }

        if self.ctx.confrontation_allowed {
            let threat = self.ctx.enemy_leader.or(self.ctx.enemy_target);
            if let Some(pos) = threat.and_then(|id| t.world.position(id)) {
                let distance = planar_distance(me.position, pos);
                self.ctx.last_measured_distance = distance;
                if distance <= self.config.battle_radius {
                    return Some(MoveState::MoveToBattle);
                }
            }
        }

        let leg = if let Some(point) = self.ctx.rendezvous() {
            Leg::Rendezvous(point)
        } else if let Some((id, pos)) = self
            .ctx
            .enemy_target
            .and_then(|id| t.world.position(id).map(|p| (id, p)))
        {
            Leg::Enemy(id, pos)
        } else if let Some(point) = self.ctx.scripted_destination() {
            Leg::Route(point)
        } else {
            return None;
        };

        if self.arrived(t, me.position, leg.point()) {
            self.throttle.reset_location_timeout();
            if let Leg::Route(_) = leg {
                self.ctx.route_index += 1;
                self.ctx.move_to_location_pending = true;
            }
            return None;
        }

        let fresh = match leg {
            Leg::Rendezvous(point) => {
                let moved = self
                    .ctx
                    .issued_rendezvous
                    .map_or(true, |p| p.distance(point) > self.config.arrival_tolerance);
                moved || !self.ctx.move_to_leader_issued
            },
            Leg::Enemy(..) => self.ctx.issued != Some(leg.target()),
            Leg::Route(_) => self.ctx.move_to_location_pending,
        };

        if fresh {
            self.issue(t, leg.target());
            match leg {
                Leg::Rendezvous(point) => {
                    self.ctx.move_to_leader_issued = true;
                    self.ctx.issued_rendezvous = Some(point);
                },
                Leg::Route(_) => self.ctx.move_to_location_pending = false,
                Leg::Enemy(..) => {},
            }
            self.throttle.reset_location_timeout();
            return None;
        }

        let ticks = self.throttle.increment_location_timeout();
        if self.throttle.location_timed_out() {
            debug!(
                "NPC {} location command stale after {ticks} ticks, reissuing",
                self.ctx.id
            );
            t.events.publish(MovementEvent::MoveStale {
                entity_id: self.ctx.id,
                ticks,
            });
            self.throttle.reset_location_timeout();
            self.ctx.issued = None;
            self.ctx.move_to_leader_issued = false;
            self.ctx.move_to_location_pending = true;
        }
        None
    }

    fn handle_follow(&mut self, t: &mut TickContext<'_>, me: &WorldObject) -> Option<MoveState> {
        let leader = self.ctx.leader?;
        if self.leader_lost(t) {
            return Some(MoveState::Flee);
        }

        if let Some(order) = t.world.published(leader).and_then(|p| p.engage_order) {
            if t.world.is_alive(order) {
                debug!("NPC {} joins leader {leader} against {order}", self.ctx.id);
                self.ctx.enemy_target = Some(order);
                self.ctx.has_seen_enemy = true;
                return Some(MoveState::MoveToEnemy);
            }
        }

        if self.throttle.can_issue_follow_move() && self.ctx.move_permitted {
            let slot = t.formation.slot_world_position(&self.ctx, t.world);
            self.ctx.last_measured_distance = planar_distance(me.position, slot);
            self.ctx.move_direction = planar_direction(me.position, slot);
            self.issue(t, MoveTarget::Location(slot));
            self.throttle.reset_follow();
        }
        None
    }

    fn handle_move_to_battle(
        &mut self,
        t: &mut TickContext<'_>,
        me: &WorldObject,
    ) -> Option<MoveState> {
        if self.ctx.enemies_are_dead {
            return Some(self.leave_combat(t));
        }
        if self.leader_lost(t) {
            return Some(MoveState::Flee);
        }

        let nearby = t.world.overlapping(me.position, self.config.engagement_radius);
        target_filter::filter_enemies(&mut self.ctx, &nearby, me, &self.config);
        self.ctx.enemy_target = nearest_enemy(&nearby, &self.ctx.enemies_nearby, me.position);

        let Some((target, pos)) = self
            .ctx
            .enemy_target
            .and_then(|id| t.world.position(id).map(|p| (id, p)))
        else {
            if !self.ctx.is_leader {
                if let Some(follow) = self.ctx.follow_target.filter(|&f| t.world.is_alive(f)) {
                    self.issue_if_changed(t, MoveTarget::Agent(follow));
                    return None;
                }
            }
            return Some(self.leave_combat(t));
        };

        let distance = self.measure(me.position, pos);
        if distance < self.config.attack_radius {
            self.ctx.has_seen_enemy = true;
            return Some(MoveState::MoveToEnemy);
        }
        self.issue_if_changed(t, MoveTarget::Agent(target));
        None
    }

    fn handle_move_to_enemy(
        &mut self,
        t: &mut TickContext<'_>,
        me: &WorldObject,
    ) -> Option<MoveState> {
        if self.ctx.enemies_are_dead {
            return Some(self.leave_combat(t));
        }
        if !self.ctx.has_seen_enemy {
            return Some(MoveState::MoveToBattle);
        }

        let live_target = self.ctx.enemy_target.filter(|&e| t.world.is_alive(e));
        let target = if let Some(target) = live_target {
            target
        } else {
            self.ctx.enemy_target = None;
            let nearby = t.world.overlapping(me.position, self.config.engagement_radius);
            target_filter::filter_enemies(&mut self.ctx, &nearby, me, &self.config);
            match self.ctx.enemy_target {
                Some(next) => {
                    debug!("NPC {} retargets to {next}", self.ctx.id);
                    next
                },
                None => {
                    self.ctx.enemies_are_dead = true;
                    return Some(self.leave_combat(t));
                },
            }
        };

        if self.ctx.is_leader && self.ctx.set_followers_move_to_enemy {
            self.ctx.set_followers_move_to_enemy = false;
            debug!("Leader {} orders followers onto {target}", self.ctx.id);
            t.events.publish(MovementEvent::EngageOrdered {
                leader: self.ctx.id,
                target,
                battle_follower: self.ctx.battle_follower,
            });
        }

        if let Some(pos) = t.world.position(target) {
            self.close_and_engage(t, me.position, target, pos, false);
        }
        None
    }

    fn handle_move_to_player(
        &mut self,
        t: &mut TickContext<'_>,
        me: &WorldObject,
    ) -> Option<MoveState> {
        let player = self
            .ctx
            .player_target
            .and_then(|p| t.world.object(p))
            .filter(|p| p.alive);
        let Some(player) = player else {
            return Some(self.leave_player(t));
        };
        if planar_distance(me.position, player.position) > self.config.disengage_radius {
            debug!("NPC {} lost player {} out of range", self.ctx.id, player.id);
            return Some(self.leave_player(t));
        }

        self.close_and_engage(t, me.position, player.id, player.position, true);
        None
    }

    fn handle_move_to_event(
        &mut self,
        t: &mut TickContext<'_>,
        me: &WorldObject,
    ) -> Option<MoveState> {
        let Some(waypoint) = self.ctx.event_waypoint else {
            return Some(self.ctx.default_state);
        };

        if self.arrived(t, me.position, waypoint) {
            self.ctx.event_waypoint = None;
            t.events.publish(MovementEvent::EventReached {
                entity_id: self.ctx.id,
                waypoint,
            });
            return Some(self.ctx.default_state);
        }
        self.measure(me.position, waypoint);
        self.issue_if_changed(t, MoveTarget::Location(waypoint));
        None
    }

    fn handle_move_to_activity(
        &mut self,
        t: &mut TickContext<'_>,
        me: &WorldObject,
    ) -> Option<MoveState> {
        if self.ctx.activity_resume_requested {
            self.ctx.activity_resume_requested = false;
            self.ctx.at_activity = false;
            self.ctx.activity_location = None;
            return Some(self.ctx.default_state);
        }
        if self.ctx.at_activity {
            return None;
        }
        let Some(location) = self.ctx.activity_location else {
            return Some(self.ctx.default_state);
        };

        if self.arrived(t, me.position, location) {
            self.ctx.at_activity = true;
            t.executor.stop(self.ctx.id);
            self.ctx.issued = None;
            t.events.publish(MovementEvent::ActivityReached {
                entity_id: self.ctx.id,
                location,
            });
            return None;
        }
        self.issue_if_changed(t, MoveTarget::Location(location));
        None
    }

    fn handle_flee(&mut self, t: &mut TickContext<'_>, me: &WorldObject) -> Option<MoveState> {
        self.ctx.confrontation_allowed = false;
        let origin = self.ctx.origin;

        if self.arrived(t, me.position, origin) {
            self.ctx.leader = None;
            self.ctx.follow_target = None;
            self.ctx.leader_died = false;
            t.events.publish(MovementEvent::FleeCompleted {
                entity_id: self.ctx.id,
            });
            return Some(MoveState::Null);
        }
        self.measure(me.position, origin);
        self.issue_if_changed(t, MoveTarget::Location(origin));
        None
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn issue(&mut self, t: &mut TickContext<'_>, target: MoveTarget) {
        t.executor.move_to(self.ctx.id, target);
        self.ctx.issued = Some(target);
    }

    fn issue_if_changed(&mut self, t: &mut TickContext<'_>, target: MoveTarget) {
        if self.ctx.issued != Some(target) {
            self.issue(t, target);
        }
    }

    fn arrived(&self, t: &TickContext<'_>, from: Vec3, destination: Vec3) -> bool {
        planar_distance(from, destination) <= self.config.arrival_tolerance
            || (self.ctx.issued == Some(MoveTarget::Location(destination))
                && t.executor.has_arrived(self.ctx.id))
    }

    fn measure(&mut self, from: Vec3, to: Vec3) -> f32 {
        let distance = planar_distance(from, to);
        self.ctx.last_measured_distance = distance;
        self.ctx.target_distance = distance;
        self.ctx.move_direction = planar_direction(from, to);
        distance
    }

    fn close_and_engage(
        &mut self,
        t: &mut TickContext<'_>,
        from: Vec3,
        target: EntityId,
        target_pos: Vec3,
        player: bool,
    ) {
        let distance = self.measure(from, target_pos);
        if distance <= self.config.attack_radius {
            if self.ctx.engaged_with != Some(target) {
                self.ctx.engaged_with = Some(target);
                t.events.publish(MovementEvent::Engage {
                    entity_id: self.ctx.id,
                    target,
                    player,
                });
            }
        } else {
            self.issue_if_changed(t, MoveTarget::Agent(target));
        }
    }

    fn leader_lost(&self, t: &TickContext<'_>) -> bool {
        self.ctx
            .leader
            .is_some_and(|l| self.ctx.leader_died || !t.world.is_alive(l))
    }

    fn role_state(&self) -> MoveState {
        if self.ctx.is_leader {
            MoveState::MoveToLocation
        } else if self.ctx.leader.is_some() {
            MoveState::Follow
        } else {
            self.ctx.default_state
        }
    }

    const fn fighting(state: MoveState) -> bool {
        matches!(state, MoveState::MoveToBattle | MoveState::MoveToEnemy)
    }

    /// Per-fight flags back to their pre-combat values.
    fn reset_combat(&mut self) {
        self.ctx.has_seen_enemy = false;
        self.ctx.enemies_are_dead = false;
        self.ctx.engaged_with = None;
        self.ctx.set_followers_move_to_enemy = true;
    }

    fn leave_combat(&mut self, t: &TickContext<'_>) -> MoveState {
        self.reset_combat();
        self.ctx.enemy_target = None;
        self.ctx.clear_enemy_leader();
        if self.leader_lost(t) {
            MoveState::Flee
        } else {
            self.role_state()
        }
    }

    fn leave_player(&mut self, t: &TickContext<'_>) -> MoveState {
        self.ctx.player_target = None;
        self.ctx.engaged_with = None;
        let resume = self.ctx.resume_state.take();
        if self.leader_lost(t) {
            return MoveState::Flee;
        }
        resume
            .filter(|s| !s.is_combat() && *s != MoveState::Flee)
            .unwrap_or_else(|| self.role_state())
    }
}
