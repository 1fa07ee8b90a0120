//! Two warbands and a passing player on an open field.
//!
//! Each warband is a leader with followers in formation. The leaders march
//! toward each other's camp, pair up once they are in engagement range, and
//! fight where they meet. The player walks across the field and attacks
//! whatever comes within reach.

use crate::combat::CombatResolver;
use crate::config::SimConfig;
use crate::executor::KinematicExecutor;
use crate::timing::FixedStep;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};
use warband_ai::{
    AgentRegistry, MoveState, MovementEvent, MovementEventBus, MovementResult, NPCMovementManager,
    PlayerTargeting, World, WorldObject,
};
use warband_common::{planar_direction, planar_distance, rotate_yaw, yaw_of, EntityId, FactionId, Vec3};

const RED: FactionId = FactionId::new(2);
const BLUE: FactionId = FactionId::new(3);

/// One leader and its followers.
#[derive(Debug, Clone)]
pub struct Warband {
    /// Name used in the report
    pub name: &'static str,
    /// Allegiance
    pub faction: FactionId,
    /// Leader handle
    pub leader: EntityId,
    /// Followers in slot order
    pub followers: Vec<EntityId>,
}

impl Warband {
    /// Leader and followers.
    pub fn members(&self) -> impl Iterator<Item = EntityId> + '_ {
        std::iter::once(self.leader).chain(self.followers.iter().copied())
    }
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    /// Fixed updates simulated
    pub ticks: u32,
    /// Simulated time
    pub simulated_seconds: f32,
    /// Move commands the executor received
    pub move_commands: u64,
    /// NPCs killed
    pub kills: usize,
    /// Engage signals aimed at the player
    pub player_hits: u32,
    /// Living members per warband
    pub survivors: BTreeMap<&'static str, usize>,
    /// NPCs per movement state at the end
    pub states: BTreeMap<String, usize>,
    /// Movement events seen, by kind
    pub events: BTreeMap<&'static str, usize>,
}

/// A running simulation.
pub struct Scenario {
    config: SimConfig,
    world: World,
    manager: NPCMovementManager,
    executor: KinematicExecutor,
    events: MovementEventBus,
    combat: CombatResolver,
    targeting: PlayerTargeting,
    /// Player handle and where it is walking to
    player: Option<(EntityId, Vec3)>,
    bands: Vec<Warband>,
    tick: u32,
    event_counts: BTreeMap<&'static str, usize>,
}

impl Scenario {
    /// Sets up the field.
    pub fn new(mut config: SimConfig) -> MovementResult<Self> {
        config.validate();
        let mut world = World::new();
        let mut manager = NPCMovementManager::new(config.movement.clone());

        let separation = config.band_separation;
        let red_camp = Vec3::ZERO;
        let blue_camp = Vec3::new(0.0, 0.0, separation);
        let bands = vec![
            Self::spawn_band(&mut manager, &mut world, &config, "red", RED, red_camp, blue_camp)?,
            Self::spawn_band(&mut manager, &mut world, &config, "blue", BLUE, blue_camp, red_camp)?,
        ];

        let player = config.player_enabled.then(|| {
            let start = Vec3::new(-separation, 0.0, separation / 2.0);
            let id = world.insert(WorldObject::player(start));
            (id, Vec3::new(separation, 0.0, separation / 2.0))
        });

        let movement = &config.movement;
        let executor = KinematicExecutor::new(config.agent_speed, movement.arrival_tolerance * 0.5);
        let combat = CombatResolver::new(
            config.hits_to_kill,
            movement.attack_radius + movement.arrival_tolerance,
        );

        info!(
            "Field ready: {} NPCs, player {}",
            manager.len(),
            if player.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            world,
            manager,
            executor,
            events: MovementEventBus::new(4096),
            combat,
            targeting: PlayerTargeting::new(),
            player,
            bands,
            tick: 0,
            event_counts: BTreeMap::new(),
        })
    }

    fn spawn_band(
        manager: &mut NPCMovementManager,
        world: &mut World,
        config: &SimConfig,
        name: &'static str,
        faction: FactionId,
        camp: Vec3,
        objective: Vec3,
    ) -> MovementResult<Warband> {
        let leader = manager.register_npc(world, faction, camp, true);
        let yaw = yaw_of(planar_direction(camp, objective));
        world.set_yaw(leader, yaw);
        manager.set_default_state(leader, MoveState::MoveToLocation)?;
        manager.set_route(leader, vec![objective])?;
        manager.set_confrontation_allowed(leader, config.allow_confrontation)?;

        let layout = config.movement.formation;
        let mut followers = Vec::new();
        for slot in 0..config.followers_per_band as usize {
            let position = camp + rotate_yaw(layout.offset(slot), yaw);
            let follower = manager.register_npc(world, faction, position, false);
            manager.set_default_state(follower, MoveState::Follow)?;
            manager.assign_follower(leader, follower, world)?;
            followers.push(follower);
        }

        debug!("Warband {name} led by {leader} with {} followers", followers.len());
        Ok(Warband {
            name,
            faction,
            leader,
            followers,
        })
    }

    /// The world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The movement manager.
    #[must_use]
    pub fn manager(&self) -> &NPCMovementManager {
        &self.manager
    }

    /// Warbands on the field.
    #[must_use]
    pub fn bands(&self) -> &[Warband] {
        &self.bands
    }

    /// Player handle, if one was spawned.
    #[must_use]
    pub fn player(&self) -> Option<EntityId> {
        self.player.map(|(id, _)| id)
    }

    /// Fixed updates run so far.
    #[must_use]
    pub fn tick(&self) -> u32 {
        self.tick
    }

    /// Runs one fixed update.
    pub fn step(&mut self, delta_time: f32) {
        self.walk_player(delta_time);
        if self.tick % self.config.player_attack_interval == 0 {
            self.player_attack();
        }

        self.manager.sense(&self.world);
        self.manager
            .update(delta_time, &mut self.world, &mut self.executor, &self.events);
        self.executor.advance(&mut self.world, delta_time);

        let events = self.events.drain();
        for event in &events {
            *self.event_counts.entry(event_kind(event)).or_insert(0) += 1;
        }
        self.combat.observe(&events);
        self.combat.resolve(&mut self.manager, &mut self.world);

        self.tick += 1;
    }

    /// Runs until the configured tick count, feeding frames through the
    /// fixed-step clock.
    pub fn run(&mut self) -> SimReport {
        let mut clock = FixedStep::new(self.config.tick_rate);
        let frame_dt = 1.0 / self.config.frame_rate as f32;

        while self.tick < self.config.ticks {
            for _ in 0..clock.accumulate(frame_dt) {
                if self.tick >= self.config.ticks {
                    break;
                }
                self.step(clock.fixed_dt());
            }
        }

        let report = self.report();
        info!(
            "Simulated {:.1}s: {} kills, {} move commands",
            report.simulated_seconds, report.kills, report.move_commands
        );
        report
    }

    /// Summary of the run so far.
    #[must_use]
    pub fn report(&self) -> SimReport {
        let survivors = self
            .bands
            .iter()
            .map(|band| {
                let alive = band.members().filter(|&id| self.world.is_alive(id)).count();
                (band.name, alive)
            })
            .collect();
        let states = self
            .manager
            .state_counts()
            .into_iter()
            .map(|(state, count)| (state.to_string(), count))
            .collect();

        SimReport {
            ticks: self.tick,
            simulated_seconds: self.tick as f32 * self.config.fixed_dt(),
            move_commands: self.executor.commands(),
            kills: self.combat.kills().len(),
            player_hits: self.combat.player_hits(),
            survivors,
            states,
            events: self.event_counts.clone(),
        }
    }

    fn walk_player(&mut self, delta_time: f32) {
        let Some((player, destination)) = self.player else {
            return;
        };
        let Some(position) = self.world.position(player) else {
            return;
        };
        let remaining = planar_distance(position, destination);
        if remaining <= f32::EPSILON {
            return;
        }
        let travel = (self.config.player_speed * delta_time).min(remaining);
        let direction = planar_direction(position, destination);
        self.world.set_position(player, position + direction * travel);
    }

    fn player_attack(&mut self) {
        let Some((player, _)) = self.player else {
            return;
        };
        let Some(player_obj) = self.world.object(player) else {
            return;
        };
        let in_reach =
            self.targeting
                .engage_in_range(&player_obj, &self.world, self.config.player_attack_radius);
        for npc in in_reach {
            if let Ok(true) = self.manager.set_player_target(npc, player) {
                debug!("Player attacked NPC {npc}");
            }
        }
    }
}

fn event_kind(event: &MovementEvent) -> &'static str {
    match event {
        MovementEvent::StateChanged { .. } => "state_changed",
        MovementEvent::Engage { .. } => "engage",
        MovementEvent::EngageOrdered { .. } => "engage_ordered",
        MovementEvent::EventReached { .. } => "event_reached",
        MovementEvent::ActivityReached { .. } => "activity_reached",
        MovementEvent::FleeCompleted { .. } => "flee_completed",
        MovementEvent::MoveStale { .. } => "move_stale",
    }
}
