//! Straight-line locomotion for the simulation.
//!
//! Agents walk directly at their goal at a fixed speed. No pathing, no
//! collision; enough to give the movement core a world that responds.

use std::collections::{BTreeMap, BTreeSet};
use warband_ai::{AgentRegistry, MoveTarget, MovementExecutor, World};
use warband_common::{planar_direction, planar_distance, yaw_of, EntityId};

/// Moves agents toward their latest command each step.
#[derive(Debug, Clone)]
pub struct KinematicExecutor {
    speed: f32,
    tolerance: f32,
    orders: BTreeMap<EntityId, MoveTarget>,
    arrived: BTreeSet<EntityId>,
    commands: u64,
}

impl KinematicExecutor {
    /// Creates an executor moving agents at `speed`, stopping `tolerance`
    /// short of their goal.
    #[must_use]
    pub fn new(speed: f32, tolerance: f32) -> Self {
        Self {
            speed,
            tolerance,
            orders: BTreeMap::new(),
            arrived: BTreeSet::new(),
            commands: 0,
        }
    }

    /// Move commands received so far.
    #[must_use]
    pub fn commands(&self) -> u64 {
        self.commands
    }

    /// Current order of an agent.
    #[must_use]
    pub fn order(&self, agent: EntityId) -> Option<MoveTarget> {
        self.orders.get(&agent).copied()
    }

    /// Advances every live agent with an order by one step.
    pub fn advance(&mut self, world: &mut World, delta_time: f32) {
        let step = self.speed * delta_time;
        let mut finished = Vec::new();

        for (&agent, &target) in &self.orders {
            let Some(me) = world.object(agent).filter(|o| o.alive) else {
                continue;
            };
            let goal = match target {
                MoveTarget::Location(point) => point,
                MoveTarget::Agent(other) => match world.position(other) {
                    Some(point) => point,
                    None => continue,
                },
            };

            let distance = planar_distance(me.position, goal);
            if distance <= self.tolerance {
                finished.push((agent, target));
                continue;
            }

            let direction = planar_direction(me.position, goal);
            let travel = step.min(distance - self.tolerance);
            world.set_position(agent, me.position + direction * travel);
            world.set_yaw(agent, yaw_of(direction));
            if distance - travel <= self.tolerance {
                finished.push((agent, target));
            }
        }

        for (agent, target) in finished {
            self.arrived.insert(agent);
            // Agent targets keep being tracked.
            if let MoveTarget::Location(_) = target {
                self.orders.remove(&agent);
            }
        }
    }
}

impl MovementExecutor for KinematicExecutor {
    fn move_to(&mut self, agent: EntityId, target: MoveTarget) {
        self.orders.insert(agent, target);
        self.arrived.remove(&agent);
        self.commands += 1;
    }

    fn stop(&mut self, agent: EntityId) {
        self.orders.remove(&agent);
    }

    fn has_arrived(&self, agent: EntityId) -> bool {
        self.arrived.contains(&agent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warband_ai::WorldObject;
    use warband_common::{FactionId, Vec3};

    #[test]
    fn test_walks_to_location() {
        let mut world = World::new();
        let id = world.insert(WorldObject::npc(FactionId::new(2), Vec3::ZERO));
        let mut exec = KinematicExecutor::new(2.0, 0.5);

        exec.move_to(id, MoveTarget::Location(Vec3::new(0.0, 0.0, 3.0)));
        exec.advance(&mut world, 1.0);
        assert_eq!(world.position(id), Some(Vec3::new(0.0, 0.0, 2.0)));
        assert!(!exec.has_arrived(id));

        exec.advance(&mut world, 1.0);
        assert!(exec.has_arrived(id));
        assert!(exec.order(id).is_none());
    }

    #[test]
    fn test_tracks_moving_agent() {
        let mut world = World::new();
        let hunter = world.insert(WorldObject::npc(FactionId::new(2), Vec3::ZERO));
        let prey = world.insert(WorldObject::npc(FactionId::new(3), Vec3::new(10.0, 0.0, 0.0)));
        let mut exec = KinematicExecutor::new(5.0, 1.0);

        exec.move_to(hunter, MoveTarget::Agent(prey));
        exec.advance(&mut world, 1.0);
        world.set_position(prey, Vec3::new(10.0, 0.0, 10.0));
        exec.advance(&mut world, 1.0);

        let pos = world.position(hunter).expect("hunter");
        assert!(pos.z > 0.0);
        assert_eq!(exec.order(hunter), Some(MoveTarget::Agent(prey)));
    }

    #[test]
    fn test_dead_agents_stay_put() {
        let mut world = World::new();
        let id = world.insert(WorldObject::npc(FactionId::new(2), Vec3::ZERO));
        world.kill(id);
        let mut exec = KinematicExecutor::new(2.0, 0.5);

        exec.move_to(id, MoveTarget::Location(Vec3::new(5.0, 0.0, 0.0)));
        exec.advance(&mut world, 1.0);
        assert_eq!(world.position(id), Some(Vec3::ZERO));
    }

    #[test]
    fn test_stop_cancels_order() {
        let mut world = World::new();
        let id = world.insert(WorldObject::npc(FactionId::new(2), Vec3::ZERO));
        let mut exec = KinematicExecutor::new(2.0, 0.5);

        exec.move_to(id, MoveTarget::Location(Vec3::new(5.0, 0.0, 0.0)));
        exec.stop(id);
        exec.advance(&mut world, 1.0);
        assert_eq!(world.position(id), Some(Vec3::ZERO));
        assert_eq!(exec.commands(), 1);
    }
}
