//! Seam to the engine-side locomotion.
//!
//! The core decides where an NPC should go; an implementation of
//! [`MovementExecutor`] does the pathing, steering and animation. Commands are
//! fire-and-forget, and a new command always supersedes the previous one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use warband_common::{EntityId, Vec3};

/// Where a move command sends an agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MoveTarget {
    /// A fixed point
    Location(Vec3),
    /// Another agent, tracked as it moves
    Agent(EntityId),
}

/// Capability handle for the external locomotion system.
pub trait MovementExecutor {
    /// Starts moving `agent` toward `target`, redirecting any move in flight.
    fn move_to(&mut self, agent: EntityId, target: MoveTarget);

    /// Halts `agent` where it stands.
    fn stop(&mut self, agent: EntityId);

    /// Whether `agent` has reached the target of its latest command.
    fn has_arrived(&self, agent: EntityId) -> bool;
}

/// Command recorded by [`RecordingExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MoveCommand {
    /// `move_to` call
    MoveTo(MoveTarget),
    /// `stop` call
    Stop,
}

/// Executor that only records commands. Arrival is set by hand.
#[derive(Debug, Default, Clone)]
pub struct RecordingExecutor {
    commands: Vec<(EntityId, MoveCommand)>,
    arrived: HashSet<EntityId>,
}

impl RecordingExecutor {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands so far, oldest first.
    #[must_use]
    pub fn commands(&self) -> &[(EntityId, MoveCommand)] {
        &self.commands
    }

    /// Move targets sent to one agent, oldest first.
    #[must_use]
    pub fn moves_for(&self, agent: EntityId) -> Vec<MoveTarget> {
        self.commands
            .iter()
            .filter_map(|&(a, cmd)| match cmd {
                MoveCommand::MoveTo(target) if a == agent => Some(target),
                _ => None,
            })
            .collect()
    }

    /// Marks an agent as having arrived.
    pub fn set_arrived(&mut self, agent: EntityId, arrived: bool) {
        if arrived {
            self.arrived.insert(agent);
        } else {
            self.arrived.remove(&agent);
        }
    }

    /// Forgets recorded commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl MovementExecutor for RecordingExecutor {
    fn move_to(&mut self, agent: EntityId, target: MoveTarget) {
        self.arrived.remove(&agent);
        self.commands.push((agent, MoveCommand::MoveTo(target)));
    }

    fn stop(&mut self, agent: EntityId) {
        self.commands.push((agent, MoveCommand::Stop));
    }

    fn has_arrived(&self, agent: EntityId) -> bool {
        self.arrived.contains(&agent)
    }
}
