//! Event bus carrying movement signals to the combat, event and activity
//! collaborators.

use crate::state::MoveState;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use warband_common::{EntityId, Vec3};

/// Signals emitted by the movement core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MovementEvent {
    /// NPC changed movement state
    StateChanged {
        /// NPC
        entity_id: EntityId,
        /// State left
        from: MoveState,
        /// State entered
        to: MoveState,
    },
    /// NPC reached its target and should attack it
    Engage {
        /// Attacker
        entity_id: EntityId,
        /// Target
        target: EntityId,
        /// Whether the target is the player
        player: bool,
    },
    /// Leader ordered its followers onto its target
    EngageOrdered {
        /// Leader
        leader: EntityId,
        /// Target handed to the followers
        target: EntityId,
        /// Follower paired with the leader, if any
        battle_follower: Option<EntityId>,
    },
    /// NPC reached a scripted event waypoint
    EventReached {
        /// NPC
        entity_id: EntityId,
        /// Waypoint reached
        waypoint: Vec3,
    },
    /// NPC arrived at its activity and stopped
    ActivityReached {
        /// NPC
        entity_id: EntityId,
        /// Activity location
        location: Vec3,
    },
    /// Fleeing NPC got back to its origin
    FleeCompleted {
        /// NPC
        entity_id: EntityId,
    },
    /// A location command went unanswered too long and was reissued
    MoveStale {
        /// NPC
        entity_id: EntityId,
        /// Ticks the command was outstanding
        ticks: u32,
    },
}

/// Event bus for broadcasting movement events to collaborators.
#[derive(Debug)]
pub struct MovementEventBus {
    sender: Sender<MovementEvent>,
    receiver: Receiver<MovementEvent>,
}

impl Default for MovementEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl MovementEventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: MovementEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<MovementEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}
