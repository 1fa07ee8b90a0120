//! Movement states an NPC can be in.

use serde::{Deserialize, Serialize};

/// Current movement intent of an NPC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MoveState {
    /// Idle; hands over to the default state on the next tick
    #[default]
    Null,
    /// Leader deciding its own destination
    MoveToLocation,
    /// Follower trailing its formation slot
    Follow,
    /// Closing on the nearest enemy
    MoveToBattle,
    /// Fighting an NPC enemy
    MoveToEnemy,
    /// Fighting the player
    MoveToPlayer,
    /// Walking to a scripted event waypoint
    MoveToEvent,
    /// Walking to, then staying at, an activity location
    MoveToActivity,
    /// Retreating to origin after the leader died
    Flee,
}

impl MoveState {
    /// Get display name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::MoveToLocation => "MoveToLocation",
            Self::Follow => "Follow",
            Self::MoveToBattle => "MoveToBattle",
            Self::MoveToEnemy => "MoveToEnemy",
            Self::MoveToPlayer => "MoveToPlayer",
            Self::MoveToEvent => "MoveToEvent",
            Self::MoveToActivity => "MoveToActivity",
            Self::Flee => "Flee",
        }
    }

    /// States where the NPC is actively fighting or closing to fight.
    #[must_use]
    pub const fn is_combat(self) -> bool {
        matches!(self, Self::MoveToBattle | Self::MoveToEnemy | Self::MoveToPlayer)
    }

    /// States that external directives (event, activity) may interrupt.
    #[must_use]
    pub const fn accepts_directives(self) -> bool {
        matches!(
            self,
            Self::Null | Self::MoveToLocation | Self::Follow | Self::MoveToEvent | Self::MoveToActivity
        )
    }

    /// Get all states.
    #[must_use]
    pub const fn all() -> [Self; 9] {
        [
            Self::Null,
            Self::MoveToLocation,
            Self::Follow,
            Self::MoveToBattle,
            Self::MoveToEnemy,
            Self::MoveToPlayer,
            Self::MoveToEvent,
            Self::MoveToActivity,
            Self::Flee,
        ]
    }
}

impl std::fmt::Display for MoveState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}
