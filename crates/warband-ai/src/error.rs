//! Errors for operations that address agents by handle.
//!
//! The per-tick update never fails; these only come out of setup and
//! bookkeeping calls on the manager and the formation coordinator.

use thiserror::Error;
use warband_common::EntityId;

/// Error types for movement management.
#[derive(Debug, Error)]
pub enum MovementError {
    /// NPC not registered with the manager
    #[error("NPC not found: {0}")]
    NotFound(EntityId),
    /// NPC registered twice
    #[error("NPC already registered: {0}")]
    AlreadyRegistered(EntityId),
    /// Followers can only be assigned to leaders
    #[error("NPC {0} is not a leader")]
    NotALeader(EntityId),
    /// Formation slots are assigned once per follower
    #[error("NPC {0} already holds a formation slot")]
    SlotAlreadyAssigned(EntityId),
    /// The spawn factory could not place a slot marker
    #[error("Failed to spawn a formation marker for leader {0}")]
    SpawnFailed(EntityId),
}

/// Result type for movement management.
pub type MovementResult<T> = Result<T, MovementError>;
