//! # Warband AI
//!
//! Movement decision layer for non-player agents.
//!
//! This crate decides, every tick, what an NPC should be doing and where it
//! should go, and hands the resulting intent to an external locomotion
//! backend:
//! - Movement states and the per-NPC state machine
//! - Enemy/leader acquisition from overlap results
//! - Leader formations and leader-to-leader rendezvous
//! - Follow throttling and stale-command timeouts
//! - A manager that ticks every NPC in order
//! - World registry, movement config, and an event bus for collaborators

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod executor;
pub mod formation;
pub mod manager;
pub mod movement;
pub mod player;
pub mod registry;
pub mod state;
pub mod target_filter;
pub mod throttle;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::context::*;
    pub use crate::error::*;
    pub use crate::events::*;
    pub use crate::executor::*;
    pub use crate::formation::*;
    pub use crate::manager::*;
    pub use crate::movement::*;
    pub use crate::player::*;
    pub use crate::registry::*;
    pub use crate::state::*;
    pub use crate::target_filter::*;
    pub use crate::throttle::*;
}

pub use prelude::*;
