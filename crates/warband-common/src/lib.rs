//! # Warband Common
//!
//! Common types shared by the Warband movement core and its simulation host:
//! - ID types (`EntityId`, `FactionId`)
//! - Ground-plane geometry over `glam::Vec3`
//! - Config error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod geom;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::geom::*;
    pub use crate::ids::*;
}

pub use prelude::*;
