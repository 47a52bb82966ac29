//! Star system domain model.
//!
//! # Responsibility
//! - Define the System→Planet→Moon/SpaceStation hierarchy used by every
//!   store and batch job.
//! - Own validation rules and the arena representation used for diffing.
//!
//! # Invariants
//! - Ownership is exclusive: no planet, moon or station exists without its
//!   parent.
//! - Validation runs before any persistence write.

pub mod arena;
pub mod discovery;
pub mod system;
pub mod validate;
