//! Synthex Common Types
//!
//! This crate contains shared types used across the Synthex exchange engine,
//! including account and asset identifiers, monetary helpers and the shared clock.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
