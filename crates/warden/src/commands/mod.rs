//! CLI command implementations.

pub mod audit;
pub mod check;
pub mod nudge;
pub mod peek;
pub mod status;
