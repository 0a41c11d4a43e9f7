//! Read-only queries over a loaded [`SessionLog`](crate::session::SessionLog).

pub mod skill;
pub mod telemetry;
pub mod tool;
