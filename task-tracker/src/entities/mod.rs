//! sea-orm entities mirroring the tables created by the `migration` crate.

pub mod change;
pub mod status;
pub mod task;
pub mod user;
