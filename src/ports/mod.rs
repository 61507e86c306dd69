//! Port traits at the domain boundary.

pub mod config_port;
pub mod history_port;
pub mod universe_port;
