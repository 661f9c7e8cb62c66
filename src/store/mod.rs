//! Store module for StatusBoard.
//!
//! Holds the current status and a bounded, in-memory history for every
//! monitored service. Nothing survives a restart.

mod models;
mod store;
mod window;

pub use models::*;
pub use store::*;
pub use window::*;
