//! Database module.
//!
//! Defines the host registry and probe history contracts and provides a
//! SQLite-backed store implementing both.

mod history;
mod models;
mod registry;
mod store;

pub use history::*;
pub use models::*;
pub use registry::*;
pub use store::*;
