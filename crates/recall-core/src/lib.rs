//! Configuration, secrets and wiring shared by the Recall binary and its tests.

pub mod bootstrap;
pub mod config;
pub mod vault;

pub use config::Config;
