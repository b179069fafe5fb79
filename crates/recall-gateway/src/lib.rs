//! HTTP surface for the memory service: insert, search, delete, statistics, embedding and
//! health, with optional bearer auth.

mod error;
mod handlers;
mod router;
mod server;

pub use error::{ApiError, GatewayError, status_for};
pub use server::GatewayServer;
