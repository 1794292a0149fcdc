//! Core: configuration, errors, logging, state, server and background tasks.

pub mod config;
pub mod error;
pub mod logger;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use server::Server;
pub use state::ServerState;
