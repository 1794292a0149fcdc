//! Order Server - order management with a reliable write path
//!
//! # Architecture overview
//!
//! The interesting machinery is the write path: creating and mutating orders
//! while deducting stock atomically, collapsing retried submissions to one
//! effect, and guaranteeing status-change events reach the bus at least once
//! even across crashes.
//!
//! # Module structure
//!
//! ```text
//! src/
//! ├── core/          # config, state, errors, logging, background tasks
//! ├── domain/        # pure value types and events
//! ├── db/            # MongoDB documents, repositories, transactions
//! ├── cache/         # Redis object cache + rate limiter
//! ├── broker/        # RabbitMQ publisher (lazy, self-healing)
//! ├── outbox/        # transactional outbox relay
//! ├── services/      # order orchestrator, idempotency, catalog, customers
//! ├── api/           # HTTP routes and middleware
//! └── utils/         # hashing helpers
//! ```

pub mod api;
pub mod broker;
pub mod cache;
pub mod core;
pub mod db;
pub mod domain;
pub mod outbox;
pub mod services;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, Server, ServerState, ServiceError, ServiceResult};
