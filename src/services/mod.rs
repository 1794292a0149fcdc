//! Core services
//!
//! - [`order`]: the order write-path orchestrator
//! - [`idempotency`]: claim/complete/release duplicate collapsing
//! - [`product`]: catalog create/list/get and stock deduction
//! - [`customer`]: creation and existence checks

pub mod customer;
pub mod idempotency;
pub mod order;
pub mod product;

pub use customer::CustomerService;
pub use idempotency::{IdempotencyEntry, IdempotencyService, IdempotencyStatus};
pub use order::{CreateOrderItem, CreateOrderRequest, OrderService};
pub use product::{CreateProductRequest, ProductService};
