//! BSON documents
//!
//! Storage-shaped twins of the domain types. Ids are `ObjectId`s here and
//! 24-hex strings in the domain; conversions live next to each document.

mod customer;
mod order;
mod outbox;
mod product;

pub use customer::CustomerDocument;
pub use order::{OrderDocument, OrderItemDocument};
pub use outbox::OutboxDocument;
pub use product::ProductDocument;
