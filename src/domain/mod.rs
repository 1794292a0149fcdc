//! Domain model
//!
//! Pure value types shared by the services and the storage layer. No I/O
//! lives here; repositories convert these to and from storage documents.

mod order;
mod product;
mod shared;

pub use order::{Order, OrderItem, OrderStatus, OrderStatusChanged};
pub use product::Product;
pub use shared::{Amount, Event, Id, is_valid_id};
