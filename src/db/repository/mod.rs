//! Storage ports and their MongoDB implementations
//!
//! The traits here are the seams the services depend on; the Mongo
//! repositories implement them and normalize driver errors into the service
//! taxonomy: unparseable ids become InvalidRequest, missing documents become
//! NotFound, duplicate keys become Conflict, everything else Internal.

pub mod customer;
pub mod order;
pub mod outbox;
pub mod product;

pub use customer::MongoCustomerRepository;
pub use order::MongoOrderRepository;
pub use outbox::MongoOutboxRepository;
pub use product::MongoProductRepository;

use async_trait::async_trait;
use bson::oid::ObjectId;
use mongodb::error::{ErrorKind, WriteFailure};

use crate::core::error::{ServiceError, ServiceResult};
use crate::db::transaction::StoreSession;
use crate::domain::{Id, Order, OrderStatus, OrderStatusChanged, Product};

/// Order persistence port.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new order inside the caller's transaction, assigning the
    /// order and item ids and the storage timestamps in place.
    async fn create(&self, order: &mut Order, session: &mut StoreSession) -> ServiceResult<()>;

    async fn get_by_id(&self, id: &str) -> ServiceResult<Order>;

    /// Applies the status change and inserts the outbox row atomically.
    async fn update_status_with_outbox(
        &self,
        id: &str,
        status: OrderStatus,
        event: &OrderStatusChanged,
    ) -> ServiceResult<()>;
}

/// Product persistence port.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn create(&self, product: &mut Product) -> ServiceResult<()>;

    async fn get_by_id(&self, id: &str) -> ServiceResult<Product>;

    async fn get_all(&self) -> ServiceResult<Vec<Product>>;

    /// Decrements stock only when enough remains; fails with
    /// UnprocessableEntity otherwise. Runs inside the caller's transaction.
    async fn deduct_stock(
        &self,
        id: &str,
        quantity: u32,
        session: &mut StoreSession,
    ) -> ServiceResult<()>;
}

/// Customer persistence port.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn create(&self) -> ServiceResult<Id>;

    /// NotFound when no such customer exists.
    async fn exists(&self, id: &str) -> ServiceResult<bool>;
}

pub(crate) fn parse_object_id(id: &str) -> ServiceResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| ServiceError::invalid_request("invalid ID format"))
}

pub(crate) fn map_driver_error(err: mongodb::error::Error) -> ServiceError {
    if is_duplicate_key(&err) {
        return ServiceError::conflict("duplicate key error");
    }
    ServiceError::internal(err.to_string())
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        ErrorKind::Command(command_error) => command_error.code == 11000,
        _ => false,
    }
}
