//! Server state
//!
//! Holds shared handles to every adapter and service. Cloning is shallow
//! (everything interesting sits behind an `Arc` or an internally pooled
//! client), so axum can clone the state per request cheaply.

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;

use crate::broker::{EventPublisher, RabbitBroker};
use crate::cache::{ObjectCache, RateLimiter, RedisCache, RedisRateLimiter};
use crate::core::Config;
use crate::core::tasks::BackgroundTasks;
use crate::db::repository::{
    MongoCustomerRepository, MongoOrderRepository, MongoOutboxRepository, MongoProductRepository,
};
use crate::db::{self, MongoTransactionManager, TransactionManager};
use crate::domain::Order;
use crate::outbox::{OutboxPublisher, OutboxStore};
use crate::services::{
    CustomerService, IdempotencyEntry, IdempotencyService, OrderService, ProductService,
};

const IDEMPOTENCY_TTL: Duration = Duration::from_secs(15 * 60);
const IDEMPOTENCY_POLL_INTERVAL: Duration = Duration::from_secs(1);
const IDEMPOTENCY_POLL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub mongo: mongodb::Client,
    pub redis: ConnectionManager,
    pub broker: Arc<RabbitBroker>,
    pub outbox_store: Arc<MongoOutboxRepository>,
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub orders: Arc<OrderService>,
    pub products: Arc<ProductService>,
    pub customers: Arc<CustomerService>,
}

impl ServerState {
    /// Connects to every external dependency and wires the service graph.
    ///
    /// Connection order is Mongo → Redis → RabbitMQ; the first failure aborts
    /// startup so a half-alive process never serves traffic.
    pub async fn initialize(config: &Config) -> anyhow::Result<Self> {
        let mongo = db::connect(&config.mongo).await?;
        tracing::info!(database = %config.mongo.database, "Connected to MongoDB");

        let redis = crate::cache::connect(&config.redis).await?;
        tracing::info!("Connected to Redis");

        let broker = Arc::new(RabbitBroker::connect(config.rabbitmq.clone()).await?);
        tracing::info!("Connected to RabbitMQ");

        let database = mongo.database(&config.mongo.database);
        let outbox_store = Arc::new(MongoOutboxRepository::new(&database));
        let order_repo = Arc::new(MongoOrderRepository::new(
            mongo.clone(),
            &database,
            Arc::clone(&outbox_store),
        ));
        if let Err(err) = order_repo.ensure_indexes().await {
            tracing::error!(error = %err, collection = "orders", "failed to create indexes");
        }
        let product_repo = Arc::new(MongoProductRepository::new(&database));
        let customer_repo = Arc::new(MongoCustomerRepository::new(&database));
        let tx_manager: Arc<dyn TransactionManager> =
            Arc::new(MongoTransactionManager::new(mongo.clone()));

        let order_cache: Arc<dyn ObjectCache<Order>> =
            Arc::new(RedisCache::new(redis.clone(), "order-cache"));
        let idempotency_cache: Arc<dyn ObjectCache<IdempotencyEntry<Order>>> =
            Arc::new(RedisCache::new(redis.clone(), "idempotency-cache"));
        let rate_limiter: Arc<dyn RateLimiter> =
            Arc::new(RedisRateLimiter::new(redis.clone()));

        let customers = Arc::new(CustomerService::new(customer_repo));
        let products = Arc::new(ProductService::new(product_repo));
        let idempotency = Arc::new(IdempotencyService::new(
            idempotency_cache,
            IDEMPOTENCY_TTL,
            IDEMPOTENCY_POLL_INTERVAL,
            IDEMPOTENCY_POLL_TIMEOUT,
        ));
        let orders = Arc::new(OrderService::new(
            order_repo,
            Arc::clone(&products),
            Arc::clone(&customers),
            order_cache,
            idempotency,
            tx_manager,
        ));

        Ok(Self {
            config: config.clone(),
            mongo,
            redis,
            broker,
            outbox_store,
            rate_limiter,
            orders,
            products,
            customers,
        })
    }

    /// Registers the long-lived workers. Must be called before serving.
    pub fn start_background_tasks(&self, tasks: &mut BackgroundTasks) {
        let publisher = OutboxPublisher::new(
            Arc::clone(&self.outbox_store) as Arc<dyn OutboxStore>,
            Arc::clone(&self.broker) as Arc<dyn EventPublisher>,
            self.config.outbox.interval,
            self.config.outbox.batch_size,
        );
        let shutdown = tasks.shutdown_token();
        tasks.spawn("outbox_publisher", publisher.run(shutdown));
    }
}
