//! Order write-path orchestrator
//!
//! Coordinates validation, product snapshots, the stock-deduction/insert
//! transaction, idempotent retries and cache coherence. Cache failures are
//! logged and swallowed; everything on the write path either commits fully
//! or leaves no trace.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::FutureExt;
use serde::{Deserialize, Serialize};

use crate::cache::ObjectCache;
use crate::core::error::{ServiceError, ServiceResult};
use crate::db::repository::OrderStore;
use crate::db::{StoreSession, TransactionManager, tx_work};
use crate::domain::{Order, OrderItem, OrderStatus, OrderStatusChanged};
use crate::services::customer::CustomerService;
use crate::services::idempotency::IdempotencyService;
use crate::services::product::ProductService;
use crate::utils::hash_json;

/// Upper bound on line items per order.
const ORDER_MAX_ITEMS: usize = 100;
/// How long a read-through cached order stays fresh.
const ORDER_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderItem {
    pub product_id: String,
    pub quantity: u32,
}

/// Create-order input. Its canonical JSON form is also the idempotency
/// payload-hash input, so field order matters to hashing stability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub items: Vec<CreateOrderItem>,
}

pub struct OrderService {
    orders: Arc<dyn OrderStore>,
    products: Arc<ProductService>,
    customers: Arc<CustomerService>,
    cache: Arc<dyn ObjectCache<Order>>,
    idempotency: Arc<IdempotencyService<Order>>,
    tx_manager: Arc<dyn TransactionManager>,
}

fn order_cache_key(order_id: &str) -> String {
    format!("order:{order_id}")
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        products: Arc<ProductService>,
        customers: Arc<CustomerService>,
        cache: Arc<dyn ObjectCache<Order>>,
        idempotency: Arc<IdempotencyService<Order>>,
        tx_manager: Arc<dyn TransactionManager>,
    ) -> Self {
        Self {
            orders,
            products,
            customers,
            cache,
            idempotency,
            tx_manager,
        }
    }

    pub async fn get_order(&self, order_id: &str) -> ServiceResult<Order> {
        let cache_key = order_cache_key(order_id);
        match self.cache.get(&cache_key).await {
            Ok(Some(order)) => {
                tracing::info!(order_id = %order_id, "order found in cache");
                return Ok(order);
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(error = %err, order_id = %order_id, "cache: get order failed");
            }
        }

        let order = self.orders.get_by_id(order_id).await?;

        if let Err(err) = self.cache.set(&cache_key, &order, ORDER_CACHE_TTL).await {
            tracing::error!(error = %err, order_id = %order_id, "cache: set order failed");
        }

        Ok(order)
    }

    pub async fn update_order_status(&self, order_id: &str, new_status: &str) -> ServiceResult<()> {
        let Some(status) = OrderStatus::parse(new_status) else {
            return Err(ServiceError::invalid_request("invalid status"));
        };

        let mut order = self.orders.get_by_id(order_id).await?;
        if order.status == status {
            return Err(ServiceError::unprocessable_entity(
                "order already has this status",
            ));
        }

        let now = Utc::now();
        let event = OrderStatusChanged {
            order_id: order.id.clone(),
            status,
            old_status: order.status,
            updated_at: now,
            customer_id: order.customer_id.clone(),
        };

        self.orders
            .update_status_with_outbox(order_id, status, &event)
            .await?;

        let old_status = order.status;
        order.status = status;
        order.updated_at = now;
        if let Err(err) = self
            .cache
            .set(&order_cache_key(order_id), &order, ORDER_CACHE_TTL)
            .await
        {
            tracing::error!(error = %err, order_id = %order_id, "cache: update order failed");
        }

        tracing::info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %status,
            "Order status updated"
        );

        Ok(())
    }

    pub async fn create_order(
        &self,
        idempotency_key: Option<&str>,
        request: &CreateOrderRequest,
    ) -> ServiceResult<Order> {
        let Some(key) = idempotency_key.filter(|key| !key.is_empty()) else {
            return self.process_order(request).await;
        };

        let payload_hash = hash_json(request);

        match self.idempotency.claim(key, &payload_hash).await {
            Ok(Some(existing)) => return Ok(existing),
            Ok(None) => {}
            Err(err) => {
                tracing::error!(error = %err, idempotency_key = %key, "idempotency: claim failed");
                return Err(err);
            }
        }

        match self.process_order(request).await {
            Ok(order) => {
                self.idempotency.complete(key, &payload_hash, &order).await;
                Ok(order)
            }
            Err(err) => {
                // Free the key so the client can retry.
                self.idempotency.release(key).await;
                Err(err)
            }
        }
    }

    async fn process_order(&self, request: &CreateOrderRequest) -> ServiceResult<Order> {
        if request.items.len() > ORDER_MAX_ITEMS {
            return Err(ServiceError::unprocessable_entity(
                "order items limit exceeded",
            ));
        }
        if request.items.iter().any(|item| item.quantity == 0) {
            return Err(ServiceError::invalid_request(
                "item quantity must be positive",
            ));
        }

        self.customers.exists(&request.customer_id).await?;

        let items = self.build_order_items(&request.items).await?;
        let order = Order::new(request.customer_id.clone(), OrderStatus::Created, items);
        // The transaction closure must be usable for any session lifetime the
        // transaction manager picks, so the order can't be captured by a plain
        // `&mut` borrow across the `.await`. An `Arc<Mutex<_>>` gives the
        // closure an owned, 'static handle while still mutating the same
        // order the transaction manager sees.
        let order_handle = Arc::new(tokio::sync::Mutex::new(order));

        let transaction = {
            let products = Arc::clone(&self.products);
            let orders = Arc::clone(&self.orders);
            let order_handle = Arc::clone(&order_handle);
            self.tx_manager
                .with_transaction(tx_work(move |session: &mut StoreSession| {
                    async move {
                        let mut order = order_handle.lock().await;
                        let items = order.items.clone();
                        for item in &items {
                            products
                                .deduct_stock(&item.product_id, item.quantity, session)
                                .await?;
                        }
                        orders.create(&mut order, session).await
                    }
                    .boxed()
                }))
                .await
        };

        if let Err(err) = transaction {
            tracing::error!(
                error = %err,
                customer_id = %request.customer_id,
                "transaction: create order failed"
            );
            return Err(err);
        }

        let order = match Arc::try_unwrap(order_handle) {
            Ok(mutex) => mutex.into_inner(),
            Err(order_handle) => order_handle.lock().await.clone(),
        };

        tracing::info!(order_id = %order.id, "Order created successfully");
        Ok(order)
    }

    /// Fetches each product and snapshots its name and price into the line
    /// item; a missing product fails the whole request.
    async fn build_order_items(
        &self,
        requested: &[CreateOrderItem],
    ) -> ServiceResult<Vec<OrderItem>> {
        let mut items = Vec::with_capacity(requested.len());
        for item in requested {
            let product = self.products.get_by_id(&item.product_id).await?;
            items.push(OrderItem::new(
                item.product_id.clone(),
                product.name,
                item.quantity,
                product.price,
            ));
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TxWork;
    use crate::db::repository::{CustomerStore, ProductStore};
    use crate::domain::{Amount, Id, Product};
    use crate::services::idempotency::IdempotencyEntry;
    use async_trait::async_trait;
    use serde::de::DeserializeOwned;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn hex_id(n: u64) -> String {
        format!("{n:024x}")
    }

    #[derive(Default)]
    struct MemoryProducts {
        items: Mutex<HashMap<String, Product>>,
        next_id: AtomicU64,
    }

    impl MemoryProducts {
        fn add(&self, name: &str, price: i64, stock: i64) -> String {
            let id = hex_id(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            let mut product = Product::new(
                name.to_string(),
                String::new(),
                Amount::from_cents(price),
                stock,
            );
            product.id = id.clone();
            self.items.lock().unwrap().insert(id.clone(), product);
            id
        }

        fn stock_of(&self, id: &str) -> i64 {
            self.items.lock().unwrap().get(id).unwrap().stock
        }

        fn snapshot(&self) -> HashMap<String, Product> {
            self.items.lock().unwrap().clone()
        }

        fn restore(&self, snapshot: HashMap<String, Product>) {
            *self.items.lock().unwrap() = snapshot;
        }
    }

    #[async_trait]
    impl ProductStore for MemoryProducts {
        async fn create(&self, product: &mut Product) -> ServiceResult<()> {
            product.id = hex_id(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
            self.items
                .lock()
                .unwrap()
                .insert(product.id.clone(), product.clone());
            Ok(())
        }

        async fn get_by_id(&self, id: &str) -> ServiceResult<Product> {
            self.items
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| ServiceError::not_found("entity not found"))
        }

        async fn get_all(&self) -> ServiceResult<Vec<Product>> {
            Ok(self.items.lock().unwrap().values().cloned().collect())
        }

        async fn deduct_stock(
            &self,
            id: &str,
            quantity: u32,
            _session: &mut StoreSession,
        ) -> ServiceResult<()> {
            let mut items = self.items.lock().unwrap();
            let product = items.get_mut(id);
            match product {
                Some(product) if product.stock >= i64::from(quantity) => {
                    product.stock -= i64::from(quantity);
                    Ok(())
                }
                _ => Err(ServiceError::unprocessable_entity(format!(
                    "insufficient stock for product {id}"
                ))),
            }
        }
    }

    #[derive(Default)]
    struct MemoryOrders {
        orders: Mutex<HashMap<String, Order>>,
        status_events: Mutex<Vec<OrderStatusChanged>>,
        next_id: AtomicU64,
    }

    impl MemoryOrders {
        fn count(&self) -> usize {
            self.orders.lock().unwrap().len()
        }

        fn snapshot(&self) -> HashMap<String, Order> {
            self.orders.lock().unwrap().clone()
        }

        fn restore(&self, snapshot: HashMap<String, Order>) {
            *self.orders.lock().unwrap() = snapshot;
        }
    }

    #[async_trait]
    impl OrderStore for MemoryOrders {
        async fn create(&self, order: &mut Order, _session: &mut StoreSession) -> ServiceResult<()> {
            if !order.id.is_empty() {
                return Err(ServiceError::internal("cannot create order with existing ID"));
            }
            order.id = hex_id(self.next_id.fetch_add(1, Ordering::SeqCst) + 1000);
            for (index, item) in order.items.iter_mut().enumerate() {
                item.id = hex_id(self.next_id.load(Ordering::SeqCst) * 100 + index as u64);
            }
            self.orders
                .lock()
                .unwrap()
                .insert(order.id.clone(), order.clone());
            Ok(())
        }

        async fn get_by_id(&self, id: &str) -> ServiceResult<Order> {
            self.orders
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| ServiceError::not_found("entity not found"))
        }

        async fn update_status_with_outbox(
            &self,
            id: &str,
            status: OrderStatus,
            event: &OrderStatusChanged,
        ) -> ServiceResult<()> {
            let mut orders = self.orders.lock().unwrap();
            let order = orders
                .get_mut(id)
                .ok_or_else(|| ServiceError::not_found("entity not found"))?;
            order.status = status;
            order.updated_at = event.updated_at;
            self.status_events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryCustomers {
        ids: Mutex<HashSet<String>>,
        fail: Mutex<Option<ServiceError>>,
    }

    #[async_trait]
    impl CustomerStore for MemoryCustomers {
        async fn create(&self) -> ServiceResult<Id> {
            let id = hex_id(7777);
            self.ids.lock().unwrap().insert(id.clone());
            Ok(id)
        }

        async fn exists(&self, id: &str) -> ServiceResult<bool> {
            if let Some(err) = self.fail.lock().unwrap().clone() {
                return Err(err);
            }
            if self.ids.lock().unwrap().contains(id) {
                Ok(true)
            } else {
                Err(ServiceError::not_found("entity not found"))
            }
        }
    }

    /// JSON-backed cache fake shared by the order cache and the idempotency
    /// cache; TTLs are accepted and ignored.
    #[derive(Default)]
    struct MemoryCache {
        map: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl<T> ObjectCache<T> for MemoryCache
    where
        T: serde::Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        async fn get(&self, id: &str) -> ServiceResult<Option<T>> {
            let map = self.map.lock().unwrap();
            match map.get(id) {
                Some(json) => Ok(Some(serde_json::from_str(json).unwrap())),
                None => Ok(None),
            }
        }

        async fn set(&self, id: &str, value: &T, _ttl: Duration) -> ServiceResult<()> {
            let json = serde_json::to_string(value).unwrap();
            self.map.lock().unwrap().insert(id.to_string(), json);
            Ok(())
        }

        async fn set_if_absent(&self, id: &str, value: &T, _ttl: Duration) -> ServiceResult<bool> {
            let mut map = self.map.lock().unwrap();
            if map.contains_key(id) {
                return Ok(false);
            }
            map.insert(id.to_string(), serde_json::to_string(value).unwrap());
            Ok(true)
        }

        async fn delete(&self, id: &str) -> ServiceResult<()> {
            self.map.lock().unwrap().remove(id);
            Ok(())
        }
    }

    /// Emulates storage rollback by snapshotting the fakes before the work
    /// runs and restoring them when it fails.
    struct SnapshotTxManager {
        products: Arc<MemoryProducts>,
        orders: Arc<MemoryOrders>,
    }

    #[async_trait]
    impl TransactionManager for SnapshotTxManager {
        async fn with_transaction(&self, work: TxWork<'_>) -> ServiceResult<()> {
            let product_snapshot = self.products.snapshot();
            let order_snapshot = self.orders.snapshot();
            let mut session = StoreSession::detached();
            match work(&mut session).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    self.products.restore(product_snapshot);
                    self.orders.restore(order_snapshot);
                    Err(err)
                }
            }
        }
    }

    struct Harness {
        service: OrderService,
        products: Arc<MemoryProducts>,
        orders: Arc<MemoryOrders>,
        customers: Arc<MemoryCustomers>,
        cache: Arc<MemoryCache>,
    }

    fn setup() -> Harness {
        let products = Arc::new(MemoryProducts::default());
        let orders = Arc::new(MemoryOrders::default());
        let customers = Arc::new(MemoryCustomers::default());
        let cache = Arc::new(MemoryCache::default());

        let product_service = Arc::new(ProductService::new(
            Arc::clone(&products) as Arc<dyn ProductStore>
        ));
        let customer_service = Arc::new(CustomerService::new(
            Arc::clone(&customers) as Arc<dyn CustomerStore>
        ));
        let idempotency = Arc::new(IdempotencyService::new(
            Arc::new(MemoryCache::default()) as Arc<dyn ObjectCache<IdempotencyEntry<Order>>>,
            Duration::from_secs(900),
            Duration::from_millis(50),
            Duration::from_millis(500),
        ));
        let tx_manager = Arc::new(SnapshotTxManager {
            products: Arc::clone(&products),
            orders: Arc::clone(&orders),
        });

        let service = OrderService::new(
            Arc::clone(&orders) as Arc<dyn OrderStore>,
            product_service,
            customer_service,
            Arc::clone(&cache) as Arc<dyn ObjectCache<Order>>,
            idempotency,
            tx_manager,
        );

        Harness {
            service,
            products,
            orders,
            customers,
            cache,
        }
    }

    fn known_customer(harness: &Harness) -> String {
        let id = hex_id(42);
        harness.customers.ids.lock().unwrap().insert(id.clone());
        id
    }

    fn request(customer_id: &str, items: Vec<(String, u32)>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_id: customer_id.to_string(),
            items: items
                .into_iter()
                .map(|(product_id, quantity)| CreateOrderItem {
                    product_id,
                    quantity,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn create_order_deducts_stock_and_computes_total() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);

        let order = harness
            .service
            .create_order(None, &request(&customer, vec![(product.clone(), 3)]))
            .await
            .unwrap();

        assert_eq!(order.total_amount.cents(), 8997);
        assert_eq!(order.status, OrderStatus::Created);
        assert_eq!(order.id.len(), 24);
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].product_name, "Widget");
        assert_eq!(order.items[0].unit_price.cents(), 2999);
        assert!(!order.items[0].id.is_empty());
        assert_eq!(harness.products.stock_of(&product), 47);
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_back_everything() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Scarce", 1000, 2);

        let err = harness
            .service
            .create_order(None, &request(&customer, vec![(product.clone(), 5)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::UnprocessableEntity(_)));
        assert_eq!(harness.products.stock_of(&product), 2);
        assert_eq!(harness.orders.count(), 0);
    }

    #[tokio::test]
    async fn partial_deduction_failure_restores_earlier_items() {
        let harness = setup();
        let customer = known_customer(&harness);
        let plenty = harness.products.add("Plenty", 100, 10);
        let scarce = harness.products.add("Scarce", 100, 1);

        let err = harness
            .service
            .create_order(
                None,
                &request(&customer, vec![(plenty.clone(), 5), (scarce.clone(), 5)]),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::UnprocessableEntity(_)));
        assert_eq!(harness.products.stock_of(&plenty), 10);
        assert_eq!(harness.products.stock_of(&scarce), 1);
        assert_eq!(harness.orders.count(), 0);
    }

    #[tokio::test]
    async fn item_limit_is_enforced() {
        let harness = setup();
        let customer = known_customer(&harness);
        let items = (0..101).map(|n| (hex_id(n), 1)).collect();

        let err = harness
            .service
            .create_order(None, &request(&customer, items))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ServiceError::unprocessable_entity("order items limit exceeded")
        );
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected_before_any_lookup() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);

        let err = harness
            .service
            .create_order(None, &request(&customer, vec![(product.clone(), 0)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        assert_eq!(harness.products.stock_of(&product), 50);
    }

    #[tokio::test]
    async fn unknown_customer_is_not_found() {
        let harness = setup();
        let product = harness.products.add("Widget", 2999, 50);

        let err = harness
            .service
            .create_order(None, &request(&hex_id(999), vec![(product, 1)]))
            .await
            .unwrap_err();

        assert_eq!(err, ServiceError::not_found("customer not found"));
    }

    #[tokio::test]
    async fn customer_store_failure_rejects_the_order() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        *harness.customers.fail.lock().unwrap() =
            Some(ServiceError::internal("storage unavailable"));

        let err = harness
            .service
            .create_order(None, &request(&customer, vec![(product, 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::Internal(_)));
        assert_eq!(harness.orders.count(), 0);
    }

    #[tokio::test]
    async fn non_not_found_customer_failure_surfaces_as_internal() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        *harness.customers.fail.lock().unwrap() =
            Some(ServiceError::invalid_request("invalid ID format"));

        let err = harness
            .service
            .create_order(None, &request(&customer, vec![(product, 1)]))
            .await
            .unwrap_err();

        // The storage layer's own kind must not leak through the check.
        assert_eq!(err, ServiceError::internal("invalid ID format"));
        assert_eq!(harness.orders.count(), 0);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let harness = setup();
        let customer = known_customer(&harness);

        let err = harness
            .service
            .create_order(None, &request(&customer, vec![(hex_id(555), 1)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn identical_retry_returns_same_order_and_deducts_once() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        let payload = request(&customer, vec![(product.clone(), 3)]);

        let first = harness
            .service
            .create_order(Some("key-1"), &payload)
            .await
            .unwrap();
        let second = harness
            .service
            .create_order(Some("key-1"), &payload)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(harness.products.stock_of(&product), 47);
        assert_eq!(harness.orders.count(), 1);
    }

    #[tokio::test]
    async fn same_key_with_different_payload_is_rejected() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);

        harness
            .service
            .create_order(Some("key-1"), &request(&customer, vec![(product.clone(), 3)]))
            .await
            .unwrap();

        let err = harness
            .service
            .create_order(Some("key-1"), &request(&customer, vec![(product, 4)]))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ServiceError::unprocessable_entity(
                "idempotency key already used with a different payload"
            )
        );
    }

    #[tokio::test]
    async fn failed_attempt_releases_key_for_retry() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Scarce", 1000, 2);

        // First attempt oversells and fails; the claim must be released.
        let err = harness
            .service
            .create_order(Some("key-1"), &request(&customer, vec![(product.clone(), 5)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnprocessableEntity(_)));

        // Retry with the same key and a fitting quantity succeeds.
        let order = harness
            .service
            .create_order(Some("key-1"), &request(&customer, vec![(product.clone(), 2)]))
            .await
            .unwrap();
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(harness.products.stock_of(&product), 0);
    }

    #[tokio::test]
    async fn empty_idempotency_key_skips_coordination() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        let payload = request(&customer, vec![(product.clone(), 1)]);

        let first = harness.service.create_order(Some(""), &payload).await.unwrap();
        let second = harness.service.create_order(Some(""), &payload).await.unwrap();

        // No collapsing without a key: two distinct orders, two deductions.
        assert_ne!(first.id, second.id);
        assert_eq!(harness.products.stock_of(&product), 48);
    }

    #[tokio::test]
    async fn update_status_persists_event_with_old_status() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        let order = harness
            .service
            .create_order(None, &request(&customer, vec![(product, 1)]))
            .await
            .unwrap();

        harness
            .service
            .update_order_status(&order.id, "processing")
            .await
            .unwrap();

        let events = harness.orders.status_events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].order_id, order.id);
        assert_eq!(events[0].status, OrderStatus::Processing);
        assert_eq!(events[0].old_status, OrderStatus::Created);
        assert_eq!(events[0].customer_id, customer);
        drop(events);

        let stored = harness.orders.get_by_id(&order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn update_status_refreshes_the_cache() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        let order = harness
            .service
            .create_order(None, &request(&customer, vec![(product, 1)]))
            .await
            .unwrap();

        harness
            .service
            .update_order_status(&order.id, "processing")
            .await
            .unwrap();

        let cached: Option<Order> = harness
            .cache
            .get(&order_cache_key(&order.id))
            .await
            .unwrap();
        assert_eq!(cached.unwrap().status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn update_status_rejects_invalid_and_same_status() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        let order = harness
            .service
            .create_order(None, &request(&customer, vec![(product, 1)]))
            .await
            .unwrap();

        let err = harness
            .service
            .update_order_status(&order.id, "teleported")
            .await
            .unwrap_err();
        assert_eq!(err, ServiceError::invalid_request("invalid status"));

        let err = harness
            .service
            .update_order_status(&order.id, "created")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::unprocessable_entity("order already has this status")
        );

        // Neither rejection produced an event.
        assert!(harness.orders.status_events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_status_on_missing_order_is_not_found() {
        let harness = setup();
        let err = harness
            .service
            .update_order_status(&hex_id(4040), "processing")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_order_prefers_the_cache() {
        let harness = setup();
        let mut order = Order::new(hex_id(1), OrderStatus::Created, vec![]);
        order.id = hex_id(2);
        harness
            .cache
            .set(&order_cache_key(&order.id), &order, ORDER_CACHE_TTL)
            .await
            .unwrap();

        // Not in the store at all, so a hit proves the cache answered.
        let loaded = harness.service.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.id, order.id);
    }

    #[tokio::test]
    async fn get_order_miss_falls_through_and_backfills() {
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        let order = harness
            .service
            .create_order(None, &request(&customer, vec![(product, 1)]))
            .await
            .unwrap();

        let loaded = harness.service.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.id, order.id);

        let cached: Option<Order> = harness
            .cache
            .get(&order_cache_key(&order.id))
            .await
            .unwrap();
        assert!(cached.is_some());
    }

    #[tokio::test]
    async fn get_order_missing_is_not_found() {
        let harness = setup();
        let err = harness.service.get_order(&hex_id(31337)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_duplicate_blocks_until_original_completes() {
        // Two tasks race on the same key: exactly one processes, the other
        // polls and receives the same order.
        let harness = setup();
        let customer = known_customer(&harness);
        let product = harness.products.add("Widget", 2999, 50);
        let payload = request(&customer, vec![(product.clone(), 3)]);

        let service = Arc::new(harness.service);
        let first = {
            let service = Arc::clone(&service);
            let payload = payload.clone();
            tokio::spawn(async move { service.create_order(Some("race"), &payload).await })
        };
        let second = {
            let service = Arc::clone(&service);
            let payload = payload.clone();
            tokio::spawn(async move { service.create_order(Some("race"), &payload).await })
        };

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(harness.products.stock_of(&product), 47);
        assert_eq!(harness.orders.count(), 1);
    }

}
