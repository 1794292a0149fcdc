//! Storage transactions
//!
//! The write path needs two atomic pairs: stock deduction + order insert, and
//! status update + outbox insert. Both ride on MongoDB multi-document
//! transactions. A [`StoreSession`] threads the driver session through store
//! calls explicitly; callers outside a transaction never see one.

use async_trait::async_trait;
use futures::future::BoxFuture;
use mongodb::{Client, ClientSession};

use crate::core::error::ServiceResult;
use crate::db::repository::map_driver_error;

/// Handle tying store calls to an open storage transaction.
///
/// A detached session carries no driver state; in-memory stores (tests) use
/// it, and the Mongo stores treat it as "run outside any transaction".
pub struct StoreSession {
    inner: Option<ClientSession>,
}

impl StoreSession {
    /// A session with no underlying storage transaction.
    pub fn detached() -> Self {
        Self { inner: None }
    }

    pub(crate) fn mongo(session: ClientSession) -> Self {
        Self {
            inner: Some(session),
        }
    }

    pub(crate) fn client_session(&mut self) -> Option<&mut ClientSession> {
        self.inner.as_mut()
    }
}

/// Unit of work executed inside one transaction.
pub type TxWork<'a> =
    Box<dyn for<'s> FnOnce(&'s mut StoreSession) -> BoxFuture<'s, ServiceResult<()>> + Send + 'a>;

/// Boxes a closure into a [`TxWork`], pinning the higher-ranked session
/// lifetime the compiler cannot infer through a bare `Box::new`.
pub fn tx_work<'a, F>(work: F) -> TxWork<'a>
where
    F: for<'s> FnOnce(&'s mut StoreSession) -> BoxFuture<'s, ServiceResult<()>> + Send + 'a,
{
    Box::new(work)
}

/// Port for running a closure inside a single storage transaction.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn with_transaction(&self, work: TxWork<'_>) -> ServiceResult<()>;
}

pub struct MongoTransactionManager {
    client: Client,
}

impl MongoTransactionManager {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TransactionManager for MongoTransactionManager {
    async fn with_transaction(&self, work: TxWork<'_>) -> ServiceResult<()> {
        run_in_transaction(&self.client, work).await
    }
}

/// Starts a session + transaction, runs `work`, commits on success and aborts
/// on failure. Also used by stores that own a composite atomic write.
pub(crate) async fn run_in_transaction(client: &Client, work: TxWork<'_>) -> ServiceResult<()> {
    let mut session = client.start_session().await.map_err(map_driver_error)?;
    session
        .start_transaction()
        .await
        .map_err(map_driver_error)?;

    let mut store_session = StoreSession::mongo(session);
    let result = work(&mut store_session).await;

    let Some(session) = store_session.client_session() else {
        return result;
    };

    match result {
        Ok(()) => session.commit_transaction().await.map_err(map_driver_error),
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                tracing::error!(error = %abort_err, "failed to abort transaction");
            }
            Err(err)
        }
    }
}
