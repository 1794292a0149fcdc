//! Database layer
//!
//! MongoDB connection bootstrap, BSON documents and the repositories that
//! implement the storage ports.

pub mod models;
pub mod repository;
mod transaction;

pub use transaction::{MongoTransactionManager, StoreSession, TransactionManager, TxWork, tx_work};

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;

use crate::core::config::MongoConfig;

/// Connects, applies pool/timeout settings and verifies reachability.
pub async fn connect(config: &MongoConfig) -> anyhow::Result<Client> {
    let mut options = ClientOptions::parse(&config.uri).await?;
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(config.connect_timeout);
    options.server_selection_timeout = Some(config.server_selection_timeout);

    let client = Client::with_options(options)?;
    ping(&client).await?;
    Ok(client)
}

/// Round-trips a `ping` command; the health endpoint reuses this.
pub async fn ping(client: &Client) -> Result<(), mongodb::error::Error> {
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await?;
    Ok(())
}
