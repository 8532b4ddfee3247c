pub mod connection;
pub mod memory_store;
pub mod mongo_store;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::config::StoreBackend;
use crate::errors::Result;
use crate::models::{PendingTransaction, Resolution, ResolveOutcome};

pub use memory_store::InMemoryPaymentStore;
pub use mongo_store::MongoPaymentStore;

/// Keyed table of STK push attempts, shared by the initiation path, the
/// callback path and the status endpoint.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new attempt. An existing record with the same id is replaced.
    async fn insert(&self, transaction: PendingTransaction) -> Result<()>;

    async fn get(&self, checkout_request_id: &str) -> Result<Option<PendingTransaction>>;

    /// Moves a `pending` record to its terminal state. Records that already
    /// left `pending` are never touched.
    async fn resolve(&self, checkout_request_id: &str, resolution: Resolution) -> Result<ResolveOutcome>;

    /// Fails every record still pending that was created before `cutoff`.
    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    /// Deletes terminal records last updated before `cutoff`.
    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    fn backend(&self) -> &'static str;
}

pub async fn open_store(backend: &StoreBackend) -> Result<Arc<dyn PaymentStore>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryPaymentStore::new())),
        StoreBackend::MongoDb { url, database } => {
            let db = connection::get_db(url, database).await?;
            let store = MongoPaymentStore::new(&db);
            store.ensure_indexes().await?;
            Ok(Arc::new(store))
        }
    }
}
