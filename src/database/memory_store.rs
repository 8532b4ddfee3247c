use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::warn;

use super::PaymentStore;
use crate::errors::Result;
use crate::models::{PaymentStatus, PendingTransaction, Resolution, ResolveOutcome};

/// Process-local store. Everything is lost when the process exits.
///
/// Every mutation takes the write lock, so two callbacks for the same id are
/// applied one after the other and the second sees the first's result.
#[derive(Debug, Default)]
pub struct InMemoryPaymentStore {
    payments: RwLock<HashMap<String, PendingTransaction>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.payments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.payments.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, transaction: PendingTransaction) -> Result<()> {
        let mut payments = self.payments.write().await;
        if let Some(previous) = payments.get(&transaction.checkout_request_id) {
            warn!(
                checkout_request_id = %previous.checkout_request_id,
                previous_status = %previous.status,
                "Replacing existing payment with the same CheckoutRequestID"
            );
        }
        payments.insert(transaction.checkout_request_id.clone(), transaction);
        Ok(())
    }

    async fn get(&self, checkout_request_id: &str) -> Result<Option<PendingTransaction>> {
        Ok(self.payments.read().await.get(checkout_request_id).cloned())
    }

    async fn resolve(&self, checkout_request_id: &str, resolution: Resolution) -> Result<ResolveOutcome> {
        let mut payments = self.payments.write().await;
        let outcome = match payments.get_mut(checkout_request_id) {
            None => ResolveOutcome::NotFound,
            Some(tx) if tx.status.is_terminal() => ResolveOutcome::AlreadyFinal(tx.clone()),
            Some(tx) => {
                tx.apply(&resolution, Utc::now());
                ResolveOutcome::Applied(tx.clone())
            }
        };
        Ok(outcome)
    }

    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let now = Utc::now();
        let mut expired = 0;
        for tx in self.payments.write().await.values_mut() {
            if tx.status == PaymentStatus::Pending && tx.created_at < cutoff {
                tx.apply(&Resolution::Failed, now);
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut payments = self.payments.write().await;
        let before = payments.len();
        payments.retain(|_, tx| !(tx.status.is_terminal() && tx.updated_at < cutoff));
        Ok((before - payments.len()) as u64)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Amount, PaymentRequest};
    use chrono::Duration;
    use std::sync::Arc;

    fn pending(id: &str) -> PendingTransaction {
        let request = PaymentRequest {
            phone: "254712345678".into(),
            amount: Amount::from(500),
            account_reference: "JOB123".into(),
            customer_name: "Jane".into(),
        };
        PendingTransaction::new(id.into(), Some("29115-1".into()), &request)
    }

    fn completed(receipt: &str) -> Resolution {
        Resolution::Completed {
            receipt_number: receipt.into(),
            confirmed_amount: Amount::from(500),
        }
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = InMemoryPaymentStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
        assert_eq!(
            store.resolve("missing", Resolution::Failed).await.unwrap(),
            ResolveOutcome::NotFound
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn resolves_pending_once() {
        let store = InMemoryPaymentStore::new();
        store.insert(pending("ws_CO_1")).await.unwrap();

        match store.resolve("ws_CO_1", completed("QA12XYZ")).await.unwrap() {
            ResolveOutcome::Applied(tx) => {
                assert_eq!(tx.status, PaymentStatus::Completed);
                assert_eq!(tx.receipt_number.as_deref(), Some("QA12XYZ"));
            }
            other => panic!("expected Applied, got {:?}", other),
        }

        // A late failure must not overwrite the completed record.
        match store.resolve("ws_CO_1", Resolution::Failed).await.unwrap() {
            ResolveOutcome::AlreadyFinal(tx) => assert_eq!(tx.status, PaymentStatus::Completed),
            other => panic!("expected AlreadyFinal, got {:?}", other),
        }

        let stored = store.get("ws_CO_1").await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.receipt_number.as_deref(), Some("QA12XYZ"));
    }

    #[tokio::test]
    async fn concurrent_callbacks_apply_exactly_once() {
        let store = Arc::new(InMemoryPaymentStore::new());
        store.insert(pending("ws_CO_race")).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let resolution = if i % 2 == 0 { completed("R1") } else { Resolution::Failed };
                store.resolve("ws_CO_race", resolution).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if let ResolveOutcome::Applied(_) = handle.await.unwrap() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn expiry_fails_old_pending_and_purges_old_terminal() {
        let store = InMemoryPaymentStore::new();

        let mut stale = pending("stale");
        stale.created_at = Utc::now() - Duration::minutes(30);
        store.insert(stale).await.unwrap();
        store.insert(pending("fresh")).await.unwrap();

        let mut old_done = pending("old_done");
        old_done.status = PaymentStatus::Completed;
        old_done.updated_at = Utc::now() - Duration::days(2);
        store.insert(old_done).await.unwrap();

        let expired = store
            .expire_pending_before(Utc::now() - Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(expired, 1);
        assert_eq!(store.get("stale").await.unwrap().unwrap().status, PaymentStatus::Failed);
        assert_eq!(store.get("fresh").await.unwrap().unwrap().status, PaymentStatus::Pending);

        let purged = store
            .purge_resolved_before(Utc::now() - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.get("old_done").await.unwrap().is_none());
        // Just expired, so still inside the retention window.
        assert!(store.get("stale").await.unwrap().is_some());
    }
}
