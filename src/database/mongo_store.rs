use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc, DateTime as BsonDateTime},
    options::{IndexOptions, ReturnDocument},
    Collection, Database, IndexModel,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::PaymentStore;
use crate::errors::{AppError, Result};
use crate::models::{Amount, PaymentStatus, PendingTransaction, Resolution, ResolveOutcome};

pub const COLLECTION: &str = "mpesa_payments";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PaymentDocument {
    #[serde(rename = "_id")]
    checkout_request_id: String,
    merchant_request_id: Option<String>,
    status: PaymentStatus,
    phone: String,
    amount: Amount,
    customer_name: String,
    account_reference: String,
    receipt_number: Option<String>,
    confirmed_amount: Option<Amount>,
    created_at: BsonDateTime,
    updated_at: BsonDateTime,
}

fn to_bson_date(at: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(at.timestamp_millis())
}

fn from_bson_date(at: BsonDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or_default()
}

impl From<PendingTransaction> for PaymentDocument {
    fn from(tx: PendingTransaction) -> Self {
        PaymentDocument {
            checkout_request_id: tx.checkout_request_id,
            merchant_request_id: tx.merchant_request_id,
            status: tx.status,
            phone: tx.phone,
            amount: tx.amount,
            customer_name: tx.customer_name,
            account_reference: tx.account_reference,
            receipt_number: tx.receipt_number,
            confirmed_amount: tx.confirmed_amount,
            created_at: to_bson_date(tx.created_at),
            updated_at: to_bson_date(tx.updated_at),
        }
    }
}

impl From<PaymentDocument> for PendingTransaction {
    fn from(doc: PaymentDocument) -> Self {
        PendingTransaction {
            checkout_request_id: doc.checkout_request_id,
            merchant_request_id: doc.merchant_request_id,
            status: doc.status,
            phone: doc.phone,
            amount: doc.amount,
            customer_name: doc.customer_name,
            account_reference: doc.account_reference,
            receipt_number: doc.receipt_number,
            confirmed_amount: doc.confirmed_amount,
            created_at: from_bson_date(doc.created_at),
            updated_at: from_bson_date(doc.updated_at),
        }
    }
}

/// Durable store. `resolve` is a single `find_one_and_update` filtered on
/// `status: "pending"`, so the server enforces the one-way transition.
#[derive(Clone)]
pub struct MongoPaymentStore {
    payments: Collection<PaymentDocument>,
}

impl MongoPaymentStore {
    pub fn new(db: &Database) -> Self {
        MongoPaymentStore {
            payments: db.collection(COLLECTION),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let sweep_index = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": 1 })
            .options(IndexOptions::builder().name("status_created_at".to_string()).build())
            .build();
        self.payments.create_index(sweep_index).await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for MongoPaymentStore {
    async fn insert(&self, transaction: PendingTransaction) -> Result<()> {
        let id = transaction.checkout_request_id.clone();
        let result = self
            .payments
            .replace_one(doc! { "_id": id.as_str() }, PaymentDocument::from(transaction))
            .upsert(true)
            .await?;

        if result.matched_count > 0 {
            warn!(checkout_request_id = %id, "Replaced existing payment with the same CheckoutRequestID");
        }
        Ok(())
    }

    async fn get(&self, checkout_request_id: &str) -> Result<Option<PendingTransaction>> {
        let found = self.payments.find_one(doc! { "_id": checkout_request_id }).await?;
        Ok(found.map(PendingTransaction::from))
    }

    async fn resolve(&self, checkout_request_id: &str, resolution: Resolution) -> Result<ResolveOutcome> {
        let now = to_bson_date(Utc::now());
        let status = resolution.status();
        let mut set = doc! {
            "status": status.as_str(),
            "updated_at": now,
        };
        if let Resolution::Completed {
            receipt_number,
            confirmed_amount,
        } = &resolution
        {
            let confirmed = bson::to_bson(confirmed_amount)
                .map_err(|e| AppError::store(format!("BSON conversion failed: {}", e)))?;
            set.insert("receipt_number", receipt_number.as_str());
            set.insert("confirmed_amount", confirmed);
        }

        let updated = self
            .payments
            .find_one_and_update(
                doc! { "_id": checkout_request_id, "status": PaymentStatus::Pending.as_str() },
                doc! { "$set": set },
            )
            .return_document(ReturnDocument::After)
            .await?;

        if let Some(doc) = updated {
            return Ok(ResolveOutcome::Applied(doc.into()));
        }

        Ok(match self.get(checkout_request_id).await? {
            Some(existing) => ResolveOutcome::AlreadyFinal(existing),
            None => ResolveOutcome::NotFound,
        })
    }

    async fn expire_pending_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = self
            .payments
            .update_many(
                doc! {
                    "status": PaymentStatus::Pending.as_str(),
                    "created_at": { "$lt": to_bson_date(cutoff) },
                },
                doc! {
                    "$set": {
                        "status": PaymentStatus::Failed.as_str(),
                        "updated_at": to_bson_date(Utc::now()),
                    }
                },
            )
            .await?;
        Ok(result.modified_count)
    }

    async fn purge_resolved_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = self
            .payments
            .delete_many(doc! {
                "status": { "$ne": PaymentStatus::Pending.as_str() },
                "updated_at": { "$lt": to_bson_date(cutoff) },
            })
            .await?;
        Ok(result.deleted_count)
    }

    fn backend(&self) -> &'static str {
        "mongodb"
    }
}
