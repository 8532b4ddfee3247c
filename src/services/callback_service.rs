// services/callback_service.rs
use std::sync::Arc;

use tracing::{info, warn};

use crate::database::PaymentStore;
use crate::errors::Result;
use crate::models::mpesa_callback::StkCallback;
use crate::models::{PendingTransaction, Resolution, ResolveOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// The pending record moved to its terminal state.
    Resolved(PendingTransaction),
    /// The record was already terminal; nothing changed.
    Duplicate(PendingTransaction),
    /// No record with that CheckoutRequestID.
    Unknown,
}

/// Applies Daraja STK callbacks to the payment store.
#[derive(Clone)]
pub struct CallbackReconciler {
    store: Arc<dyn PaymentStore>,
}

impl CallbackReconciler {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        CallbackReconciler { store }
    }

    pub async fn reconcile(&self, callback: &StkCallback) -> Result<CallbackOutcome> {
        let id = callback.checkout_request_id.as_str();

        let resolution = if callback.is_success() {
            let metadata = callback.metadata();
            info!(
                checkout_request_id = %id,
                phone = %metadata.phone_number,
                amount = %metadata.amount,
                receipt = %metadata.receipt_number,
                "Payment SUCCESS"
            );
            Resolution::Completed {
                receipt_number: metadata.receipt_number,
                confirmed_amount: metadata.amount,
            }
        } else {
            info!(
                checkout_request_id = %id,
                result_code = ?callback.result_code,
                result_desc = ?callback.result_desc,
                "Payment FAILED"
            );
            Resolution::Failed
        };

        let outcome = match self.store.resolve(id, resolution.clone()).await? {
            ResolveOutcome::Applied(tx) => {
                info!(checkout_request_id = %id, status = %tx.status, "Payment store updated");
                CallbackOutcome::Resolved(tx)
            }
            ResolveOutcome::AlreadyFinal(tx) => {
                if is_redelivery(&tx, &resolution) {
                    info!(checkout_request_id = %id, status = %tx.status, "Duplicate callback ignored");
                } else {
                    warn!(
                        checkout_request_id = %id,
                        current = %tx.status,
                        attempted = %resolution.status(),
                        "Callback conflicts with a terminal payment, keeping current state"
                    );
                }
                CallbackOutcome::Duplicate(tx)
            }
            ResolveOutcome::NotFound => {
                warn!(checkout_request_id = %id, "CheckoutRequestID not found in payment store");
                CallbackOutcome::Unknown
            }
        };

        Ok(outcome)
    }
}

fn is_redelivery(tx: &PendingTransaction, resolution: &Resolution) -> bool {
    match resolution {
        Resolution::Completed { receipt_number, .. } => {
            tx.receipt_number.as_deref() == Some(receipt_number.as_str())
        }
        Resolution::Failed => tx.status == resolution.status(),
    }
}
