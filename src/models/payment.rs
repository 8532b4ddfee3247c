use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Number, Value};

/// Amount as the caller or the gateway supplied it. A numeric string is
/// parsed for the gateway request but serialized back as the same string.
#[derive(Debug, Clone, PartialEq)]
pub struct Amount {
    number: Number,
    text: Option<String>,
}

impl Amount {
    pub fn zero() -> Self {
        Amount::from(0)
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Amount {
                number: n.clone(),
                text: None,
            }),
            Value::String(s) => serde_json::from_str::<Number>(s.trim()).ok().map(|number| Amount {
                number,
                text: Some(s.clone()),
            }),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        self.number.as_f64().unwrap_or(0.0)
    }

    pub fn is_positive(&self) -> bool {
        self.as_f64() > 0.0
    }

    pub fn as_number(&self) -> &Number {
        &self.number
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount {
            number: Number::from(value),
            text: None,
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match &self.text {
            Some(text) => serializer.serialize_str(text),
            None => self.number.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Amount::from_json(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("amount must be numeric, got {}", raw)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One STK push attempt, keyed by the gateway's `CheckoutRequestID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTransaction {
    pub checkout_request_id: String,
    pub merchant_request_id: Option<String>,
    pub status: PaymentStatus,
    pub phone: String,
    pub amount: Amount,
    pub customer_name: String,
    pub account_reference: String,
    pub receipt_number: Option<String>,
    pub confirmed_amount: Option<Amount>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PendingTransaction {
    pub fn new(
        checkout_request_id: String,
        merchant_request_id: Option<String>,
        payment: &PaymentRequest,
    ) -> Self {
        let now = Utc::now();
        PendingTransaction {
            checkout_request_id,
            merchant_request_id,
            status: PaymentStatus::Pending,
            phone: payment.phone.clone(),
            amount: payment.amount.clone(),
            customer_name: payment.customer_name.clone(),
            account_reference: payment.account_reference.clone(),
            receipt_number: None,
            confirmed_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Gateway-confirmed amount once completed, otherwise the requested one.
    pub fn effective_amount(&self) -> &Amount {
        self.confirmed_amount.as_ref().unwrap_or(&self.amount)
    }

    pub(crate) fn apply(&mut self, resolution: &Resolution, at: DateTime<Utc>) {
        match resolution {
            Resolution::Completed {
                receipt_number,
                confirmed_amount,
            } => {
                self.status = PaymentStatus::Completed;
                self.receipt_number = Some(receipt_number.clone());
                self.confirmed_amount = Some(confirmed_amount.clone());
            }
            Resolution::Failed => self.status = PaymentStatus::Failed,
        }
        self.updated_at = at;
    }
}

/// Validated input for one payment initiation.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub phone: String,
    pub amount: Amount,
    pub account_reference: String,
    pub customer_name: String,
}

/// Terminal outcome written onto a pending transaction.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Completed {
        receipt_number: String,
        confirmed_amount: Amount,
    },
    Failed,
}

impl Resolution {
    pub fn status(&self) -> PaymentStatus {
        match self {
            Resolution::Completed { .. } => PaymentStatus::Completed,
            Resolution::Failed => PaymentStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolveOutcome {
    Applied(PendingTransaction),
    /// The record had already left `pending`; it is returned unchanged.
    AlreadyFinal(PendingTransaction),
    NotFound,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: u64,
    pub purged: u64,
}
