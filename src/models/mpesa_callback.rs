use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::payment::Amount;

// Daraja STK callback envelope: {"Body": {"stkCallback": {...}}}
#[derive(Debug, Deserialize)]
pub struct MpesaCallback {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,

    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,

    #[serde(rename = "ResultCode", default, deserialize_with = "lenient_code")]
    pub result_code: Option<i64>,

    #[serde(rename = "ResultDesc", default)]
    pub result_desc: Option<String>,

    #[serde(rename = "CallbackMetadata", default, deserialize_with = "lenient_metadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

impl StkCallback {
    /// Only a code of exactly zero is a success. A missing or unreadable
    /// code is treated like any other non-zero code.
    pub fn is_success(&self) -> bool {
        self.result_code == Some(0)
    }

    pub fn metadata(&self) -> PaymentMetadata {
        self.callback_metadata
            .as_ref()
            .map(CallbackMetadata::payment_metadata)
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default, deserialize_with = "lenient_items")]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name", default)]
    pub name: Option<String>,

    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

impl CallbackMetadata {
    /// First item with a matching name that actually carries a value.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|item| item.name.as_deref() == Some(name))
            .and_then(|item| item.value.as_ref())
    }

    pub fn text(&self, name: &str) -> Option<String> {
        match self.value(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn amount(&self, name: &str) -> Option<Amount> {
        self.value(name).and_then(Amount::from_json)
    }

    pub fn payment_metadata(&self) -> PaymentMetadata {
        let defaults = PaymentMetadata::default();
        PaymentMetadata {
            amount: self.amount("Amount").unwrap_or(defaults.amount),
            phone_number: self.text("PhoneNumber").unwrap_or(defaults.phone_number),
            receipt_number: self.text("MpesaReceiptNumber").unwrap_or(defaults.receipt_number),
        }
    }
}

/// Fields pulled from a successful callback, with the gateway-agnostic
/// fallbacks `0` and `"Unknown"` for anything it left out.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMetadata {
    pub amount: Amount,
    pub phone_number: String,
    pub receipt_number: String,
}

impl Default for PaymentMetadata {
    fn default() -> Self {
        PaymentMetadata {
            amount: Amount::zero(),
            phone_number: "Unknown".to_string(),
            receipt_number: "Unknown".to_string(),
        }
    }
}

fn lenient_code<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// A metadata block that does not have the expected shape reads as absent,
// so the result code alone still decides the outcome.
fn lenient_metadata<'de, D>(deserializer: D) -> Result<Option<CallbackMetadata>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.and_then(|value| serde_json::from_value(value).ok()))
}

fn lenient_items<'de, D>(deserializer: D) -> Result<Vec<MetadataItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> StkCallback {
        serde_json::from_value::<MpesaCallback>(value).unwrap().body.stk_callback
    }

    #[test]
    fn parses_successful_callback() {
        let callback = parse(json!({
            "Body": {
                "stkCallback": {
                    "MerchantRequestID": "29115-34620561-1",
                    "CheckoutRequestID": "ws_CO_1",
                    "ResultCode": 0,
                    "ResultDesc": "The service request is processed successfully.",
                    "CallbackMetadata": {
                        "Item": [
                            {"Name": "Amount", "Value": 500},
                            {"Name": "MpesaReceiptNumber", "Value": "QA12XYZ"},
                            {"Name": "Balance"},
                            {"Name": "TransactionDate", "Value": 20191219102115u64},
                            {"Name": "PhoneNumber", "Value": 254712345678u64}
                        ]
                    }
                }
            }
        }));

        assert!(callback.is_success());
        assert_eq!(
            callback.metadata(),
            PaymentMetadata {
                amount: Amount::from(500),
                phone_number: "254712345678".into(),
                receipt_number: "QA12XYZ".into(),
            }
        );
    }

    #[test]
    fn missing_items_fall_back_to_defaults() {
        let callback = parse(json!({
            "Body": {"stkCallback": {
                "CheckoutRequestID": "ws_CO_2",
                "ResultCode": 0,
                "CallbackMetadata": {"Item": [{"Name": "Amount", "Value": 10}]}
            }}
        }));

        let metadata = callback.metadata();
        assert_eq!(metadata.amount, Amount::from(10));
        assert_eq!(metadata.phone_number, "Unknown");
        assert_eq!(metadata.receipt_number, "Unknown");

        let bare = parse(json!({
            "Body": {"stkCallback": {"CheckoutRequestID": "ws_CO_3", "ResultCode": 0}}
        }));
        assert_eq!(bare.metadata(), PaymentMetadata::default());
    }

    #[test]
    fn result_code_is_read_as_a_number() {
        let as_text = parse(json!({
            "Body": {"stkCallback": {"CheckoutRequestID": "a", "ResultCode": "0"}}
        }));
        assert!(as_text.is_success());

        let cancelled = parse(json!({
            "Body": {"stkCallback": {"CheckoutRequestID": "b", "ResultCode": 1032}}
        }));
        assert_eq!(cancelled.result_code, Some(1032));
        assert!(!cancelled.is_success());

        let missing = parse(json!({
            "Body": {"stkCallback": {"CheckoutRequestID": "c"}}
        }));
        assert!(!missing.is_success());

        let garbage = parse(json!({
            "Body": {"stkCallback": {"CheckoutRequestID": "d", "ResultCode": "oops"}}
        }));
        assert!(!garbage.is_success());
    }

    #[test]
    fn nameless_and_malformed_items_are_skipped() {
        let callback = parse(json!({
            "Body": {"stkCallback": {
                "CheckoutRequestID": "ws_CO_4",
                "ResultCode": 0,
                "CallbackMetadata": {"Item": [
                    {"Name": "Amount", "Value": 500},
                    {"Name": "MpesaReceiptNumber", "Value": "QA12XYZ"},
                    {"Value": "stray"},
                    "not an item"
                ]}
            }}
        }));

        assert!(callback.is_success());
        let metadata = callback.metadata();
        assert_eq!(metadata.amount, Amount::from(500));
        assert_eq!(metadata.receipt_number, "QA12XYZ");
        assert_eq!(metadata.phone_number, "Unknown");
    }

    #[test]
    fn malformed_metadata_block_reads_as_absent() {
        let failed = parse(json!({
            "Body": {"stkCallback": {
                "CheckoutRequestID": "ws_CO_5",
                "ResultCode": 1032,
                "CallbackMetadata": "garbage"
            }}
        }));
        assert!(!failed.is_success());
        assert!(failed.callback_metadata.is_none());

        let odd_items = parse(json!({
            "Body": {"stkCallback": {
                "CheckoutRequestID": "ws_CO_6",
                "ResultCode": 0,
                "CallbackMetadata": {"Item": {"Name": "Amount"}}
            }}
        }));
        assert_eq!(odd_items.metadata(), PaymentMetadata::default());
    }

    #[test]
    fn envelope_without_checkout_id_is_rejected() {
        let result = serde_json::from_value::<MpesaCallback>(json!({
            "Body": {"stkCallback": {"ResultCode": 0}}
        }));
        assert!(result.is_err());
    }
}
