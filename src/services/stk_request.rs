// services/stk_request.rs
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::config::AppConfig;
use crate::models::PaymentRequest;

pub const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

/// `YYYYMMDDHHMMSS`, no separators. The same string goes into the password,
/// so both must come from one call.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d%H%M%S").to_string()
}

pub fn generate_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    base64.encode(format!("{}{}{}", short_code, passkey, timestamp))
}

/// Daraja wants `2547XXXXXXXX`. Local forms are rewritten, anything else is
/// passed through for the gateway to judge.
pub fn format_phone_number(phone: &str) -> String {
    let phone = phone.trim();
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.starts_with("254") && digits.len() == 12 {
        return digits.to_string();
    }
    if digits.starts_with("07") && digits.len() == 10 {
        return format!("254{}", &digits[1..]);
    }
    if digits.starts_with('7') && digits.len() == 9 {
        return format!("254{}", digits);
    }
    phone.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: Number,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

impl StkPushRequest {
    pub fn build(config: &AppConfig, payment: &PaymentRequest, at: DateTime<Utc>) -> Self {
        let timestamp = timestamp(at);
        let password = generate_password(&config.mpesa_short_code, &config.mpesa_passkey, &timestamp);
        let phone = format_phone_number(&payment.phone);

        StkPushRequest {
            business_short_code: config.mpesa_short_code.clone(),
            password,
            timestamp,
            transaction_type: TRANSACTION_TYPE.to_string(),
            amount: payment.amount.as_number().clone(),
            party_a: phone.clone(),
            party_b: config.mpesa_short_code.clone(),
            phone_number: phone,
            callback_url: config.mpesa_callback_url.clone(),
            account_reference: payment.account_reference.clone(),
            transaction_desc: format!("Payment for carwash by {}", payment.customer_name),
        }
    }
}
