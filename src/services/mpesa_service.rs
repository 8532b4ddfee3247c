// services/mpesa_service.rs
use std::sync::Arc;

use chrono::Utc;
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{error, info};

use super::mpesa_auth::MpesaAuth;
use super::stk_request::StkPushRequest;
use crate::config::AppConfig;
use crate::database::PaymentStore;
use crate::errors::{AppError, Result};
use crate::models::{PaymentRequest, PendingTransaction};

// Daraja answers with these on acceptance; error bodies use a different shape,
// so every field is optional here.
#[derive(Debug, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID", default)]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID", default)]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResponseCode", default)]
    pub response_code: Option<String>,
    #[serde(rename = "ResponseDescription", default)]
    pub response_description: Option<String>,
    #[serde(rename = "CustomerMessage", default)]
    pub customer_message: Option<String>,
}

#[derive(Clone)]
pub struct MpesaService {
    config: Arc<AppConfig>,
    client: Client,
    auth: MpesaAuth,
    store: Arc<dyn PaymentStore>,
}

impl MpesaService {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn PaymentStore>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AppError::HttpClient(format!("Failed to create HTTP client: {}", e)))?;
        let auth = MpesaAuth::new(client.clone(), &config);

        Ok(MpesaService {
            config,
            client,
            auth,
            store,
        })
    }

    /// Sends an STK push and records it as pending under the gateway's
    /// `CheckoutRequestID`. Nothing is stored unless the gateway assigned one.
    pub async fn initiate_payment(&self, payment: PaymentRequest) -> Result<PendingTransaction> {
        info!(
            phone = %payment.phone,
            amount = %payment.amount,
            account_reference = %payment.account_reference,
            "C2B: STK push requested"
        );

        let access_token = self.auth.get_access_token().await?;
        let stk_request = StkPushRequest::build(&self.config, &payment, Utc::now());

        let response = self
            .client
            .post(self.config.stk_push_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", access_token))
            .json(&stk_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "C2B: STK push rejected");
            return Err(AppError::mpesa(format!("STK push failed: {}", status)));
        }

        let stk_response: StkPushResponse = response
            .json()
            .await
            .map_err(|e| AppError::protocol(format!("malformed STK push response: {}", e)))?;

        let checkout_request_id = stk_response
            .checkout_request_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| AppError::protocol("STK push response has no CheckoutRequestID"))?;

        info!(
            checkout_request_id = %checkout_request_id,
            response_code = ?stk_response.response_code,
            customer_message = ?stk_response.customer_message,
            "C2B: STK push accepted"
        );

        let transaction = PendingTransaction::new(
            checkout_request_id,
            stk_response.merchant_request_id,
            &payment,
        );
        self.store.insert(transaction.clone()).await?;

        info!(checkout_request_id = %transaction.checkout_request_id, "Payment saved as pending");
        Ok(transaction)
    }
}
