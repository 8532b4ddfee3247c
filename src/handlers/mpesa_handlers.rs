// handlers/mpesa_handlers.rs
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};
use validator::Validate;

use crate::errors::{AppError, Result};
use crate::models::mpesa_callback::MpesaCallback;
use crate::models::{Amount, PaymentRequest, PaymentStatus};
use crate::state::AppState;

const DEFAULT_ACCOUNT_REFERENCE: &str = "CarWash";

// C2B Request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StkPushBody {
    #[validate(length(max = 20, message = "phone must be at most 20 characters"))]
    pub phone: String,
    pub amount: Amount,
    #[serde(default)]
    pub account_reference: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "customerName must be at most 100 characters"))]
    pub customer_name: String,
}

impl StkPushBody {
    pub fn into_payment(self) -> Result<PaymentRequest> {
        self.validate()?;

        let phone = self.phone.trim().to_string();
        let customer_name = self.customer_name.trim().to_string();
        if phone.is_empty() {
            return Err(AppError::invalid_data("phone is required"));
        }
        if customer_name.is_empty() {
            return Err(AppError::invalid_data("customerName is required"));
        }
        if !self.amount.is_positive() {
            return Err(AppError::invalid_data("amount must be greater than 0"));
        }

        let account_reference = self
            .account_reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_ACCOUNT_REFERENCE.to_string());

        Ok(PaymentRequest {
            phone,
            amount: self.amount,
            account_reference,
            customer_name,
        })
    }
}

// C2B Response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushAccepted {
    pub success: bool,
    pub checkout_request_id: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentStatusResponse {
    pub success: bool,
    pub status: PaymentStatus,
    pub phone: String,
    pub amount: Amount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<String>,
}

fn rejected(message: impl Into<String>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "success": false,
            "message": message.into(),
        })),
    )
}

fn callback_ack(status: StatusCode, code: u8, desc: &str) -> (StatusCode, Json<serde_json::Value>) {
    (status, Json(json!({ "ResultCode": code, "ResultDesc": desc })))
}

/// Failures come back as HTTP 200 with `success: false`; callers key off the
/// flag, not the status code.
pub async fn initiate_stk_push(
    State(state): State<AppState>,
    payload: std::result::Result<Json<StkPushBody>, JsonRejection>,
) -> impl IntoResponse {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(rejection) => {
            error!("Invalid STK push body: {}", rejection.body_text());
            return rejected("Invalid request body");
        }
    };
    info!("Received STK push request: {:?}", body);

    let payment = match body.into_payment() {
        Ok(payment) => payment,
        Err(AppError::Validation(message)) => return rejected(message),
        Err(e) => return rejected(e.to_string()),
    };

    match state.mpesa_service.initiate_payment(payment).await {
        Ok(transaction) => {
            let accepted = StkPushAccepted {
                success: true,
                checkout_request_id: transaction.checkout_request_id,
            };
            (StatusCode::OK, Json(json!(accepted)))
        }
        Err(e) => {
            error!("Error sending STK Push: {}", e);
            rejected("Error sending STK Push")
        }
    }
}

/// Daraja webhook. Every path answers with a ResultCode body so the gateway
/// never waits on us.
pub async fn mpesa_callback(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let callback = match serde_json::from_slice::<MpesaCallback>(&body) {
        Ok(payload) => payload.body.stk_callback,
        Err(e) => {
            error!(
                body = %String::from_utf8_lossy(&body),
                "Error handling STK callback: {}", e
            );
            return callback_ack(StatusCode::INTERNAL_SERVER_ERROR, 1, "Error");
        }
    };
    info!(
        checkout_request_id = %callback.checkout_request_id,
        result_code = ?callback.result_code,
        "Received STK callback"
    );

    match state.reconciler.reconcile(&callback).await {
        Ok(_) if callback.is_success() => callback_ack(StatusCode::OK, 0, "Success"),
        Ok(_) => callback_ack(StatusCode::OK, 0, "Received"),
        Err(e) => {
            error!(
                checkout_request_id = %callback.checkout_request_id,
                "Error handling STK callback: {}", e
            );
            callback_ack(StatusCode::INTERNAL_SERVER_ERROR, 1, "Error")
        }
    }
}

pub async fn payment_status(
    State(state): State<AppState>,
    Path(checkout_request_id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let payment = state.store.get(&checkout_request_id).await?;
    info!(
        checkout_request_id = %checkout_request_id,
        status = ?payment.as_ref().map(|p| p.status),
        "Checking payment status"
    );

    let Some(payment) = payment else {
        return Ok(Json(json!({
            "success": false,
            "message": "Payment not found",
        })));
    };

    let response = PaymentStatusResponse {
        success: true,
        status: payment.status,
        amount: payment.effective_amount().clone(),
        phone: payment.phone,
        receipt: payment.receipt_number,
    };
    Ok(Json(json!(response)))
}
