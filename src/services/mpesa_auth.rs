// services/mpesa_auth.rs
use base64::{engine::general_purpose::STANDARD as base64, Engine as _};
use reqwest::{header, Client};
use serde::Deserialize;
use tracing::{error, info};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<String>,
}

/// OAuth client-credentials exchange against Daraja. No caching: every
/// push re-authenticates.
#[derive(Debug, Clone)]
pub struct MpesaAuth {
    client: Client,
    auth_url: String,
    basic_credentials: String,
}

impl MpesaAuth {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        let basic_credentials = base64.encode(format!(
            "{}:{}",
            config.mpesa_consumer_key, config.mpesa_consumer_secret
        ));

        MpesaAuth {
            client,
            auth_url: config.auth_url(),
            basic_credentials,
        }
    }

    pub async fn get_access_token(&self) -> Result<String> {
        info!("Requesting M-Pesa access token");

        let response = self
            .client
            .get(&self.auth_url)
            .header(header::AUTHORIZATION, format!("Basic {}", self.basic_credentials))
            .send()
            .await
            .map_err(|e| AppError::upstream_auth(format!("token endpoint unreachable: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, body = %body, "M-Pesa rejected the token request");
            return Err(AppError::upstream_auth(format!("token request failed: {}", status)));
        }

        let auth_response: AuthResponse = response
            .json()
            .await
            .map_err(|e| AppError::upstream_auth(format!("malformed token response: {}", e)))?;

        if auth_response.access_token.is_empty() {
            return Err(AppError::upstream_auth("token response carried an empty access_token"));
        }

        info!(expires_in = ?auth_response.expires_in, "M-Pesa access token obtained");
        Ok(auth_response.access_token)
    }
}
