// config.rs
use std::env;
use std::fmt;
use std::time::Duration;

use crate::errors::{AppError, Result};

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpesaEnvironment {
    Sandbox,
    Production,
}

impl MpesaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            MpesaEnvironment::Sandbox => SANDBOX_BASE_URL,
            MpesaEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl fmt::Display for MpesaEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MpesaEnvironment::Sandbox => write!(f, "sandbox"),
            MpesaEnvironment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    MongoDb { url: String, database: String },
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::MongoDb { .. } => "mongodb",
        }
    }
}

/// Timing for the background expiry sweep. A `None` window disables that half
/// of the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub pending_timeout: Option<Duration>,
    pub retention: Option<Duration>,
    pub sweep_interval: Duration,
}

impl ExpiryPolicy {
    pub fn is_enabled(&self) -> bool {
        self.pending_timeout.is_some() || self.retention.is_some()
    }
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        ExpiryPolicy {
            pending_timeout: Some(Duration::from_secs(600)),
            retention: Some(Duration::from_secs(86_400)),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub mpesa_consumer_key: String,
    pub mpesa_consumer_secret: String,
    pub mpesa_short_code: String,
    pub mpesa_passkey: String,
    pub mpesa_callback_url: String,
    pub mpesa_environment: MpesaEnvironment,
    pub mpesa_base_url: String,
    pub http_timeout: Duration,
    pub store: StoreBackend,
    pub expiry: ExpiryPolicy,
    pub port: u16,
    pub host: String,
}

// Credentials stay out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("mpesa_short_code", &self.mpesa_short_code)
            .field("mpesa_callback_url", &self.mpesa_callback_url)
            .field("mpesa_environment", &self.mpesa_environment)
            .field("mpesa_base_url", &self.mpesa_base_url)
            .field("http_timeout", &self.http_timeout)
            .field("store", &self.store.name())
            .field("expiry", &self.expiry)
            .field("port", &self.port)
            .field("host", &self.host)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as
    /// missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| AppError::configuration(format!("{} must be set", key)))
        };

        let mpesa_environment = match get("MPESA_ENVIRONMENT").as_deref() {
            None | Some("sandbox") => MpesaEnvironment::Sandbox,
            Some("production") => MpesaEnvironment::Production,
            Some(other) => {
                return Err(AppError::configuration(format!(
                    "MPESA_ENVIRONMENT must be 'sandbox' or 'production', got '{}'",
                    other
                )))
            }
        };

        let mpesa_base_url = get("MPESA_BASE_URL")
            .unwrap_or_else(|| mpesa_environment.base_url().to_string())
            .trim_end_matches('/')
            .to_string();

        let store = match get("PAYMENT_STORE").as_deref() {
            None | Some("memory") => StoreBackend::Memory,
            Some("mongodb") => StoreBackend::MongoDb {
                url: required("DATABASE_URL")?,
                database: get("DATABASE_NAME").unwrap_or_else(|| "niapay".to_string()),
            },
            Some(other) => {
                return Err(AppError::configuration(format!(
                    "PAYMENT_STORE must be 'memory' or 'mongodb', got '{}'",
                    other
                )))
            }
        };

        let seconds = |key: &str, default: u64| -> Result<u64> {
            match get(key) {
                Some(raw) => raw
                    .parse::<u64>()
                    .map_err(|_| AppError::configuration(format!("{} must be a number of seconds", key))),
                None => Ok(default),
            }
        };
        let window = |secs: u64| (secs > 0).then(|| Duration::from_secs(secs));

        let expiry = ExpiryPolicy {
            pending_timeout: window(seconds("PAYMENT_PENDING_TIMEOUT_SECS", 600)?),
            retention: window(seconds("PAYMENT_RETENTION_SECS", 86_400)?),
            sweep_interval: Duration::from_secs(seconds("PAYMENT_SWEEP_INTERVAL_SECS", 60)?.max(1)),
        };

        let port = match get("PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| AppError::configuration("PORT must be a number"))?,
            None => 3000,
        };

        Ok(AppConfig {
            mpesa_consumer_key: required("MPESA_CONSUMER_KEY")?,
            mpesa_consumer_secret: required("MPESA_CONSUMER_SECRET")?,
            mpesa_short_code: required("MPESA_SHORT_CODE")?,
            mpesa_passkey: required("MPESA_PASSKEY")?,
            mpesa_callback_url: required("MPESA_CALLBACK_URL")?,
            mpesa_environment,
            mpesa_base_url,
            http_timeout: Duration::from_secs(seconds("MPESA_HTTP_TIMEOUT_SECS", 30)?.max(1)),
            store,
            expiry,
            port,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
        })
    }

    pub fn auth_url(&self) -> String {
        format!("{}/oauth/v1/generate?grant_type=client_credentials", self.mpesa_base_url)
    }

    pub fn stk_push_url(&self) -> String {
        format!("{}/mpesa/stkpush/v1/processrequest", self.mpesa_base_url)
    }
}
