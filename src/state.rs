use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::PaymentStore;
use crate::errors::Result;
use crate::services::callback_service::CallbackReconciler;
use crate::services::mpesa_service::MpesaService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn PaymentStore>,
    pub mpesa_service: Arc<MpesaService>,
    pub reconciler: CallbackReconciler,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn PaymentStore>) -> Result<Self> {
        let config = Arc::new(config);
        let mpesa_service = Arc::new(MpesaService::new(config.clone(), store.clone())?);
        let reconciler = CallbackReconciler::new(store.clone());

        Ok(AppState {
            config,
            store,
            mpesa_service,
            reconciler,
        })
    }
}
