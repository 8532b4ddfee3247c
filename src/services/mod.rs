pub mod callback_service;
pub mod expiry_service;
pub mod mpesa_auth;
pub mod mpesa_service;
pub mod stk_request;
