pub mod mpesa_callback;
pub mod payment;

pub use payment::{
    Amount, PaymentRequest, PaymentStatus, PendingTransaction, Resolution, ResolveOutcome,
    SweepReport,
};
