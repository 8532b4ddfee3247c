// services/expiry_service.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::ExpiryPolicy;
use crate::database::PaymentStore;
use crate::errors::Result;
use crate::models::SweepReport;

/// One sweep: fail pendings older than the timeout, then drop terminal
/// records older than the retention window.
pub async fn run_sweep(
    store: &dyn PaymentStore,
    policy: &ExpiryPolicy,
    now: DateTime<Utc>,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    if let Some(timeout) = policy.pending_timeout {
        match cutoff(now, timeout) {
            Some(before) => report.expired = store.expire_pending_before(before).await?,
            None => warn!(?timeout, "Pending timeout out of range, skipping expiry"),
        }
    }
    if let Some(retention) = policy.retention {
        match cutoff(now, retention) {
            Some(before) => report.purged = store.purge_resolved_before(before).await?,
            None => warn!(?retention, "Retention window out of range, skipping purge"),
        }
    }

    Ok(report)
}

pub fn spawn_expiry_task(store: Arc<dyn PaymentStore>, policy: ExpiryPolicy) -> Option<JoinHandle<()>> {
    if !policy.is_enabled() {
        info!("Payment expiry disabled");
        return None;
    }

    info!(
        pending_timeout = ?policy.pending_timeout,
        retention = ?policy.retention,
        every = ?policy.sweep_interval,
        "Starting payment expiry task"
    );

    Some(tokio::spawn(async move {
        let mut ticker = interval(policy.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match run_sweep(store.as_ref(), &policy, Utc::now()).await {
                Ok(report) if report != SweepReport::default() => {
                    info!(expired = report.expired, purged = report.purged, "Payment sweep finished");
                }
                Ok(_) => {}
                Err(e) => error!("Payment sweep failed: {}", e),
            }
        }
    }))
}

// None when the window reaches past the earliest representable instant.
fn cutoff(now: DateTime<Utc>, window: std::time::Duration) -> Option<DateTime<Utc>> {
    let window = chrono::Duration::from_std(window).ok()?;
    now.checked_sub_signed(window)
}
