//! # Background Tasks
//!
//! Two interval loops run beside the HTTP server:
//!
//! - **transmission**: retry database writes left pending by earlier
//!   failures, reclaim stale `processing` claims, then run the worker for
//!   every business whose configuration has `auto_submit` on.
//! - **certificates**: refresh every certificate's validity from the
//!   certificate store and log the classification summary.
//!
//! Both stop when the shutdown channel flips to `true`. A tick that is
//! still running when the next one is due is not doubled up; the interval
//! skips missed ticks.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vfx_core::BusinessId;
use vfx_transmit::RunTrigger;

use crate::state::AppState;

/// Handles of the spawned loops.
#[derive(Debug)]
pub struct Scheduler {
    pub transmission: JoinHandle<()>,
    pub certificates: JoinHandle<()>,
}

impl Scheduler {
    pub async fn join(self) {
        for (name, handle) in [("transmission", self.transmission), ("certificates", self.certificates)] {
            if let Err(e) = handle.await {
                tracing::error!(task = name, error = %e, "background task panicked");
            }
        }
    }
}

pub fn spawn(state: AppState, shutdown: watch::Receiver<bool>) -> Scheduler {
    let transmission = tokio::spawn(every(
        state.config.worker_interval,
        shutdown.clone(),
        state.clone(),
        transmission_tick,
    ));
    let certificates = tokio::spawn(every(state.config.cert_check_interval, shutdown, state, certificate_tick));
    Scheduler {
        transmission,
        certificates,
    }
}

async fn every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, state: AppState, tick: F)
where
    F: Fn(AppState) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = interval.tick() => tick(state.clone()).await,
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// One pass of the transmission loop.
pub async fn transmission_tick(state: AppState) {
    state.flush_pending().await;

    let recovery = state.worker.recover(Utc::now());
    let mut touched: BTreeMap<BusinessId, Vec<u64>> = BTreeMap::new();
    for reclaimed in recovery.reclaimed {
        touched.entry(reclaimed.business_id).or_default().push(reclaimed.sequence);
    }

    let report = state.worker.run_all(RunTrigger::Scheduled).await;
    for run in report.reports {
        touched.entry(run.business_id).or_default().extend(run.touched);
    }
    for error in &report.errors {
        tracing::error!(business_id = %error.business_id, error = %error.error, "scheduled run failed");
    }
    if report.totals.processed > 0 {
        tracing::info!(
            businesses = report.totals.businesses,
            processed = report.totals.processed,
            succeeded = report.totals.succeeded,
            failed = report.totals.failed,
            "scheduled transmission pass finished"
        );
    }

    for (business_id, mut sequences) in touched {
        sequences.sort_unstable();
        sequences.dedup();
        if let Err(e) = state.persist(&business_id, &sequences).await {
            tracing::warn!(business_id = %business_id, error = %e, "transmission state kept pending for the next tick");
        }
    }
}

/// One pass of the certificate loop.
pub async fn certificate_tick(state: AppState) {
    let refresh = state.monitor.refresh_all().await;
    for failure in &refresh.failures {
        tracing::warn!(business_id = %failure.business_id, reason = %failure.reason, "certificate refresh failed");
    }
    for status in &refresh.refreshed {
        if let Err(e) = state.persist(&status.business_id, &[]).await {
            tracing::warn!(business_id = %status.business_id, error = %e, "certificate validity kept pending for the next tick");
        }
    }

    let check = state.monitor.check_all(Utc::now());
    let summary = check.summary;
    metrics::gauge!("vfx_certificates_expiring_soon").set(summary.expiring_soon as f64);
    metrics::gauge!("vfx_certificates_expired").set(summary.expired as f64);
    if summary.expired > 0 || summary.expiring_soon > 0 {
        tracing::warn!(
            total = summary.total,
            expiring_soon = summary.expiring_soon,
            expired = summary.expired,
            missing = summary.missing,
            "signing certificates need attention"
        );
    } else {
        tracing::info!(total = summary.total, missing = summary.missing, "certificate check finished");
    }
}
