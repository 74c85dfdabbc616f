//! Broadcast-specific metrics for campaign processing.

use metrics::{counter, histogram};

/// Broadcast metrics recorder
pub struct BroadcastMetrics;

impl BroadcastMetrics {
    /// Record a completed processing run and its per-message outcomes
    pub fn record_run_completed(
        campaigns_processed: usize,
        sent: u64,
        failed: u64,
        skipped: u64,
        duration_secs: f64,
    ) {
        counter!("broadcast_runs_total", "status" => "completed").increment(1);
        histogram!("broadcast_run_duration_seconds").record(duration_secs);

        if sent > 0 {
            counter!("broadcast_messages_total", "status" => "sent").increment(sent);
        }
        if failed > 0 {
            counter!("broadcast_messages_total", "status" => "failed").increment(failed);
        }
        if skipped > 0 {
            counter!("broadcast_messages_total", "status" => "skipped").increment(skipped);
        }

        tracing::info!(
            campaigns_processed = campaigns_processed,
            sent = sent,
            failed = failed,
            skipped = skipped,
            duration_secs = duration_secs,
            "Broadcast run completed"
        );
    }

    /// Record a run that aborted before producing a summary
    pub fn record_run_failed(error: &str) {
        counter!("broadcast_runs_total", "status" => "failed").increment(1);
        tracing::error!(error = error, "Broadcast run failed");
    }

    /// Record campaigns that reached the completed state during a run
    pub fn record_campaigns_completed(count: u64) {
        if count > 0 {
            counter!("broadcast_campaigns_completed_total").increment(count);
        }
    }

    /// Record campaigns whose batch routine returned an error
    pub fn record_campaign_errors(count: u64) {
        if count > 0 {
            counter!("broadcast_campaign_errors_total").increment(count);
        }
    }

    /// Record usage events that could not be written
    pub fn record_billing_failures(count: u64) {
        if count > 0 {
            counter!("broadcast_billing_failures_total").increment(count);
        }
    }

    /// Record recipients recovered by the reaper
    pub fn record_reaped(requeued: u64, failed: u64) {
        if requeued > 0 {
            counter!("broadcast_reaped_total", "outcome" => "requeued").increment(requeued);
        }
        if failed > 0 {
            counter!("broadcast_reaped_total", "outcome" => "failed").increment(failed);
        }
    }
}
