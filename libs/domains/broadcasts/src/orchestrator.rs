//! Broadcast run orchestration.
//!
//! One invocation: sweep stuck recipients, promote due scheduled
//! campaigns, then run the batch routine per campaign with failures
//! isolated to the campaign that raised them. All resumption state lives
//! in the store; nothing survives in memory between invocations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{BroadcastError, BroadcastResult};
use crate::models::{BroadcastConfig, Campaign, ReapedCounts};
use crate::processor::CampaignProcessor;
use crate::repository::{CampaignRepository, RecipientRepository};

/// Result of one broadcast run
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunSummary {
    pub broadcasts_processed: u64,
    pub total_sent: u64,
    pub total_failed: u64,
    pub total_skipped: u64,
    pub broadcasts_completed: u64,
    /// One `"<campaign id>: <error>"` entry per failed campaign
    pub errors: Vec<String>,
    pub billing_failures: u64,
    pub reaped: ReapedCounts,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Read-only processing snapshot for the status endpoint
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct StatusSnapshot {
    /// Campaigns currently `sending`
    pub sending_campaigns: u64,
    /// `scheduled` campaigns whose `scheduled_at` has passed
    pub due_campaigns: u64,
    pub rate_limit: u32,
    pub batch_size: u64,
}

/// Drives one stateless broadcast run.
pub struct RunOrchestrator {
    campaigns: Arc<dyn CampaignRepository>,
    recipients: Arc<dyn RecipientRepository>,
    processor: CampaignProcessor,
    config: BroadcastConfig,
}

impl RunOrchestrator {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        recipients: Arc<dyn RecipientRepository>,
        processor: CampaignProcessor,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            campaigns,
            recipients,
            processor,
            config,
        }
    }

    /// Run one pass over every eligible campaign, or over exactly one
    /// campaign when a filter is given (processed only if `sending`).
    ///
    /// A campaign-level failure marks that campaign `failed` and is
    /// reported in the summary's `errors`; only a run-level failure
    /// (the store cannot be queried at all) propagates.
    #[instrument(skip(self))]
    pub async fn run(&self, campaign_filter: Option<Uuid>) -> BroadcastResult<RunSummary> {
        let start = std::time::Instant::now();

        let cutoff = Utc::now()
            - chrono::Duration::seconds(self.config.sending_timeout.as_secs() as i64);
        let reaped = self
            .recipients
            .reap_stuck(cutoff, self.config.max_attempts as i32)
            .await?;
        if reaped.requeued > 0 || reaped.failed > 0 {
            info!(
                requeued = reaped.requeued,
                failed = reaped.failed,
                "Reaped stuck recipients"
            );
        }

        let mut errors: Vec<String> = Vec::new();

        let campaigns = match campaign_filter {
            Some(id) => match self.campaigns.find_by_id(id).await? {
                Some(campaign) => vec![campaign],
                None => {
                    errors.push(format!("{}: {}", id, BroadcastError::CampaignNotFound(id)));
                    Vec::new()
                }
            },
            None => self.discover_due_and_sending().await?,
        };

        let mut broadcasts_processed = 0;
        let mut total_sent = 0;
        let mut total_failed = 0;
        let mut total_skipped = 0;
        let mut broadcasts_completed = 0;
        let mut billing_failures = 0;

        for campaign in &campaigns {
            info!(campaign_id = %campaign.id, name = %campaign.name, "Processing campaign");

            match self.processor.process_campaign(campaign.id).await {
                Ok(stats) => {
                    broadcasts_processed += 1;
                    total_sent += stats.sent;
                    total_failed += stats.failed;
                    total_skipped += stats.skipped;
                    billing_failures += stats.billing_failures;
                    if stats.completed {
                        broadcasts_completed += 1;
                    }
                }
                Err(e) => {
                    error!(campaign_id = %campaign.id, error = %e, "Campaign processing failed");
                    if let Err(mark_err) = self
                        .campaigns
                        .mark_failed(campaign.id, &e.to_string())
                        .await
                    {
                        error!(
                            campaign_id = %campaign.id,
                            error = %mark_err,
                            "Failed to mark campaign failed"
                        );
                    }
                    errors.push(format!("{}: {}", campaign.id, e));
                }
            }
        }

        let summary = RunSummary {
            broadcasts_processed,
            total_sent,
            total_failed,
            total_skipped,
            broadcasts_completed,
            errors,
            billing_failures,
            reaped,
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        };

        info!(
            processed = summary.broadcasts_processed,
            sent = summary.total_sent,
            failed = summary.total_failed,
            skipped = summary.total_skipped,
            completed = summary.broadcasts_completed,
            errors = summary.errors.len(),
            duration_ms = summary.duration_ms,
            "Broadcast run finished"
        );
        Ok(summary)
    }

    /// Promote due scheduled campaigns, then union them with campaigns
    /// already `sending`, preserving discovery order.
    async fn discover_due_and_sending(&self) -> BroadcastResult<Vec<Campaign>> {
        let now = Utc::now();
        let mut campaigns = Vec::new();

        for campaign in self.campaigns.find_due_scheduled(now).await? {
            // The promotion is conditional, so concurrent invocations
            // hand each due campaign to exactly one winner; the loser
            // still sees it through find_sending below.
            if self.campaigns.promote_to_sending(campaign.id).await? {
                info!(campaign_id = %campaign.id, "Promoted scheduled campaign to sending");
                campaigns.push(campaign);
            }
        }

        for campaign in self.campaigns.find_sending().await? {
            if !campaigns.iter().any(|c| c.id == campaign.id) {
                campaigns.push(campaign);
            }
        }

        Ok(campaigns)
    }

    /// Counts for the read-only status endpoint.
    pub async fn status_snapshot(&self) -> BroadcastResult<StatusSnapshot> {
        let now = Utc::now();
        Ok(StatusSnapshot {
            sending_campaigns: self.campaigns.count_sending().await?,
            due_campaigns: self.campaigns.count_due_scheduled(now).await?,
            rate_limit: self.config.rate_limit,
            batch_size: self.config.batch_size,
        })
    }
}
