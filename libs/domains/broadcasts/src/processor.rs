//! Per-campaign batch routine: claim, dispatch, recount.

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::dispatcher::{DispatchOutcome, RecipientDispatcher};
use crate::error::{BroadcastError, BroadcastResult};
use crate::governor::RateGovernor;
use crate::models::{BroadcastConfig, CampaignStatus};
use crate::repository::{CampaignRepository, RecipientRepository};
use std::sync::Arc;
use utoipa::ToSchema;

/// Outcome of one batch routine for one campaign
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct BatchStats {
    /// Recipients resolved this run
    pub processed: u64,
    pub sent: u64,
    pub failed: u64,
    pub skipped: u64,
    /// Successful sends whose usage event could not be written
    pub billing_failures: u64,
    /// True when this run transitioned the campaign to `completed`
    pub completed: bool,
}

/// Runs one claim-dispatch-recount cycle for a campaign.
///
/// Recipients are dispatched in waves of `dispatch_concurrency` sharing
/// one rate governor; the campaign status is polled between waves so an
/// external pause stops the loop and releases the unclaimed remainder.
pub struct CampaignProcessor {
    campaigns: Arc<dyn CampaignRepository>,
    recipients: Arc<dyn RecipientRepository>,
    dispatcher: RecipientDispatcher,
    governor: RateGovernor,
    config: BroadcastConfig,
}

impl CampaignProcessor {
    pub fn new(
        campaigns: Arc<dyn CampaignRepository>,
        recipients: Arc<dyn RecipientRepository>,
        dispatcher: RecipientDispatcher,
        governor: RateGovernor,
        config: BroadcastConfig,
    ) -> Self {
        Self {
            campaigns,
            recipients,
            dispatcher,
            governor,
            config,
        }
    }

    #[instrument(skip(self), fields(campaign_id = %campaign_id))]
    pub async fn process_campaign(&self, campaign_id: Uuid) -> BroadcastResult<BatchStats> {
        let campaign = self
            .campaigns
            .find_by_id(campaign_id)
            .await?
            .ok_or(BroadcastError::CampaignNotFound(campaign_id))?;

        if campaign.status != CampaignStatus::Sending {
            debug!(status = %campaign.status, "Campaign not sending, nothing to do");
            return Ok(BatchStats::default());
        }

        let claimed = self
            .recipients
            .claim_batch(
                campaign_id,
                self.config.batch_size,
                self.config.claim_policy(),
            )
            .await?;

        let mut stats = BatchStats::default();

        if claimed.is_empty() {
            // No pending work left; the recount decides completion.
            stats.completed = self.finalize(campaign_id).await?;
            return Ok(stats);
        }

        info!(claimed = claimed.len(), "Processing batch");

        let wave_size = self.config.dispatch_concurrency.max(1);
        let mut index = 0;

        while index < claimed.len() {
            let wave_end = (index + wave_size).min(claimed.len());
            let wave = &claimed[index..wave_end];

            let outcomes = join_all(wave.iter().map(|recipient| {
                let campaign = &campaign;
                async move {
                    self.governor.acquire().await;
                    self.dispatcher.dispatch(campaign, recipient).await
                }
            }))
            .await;

            let mut wave_error = None;
            for outcome in outcomes {
                match outcome {
                    Ok(DispatchOutcome::Sent { billing_recorded }) => {
                        stats.processed += 1;
                        stats.sent += 1;
                        if !billing_recorded {
                            stats.billing_failures += 1;
                        }
                    }
                    Ok(DispatchOutcome::Failed) => {
                        stats.processed += 1;
                        stats.failed += 1;
                    }
                    Ok(DispatchOutcome::Skipped) => {
                        stats.processed += 1;
                        stats.skipped += 1;
                    }
                    Err(e) if wave_error.is_none() => wave_error = Some(e),
                    Err(_) => {}
                }
            }
            if let Some(e) = wave_error {
                // Claimed-but-undispatched rows stay `sending`; the reaper
                // requeues them once they age past the timeout.
                return Err(e);
            }

            index = wave_end;

            if index < claimed.len() {
                let status = self.campaigns.current_status(campaign_id).await?;
                if status != Some(CampaignStatus::Sending) {
                    let rest: Vec<Uuid> = claimed[index..].iter().map(|r| r.id).collect();
                    let released = self.recipients.release_to_pending(rest).await?;
                    info!(
                        status = ?status,
                        released = released,
                        "Campaign no longer sending, stopping batch"
                    );
                    break;
                }
            }
        }

        stats.completed = self.finalize(campaign_id).await?;
        Ok(stats)
    }

    /// Recompute the aggregate counters from the full recipient set and
    /// persist them; a campaign with nothing unresolved is completed.
    /// Recounting instead of incrementing lets the counters self-heal
    /// after crashes, partial batches, or external corrections.
    async fn finalize(&self, campaign_id: Uuid) -> BroadcastResult<bool> {
        let counts = self.recipients.status_counts(campaign_id).await?;
        self.campaigns
            .update_aggregates(campaign_id, counts)
            .await?;

        if counts.unresolved() == 0 {
            let transitioned = self.campaigns.mark_completed(campaign_id).await?;
            if transitioned {
                info!(
                    sent = counts.sent,
                    failed = counts.failed,
                    skipped = counts.skipped,
                    "Campaign completed"
                );
            }
            return Ok(transitioned);
        }
        Ok(false)
    }
}
