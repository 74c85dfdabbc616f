//! Wires the broadcast engine to Postgres and the configured SMS provider,
//! and records run metrics.

use std::sync::Arc;

use eyre::Result;
use sea_orm::DatabaseConnection;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use uuid::Uuid;

use domain_broadcasts::{
    BillingEmitter, BroadcastConfig, BroadcastResult, CampaignProcessor, CampaignRepository,
    PgBillingRepository, PgCampaignRepository, PgConversationRepository, PgOptOutRepository,
    PgRecipientRepository, RateGovernor, RecipientDispatcher, RecipientRepository,
    RunOrchestrator, RunSummary, StatusSnapshot,
};
use observability::broadcasts::BroadcastMetrics;
use sms::SmsProvider;

/// One fully wired broadcast engine over a live database connection.
#[derive(Clone)]
pub struct BroadcastRunner {
    orchestrator: Arc<RunOrchestrator>,
}

impl BroadcastRunner {
    pub fn new(
        db: DatabaseConnection,
        provider: Arc<dyn SmsProvider>,
        config: BroadcastConfig,
    ) -> Self {
        let campaigns: Arc<dyn CampaignRepository> =
            Arc::new(PgCampaignRepository::new(db.clone()));
        let recipients: Arc<dyn RecipientRepository> =
            Arc::new(PgRecipientRepository::new(db.clone()));

        let dispatcher = RecipientDispatcher::new(
            recipients.clone(),
            Arc::new(PgConversationRepository::new(db.clone())),
            Arc::new(PgOptOutRepository::new(db.clone())),
            BillingEmitter::new(
                Arc::new(PgBillingRepository::new(db)),
                config.unit_cost_cents,
            ),
            provider,
        );
        let processor = CampaignProcessor::new(
            campaigns.clone(),
            recipients.clone(),
            dispatcher,
            RateGovernor::new(config.rate_limit),
            config.clone(),
        );

        Self {
            orchestrator: Arc::new(RunOrchestrator::new(campaigns, recipients, processor, config)),
        }
    }

    /// Run one processing pass and record its metrics.
    pub async fn run_once(&self, campaign_id: Option<Uuid>) -> BroadcastResult<RunSummary> {
        match self.orchestrator.run(campaign_id).await {
            Ok(summary) => {
                BroadcastMetrics::record_run_completed(
                    summary.broadcasts_processed as usize,
                    summary.total_sent,
                    summary.total_failed,
                    summary.total_skipped,
                    summary.duration_ms as f64 / 1000.0,
                );
                BroadcastMetrics::record_campaigns_completed(summary.broadcasts_completed);
                BroadcastMetrics::record_campaign_errors(summary.errors.len() as u64);
                BroadcastMetrics::record_billing_failures(summary.billing_failures);
                BroadcastMetrics::record_reaped(summary.reaped.requeued, summary.reaped.failed);
                Ok(summary)
            }
            Err(e) => {
                BroadcastMetrics::record_run_failed(&e.to_string());
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> BroadcastResult<StatusSnapshot> {
        self.orchestrator.status_snapshot().await
    }

    /// Run passes on a cron schedule until the process is stopped.
    pub async fn run_scheduled(&self, cron_expr: &str) -> Result<()> {
        info!(cron = cron_expr, "Starting scheduled broadcast processing");

        let sched = JobScheduler::new().await?;

        let runner = self.clone();
        let job = Job::new_async(cron_expr, move |_uuid, _l| {
            let runner = runner.clone();
            Box::pin(async move {
                info!("Running scheduled broadcast pass");
                match runner.run_once(None).await {
                    Ok(summary) => {
                        info!(
                            processed = summary.broadcasts_processed,
                            sent = summary.total_sent,
                            failed = summary.total_failed,
                            "Scheduled pass complete"
                        );
                    }
                    Err(e) => {
                        error!(error = %e, "Scheduled pass failed");
                    }
                }
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler started, waiting for jobs...");
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(60)).await;
        }
    }
}
