//! Best-effort billing ledger writes.

use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::models::CreateUsageEvent;
use crate::repository::BillingRepository;

/// Emits one usage event per successfully sent message at the configured
/// fixed per-message rate. Delivery success is authoritative: a failed
/// write is logged and surfaced as a count, never as an error.
#[derive(Clone)]
pub struct BillingEmitter {
    repository: Arc<dyn BillingRepository>,
    unit_cost_cents: i64,
}

impl BillingEmitter {
    pub fn new(repository: Arc<dyn BillingRepository>, unit_cost_cents: i64) -> Self {
        Self {
            repository,
            unit_cost_cents,
        }
    }

    /// Returns true when the usage event was recorded.
    pub async fn record_usage(
        &self,
        organization_id: Uuid,
        campaign_id: Uuid,
        recipient_id: Uuid,
        message_id: Option<Uuid>,
    ) -> bool {
        let event = CreateUsageEvent {
            organization_id,
            campaign_id,
            recipient_id,
            message_id,
            unit_cost_cents: self.unit_cost_cents,
        };

        match self.repository.record_usage(event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    campaign_id = %campaign_id,
                    recipient_id = %recipient_id,
                    error = %e,
                    "Failed to record usage event"
                );
                false
            }
        }
    }
}
