use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::BroadcastResult;
use crate::models::{
    Campaign, CampaignStatus, ClaimPolicy, Conversation, CreateCampaign, CreateRecipient,
    CreateUsageEvent, MessageRecord, ReapedCounts, Recipient, RecipientStatusCounts, SkipReason,
};

/// Repository trait for campaign persistence and lifecycle transitions.
///
/// `create` models the authoring collaborator; everything else is driven
/// by the run orchestrator and the batch processor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Create a campaign in `draft` or `scheduled` state
    async fn create(&self, input: CreateCampaign) -> BroadcastResult<Campaign>;

    /// Get a campaign by ID
    async fn find_by_id(&self, id: Uuid) -> BroadcastResult<Option<Campaign>>;

    /// `scheduled` campaigns whose `scheduled_at` has passed, oldest first
    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> BroadcastResult<Vec<Campaign>>;

    /// Campaigns currently `sending`, oldest first
    async fn find_sending(&self) -> BroadcastResult<Vec<Campaign>>;

    /// Atomically move `scheduled` -> `sending` and stamp `started_at`.
    /// Returns false when another invocation won the race.
    async fn promote_to_sending(&self, id: Uuid) -> BroadcastResult<bool>;

    /// Cheap status poll used between dispatch waves
    async fn current_status(&self, id: Uuid) -> BroadcastResult<Option<CampaignStatus>>;

    /// Overwrite the cached aggregate counters from a fresh recount
    async fn update_aggregates(
        &self,
        id: Uuid,
        counts: RecipientStatusCounts,
    ) -> BroadcastResult<()>;

    /// Atomically move `sending` -> `completed` and stamp `completed_at`.
    /// Returns false when the campaign was no longer `sending`.
    async fn mark_completed(&self, id: Uuid) -> BroadcastResult<bool>;

    /// Mark the campaign `failed` with the error text
    async fn mark_failed(&self, id: Uuid, error: &str) -> BroadcastResult<()>;

    /// Count of campaigns currently `sending`
    async fn count_sending(&self) -> BroadcastResult<u64>;

    /// Count of `scheduled` campaigns already due
    async fn count_due_scheduled(&self, now: DateTime<Utc>) -> BroadcastResult<u64>;
}

/// Repository trait for recipient persistence.
///
/// Mutation goes exclusively through the claim / mark / release / reap
/// operations so every invocation observes the same state machine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Insert a batch of recipients as `pending`
    async fn create_batch(&self, inputs: Vec<CreateRecipient>) -> BroadcastResult<u64>;

    /// Atomically claim up to `limit` eligible recipients in stable
    /// insertion order: mark them `sending`, bump `attempt_count`, stamp
    /// `last_attempt_at`, and return the claimed rows. Two racing
    /// invocations can never claim the same row.
    async fn claim_batch(
        &self,
        campaign_id: Uuid,
        limit: u64,
        policy: ClaimPolicy,
    ) -> BroadcastResult<Vec<Recipient>>;

    /// Read-only view of `pending` rows in claim order
    async fn find_pending(&self, campaign_id: Uuid, limit: u64) -> BroadcastResult<Vec<Recipient>>;

    /// Resolve a recipient as `sent` with its ledger linkage
    async fn mark_sent(&self, id: Uuid, message_id: Uuid) -> BroadcastResult<()>;

    /// Resolve a recipient as `failed` with the error text
    async fn mark_failed(&self, id: Uuid, error: &str) -> BroadcastResult<()>;

    /// Resolve a recipient as `skipped`
    async fn mark_skipped(&self, id: Uuid, reason: SkipReason) -> BroadcastResult<()>;

    /// Return still-claimed rows to `pending` (campaign paused mid-batch)
    async fn release_to_pending(&self, ids: Vec<Uuid>) -> BroadcastResult<u64>;

    /// Recount recipient statuses for one campaign
    async fn status_counts(&self, campaign_id: Uuid) -> BroadcastResult<RecipientStatusCounts>;

    /// Sweep rows stuck `sending` since before `cutoff`: requeue those
    /// under the attempt cap, fail the rest with a timeout error
    async fn reap_stuck(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: i32,
    ) -> BroadcastResult<ReapedCounts>;
}

/// Repository trait for the conversation ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    /// Find or idempotently create the conversation for
    /// (organization, destination)
    async fn find_or_create(
        &self,
        organization_id: Uuid,
        contact_number: &str,
    ) -> BroadcastResult<Conversation>;

    /// Append one outbound message row and bump the conversation's
    /// `last_message_at`
    async fn append_outbound(
        &self,
        conversation_id: Uuid,
        body: &str,
        provider_message_id: &str,
        segments: i32,
    ) -> BroadcastResult<MessageRecord>;
}

/// Repository trait for the opt-out registry.
///
/// `record` models the inbound opt-out path; the dispatcher only reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OptOutRepository: Send + Sync {
    /// Fresh opt-out check; must be consulted immediately before every send
    async fn is_opted_out(&self, organization_id: Uuid, phone_number: &str)
    -> BroadcastResult<bool>;

    /// Register an opt-out (idempotent)
    async fn record(&self, organization_id: Uuid, phone_number: &str) -> BroadcastResult<()>;
}

/// Repository trait for the billing ledger
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingRepository: Send + Sync {
    /// Append one usage event
    async fn record_usage(&self, event: CreateUsageEvent) -> BroadcastResult<()>;
}
