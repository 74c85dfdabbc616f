use chrono::{DateTime, Utc};
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Campaign lifecycle status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "campaign_status")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignStatus {
    /// Authored but not yet runnable
    #[default]
    #[sea_orm(string_value = "draft")]
    Draft,
    /// Waiting for its scheduled_at to pass
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    /// Actively being delivered
    #[sea_orm(string_value = "sending")]
    Sending,
    /// Every recipient resolved
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Unrecoverable processing error
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Externally halted; resumable
    #[sea_orm(string_value = "paused")]
    Paused,
}

/// Recipient delivery status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "recipient_status")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecipientStatus {
    /// Not yet attempted
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Claimed by an in-flight invocation
    #[sea_orm(string_value = "sending")]
    Sending,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "skipped")]
    Skipped,
}

impl RecipientStatus {
    /// Resolved recipients never become eligible for processing again
    /// (except `failed` under an explicit retry policy).
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Sent | Self::Failed | Self::Skipped)
    }
}

/// Why a recipient was skipped instead of sent
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "skip_reason")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    #[default]
    #[sea_orm(string_value = "opted_out")]
    OptedOut,
}

/// Direction of a conversation ledger entry
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    Default,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "message_direction")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageDirection {
    #[default]
    #[sea_orm(string_value = "outbound")]
    Outbound,
    #[sea_orm(string_value = "inbound")]
    Inbound,
}

/// Broadcast campaign - one message template delivered to a recipient list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Campaign {
    /// Unique identifier
    pub id: Uuid,
    /// Owning tenant
    pub organization_id: Uuid,
    pub name: String,
    /// Message body with `{variable}` placeholders
    pub message_template: String,
    /// Originating sender identity (E.164 number or alphanumeric sender)
    pub sender_id: String,
    /// When a `scheduled` campaign becomes due
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: CampaignStatus,
    /// Aggregate counters, recomputed from the recipient set - a cache,
    /// never the source of truth
    pub sent_count: i32,
    /// Written by the external delivery-receipt path, never by the processor
    pub delivered_count: i32,
    pub failed_count: i32,
    pub skipped_count: i32,
    /// Populated when a run marks the campaign `failed`
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One destination within a campaign
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Recipient {
    pub id: Uuid,
    pub campaign_id: Uuid,
    /// Destination phone number
    pub destination: String,
    pub display_name: Option<String>,
    /// Flat string map of per-recipient template variables
    pub variables: Option<serde_json::Value>,
    pub status: RecipientStatus,
    pub skip_reason: Option<SkipReason>,
    pub error_message: Option<String>,
    /// Ledger linkage set on successful send
    pub message_id: Option<Uuid>,
    pub attempt_count: i32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One conversation per (organization, destination)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Conversation {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub contact_number: String,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageRecord {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub direction: MessageDirection,
    pub body: String,
    pub provider_message_id: Option<String>,
    pub segments: i32,
    pub created_at: DateTime<Utc>,
}

/// DTO for creating a campaign
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCampaign {
    pub organization_id: Uuid,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub message_template: String,
    #[validate(length(min = 1, max = 32))]
    pub sender_id: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: CampaignStatus,
}

/// DTO for adding recipients to a campaign
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateRecipient {
    pub campaign_id: Uuid,
    #[validate(length(min = 3, max = 32))]
    pub destination: String,
    pub display_name: Option<String>,
    pub variables: Option<serde_json::Value>,
}

/// DTO for appending an outbound ledger entry
#[derive(Debug, Clone)]
pub struct CreateMessage {
    pub conversation_id: Uuid,
    pub direction: MessageDirection,
    pub body: String,
    pub provider_message_id: Option<String>,
    pub segments: i32,
}

/// DTO for one billing usage event
#[derive(Debug, Clone)]
pub struct CreateUsageEvent {
    pub organization_id: Uuid,
    pub campaign_id: Uuid,
    pub recipient_id: Uuid,
    pub message_id: Option<Uuid>,
    pub unit_cost_cents: i64,
}

/// Recipient counts per status for one campaign
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct RecipientStatusCounts {
    pub pending: i64,
    pub sending: i64,
    pub sent: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl RecipientStatusCounts {
    /// Recipients still eligible for future processing
    pub fn unresolved(&self) -> i64 {
        self.pending + self.sending
    }

    pub fn total(&self) -> i64 {
        self.pending + self.sending + self.sent + self.failed + self.skipped
    }
}

/// Claim eligibility policy derived from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimPolicy {
    /// When true, `failed` rows under the attempt cap are claimable again
    pub retry_failed: bool,
    pub max_attempts: i32,
}

/// Counts returned by one reaper sweep
#[derive(Debug, Clone, Copy, Default, Serialize, ToSchema)]
pub struct ReapedCounts {
    /// Stuck rows returned to `pending`
    pub requeued: u64,
    /// Stuck rows failed at the attempt cap
    pub failed: u64,
}

/// Processing knobs, populated from `BROADCAST_*` environment variables
/// by the binary.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Messages per second across one invocation
    pub rate_limit: u32,
    /// Max recipients claimed per campaign per run
    pub batch_size: u64,
    /// Bounded dispatch wave size; 1 keeps the sequential semantics
    pub dispatch_concurrency: usize,
    /// How long a recipient may sit `sending` before the reaper sweeps it
    pub sending_timeout: Duration,
    pub retry_failed: bool,
    pub max_attempts: u32,
    /// Fixed per-message broadcast rate billed on successful sends
    pub unit_cost_cents: i64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            rate_limit: 10,
            batch_size: 50,
            dispatch_concurrency: 1,
            sending_timeout: Duration::from_secs(300),
            retry_failed: false,
            max_attempts: 3,
            unit_cost_cents: 5,
        }
    }
}

impl BroadcastConfig {
    pub fn claim_policy(&self) -> ClaimPolicy {
        ClaimPolicy {
            retry_failed: self.retry_failed,
            max_attempts: self.max_attempts as i32,
        }
    }
}
