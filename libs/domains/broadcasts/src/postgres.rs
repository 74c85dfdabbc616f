//! PostgreSQL implementations of the broadcast repository traits.
//!
//! Entity CRUD goes through Sea-ORM; the race-sensitive transitions
//! (claim, promote, complete, release, reap) are raw conditional
//! statements so each one is a single atomic round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    FromQueryResult, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement,
};
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::entity;
use crate::error::{BroadcastError, BroadcastResult};
use crate::models::{
    Campaign, CampaignStatus, ClaimPolicy, Conversation, CreateCampaign, CreateRecipient,
    CreateUsageEvent, MessageRecord, ReapedCounts, Recipient, RecipientStatus,
    RecipientStatusCounts, SkipReason,
};
use crate::repository::{
    BillingRepository, CampaignRepository, ConversationRepository, OptOutRepository,
    RecipientRepository,
};

/// PostgreSQL implementation of CampaignRepository
#[derive(Clone)]
pub struct PgCampaignRepository {
    db: DatabaseConnection,
}

impl PgCampaignRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CampaignRepository for PgCampaignRepository {
    async fn create(&self, input: CreateCampaign) -> BroadcastResult<Campaign> {
        input
            .validate()
            .map_err(|e| BroadcastError::Validation(e.to_string()))?;

        let model = entity::campaign::ActiveModel::from(input)
            .insert(&self.db)
            .await?;

        tracing::info!(campaign_id = %model.id, "Created campaign");
        Ok(model.into())
    }

    async fn find_by_id(&self, id: Uuid) -> BroadcastResult<Option<Campaign>> {
        let model = entity::campaign::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(Into::into))
    }

    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> BroadcastResult<Vec<Campaign>> {
        let models = entity::campaign::Entity::find()
            .filter(entity::campaign::Column::Status.eq(CampaignStatus::Scheduled))
            .filter(entity::campaign::Column::ScheduledAt.lte(now))
            .order_by_asc(entity::campaign::Column::ScheduledAt)
            .order_by_asc(entity::campaign::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_sending(&self) -> BroadcastResult<Vec<Campaign>> {
        let models = entity::campaign::Entity::find()
            .filter(entity::campaign::Column::Status.eq(CampaignStatus::Sending))
            .order_by_asc(entity::campaign::Column::CreatedAt)
            .order_by_asc(entity::campaign::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn promote_to_sending(&self, id: Uuid) -> BroadcastResult<bool> {
        let sql = r#"
            UPDATE campaigns
            SET status = 'sending', started_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
        "#;
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [id.into()]);
        let result = self.db.execute_raw(stmt).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn current_status(&self, id: Uuid) -> BroadcastResult<Option<CampaignStatus>> {
        let model = entity::campaign::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(|c| c.status))
    }

    async fn update_aggregates(
        &self,
        id: Uuid,
        counts: RecipientStatusCounts,
    ) -> BroadcastResult<()> {
        let update = entity::campaign::ActiveModel {
            id: Set(id),
            sent_count: Set(counts.sent as i32),
            failed_count: Set(counts.failed as i32),
            skipped_count: Set(counts.skipped as i32),
            ..Default::default()
        };
        update.update(&self.db).await?;
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> BroadcastResult<bool> {
        let sql = r#"
            UPDATE campaigns
            SET status = 'completed', completed_at = NOW()
            WHERE id = $1 AND status = 'sending'
        "#;
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [id.into()]);
        let result = self.db.execute_raw(stmt).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> BroadcastResult<()> {
        let sql = r#"
            UPDATE campaigns
            SET status = 'failed', error_message = $2
            WHERE id = $1
        "#;
        let stmt =
            Statement::from_sql_and_values(DbBackend::Postgres, sql, [id.into(), error.into()]);
        self.db.execute_raw(stmt).await?;
        Ok(())
    }

    async fn count_sending(&self) -> BroadcastResult<u64> {
        let count = entity::campaign::Entity::find()
            .filter(entity::campaign::Column::Status.eq(CampaignStatus::Sending))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    async fn count_due_scheduled(&self, now: DateTime<Utc>) -> BroadcastResult<u64> {
        let count = entity::campaign::Entity::find()
            .filter(entity::campaign::Column::Status.eq(CampaignStatus::Scheduled))
            .filter(entity::campaign::Column::ScheduledAt.lte(now))
            .count(&self.db)
            .await?;
        Ok(count)
    }
}

/// PostgreSQL implementation of RecipientRepository
#[derive(Clone)]
pub struct PgRecipientRepository {
    db: DatabaseConnection,
}

impl PgRecipientRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Helper struct for ids coming back from RETURNING clauses
#[derive(FromQueryResult)]
struct IdRow {
    id: Uuid,
}

/// Helper struct for the status recount; the enum column is cast to text
/// in SQL so it decodes as a plain string
#[derive(FromQueryResult)]
struct StatusCountRow {
    status: String,
    count: i64,
}

#[async_trait]
impl RecipientRepository for PgRecipientRepository {
    async fn create_batch(&self, inputs: Vec<CreateRecipient>) -> BroadcastResult<u64> {
        if inputs.is_empty() {
            return Ok(0);
        }
        for input in &inputs {
            input
                .validate()
                .map_err(|e| BroadcastError::Validation(e.to_string()))?;
        }

        let count = inputs.len() as u64;
        let models = inputs
            .into_iter()
            .map(entity::recipient::ActiveModel::from);
        entity::recipient::Entity::insert_many(models)
            .exec(&self.db)
            .await?;

        Ok(count)
    }

    async fn claim_batch(
        &self,
        campaign_id: Uuid,
        limit: u64,
        policy: ClaimPolicy,
    ) -> BroadcastResult<Vec<Recipient>> {
        // FOR UPDATE SKIP LOCKED closes the select-then-mark race: rows
        // locked by a concurrent claim are passed over instead of blocking,
        // and the conditional update can never hand the same row to two
        // invocations.
        let sql = r#"
            UPDATE broadcast_recipients
            SET status = 'sending',
                attempt_count = attempt_count + 1,
                last_attempt_at = NOW()
            WHERE id IN (
                SELECT id FROM broadcast_recipients
                WHERE campaign_id = $1
                  AND (status = 'pending'
                       OR ($2 AND status = 'failed' AND attempt_count < $3))
                ORDER BY created_at, id
                LIMIT $4
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                campaign_id.into(),
                policy.retry_failed.into(),
                policy.max_attempts.into(),
                (limit as i64).into(),
            ],
        );

        let ids: Vec<Uuid> = IdRow::find_by_statement(stmt)
            .all(&self.db)
            .await
            .map_err(|e| BroadcastError::Database(format!("Claim failed: {}", e)))?
            .into_iter()
            .map(|row| row.id)
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        tracing::debug!(campaign_id = %campaign_id, claimed = ids.len(), "Claimed recipients");

        // Re-read through the entity so enum columns decode normally,
        // preserving claim order.
        let models = entity::recipient::Entity::find()
            .filter(entity::recipient::Column::Id.is_in(ids))
            .order_by_asc(entity::recipient::Column::CreatedAt)
            .order_by_asc(entity::recipient::Column::Id)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn find_pending(&self, campaign_id: Uuid, limit: u64) -> BroadcastResult<Vec<Recipient>> {
        let models = entity::recipient::Entity::find()
            .filter(entity::recipient::Column::CampaignId.eq(campaign_id))
            .filter(entity::recipient::Column::Status.eq(RecipientStatus::Pending))
            .order_by_asc(entity::recipient::Column::CreatedAt)
            .order_by_asc(entity::recipient::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(Into::into).collect())
    }

    async fn mark_sent(&self, id: Uuid, message_id: Uuid) -> BroadcastResult<()> {
        let update = entity::recipient::ActiveModel {
            id: Set(id),
            status: Set(RecipientStatus::Sent),
            message_id: Set(Some(message_id)),
            error_message: Set(None),
            ..Default::default()
        };
        update.update(&self.db).await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> BroadcastResult<()> {
        let update = entity::recipient::ActiveModel {
            id: Set(id),
            status: Set(RecipientStatus::Failed),
            error_message: Set(Some(error.to_string())),
            ..Default::default()
        };
        update.update(&self.db).await?;
        Ok(())
    }

    async fn mark_skipped(&self, id: Uuid, reason: SkipReason) -> BroadcastResult<()> {
        let update = entity::recipient::ActiveModel {
            id: Set(id),
            status: Set(RecipientStatus::Skipped),
            skip_reason: Set(Some(reason)),
            ..Default::default()
        };
        update.update(&self.db).await?;
        Ok(())
    }

    async fn release_to_pending(&self, ids: Vec<Uuid>) -> BroadcastResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let sql = r#"
            UPDATE broadcast_recipients
            SET status = 'pending'
            WHERE id = ANY($1) AND status = 'sending'
        "#;
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [ids.into()]);
        let result = self.db.execute_raw(stmt).await?;
        Ok(result.rows_affected())
    }

    async fn status_counts(&self, campaign_id: Uuid) -> BroadcastResult<RecipientStatusCounts> {
        let sql = r#"
            SELECT status::text AS status, COUNT(*) AS count
            FROM broadcast_recipients
            WHERE campaign_id = $1
            GROUP BY status
        "#;
        let stmt = Statement::from_sql_and_values(DbBackend::Postgres, sql, [campaign_id.into()]);

        let rows = StatusCountRow::find_by_statement(stmt).all(&self.db).await?;

        let mut counts = RecipientStatusCounts::default();
        for row in rows {
            match RecipientStatus::from_str(&row.status) {
                Ok(RecipientStatus::Pending) => counts.pending = row.count,
                Ok(RecipientStatus::Sending) => counts.sending = row.count,
                Ok(RecipientStatus::Sent) => counts.sent = row.count,
                Ok(RecipientStatus::Failed) => counts.failed = row.count,
                Ok(RecipientStatus::Skipped) => counts.skipped = row.count,
                Err(_) => {
                    return Err(BroadcastError::Internal(format!(
                        "Unknown recipient status: {}",
                        row.status
                    )));
                }
            }
        }
        Ok(counts)
    }

    async fn reap_stuck(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: i32,
    ) -> BroadcastResult<ReapedCounts> {
        let requeue_sql = r#"
            UPDATE broadcast_recipients
            SET status = 'pending'
            WHERE status = 'sending' AND last_attempt_at < $1 AND attempt_count < $2
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            requeue_sql,
            [cutoff.into(), max_attempts.into()],
        );
        let requeued = self.db.execute_raw(stmt).await?.rows_affected();

        let fail_sql = r#"
            UPDATE broadcast_recipients
            SET status = 'failed', error_message = 'Timed out in sending state'
            WHERE status = 'sending' AND last_attempt_at < $1 AND attempt_count >= $2
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            fail_sql,
            [cutoff.into(), max_attempts.into()],
        );
        let failed = self.db.execute_raw(stmt).await?.rows_affected();

        Ok(ReapedCounts { requeued, failed })
    }
}

/// PostgreSQL implementation of ConversationRepository
#[derive(Clone)]
pub struct PgConversationRepository {
    db: DatabaseConnection,
}

impl PgConversationRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn find_or_create(
        &self,
        organization_id: Uuid,
        contact_number: &str,
    ) -> BroadcastResult<Conversation> {
        // DO UPDATE instead of DO NOTHING so RETURNING always yields the
        // row, whether it already existed or not.
        let sql = r#"
            INSERT INTO conversations (id, organization_id, contact_number, created_at, updated_at)
            VALUES ($1, $2, $3, NOW(), NOW())
            ON CONFLICT (organization_id, contact_number)
            DO UPDATE SET updated_at = NOW()
            RETURNING *
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                Uuid::now_v7().into(),
                organization_id.into(),
                contact_number.into(),
            ],
        );

        let model = entity::conversation::Model::find_by_statement(stmt)
            .one(&self.db)
            .await?
            .ok_or_else(|| BroadcastError::Internal("Failed to upsert conversation".to_string()))?;

        Ok(model.into())
    }

    async fn append_outbound(
        &self,
        conversation_id: Uuid,
        body: &str,
        provider_message_id: &str,
        segments: i32,
    ) -> BroadcastResult<MessageRecord> {
        let message = entity::message::ActiveModel::from(crate::models::CreateMessage {
            conversation_id,
            direction: crate::models::MessageDirection::Outbound,
            body: body.to_string(),
            provider_message_id: Some(provider_message_id.to_string()),
            segments,
        })
        .insert(&self.db)
        .await?;

        let sql = "UPDATE conversations SET last_message_at = NOW() WHERE id = $1";
        let stmt =
            Statement::from_sql_and_values(DbBackend::Postgres, sql, [conversation_id.into()]);
        self.db.execute_raw(stmt).await?;

        Ok(message.into())
    }
}

/// PostgreSQL implementation of OptOutRepository
#[derive(Clone)]
pub struct PgOptOutRepository {
    db: DatabaseConnection,
}

impl PgOptOutRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OptOutRepository for PgOptOutRepository {
    async fn is_opted_out(
        &self,
        organization_id: Uuid,
        phone_number: &str,
    ) -> BroadcastResult<bool> {
        let sql = r#"
            SELECT EXISTS(
                SELECT 1 FROM opt_outs
                WHERE organization_id = $1 AND phone_number = $2
            ) AS opted_out
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [organization_id.into(), phone_number.into()],
        );

        #[derive(FromQueryResult)]
        struct ExistsRow {
            opted_out: bool,
        }

        let row = ExistsRow::find_by_statement(stmt).one(&self.db).await?;
        Ok(row.map(|r| r.opted_out).unwrap_or(false))
    }

    async fn record(&self, organization_id: Uuid, phone_number: &str) -> BroadcastResult<()> {
        let sql = r#"
            INSERT INTO opt_outs (id, organization_id, phone_number, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (organization_id, phone_number) DO NOTHING
        "#;
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                Uuid::now_v7().into(),
                organization_id.into(),
                phone_number.into(),
            ],
        );
        self.db.execute_raw(stmt).await?;
        Ok(())
    }
}

/// PostgreSQL implementation of BillingRepository
#[derive(Clone)]
pub struct PgBillingRepository {
    db: DatabaseConnection,
}

impl PgBillingRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BillingRepository for PgBillingRepository {
    async fn record_usage(&self, event: CreateUsageEvent) -> BroadcastResult<()> {
        entity::usage_event::ActiveModel::from(event)
            .insert(&self.db)
            .await?;
        Ok(())
    }
}
