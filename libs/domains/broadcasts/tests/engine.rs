//! End-to-end broadcast engine tests over in-memory repositories
//!
//! These tests exercise the full pipeline (orchestrator -> processor ->
//! dispatcher) against fakes that mirror the Postgres state machine, so
//! the lifecycle rules can be verified without a database:
//! - campaigns only complete once no recipient is unresolved
//! - claims respect batch size, ordering, and the retry policy
//! - opt-outs, send failures, pausing, and reaping leave the store in
//!   the documented states

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use domain_broadcasts::*;
use sms::{MockSmsProvider, SendReceipt, SmsMessage, SmsProvider, SmsResult};

// ============================================================================
// In-memory store implementing the repository traits
// ============================================================================

#[derive(Default)]
struct StoreInner {
    campaigns: HashMap<Uuid, Campaign>,
    recipients: Vec<Recipient>,
    conversations: Vec<Conversation>,
    messages: Vec<MessageRecord>,
    opt_outs: HashSet<(Uuid, String)>,
    usage_events: Vec<CreateUsageEvent>,
}

#[derive(Default)]
struct InMemoryStore {
    inner: Mutex<StoreInner>,
    fail_billing: AtomicBool,
}

impl InMemoryStore {
    fn insert_campaign(&self, campaign: Campaign) {
        self.inner
            .lock()
            .unwrap()
            .campaigns
            .insert(campaign.id, campaign);
    }

    fn insert_recipient(&self, recipient: Recipient) {
        self.inner.lock().unwrap().recipients.push(recipient);
    }

    fn campaign(&self, id: Uuid) -> Campaign {
        self.inner.lock().unwrap().campaigns[&id].clone()
    }

    fn recipient(&self, id: Uuid) -> Recipient {
        self.inner
            .lock()
            .unwrap()
            .recipients
            .iter()
            .find(|r| r.id == id)
            .expect("recipient exists")
            .clone()
    }

    fn set_campaign_status(&self, id: Uuid, status: CampaignStatus) {
        if let Some(c) = self.inner.lock().unwrap().campaigns.get_mut(&id) {
            c.status = status;
        }
    }

    fn messages(&self) -> Vec<MessageRecord> {
        self.inner.lock().unwrap().messages.clone()
    }

    fn conversations(&self) -> Vec<Conversation> {
        self.inner.lock().unwrap().conversations.clone()
    }

    fn usage_events(&self) -> Vec<CreateUsageEvent> {
        self.inner.lock().unwrap().usage_events.clone()
    }
}

#[async_trait]
impl CampaignRepository for InMemoryStore {
    async fn create(&self, input: CreateCampaign) -> BroadcastResult<Campaign> {
        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::now_v7(),
            organization_id: input.organization_id,
            name: input.name,
            message_template: input.message_template,
            sender_id: input.sender_id,
            scheduled_at: input.scheduled_at,
            status: input.status,
            sent_count: 0,
            delivered_count: 0,
            failed_count: 0,
            skipped_count: 0,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.insert_campaign(campaign.clone());
        Ok(campaign)
    }

    async fn find_by_id(&self, id: Uuid) -> BroadcastResult<Option<Campaign>> {
        Ok(self.inner.lock().unwrap().campaigns.get(&id).cloned())
    }

    async fn find_due_scheduled(&self, now: DateTime<Utc>) -> BroadcastResult<Vec<Campaign>> {
        let mut due: Vec<Campaign> = self
            .inner
            .lock()
            .unwrap()
            .campaigns
            .values()
            .filter(|c| {
                c.status == CampaignStatus::Scheduled
                    && c.scheduled_at.map(|at| at <= now).unwrap_or(false)
            })
            .cloned()
            .collect();
        due.sort_by_key(|c| (c.scheduled_at, c.id));
        Ok(due)
    }

    async fn find_sending(&self) -> BroadcastResult<Vec<Campaign>> {
        let mut sending: Vec<Campaign> = self
            .inner
            .lock()
            .unwrap()
            .campaigns
            .values()
            .filter(|c| c.status == CampaignStatus::Sending)
            .cloned()
            .collect();
        sending.sort_by_key(|c| (c.created_at, c.id));
        Ok(sending)
    }

    async fn promote_to_sending(&self, id: Uuid) -> BroadcastResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.campaigns.get_mut(&id) {
            Some(c) if c.status == CampaignStatus::Scheduled => {
                c.status = CampaignStatus::Sending;
                c.started_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn current_status(&self, id: Uuid) -> BroadcastResult<Option<CampaignStatus>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .campaigns
            .get(&id)
            .map(|c| c.status))
    }

    async fn update_aggregates(
        &self,
        id: Uuid,
        counts: RecipientStatusCounts,
    ) -> BroadcastResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(c) = inner.campaigns.get_mut(&id) {
            c.sent_count = counts.sent as i32;
            c.failed_count = counts.failed as i32;
            c.skipped_count = counts.skipped as i32;
        }
        Ok(())
    }

    async fn mark_completed(&self, id: Uuid) -> BroadcastResult<bool> {
        let mut inner = self.inner.lock().unwrap();
        match inner.campaigns.get_mut(&id) {
            Some(c) if c.status == CampaignStatus::Sending => {
                c.status = CampaignStatus::Completed;
                c.completed_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> BroadcastResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(c) = inner.campaigns.get_mut(&id) {
            c.status = CampaignStatus::Failed;
            c.error_message = Some(error.to_string());
        }
        Ok(())
    }

    async fn count_sending(&self) -> BroadcastResult<u64> {
        Ok(self.find_sending().await?.len() as u64)
    }

    async fn count_due_scheduled(&self, now: DateTime<Utc>) -> BroadcastResult<u64> {
        Ok(self.find_due_scheduled(now).await?.len() as u64)
    }
}

#[async_trait]
impl RecipientRepository for InMemoryStore {
    async fn create_batch(&self, inputs: Vec<CreateRecipient>) -> BroadcastResult<u64> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();
        let count = inputs.len() as u64;
        for input in inputs {
            inner.recipients.push(Recipient {
                id: Uuid::now_v7(),
                campaign_id: input.campaign_id,
                destination: input.destination,
                display_name: input.display_name,
                variables: input.variables,
                status: RecipientStatus::Pending,
                skip_reason: None,
                error_message: None,
                message_id: None,
                attempt_count: 0,
                last_attempt_at: None,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(count)
    }

    async fn claim_batch(
        &self,
        campaign_id: Uuid,
        limit: u64,
        policy: ClaimPolicy,
    ) -> BroadcastResult<Vec<Recipient>> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap();

        let mut eligible: Vec<usize> = inner
            .recipients
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.campaign_id == campaign_id
                    && (r.status == RecipientStatus::Pending
                        || (policy.retry_failed
                            && r.status == RecipientStatus::Failed
                            && r.attempt_count < policy.max_attempts))
            })
            .map(|(i, _)| i)
            .collect();
        eligible.sort_by_key(|&i| (inner.recipients[i].created_at, inner.recipients[i].id));
        eligible.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(eligible.len());
        for i in eligible {
            let r = &mut inner.recipients[i];
            r.status = RecipientStatus::Sending;
            r.attempt_count += 1;
            r.last_attempt_at = Some(now);
            claimed.push(r.clone());
        }
        Ok(claimed)
    }

    async fn find_pending(&self, campaign_id: Uuid, limit: u64) -> BroadcastResult<Vec<Recipient>> {
        let inner = self.inner.lock().unwrap();
        let mut pending: Vec<Recipient> = inner
            .recipients
            .iter()
            .filter(|r| r.campaign_id == campaign_id && r.status == RecipientStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| (r.created_at, r.id));
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_sent(&self, id: Uuid, message_id: Uuid) -> BroadcastResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(r) = inner.recipients.iter_mut().find(|r| r.id == id) {
            r.status = RecipientStatus::Sent;
            r.message_id = Some(message_id);
            r.error_message = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> BroadcastResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(r) = inner.recipients.iter_mut().find(|r| r.id == id) {
            r.status = RecipientStatus::Failed;
            r.error_message = Some(error.to_string());
        }
        Ok(())
    }

    async fn mark_skipped(&self, id: Uuid, reason: SkipReason) -> BroadcastResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(r) = inner.recipients.iter_mut().find(|r| r.id == id) {
            r.status = RecipientStatus::Skipped;
            r.skip_reason = Some(reason);
        }
        Ok(())
    }

    async fn release_to_pending(&self, ids: Vec<Uuid>) -> BroadcastResult<u64> {
        let mut inner = self.inner.lock().unwrap();
        let mut released = 0;
        for r in inner.recipients.iter_mut() {
            if ids.contains(&r.id) && r.status == RecipientStatus::Sending {
                r.status = RecipientStatus::Pending;
                released += 1;
            }
        }
        Ok(released)
    }

    async fn status_counts(&self, campaign_id: Uuid) -> BroadcastResult<RecipientStatusCounts> {
        let inner = self.inner.lock().unwrap();
        let mut counts = RecipientStatusCounts::default();
        for r in inner.recipients.iter().filter(|r| r.campaign_id == campaign_id) {
            match r.status {
                RecipientStatus::Pending => counts.pending += 1,
                RecipientStatus::Sending => counts.sending += 1,
                RecipientStatus::Sent => counts.sent += 1,
                RecipientStatus::Failed => counts.failed += 1,
                RecipientStatus::Skipped => counts.skipped += 1,
            }
        }
        Ok(counts)
    }

    async fn reap_stuck(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: i32,
    ) -> BroadcastResult<ReapedCounts> {
        let mut inner = self.inner.lock().unwrap();
        let mut reaped = ReapedCounts::default();
        for r in inner.recipients.iter_mut() {
            let stuck = r.status == RecipientStatus::Sending
                && r.last_attempt_at.map(|at| at < cutoff).unwrap_or(false);
            if !stuck {
                continue;
            }
            if r.attempt_count < max_attempts {
                r.status = RecipientStatus::Pending;
                reaped.requeued += 1;
            } else {
                r.status = RecipientStatus::Failed;
                r.error_message = Some("Timed out in sending state".to_string());
                reaped.failed += 1;
            }
        }
        Ok(reaped)
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn find_or_create(
        &self,
        organization_id: Uuid,
        contact_number: &str,
    ) -> BroadcastResult<Conversation> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(existing) = inner
            .conversations
            .iter()
            .find(|c| c.organization_id == organization_id && c.contact_number == contact_number)
        {
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            organization_id,
            contact_number: contact_number.to_string(),
            last_message_at: None,
            created_at: now,
            updated_at: now,
        };
        inner.conversations.push(conversation.clone());
        Ok(conversation)
    }

    async fn append_outbound(
        &self,
        conversation_id: Uuid,
        body: &str,
        provider_message_id: &str,
        segments: i32,
    ) -> BroadcastResult<MessageRecord> {
        let now = Utc::now();
        let record = MessageRecord {
            id: Uuid::now_v7(),
            conversation_id,
            direction: MessageDirection::Outbound,
            body: body.to_string(),
            provider_message_id: Some(provider_message_id.to_string()),
            segments,
            created_at: now,
        };
        let mut inner = self.inner.lock().unwrap();
        inner.messages.push(record.clone());
        if let Some(c) = inner
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            c.last_message_at = Some(now);
        }
        Ok(record)
    }
}

#[async_trait]
impl OptOutRepository for InMemoryStore {
    async fn is_opted_out(
        &self,
        organization_id: Uuid,
        phone_number: &str,
    ) -> BroadcastResult<bool> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .opt_outs
            .contains(&(organization_id, phone_number.to_string())))
    }

    async fn record(&self, organization_id: Uuid, phone_number: &str) -> BroadcastResult<()> {
        self.inner
            .lock()
            .unwrap()
            .opt_outs
            .insert((organization_id, phone_number.to_string()));
        Ok(())
    }
}

#[async_trait]
impl BillingRepository for InMemoryStore {
    async fn record_usage(&self, event: CreateUsageEvent) -> BroadcastResult<()> {
        if self.fail_billing.load(Ordering::SeqCst) {
            return Err(BroadcastError::Internal(
                "billing ledger unavailable".to_string(),
            ));
        }
        self.inner.lock().unwrap().usage_events.push(event);
        Ok(())
    }
}

/// Provider that pauses the campaign after a fixed number of sends,
/// simulating an operator hitting pause while a batch is in flight.
struct PausingProvider {
    store: Arc<InMemoryStore>,
    campaign_id: Uuid,
    pause_after: usize,
    sent: AtomicUsize,
}

#[async_trait]
impl SmsProvider for PausingProvider {
    async fn send(&self, _message: &SmsMessage) -> SmsResult<SendReceipt> {
        let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.pause_after {
            self.store
                .set_campaign_status(self.campaign_id, CampaignStatus::Paused);
        }
        Ok(SendReceipt {
            message_id: format!("pause-{}", n),
            segments: 1,
        })
    }

    async fn health_check(&self) -> SmsResult<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "pausing"
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Engine {
    store: Arc<InMemoryStore>,
    provider: Arc<MockSmsProvider>,
    orchestrator: RunOrchestrator,
}

fn orchestrator_over(
    store: Arc<InMemoryStore>,
    provider: Arc<dyn SmsProvider>,
    config: BroadcastConfig,
) -> RunOrchestrator {
    let campaigns: Arc<dyn CampaignRepository> = store.clone();
    let recipients: Arc<dyn RecipientRepository> = store.clone();
    let dispatcher = RecipientDispatcher::new(
        recipients.clone(),
        store.clone() as Arc<dyn ConversationRepository>,
        store.clone() as Arc<dyn OptOutRepository>,
        BillingEmitter::new(
            store.clone() as Arc<dyn BillingRepository>,
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
    RunOrchestrator::new(campaigns, recipients, processor, config)
}

fn engine(config: BroadcastConfig) -> Engine {
    let store = Arc::new(InMemoryStore::default());
    let provider = Arc::new(MockSmsProvider::new());
    let orchestrator = orchestrator_over(store.clone(), provider.clone(), config);
    Engine {
        store,
        provider,
        orchestrator,
    }
}

/// High rate limit so tests spend no time waiting on the pacer
fn fast_config() -> BroadcastConfig {
    BroadcastConfig {
        rate_limit: 1_000,
        ..Default::default()
    }
}

fn campaign(status: CampaignStatus, template: &str) -> Campaign {
    let now = Utc::now();
    Campaign {
        id: Uuid::now_v7(),
        organization_id: Uuid::now_v7(),
        name: "Autumn promo".to_string(),
        message_template: template.to_string(),
        sender_id: "+15550009999".to_string(),
        scheduled_at: None,
        status,
        sent_count: 0,
        delivered_count: 0,
        failed_count: 0,
        skipped_count: 0,
        error_message: None,
        started_at: match status {
            CampaignStatus::Sending => Some(now),
            _ => None,
        },
        completed_at: None,
        created_at: now,
        updated_at: now,
    }
}

/// Recipient with a creation timestamp staggered by `index` so claim
/// order is deterministic in tests.
fn recipient(campaign: &Campaign, index: i64, destination: &str) -> Recipient {
    let created_at = Utc::now() - ChronoDuration::minutes(10) + ChronoDuration::seconds(index);
    Recipient {
        id: Uuid::now_v7(),
        campaign_id: campaign.id,
        destination: destination.to_string(),
        display_name: None,
        variables: None,
        status: RecipientStatus::Pending,
        skip_reason: None,
        error_message: None,
        message_id: None,
        attempt_count: 0,
        last_attempt_at: None,
        created_at,
        updated_at: created_at,
    }
}

// ============================================================================
// Lifecycle scenarios
// ============================================================================

#[tokio::test]
async fn test_small_campaign_completes_in_one_run() {
    let engine = engine(fast_config());
    let campaign = campaign(CampaignStatus::Sending, "Hello from us");
    engine.store.insert_campaign(campaign.clone());
    for i in 0..3 {
        engine
            .store
            .insert_recipient(recipient(&campaign, i, &format!("+1555000000{}", i)));
    }

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.broadcasts_processed, 1);
    assert_eq!(summary.total_sent, 3);
    assert_eq!(summary.total_failed, 0);
    assert_eq!(summary.total_skipped, 0);
    assert_eq!(summary.broadcasts_completed, 1);
    assert!(summary.errors.is_empty());

    let stored = engine.store.campaign(campaign.id);
    assert_eq!(stored.status, CampaignStatus::Completed);
    assert_eq!(stored.sent_count, 3);
    assert!(stored.completed_at.is_some());

    assert_eq!(engine.provider.sent_count().await, 3);
    assert_eq!(engine.store.messages().len(), 3);
    assert_eq!(engine.store.conversations().len(), 3);

    let events = engine.store.usage_events();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| e.unit_cost_cents == 5));
    assert!(events.iter().all(|e| e.campaign_id == campaign.id));
    assert!(events.iter().all(|e| e.message_id.is_some()));
}

#[tokio::test]
async fn test_sent_recipients_link_to_the_conversation_ledger() {
    let engine = engine(fast_config());
    let campaign = campaign(CampaignStatus::Sending, "Your order shipped");
    engine.store.insert_campaign(campaign.clone());
    let r = recipient(&campaign, 0, "+15557770001");
    engine.store.insert_recipient(r.clone());

    engine.orchestrator.run(None).await.unwrap();

    let stored = engine.store.recipient(r.id);
    assert_eq!(stored.status, RecipientStatus::Sent);

    let messages = engine.store.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(stored.message_id, Some(messages[0].id));
    assert_eq!(messages[0].body, "Your order shipped");
    assert!(messages[0]
        .provider_message_id
        .as_deref()
        .unwrap()
        .starts_with("mock-"));

    let conversations = engine.store.conversations();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].contact_number, "+15557770001");
    assert_eq!(conversations[0].organization_id, campaign.organization_id);
    assert!(conversations[0].last_message_at.is_some());
}

#[tokio::test]
async fn test_batches_span_runs_until_complete() {
    let config = BroadcastConfig {
        batch_size: 2,
        ..fast_config()
    };
    let engine = engine(config);
    let campaign = campaign(CampaignStatus::Sending, "Batch test");
    engine.store.insert_campaign(campaign.clone());
    for i in 0..5 {
        engine
            .store
            .insert_recipient(recipient(&campaign, i, &format!("+1555111000{}", i)));
    }

    let first = engine.orchestrator.run(None).await.unwrap();
    assert_eq!(first.total_sent, 2);
    assert_eq!(first.broadcasts_completed, 0);
    let after_first = engine.store.campaign(campaign.id);
    assert_eq!(after_first.status, CampaignStatus::Sending);
    assert_eq!(after_first.sent_count, 2);

    let second = engine.orchestrator.run(None).await.unwrap();
    assert_eq!(second.total_sent, 2);
    assert_eq!(second.broadcasts_completed, 0);

    let third = engine.orchestrator.run(None).await.unwrap();
    assert_eq!(third.total_sent, 1);
    assert_eq!(third.broadcasts_completed, 1);

    let done = engine.store.campaign(campaign.id);
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.sent_count, 5);
    assert_eq!(engine.provider.sent_count().await, 5);
}

#[tokio::test]
async fn test_template_variables_render_per_recipient() {
    let engine = engine(fast_config());
    let campaign = campaign(
        CampaignStatus::Sending,
        "Hi {first_name}, your code is {code}",
    );
    engine.store.insert_campaign(campaign.clone());

    let mut maria = recipient(&campaign, 0, "+15552220001");
    maria.display_name = Some("Maria Lopez".to_string());
    maria.variables = Some(json!({"code": "SAVE20"}));
    engine.store.insert_recipient(maria);

    // No display name: {first_name} stays verbatim
    let mut anonymous = recipient(&campaign, 1, "+15552220002");
    anonymous.variables = Some(json!({"code": "WELCOME5"}));
    engine.store.insert_recipient(anonymous);

    engine.orchestrator.run(None).await.unwrap();

    let sent = engine.provider.sent_messages().await;
    assert_eq!(sent.len(), 2);

    let to_maria = sent.iter().find(|m| m.to == "+15552220001").unwrap();
    assert_eq!(to_maria.body, "Hi Maria, your code is SAVE20");
    assert_eq!(to_maria.from, "+15550009999");

    let to_anonymous = sent.iter().find(|m| m.to == "+15552220002").unwrap();
    assert_eq!(to_anonymous.body, "Hi {first_name}, your code is WELCOME5");
}

#[tokio::test]
async fn test_opted_out_recipient_is_skipped_before_send() {
    let engine = engine(fast_config());
    let campaign = campaign(CampaignStatus::Sending, "Promo");
    engine.store.insert_campaign(campaign.clone());

    let reachable = recipient(&campaign, 0, "+15553330001");
    let unsubscribed = recipient(&campaign, 1, "+15553330002");
    let also_reachable = recipient(&campaign, 2, "+15553330003");
    engine.store.insert_recipient(reachable.clone());
    engine.store.insert_recipient(unsubscribed.clone());
    engine.store.insert_recipient(also_reachable.clone());

    OptOutRepository::record(
        engine.store.as_ref(),
        campaign.organization_id,
        "+15553330002",
    )
    .await
    .unwrap();

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.total_sent, 2);
    assert_eq!(summary.total_skipped, 1);
    assert_eq!(summary.broadcasts_completed, 1);

    assert!(!engine.provider.was_sent_to("+15553330002").await);
    assert!(engine.provider.was_sent_to("+15553330001").await);

    let stored = engine.store.recipient(unsubscribed.id);
    assert_eq!(stored.status, RecipientStatus::Skipped);
    assert_eq!(stored.skip_reason, Some(SkipReason::OptedOut));

    // No ledger entry and no billing for the skipped recipient
    assert_eq!(engine.store.messages().len(), 2);
    assert_eq!(engine.store.usage_events().len(), 2);
    assert!(engine
        .store
        .usage_events()
        .iter()
        .all(|e| e.recipient_id != unsubscribed.id));

    let done = engine.store.campaign(campaign.id);
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.sent_count, 2);
    assert_eq!(done.skipped_count, 1);
}

#[tokio::test]
async fn test_send_failures_resolve_recipients_and_complete_the_campaign() {
    let store = Arc::new(InMemoryStore::default());
    let provider = Arc::new(MockSmsProvider::failing("carrier rejected sender"));
    let orchestrator = orchestrator_over(store.clone(), provider, fast_config());

    let campaign = campaign(CampaignStatus::Sending, "Doomed");
    store.insert_campaign(campaign.clone());
    let first = recipient(&campaign, 0, "+15554440001");
    let second = recipient(&campaign, 1, "+15554440002");
    store.insert_recipient(first.clone());
    store.insert_recipient(second.clone());

    let summary = orchestrator.run(None).await.unwrap();

    assert_eq!(summary.total_sent, 0);
    assert_eq!(summary.total_failed, 2);
    // Failed recipients are resolved, so the campaign still converges
    assert_eq!(summary.broadcasts_completed, 1);

    let stored = store.recipient(first.id);
    assert_eq!(stored.status, RecipientStatus::Failed);
    assert!(stored
        .error_message
        .as_deref()
        .unwrap()
        .contains("carrier rejected sender"));
    assert_eq!(stored.attempt_count, 1);

    let done = store.campaign(campaign.id);
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.failed_count, 2);
    assert!(store.messages().is_empty());
    assert!(store.usage_events().is_empty());
}

#[tokio::test]
async fn test_pause_mid_batch_releases_unprocessed_claims() {
    let store = Arc::new(InMemoryStore::default());
    let campaign = campaign(CampaignStatus::Sending, "Pausable");
    store.insert_campaign(campaign.clone());
    for i in 0..5 {
        store.insert_recipient(recipient(&campaign, i, &format!("+1555666000{}", i)));
    }

    let provider = Arc::new(PausingProvider {
        store: store.clone(),
        campaign_id: campaign.id,
        pause_after: 2,
        sent: AtomicUsize::new(0),
    });
    let orchestrator = orchestrator_over(store.clone(), provider, fast_config());

    let summary = orchestrator.run(None).await.unwrap();

    assert_eq!(summary.total_sent, 2);
    assert_eq!(summary.broadcasts_completed, 0);

    let counts = RecipientRepository::status_counts(store.as_ref(), campaign.id)
        .await
        .unwrap();
    assert_eq!(counts.sent, 2);
    assert_eq!(counts.pending, 3);
    assert_eq!(counts.sending, 0);

    // The released rows are visible again through the read-only view
    let pending = store.find_pending(campaign.id, 10).await.unwrap();
    assert_eq!(pending.len(), 3);

    let paused = store.campaign(campaign.id);
    assert_eq!(paused.status, CampaignStatus::Paused);
    assert_eq!(paused.sent_count, 2);
}

// ============================================================================
// Retry policy and reaping
// ============================================================================

#[tokio::test]
async fn test_failed_recipients_stay_failed_by_default() {
    let engine = engine(fast_config());
    let campaign = campaign(CampaignStatus::Sending, "Retry off");
    engine.store.insert_campaign(campaign.clone());

    let mut exhausted = recipient(&campaign, 0, "+15557110001");
    exhausted.status = RecipientStatus::Failed;
    exhausted.attempt_count = 1;
    exhausted.error_message = Some("temporary outage".to_string());
    engine.store.insert_recipient(exhausted.clone());
    let fresh = recipient(&campaign, 1, "+15557110002");
    engine.store.insert_recipient(fresh.clone());

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.total_sent, 1);
    assert!(!engine.provider.was_sent_to("+15557110001").await);
    assert_eq!(
        engine.store.recipient(exhausted.id).status,
        RecipientStatus::Failed
    );

    // failed counts as resolved, so the campaign still completes
    let done = engine.store.campaign(campaign.id);
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.sent_count, 1);
    assert_eq!(done.failed_count, 1);
}

#[tokio::test]
async fn test_failed_recipients_retry_when_enabled() {
    let config = BroadcastConfig {
        retry_failed: true,
        ..fast_config()
    };
    let engine = engine(config);
    let campaign = campaign(CampaignStatus::Sending, "Retry on");
    engine.store.insert_campaign(campaign.clone());

    let mut retryable = recipient(&campaign, 0, "+15557220001");
    retryable.status = RecipientStatus::Failed;
    retryable.attempt_count = 1;
    engine.store.insert_recipient(retryable.clone());

    // Already at the attempt cap, must stay failed
    let mut capped = recipient(&campaign, 1, "+15557220002");
    capped.status = RecipientStatus::Failed;
    capped.attempt_count = 3;
    engine.store.insert_recipient(capped.clone());

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.total_sent, 1);
    assert!(engine.provider.was_sent_to("+15557220001").await);
    assert!(!engine.provider.was_sent_to("+15557220002").await);

    let retried = engine.store.recipient(retryable.id);
    assert_eq!(retried.status, RecipientStatus::Sent);
    assert_eq!(retried.attempt_count, 2);
    assert_eq!(
        engine.store.recipient(capped.id).status,
        RecipientStatus::Failed
    );
}

#[tokio::test]
async fn test_reaper_requeues_stuck_claims_and_fails_at_the_cap() {
    let engine = engine(fast_config());
    let campaign = campaign(CampaignStatus::Sending, "Stuck");
    engine.store.insert_campaign(campaign.clone());

    let stale = Utc::now() - ChronoDuration::minutes(30);
    let mut recoverable = recipient(&campaign, 0, "+15558330001");
    recoverable.status = RecipientStatus::Sending;
    recoverable.attempt_count = 1;
    recoverable.last_attempt_at = Some(stale);
    engine.store.insert_recipient(recoverable.clone());

    let mut hopeless = recipient(&campaign, 1, "+15558330002");
    hopeless.status = RecipientStatus::Sending;
    hopeless.attempt_count = 3;
    hopeless.last_attempt_at = Some(stale);
    engine.store.insert_recipient(hopeless.clone());

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.reaped.requeued, 1);
    assert_eq!(summary.reaped.failed, 1);
    // The requeued recipient is claimed and sent within the same run
    assert_eq!(summary.total_sent, 1);
    assert_eq!(summary.broadcasts_completed, 1);

    let recovered = engine.store.recipient(recoverable.id);
    assert_eq!(recovered.status, RecipientStatus::Sent);
    assert_eq!(recovered.attempt_count, 2);

    let failed = engine.store.recipient(hopeless.id);
    assert_eq!(failed.status, RecipientStatus::Failed);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("Timed out in sending state")
    );
}

#[tokio::test]
async fn test_recent_claims_are_not_reaped() {
    let engine = engine(fast_config());
    let campaign = campaign(CampaignStatus::Sending, "In flight");
    engine.store.insert_campaign(campaign.clone());

    let mut in_flight = recipient(&campaign, 0, "+15558440001");
    in_flight.status = RecipientStatus::Sending;
    in_flight.attempt_count = 1;
    in_flight.last_attempt_at = Some(Utc::now());
    engine.store.insert_recipient(in_flight.clone());

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.reaped.requeued, 0);
    assert_eq!(summary.reaped.failed, 0);
    // Still unresolved, so the campaign cannot complete yet
    assert_eq!(summary.broadcasts_completed, 0);
    assert_eq!(
        engine.store.recipient(in_flight.id).status,
        RecipientStatus::Sending
    );
}

// ============================================================================
// Discovery, scheduling, and filtering
// ============================================================================

#[tokio::test]
async fn test_draft_and_future_scheduled_campaigns_are_left_alone() {
    let engine = engine(fast_config());

    let draft = campaign(CampaignStatus::Draft, "Draft");
    engine.store.insert_campaign(draft.clone());
    engine
        .store
        .insert_recipient(recipient(&draft, 0, "+15559110001"));

    let mut future = campaign(CampaignStatus::Scheduled, "Tomorrow");
    future.scheduled_at = Some(Utc::now() + ChronoDuration::hours(6));
    engine.store.insert_campaign(future.clone());
    engine
        .store
        .insert_recipient(recipient(&future, 0, "+15559110002"));

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.broadcasts_processed, 0);
    assert_eq!(engine.provider.sent_count().await, 0);
    assert_eq!(engine.store.campaign(draft.id).status, CampaignStatus::Draft);
    assert_eq!(
        engine.store.campaign(future.id).status,
        CampaignStatus::Scheduled
    );
}

#[tokio::test]
async fn test_due_scheduled_campaign_is_promoted_and_processed() {
    let engine = engine(fast_config());

    let mut due = campaign(CampaignStatus::Scheduled, "Due now");
    due.scheduled_at = Some(Utc::now() - ChronoDuration::minutes(5));
    engine.store.insert_campaign(due.clone());
    engine
        .store
        .insert_recipient(recipient(&due, 0, "+15559220001"));

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.broadcasts_processed, 1);
    assert_eq!(summary.total_sent, 1);
    assert_eq!(summary.broadcasts_completed, 1);

    let stored = engine.store.campaign(due.id);
    assert_eq!(stored.status, CampaignStatus::Completed);
    assert!(stored.started_at.is_some());
}

#[tokio::test]
async fn test_run_filter_limits_processing_to_one_campaign() {
    let engine = engine(fast_config());

    let targeted = campaign(CampaignStatus::Sending, "Targeted");
    engine.store.insert_campaign(targeted.clone());
    engine
        .store
        .insert_recipient(recipient(&targeted, 0, "+15559330001"));

    let bystander = campaign(CampaignStatus::Sending, "Bystander");
    engine.store.insert_campaign(bystander.clone());
    let untouched = recipient(&bystander, 0, "+15559330002");
    engine.store.insert_recipient(untouched.clone());

    let summary = engine.orchestrator.run(Some(targeted.id)).await.unwrap();

    assert_eq!(summary.broadcasts_processed, 1);
    assert_eq!(summary.total_sent, 1);
    assert!(engine.provider.was_sent_to("+15559330001").await);
    assert!(!engine.provider.was_sent_to("+15559330002").await);
    assert_eq!(
        engine.store.recipient(untouched.id).status,
        RecipientStatus::Pending
    );
    assert_eq!(
        engine.store.campaign(bystander.id).status,
        CampaignStatus::Sending
    );
}

#[tokio::test]
async fn test_filter_on_paused_campaign_does_no_work() {
    let engine = engine(fast_config());
    let paused = campaign(CampaignStatus::Paused, "Paused");
    engine.store.insert_campaign(paused.clone());
    let r = recipient(&paused, 0, "+15559440001");
    engine.store.insert_recipient(r.clone());

    let summary = engine.orchestrator.run(Some(paused.id)).await.unwrap();

    // Counted as processed, but nothing is claimed or sent
    assert_eq!(summary.broadcasts_processed, 1);
    assert_eq!(summary.total_sent, 0);
    assert_eq!(engine.provider.sent_count().await, 0);
    assert_eq!(engine.store.recipient(r.id).status, RecipientStatus::Pending);
    assert_eq!(engine.store.campaign(paused.id).status, CampaignStatus::Paused);
}

// ============================================================================
// Billing
// ============================================================================

#[tokio::test]
async fn test_billing_failure_does_not_block_delivery() {
    let engine = engine(fast_config());
    engine.store.fail_billing.store(true, Ordering::SeqCst);

    let campaign = campaign(CampaignStatus::Sending, "Billing down");
    engine.store.insert_campaign(campaign.clone());
    let r = recipient(&campaign, 0, "+15559550001");
    engine.store.insert_recipient(r.clone());

    let summary = engine.orchestrator.run(None).await.unwrap();

    assert_eq!(summary.total_sent, 1);
    assert_eq!(summary.billing_failures, 1);
    assert_eq!(summary.broadcasts_completed, 1);
    assert_eq!(engine.store.recipient(r.id).status, RecipientStatus::Sent);
    assert!(engine.store.usage_events().is_empty());
}

#[tokio::test]
async fn test_status_snapshot_reports_backlog() {
    let engine = engine(fast_config());

    engine
        .store
        .insert_campaign(campaign(CampaignStatus::Sending, "One"));
    engine
        .store
        .insert_campaign(campaign(CampaignStatus::Sending, "Two"));
    let mut due = campaign(CampaignStatus::Scheduled, "Due");
    due.scheduled_at = Some(Utc::now() - ChronoDuration::minutes(1));
    engine.store.insert_campaign(due);

    let snapshot = engine.orchestrator.status_snapshot().await.unwrap();
    assert_eq!(snapshot.sending_campaigns, 2);
    assert_eq!(snapshot.due_campaigns, 1);
    assert_eq!(snapshot.batch_size, 50);
}
