//! Broadcasts Domain
//!
//! This module implements bulk SMS broadcast campaigns: atomic batch
//! claiming, rate-limited dispatch through a pluggable SMS provider,
//! per-recipient conversation threading, usage billing, and campaign
//! lifecycle management.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ Orchestrator │  ← One run: reap, promote, iterate campaigns
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │  Processor   │  ← One batch: claim, pace, finalize counters
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │  Dispatcher  │  ← One recipient: opt-out check, render, send
//! └──────┬───────┘
//!        │
//! ┌──────▼───────┐
//! │ Repositories │  ← Data access (traits + Postgres implementations)
//! └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_broadcasts::{
//!     BillingEmitter, BroadcastConfig, CampaignProcessor, PgBillingRepository,
//!     PgCampaignRepository, PgConversationRepository, PgOptOutRepository,
//!     PgRecipientRepository, RateGovernor, RecipientDispatcher, RunOrchestrator,
//! };
//! use sea_orm::Database;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::connect("postgres://...").await?;
//! let config = BroadcastConfig::default();
//!
//! let campaigns = Arc::new(PgCampaignRepository::new(db.clone()));
//! let recipients = Arc::new(PgRecipientRepository::new(db.clone()));
//!
//! let dispatcher = RecipientDispatcher::new(
//!     recipients.clone(),
//!     Arc::new(PgConversationRepository::new(db.clone())),
//!     Arc::new(PgOptOutRepository::new(db.clone())),
//!     BillingEmitter::new(
//!         Arc::new(PgBillingRepository::new(db)),
//!         config.unit_cost_cents,
//!     ),
//!     sms::provider::from_env()?,
//! );
//! let processor = CampaignProcessor::new(
//!     campaigns.clone(),
//!     recipients.clone(),
//!     dispatcher,
//!     RateGovernor::new(config.rate_limit),
//!     config.clone(),
//! );
//! let orchestrator = RunOrchestrator::new(campaigns, recipients, processor, config);
//!
//! let summary = orchestrator.run(None).await?;
//! println!("sent {} messages", summary.total_sent);
//! # Ok(())
//! # }
//! ```

pub mod billing;
pub mod dispatcher;
pub mod entity;
pub mod error;
pub mod governor;
pub mod models;
pub mod orchestrator;
pub mod postgres;
pub mod processor;
pub mod renderer;
pub mod repository;

// Re-export commonly used types
pub use billing::BillingEmitter;
pub use dispatcher::{DispatchOutcome, RecipientDispatcher};
pub use error::{BroadcastError, BroadcastResult};
pub use governor::RateGovernor;
pub use models::{
    BroadcastConfig, Campaign, CampaignStatus, ClaimPolicy, Conversation, CreateCampaign,
    CreateMessage, CreateRecipient, CreateUsageEvent, MessageDirection, MessageRecord,
    ReapedCounts, Recipient, RecipientStatus, RecipientStatusCounts, SkipReason,
};
pub use orchestrator::{RunOrchestrator, RunSummary, StatusSnapshot};
pub use postgres::{
    PgBillingRepository, PgCampaignRepository, PgConversationRepository, PgOptOutRepository,
    PgRecipientRepository,
};
pub use processor::{BatchStats, CampaignProcessor};
pub use renderer::render_template;
pub use repository::{
    BillingRepository, CampaignRepository, ConversationRepository, OptOutRepository,
    RecipientRepository,
};
