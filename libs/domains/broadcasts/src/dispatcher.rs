//! Per-recipient delivery.
//!
//! The claim already marked the row `sending`; from here every step is a
//! hard precondition for the next: fresh opt-out check, render, send,
//! then the success bookkeeping (ledger append, recipient resolution,
//! billing).

use sms::{SmsMessage, SmsProvider};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::billing::BillingEmitter;
use crate::error::BroadcastResult;
use crate::models::{Campaign, Recipient, SkipReason};
use crate::renderer::render_template;
use crate::repository::{ConversationRepository, OptOutRepository, RecipientRepository};

/// How one claimed recipient was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent { billing_recorded: bool },
    Failed,
    Skipped,
}

/// Delivers one claimed recipient at a time.
///
/// Store errors around the opt-out check and the success bookkeeping
/// propagate (the campaign can no longer trust its state); a provider
/// send failure resolves the recipient as `failed` and never propagates.
#[derive(Clone)]
pub struct RecipientDispatcher {
    recipients: Arc<dyn RecipientRepository>,
    conversations: Arc<dyn ConversationRepository>,
    opt_outs: Arc<dyn OptOutRepository>,
    billing: BillingEmitter,
    provider: Arc<dyn SmsProvider>,
}

impl RecipientDispatcher {
    pub fn new(
        recipients: Arc<dyn RecipientRepository>,
        conversations: Arc<dyn ConversationRepository>,
        opt_outs: Arc<dyn OptOutRepository>,
        billing: BillingEmitter,
        provider: Arc<dyn SmsProvider>,
    ) -> Self {
        Self {
            recipients,
            conversations,
            opt_outs,
            billing,
            provider,
        }
    }

    #[instrument(
        skip(self, campaign, recipient),
        fields(campaign_id = %campaign.id, recipient_id = %recipient.id)
    )]
    pub async fn dispatch(
        &self,
        campaign: &Campaign,
        recipient: &Recipient,
    ) -> BroadcastResult<DispatchOutcome> {
        // The recipient may have opted out after being claimed, so the
        // registry is consulted fresh right before the send.
        let opted_out = self
            .opt_outs
            .is_opted_out(campaign.organization_id, &recipient.destination)
            .await?;
        if opted_out {
            self.recipients
                .mark_skipped(recipient.id, SkipReason::OptedOut)
                .await?;
            debug!("Recipient opted out, skipping");
            return Ok(DispatchOutcome::Skipped);
        }

        let body = render_template(
            &campaign.message_template,
            recipient.variables.as_ref(),
            recipient.display_name.as_deref(),
        );
        let message = SmsMessage::new(
            recipient.destination.clone(),
            campaign.sender_id.clone(),
            body,
        );

        match self.provider.send(&message).await {
            Ok(receipt) => {
                let conversation = self
                    .conversations
                    .find_or_create(campaign.organization_id, &recipient.destination)
                    .await?;
                let record = self
                    .conversations
                    .append_outbound(
                        conversation.id,
                        &message.body,
                        &receipt.message_id,
                        receipt.segments as i32,
                    )
                    .await?;
                self.recipients.mark_sent(recipient.id, record.id).await?;

                let billing_recorded = self
                    .billing
                    .record_usage(
                        campaign.organization_id,
                        campaign.id,
                        recipient.id,
                        Some(record.id),
                    )
                    .await;

                debug!(segments = receipt.segments, "Recipient sent");
                Ok(DispatchOutcome::Sent { billing_recorded })
            }
            Err(e) => {
                warn!(error = %e, "SMS send failed");
                self.recipients
                    .mark_failed(recipient.id, &e.to_string())
                    .await?;
                Ok(DispatchOutcome::Failed)
            }
        }
    }
}
