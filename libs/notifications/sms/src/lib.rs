//! SMS delivery library
//!
//! Provides a provider-agnostic [`SmsProvider`] trait with HTTP implementations
//! for Twilio and Telnyx, plus an in-memory mock for tests. Vendor selection
//! happens at startup via the `SMS_PROVIDER` environment variable, so callers
//! only ever hold an `Arc<dyn SmsProvider>`.

pub mod error;
pub mod message;
pub mod provider;

pub use error::{SmsError, SmsResult};
pub use message::{segment_count, SmsEncoding, SmsMessage};
pub use provider::{MockSmsProvider, SendReceipt, SmsProvider, TelnyxProvider, TwilioProvider};
