//! Outbound SMS message and segment arithmetic.

use serde::{Deserialize, Serialize};

/// An outbound SMS message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsMessage {
    /// Destination number in E.164 form
    pub to: String,
    /// Sender ID (number or alphanumeric, as registered with the provider)
    pub from: String,
    /// Rendered message body
    pub body: String,
}

impl SmsMessage {
    pub fn new(to: impl Into<String>, from: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            from: from.into(),
            body: body.into(),
        }
    }

    /// Number of billable segments for this message body
    pub fn segments(&self) -> u32 {
        segment_count(&self.body)
    }
}

/// Wire encoding a body will be sent with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsEncoding {
    /// GSM 03.38 seven-bit alphabet
    Gsm7,
    /// UCS-2 (any character outside the GSM alphabet forces this)
    Ucs2,
}

/// GSM 03.38 basic character set (each costs one septet)
const GSM7_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑܧ¿abcdefghijklmnopqrstuvwxyzäöñüà";

/// GSM 03.38 extension table (escape-prefixed, each costs two septets)
const GSM7_EXTENSION: &str = "^{}\\[~]|€";

fn gsm7_septets(c: char) -> Option<u32> {
    if GSM7_BASIC.contains(c) {
        Some(1)
    } else if GSM7_EXTENSION.contains(c) {
        Some(2)
    } else {
        None
    }
}

/// Determine the encoding a body requires
pub fn encoding(body: &str) -> SmsEncoding {
    if body.chars().all(|c| gsm7_septets(c).is_some()) {
        SmsEncoding::Gsm7
    } else {
        SmsEncoding::Ucs2
    }
}

/// Number of billable segments for a message body.
///
/// GSM-7 bodies fit 160 septets in a single message, 153 per segment once
/// concatenation headers are needed. UCS-2 bodies fit 70 UTF-16 code units,
/// 67 per segment when concatenated. Empty bodies count as one segment.
pub fn segment_count(body: &str) -> u32 {
    let mut septets: u32 = 0;

    for c in body.chars() {
        match gsm7_septets(c) {
            Some(n) => septets += n,
            None => {
                // UCS-2 path: count UTF-16 code units, not chars
                let units = body.encode_utf16().count() as u32;
                return if units <= 70 { 1 } else { units.div_ceil(67) };
            }
        }
    }

    if septets <= 160 {
        1
    } else {
        septets.div_ceil(153)
    }
}
