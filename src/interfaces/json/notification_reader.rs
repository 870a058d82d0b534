use crate::domain::notification::{EventCode, Notification};
use crate::error::{ReconcileError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::io::Read;

/// One notification item as the gateway sends it: capitalised field
/// names, booleans as the strings `"true"`/`"false"`. This struct is the
/// explicit mapping table between the wire shape and the canonical
/// `Notification`; nothing past this boundary sees gateway field names.
#[derive(Debug, Deserialize)]
struct RawNotification {
    #[serde(rename = "pspReference")]
    psp_reference: String,
    #[serde(rename = "originalReference", default)]
    original_reference: Option<String>,
    #[serde(rename = "merchantReference")]
    merchant_reference: String,
    #[serde(rename = "eventCode")]
    event_code: EventCode,
    #[serde(deserialize_with = "bool_from_wire")]
    success: bool,
    value: i64,
    currency: String,
    #[serde(default)]
    operations: Vec<String>,
    #[serde(rename = "eventDate")]
    event_date: DateTime<Utc>,
}

/// The gateway encodes booleans as strings; newer payload versions send
/// real booleans. Accept both.
fn bool_from_wire<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
        Bool(bool),
        Text(String),
    }

    match Wire::deserialize(deserializer)? {
        Wire::Bool(b) => Ok(b),
        Wire::Text(s) => Ok(s.eq_ignore_ascii_case("true")),
    }
}

impl From<RawNotification> for Notification {
    fn from(raw: RawNotification) -> Self {
        Notification {
            psp_reference: raw.psp_reference,
            original_reference: raw.original_reference,
            merchant_reference: raw.merchant_reference,
            event_code: raw.event_code,
            success: raw.success,
            value: raw.value,
            currency: raw.currency,
            operations: raw.operations,
            dispatched_at: raw.event_date,
            processed: false,
        }
    }
}

/// Reads gateway notifications from a JSON stream, one object per line.
///
/// Wraps `serde_json`'s stream deserializer and provides an iterator over
/// `Result<Notification>`, so large feeds are processed without loading
/// the entire dataset into memory.
pub struct NotificationReader<R: Read> {
    source: R,
}

impl<R: Read> NotificationReader<R> {
    /// Creates a new `NotificationReader` from any `Read` source (e.g.
    /// File, Stdin).
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Returns an iterator that lazily reads, maps and yields
    /// notifications.
    pub fn notifications(self) -> impl Iterator<Item = Result<Notification>> {
        serde_json::Deserializer::from_reader(self.source)
            .into_iter::<RawNotification>()
            .map(|result| {
                result
                    .map(Notification::from)
                    .map_err(ReconcileError::from)
            })
    }
}
