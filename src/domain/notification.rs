use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Gateway event codes as they appear on the wire.
///
/// Anything the reconciler does not handle (disputes, reports, codes added
/// after this build) collapses into `Unsupported` instead of failing to
/// parse, so the notification can still be stored and revisited later.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    Authorisation,
    Capture,
    Cancellation,
    CancelOrRefund,
    Refund,
    #[serde(other)]
    Unsupported,
}

impl EventCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::Authorisation => "AUTHORISATION",
            EventCode::Capture => "CAPTURE",
            EventCode::Cancellation => "CANCELLATION",
            EventCode::CancelOrRefund => "CANCEL_OR_REFUND",
            EventCode::Refund => "REFUND",
            EventCode::Unsupported => "UNSUPPORTED",
        }
    }
}

/// What a notification means for reconciliation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum EventKind {
    /// The initial authorisation report for a payment.
    NormalAuthorisation,
    /// A capture confirmation against a prior authorisation.
    ModificationCapture,
    /// A cancellation (or cancel-or-refund) of a prior transaction.
    ModificationCancelOrRefund,
    /// A refund settlement against a prior capture.
    ModificationRefund,
    /// Not understood by this build; left in the backlog.
    Unknown,
}

/// One asynchronously delivered gateway event report.
///
/// Notifications are append-only facts: they are created by webhook intake
/// with `processed = false` and the reconciler is the only writer of the
/// `processed` flag, which moves false->true exactly once or never.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Notification {
    pub psp_reference: String,
    /// Reference of the transaction this event modifies, when any.
    #[serde(default)]
    pub original_reference: Option<String>,
    pub merchant_reference: String,
    pub event_code: EventCode,
    pub success: bool,
    /// Event amount in minor units.
    pub value: i64,
    pub currency: String,
    /// Follow-up operations the gateway advertises as available after
    /// this event (e.g. CAPTURE, CANCEL, REFUND).
    #[serde(default)]
    pub operations: Vec<String>,
    pub dispatched_at: DateTime<Utc>,
    #[serde(default)]
    pub processed: bool,
}

impl Notification {
    pub fn kind(&self) -> EventKind {
        match self.event_code {
            EventCode::Authorisation => EventKind::NormalAuthorisation,
            EventCode::Capture => EventKind::ModificationCapture,
            EventCode::Cancellation | EventCode::CancelOrRefund => {
                EventKind::ModificationCancelOrRefund
            }
            EventCode::Refund => EventKind::ModificationRefund,
            EventCode::Unsupported => EventKind::Unknown,
        }
    }

    pub fn is_modification(&self) -> bool {
        matches!(
            self.kind(),
            EventKind::ModificationCapture
                | EventKind::ModificationCancelOrRefund
                | EventKind::ModificationRefund
        )
    }

    /// True when the gateway captured funds at authorisation time: a
    /// successful authorisation that does not advertise CAPTURE as a
    /// follow-up operation has nothing left to capture.
    pub fn auto_captured(&self) -> bool {
        self.kind() == EventKind::NormalAuthorisation
            && self.success
            && !self
                .operations
                .iter()
                .any(|op| op.eq_ignore_ascii_case("capture"))
    }

    /// Storage identity: the gateway may redeliver an event, and distinct
    /// events can share a psp reference across event codes.
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.psp_reference, self.event_code.as_str())
    }
}
