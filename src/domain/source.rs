use crate::domain::notification::{EventKind, Notification};
use crate::domain::payment::Payment;
use serde::{Deserialize, Serialize};

/// Namespace prefix for actions exposed by the HPP source, so they never
/// collide with the generic payment action vocabulary.
pub const ACTION_NAMESPACE: &str = "hpp_";

/// Capability interface of a payment source variant.
///
/// A payment owns at most one source; the source answers which manual
/// actions are currently available and whether a manual capture would do
/// anything. Other source variants (cards on file, wallets) would
/// implement the same interface.
pub trait PaymentSource {
    /// Manually triggerable actions, derived from the given notification
    /// history (ascending dispatch order, processed notifications only).
    fn actions(&self, history: &[Notification]) -> Vec<String>;

    /// Whether a manual capture on this payment would capture anything.
    fn can_capture(&self, payment: &Payment) -> bool;
}

/// The redirect-flow response attached to a payment after the shopper
/// returns from the gateway's hosted payment pages. Correlates to all
/// notifications sharing its merchant reference.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct HppSource {
    pub merchant_reference: String,
    pub psp_reference: String,
    #[serde(default)]
    pub auth_result: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl HppSource {
    /// The most recent successfully processed authorisation for this
    /// source, if any.
    fn auth_notification<'a>(&self, history: &'a [Notification]) -> Option<&'a Notification> {
        history.iter().rev().find(|n| {
            n.processed
                && n.success
                && n.kind() == EventKind::NormalAuthorisation
                && n.merchant_reference == self.merchant_reference
        })
    }
}

impl PaymentSource for HppSource {
    fn actions(&self, history: &[Notification]) -> Vec<String> {
        match self.auth_notification(history) {
            Some(auth) => auth
                .operations
                .iter()
                .map(|op| format!("{ACTION_NAMESPACE}{}", op.to_ascii_lowercase()))
                .collect(),
            None => Vec::new(),
        }
    }

    fn can_capture(&self, payment: &Payment) -> bool {
        payment.uncaptured_minor() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Money;
    use crate::domain::notification::EventCode;
    use chrono::{TimeZone, Utc};

    fn source() -> HppSource {
        HppSource {
            merchant_reference: "R1".to_string(),
            psp_reference: "psp-0".to_string(),
            auth_result: Some("AUTHORISED".to_string()),
            payment_method: Some("visa".to_string()),
        }
    }

    fn auth(seq: u32, processed: bool, operations: Vec<&str>) -> Notification {
        Notification {
            psp_reference: format!("psp-{seq}"),
            original_reference: None,
            merchant_reference: "R1".to_string(),
            event_code: EventCode::Authorisation,
            success: true,
            value: 1000,
            currency: "USD".to_string(),
            operations: operations.into_iter().map(String::from).collect(),
            dispatched_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, seq).unwrap(),
            processed,
        }
    }

    #[test]
    fn test_actions_empty_without_processed_auth() {
        assert!(source().actions(&[]).is_empty());
        // An unprocessed authorisation does not expose anything yet.
        assert!(source().actions(&[auth(1, false, vec!["CAPTURE"])]).is_empty());
    }

    #[test]
    fn test_actions_namespaced() {
        let history = vec![auth(1, true, vec!["CAPTURE", "REFUND"])];
        assert_eq!(
            source().actions(&history),
            vec!["hpp_capture".to_string(), "hpp_refund".to_string()]
        );
    }

    #[test]
    fn test_actions_use_latest_auth() {
        let history = vec![
            auth(1, true, vec!["CAPTURE", "CANCEL", "REFUND"]),
            auth(2, true, vec!["REFUND"]),
        ];
        assert_eq!(source().actions(&history), vec!["hpp_refund".to_string()]);
    }

    #[test]
    fn test_can_capture_exact_zero() {
        let mut payment = Payment::new(1, 1000, "USD");
        let source = source();
        assert!(source.can_capture(&payment));

        payment
            .record_capture(Money::new(999, "USD").unwrap())
            .unwrap();
        assert!(source.can_capture(&payment));

        payment
            .record_capture(Money::new(1, "USD").unwrap())
            .unwrap();
        assert!(!source.can_capture(&payment));
    }
}
