use crate::domain::money::Money;
use crate::domain::source::HppSource;
use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Void,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Pending => "pending",
            PaymentState::Processing => "processing",
            PaymentState::Completed => "completed",
            PaymentState::Failed => "failed",
            PaymentState::Void => "void",
        }
    }
}

/// One gateway-confirmed capture against a payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct CaptureEvent {
    pub amount_minor: i64,
    pub psp_reference: String,
}

/// A local payment awaiting reconciliation with gateway notifications.
///
/// The lifecycle state only moves through the guarded transition methods;
/// an illegal transition is a hard error so that a reconciliation attempt
/// built on a stale precondition rolls back instead of corrupting state.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: u64,
    #[serde(default)]
    pub state: PaymentState,
    /// Order total in minor units; rewritten to the captured total once
    /// the gateway confirms capture.
    pub amount_minor: i64,
    pub currency: String,
    #[serde(default)]
    pub capture_events: Vec<CaptureEvent>,
    #[serde(default)]
    pub source: Option<HppSource>,
}

impl Payment {
    pub fn new(id: u64, amount_minor: i64, currency: impl Into<String>) -> Self {
        Self {
            id,
            state: PaymentState::Pending,
            amount_minor,
            currency: currency.into(),
            capture_events: Vec::new(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: HppSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.state == PaymentState::Completed
    }

    /// Sum of all gateway-confirmed captures, in minor units.
    pub fn captured_minor(&self) -> i64 {
        self.capture_events.iter().map(|e| e.amount_minor).sum()
    }

    /// Remainder still capturable, in minor units. Exact integer
    /// arithmetic; zero means fully captured.
    pub fn uncaptured_minor(&self) -> i64 {
        self.amount_minor - self.captured_minor()
    }

    /// Marks the payment as failed. Legal from Pending or Processing.
    pub fn fail(&mut self) -> Result<()> {
        self.transition_to(PaymentState::Failed, &[PaymentState::Pending, PaymentState::Processing])
    }

    /// Voids the payment. Legal from Pending, Processing or Completed.
    pub fn void(&mut self) -> Result<()> {
        self.transition_to(
            PaymentState::Void,
            &[PaymentState::Pending, PaymentState::Processing, PaymentState::Completed],
        )
    }

    /// Completes the payment. Legal from Pending or Processing;
    /// completing an already-completed payment is a no-op, so refund
    /// settlements converge no matter whether an outbound refund moved
    /// the payment back to processing first.
    pub fn complete(&mut self) -> Result<()> {
        self.transition_to(
            PaymentState::Completed,
            &[
                PaymentState::Pending,
                PaymentState::Processing,
                PaymentState::Completed,
            ],
        )
    }

    /// Records a successful authorisation that was not auto-captured: the
    /// payment moves to Processing and waits for a manual capture.
    pub fn authorize(&mut self) -> Result<()> {
        self.transition_to(PaymentState::Processing, &[PaymentState::Pending])
    }

    /// Appends a capture event. The capture currency must match the
    /// payment currency.
    pub fn record_capture(&mut self, amount: Money) -> Result<()> {
        if amount.currency() != self.currency {
            return Err(ReconcileError::ValidationError(format!(
                "Capture currency {} does not match payment currency {}",
                amount.currency(),
                self.currency
            )));
        }
        self.capture_events.push(CaptureEvent {
            amount_minor: amount.minor(),
            psp_reference: String::new(),
        });
        Ok(())
    }

    /// Records a capture with the originating gateway reference attached.
    pub fn record_capture_from(&mut self, amount: Money, psp_reference: &str) -> Result<()> {
        self.record_capture(amount)?;
        if let Some(event) = self.capture_events.last_mut() {
            event.psp_reference = psp_reference.to_string();
        }
        Ok(())
    }

    /// Rewrites the payment total to the captured total, as the gateway
    /// settles what was actually taken.
    pub fn set_amount_to_captured(&mut self) {
        self.amount_minor = self.captured_minor();
    }

    fn transition_to(&mut self, target: PaymentState, allowed_from: &[PaymentState]) -> Result<()> {
        if allowed_from.contains(&self.state) {
            self.state = target;
            Ok(())
        } else {
            Err(ReconcileError::TransitionError(format!(
                "cannot move payment {} from {} to {}",
                self.id,
                self.state.as_str(),
                target.as_str()
            )))
        }
    }
}
