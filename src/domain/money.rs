use crate::error::{ReconcileError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A positive monetary amount in gateway minor units (cents).
///
/// Gateways report amounts as minor-unit integers; keeping them as `i64`
/// means every balance comparison in the crate is exact. Conversion to
/// major units happens only at presentation boundaries (refund records,
/// summary output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: String,
}

impl Money {
    pub fn new(minor: i64, currency: impl Into<String>) -> Result<Self> {
        if minor > 0 {
            Ok(Self {
                minor,
                currency: currency.into(),
            })
        } else {
            Err(ReconcileError::ValidationError(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// The major-unit value, at the conventional two-digit exponent.
    pub fn major(&self) -> Decimal {
        Decimal::new(self.minor, 2)
    }
}

/// Minor-to-major conversion for raw minor-unit values that are not
/// constrained to be positive (e.g. payment totals in summaries).
pub fn minor_to_major(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}
