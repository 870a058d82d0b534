use crate::domain::money::minor_to_major;
use crate::domain::payment::Payment;
use crate::error::Result;
use std::io::Write;

/// Writes the final payment summary as CSV.
///
/// Amounts are printed in major units with trailing zeros trimmed.
pub struct PaymentWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> PaymentWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_payments(&mut self, payments: Vec<Payment>) -> Result<()> {
        self.writer
            .write_record(["id", "state", "amount", "captured", "currency"])?;
        for payment in payments {
            self.writer.write_record([
                payment.id.to_string(),
                payment.state.as_str().to_string(),
                minor_to_major(payment.amount_minor).normalize().to_string(),
                minor_to_major(payment.captured_minor())
                    .normalize()
                    .to_string(),
                payment.currency.clone(),
            ])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
