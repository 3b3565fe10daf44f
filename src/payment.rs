//! Payment instructions for bank-transfer and QR payments.
//!
//! The payload is an opaque text block the frontend renders (or encodes as a
//! QR image) so the customer can wire the exact amount with the order number
//! as the transfer reference. Generation failures never abort checkout; the
//! order is simply created without a payload.

use serde::Deserialize;

use crate::domain::Money;
use crate::error::Error;

/// Static receiving-account details, from configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct BankConfig {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

/// Build the transfer-instruction payload for one order.
pub fn instruction(
    bank: Option<&BankConfig>,
    amount: &Money,
    order_number: &str,
) -> Result<String, Error> {
    let bank = bank.ok_or_else(|| {
        Error::PaymentInstruction("bank transfer details are not configured".into())
    })?;
    Ok(format!(
        "Bank: {}\nAccount: {}\nName: {}\nAmount: {}\nContent: {}",
        bank.bank_name, bank.account_number, bank.account_name, amount, order_number
    ))
}
