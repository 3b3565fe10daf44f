//! Value objects

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Money value object. Amounts are exact decimals tagged with a currency code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: String,
}

impl Money {
    pub fn new(amount: Decimal, currency: &str) -> Self {
        Self { amount, currency: currency.to_string() }
    }

    pub fn zero(currency: &str) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// A zero amount in the same currency as `self`.
    pub fn zeroed(&self) -> Self {
        Self::new(Decimal::ZERO, &self.currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch);
        }
        Ok(Money::new(self.amount + other.amount, &self.currency))
    }

    pub fn multiply(&self, qty: u32) -> Money {
        Money::new(self.amount * Decimal::from(qty), &self.currency)
    }

    /// Round to the currency's minor unit (two decimal places).
    pub fn round_minor(&self) -> Money {
        Money::new(self.amount.round_dp(2), &self.currency)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}

#[derive(Debug, Clone)]
pub enum MoneyError {
    CurrencyMismatch,
}

impl std::error::Error for MoneyError {}
impl fmt::Display for MoneyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Currency mismatch")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_add() {
        let a = Money::new(Decimal::new(85000, 0), "VND");
        let b = Money::new(Decimal::new(65000, 0), "VND");
        assert_eq!(a.add(&b).unwrap().amount(), Decimal::new(150000, 0));
    }

    #[test]
    fn test_money_add_rejects_mixed_currencies() {
        let a = Money::new(Decimal::new(100, 0), "VND");
        let b = Money::new(Decimal::new(100, 0), "USD");
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn test_money_multiply_and_round() {
        let unit = Money::new(Decimal::new(10555, 3), "USD"); // 10.555
        assert_eq!(unit.multiply(2).round_minor().amount(), Decimal::new(2111, 2)); // 21.11
    }
}
