//! Decimal quantity guards shared by every ledger.

use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};

/// Reject zero and negative quantities.
pub fn ensure_positive(what: &str, value: Decimal) -> DomainResult<Decimal> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{what} must be positive (got {value})"
        )));
    }
    Ok(value)
}

/// Reject negative quantities; zero is allowed.
pub fn ensure_non_negative(what: &str, value: Decimal) -> DomainResult<Decimal> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "{what} cannot be negative (got {value})"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_guard_rejects_zero() {
        assert!(ensure_positive("quantity", Decimal::ZERO).is_err());
        assert!(ensure_positive("quantity", Decimal::ONE).is_ok());
    }

    #[test]
    fn non_negative_guard_accepts_zero() {
        assert!(ensure_non_negative("price", Decimal::ZERO).is_ok());
        assert!(ensure_non_negative("price", Decimal::NEGATIVE_ONE).is_err());
    }
}
