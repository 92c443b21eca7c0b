// Validation utilities module
// Provides custom validation functions for domain-specific rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use validator::ValidationError;

/// Validates that a discount window is well-formed: both bounds required at
/// the type level, start strictly before end.
pub fn validate_discount_window(
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> Result<(), ValidationError> {
    if starts_at < ends_at {
        Ok(())
    } else {
        Err(ValidationError::new("start_must_precede_end"))
    }
}

/// Validates that a percentage value is within 0-100
pub fn validate_percentage(value: Decimal) -> Result<(), ValidationError> {
    if value >= Decimal::ZERO && value <= Decimal::from(100) {
        Ok(())
    } else {
        Err(ValidationError::new("percentage_out_of_range"))
    }
}

/// Validates that a monetary amount is non-negative
pub fn validate_non_negative_amount(value: Decimal) -> Result<(), ValidationError> {
    if value >= Decimal::ZERO {
        Ok(())
    } else {
        Err(ValidationError::new("amount_must_be_non_negative"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn test_window_start_before_end_is_valid() {
        let now = Utc::now();
        assert!(validate_discount_window(now, now + Duration::hours(1)).is_ok());
    }

    #[test]
    fn test_window_start_equal_to_end_is_invalid() {
        let now = Utc::now();
        assert!(validate_discount_window(now, now).is_err());
    }

    #[test]
    fn test_window_start_after_end_is_invalid() {
        let now = Utc::now();
        assert!(validate_discount_window(now + Duration::hours(1), now).is_err());
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(validate_percentage(dec!(0)).is_ok());
        assert!(validate_percentage(dec!(100)).is_ok());
        assert!(validate_percentage(dec!(100.01)).is_err());
        assert!(validate_percentage(dec!(-1)).is_err());
    }

    #[test]
    fn test_non_negative_amount() {
        assert!(validate_non_negative_amount(dec!(0)).is_ok());
        assert!(validate_non_negative_amount(dec!(5.99)).is_ok());
        assert!(validate_non_negative_amount(dec!(-0.01)).is_err());
    }
}
