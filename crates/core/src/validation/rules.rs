use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{to_quarks, KIN_SCALE};

/// Returns why `amount` cannot appear on an invoice, if it cannot.
pub fn amount_violation(amount: Decimal) -> Option<&'static str> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Some("amount is negative");
    }
    if to_quarks(amount).is_none() {
        if amount.normalize().scale() > KIN_SCALE {
            return Some("amount is finer than one quark");
        }
        return Some("amount exceeds the ledger's range");
    }
    None
}

/// Parses a floating-point amount through its shortest decimal rendering, so
/// that `0.1` becomes exactly `0.1`, then rounds to whole quarks to drop
/// float noise such as `0.1 + 0.2`.
pub fn decimal_from_f64(value: f64) -> Result<Decimal, &'static str> {
    if !value.is_finite() {
        return Err("amount is not finite");
    }
    let amount = value
        .to_string()
        .parse::<Decimal>()
        .map_err(|_| "amount exceeds the ledger's range")?;
    Ok(amount.round_dp_with_strategy(KIN_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_noise_rounds_to_whole_quarks() {
        assert_eq!(decimal_from_f64(0.1 + 0.2), Ok(Decimal::new(3, 1)));
        assert_eq!(decimal_from_f64(1.1 * 3.0), Ok(Decimal::new(33, 1)));
        assert_eq!(decimal_from_f64(0.000005), Ok(Decimal::new(1, 5)));
    }

    #[test]
    fn decimal_amounts_keep_the_strict_quark_rule() {
        assert_eq!(amount_violation(Decimal::new(3, 1)), None);
        assert_eq!(
            amount_violation(Decimal::new(1, 6)),
            Some("amount is finer than one quark")
        );
        assert_eq!(amount_violation(Decimal::new(-1, 0)), Some("amount is negative"));
    }
}
