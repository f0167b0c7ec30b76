mod rules;

pub use rules::{amount_violation, decimal_from_f64};

use rust_decimal::Decimal;

use crate::invoice::InvoiceError;

/// Checks every amount in order and reports the first offending index.
pub fn validate_amounts<I>(amounts: I) -> Result<(), InvoiceError>
where
    I: IntoIterator<Item = Decimal>,
{
    let mut seen = 0;
    for (index, amount) in amounts.into_iter().enumerate() {
        if let Some(reason) = amount_violation(amount) {
            return Err(InvoiceError::InvalidAmount { index, reason });
        }
        seen += 1;
    }
    if seen == 0 {
        return Err(InvoiceError::Empty);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_bad_index_is_reported() {
        let amounts = [Decimal::ONE, Decimal::new(-1, 0), Decimal::new(-2, 0)];
        assert_eq!(
            validate_amounts(amounts),
            Err(InvoiceError::InvalidAmount {
                index: 1,
                reason: "amount is negative"
            })
        );
    }

    #[test]
    fn zero_and_negative_zero_are_allowed() {
        assert_eq!(validate_amounts([Decimal::ZERO, -Decimal::ZERO]), Ok(()));
    }

    #[test]
    fn sub_quark_precision_is_rejected() {
        let err = validate_amounts([Decimal::new(1, 6)]).unwrap_err();
        assert_eq!(
            err,
            InvoiceError::InvalidAmount {
                index: 0,
                reason: "amount is finer than one quark"
            }
        );
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(validate_amounts(Vec::new()), Err(InvoiceError::Empty));
    }

    #[test]
    fn floats_parse_exactly() {
        assert_eq!(decimal_from_f64(0.1), Ok(Decimal::new(1, 1)));
        assert_eq!(decimal_from_f64(2.0), Ok(Decimal::new(2, 0)));
        assert!(decimal_from_f64(f64::NAN).is_err());
        assert!(decimal_from_f64(f64::INFINITY).is_err());
    }
}
