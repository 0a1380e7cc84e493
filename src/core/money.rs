use crate::core::error::ValidationError;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tolerance used for every monetary comparison in the ledger.
///
/// Balances whose magnitude falls below this value are treated as settled
/// and removed; split totals may deviate from the expense total by at most
/// this much.
pub const EPSILON: Decimal = dec!(0.01);

/// True when `amount` is too small to be a real balance (`|amount| < ε`).
pub fn is_negligible(amount: Decimal) -> bool {
    amount.abs() < EPSILON
}

/// True when `a` and `b` differ by no more than `ε`.
///
/// Values too far apart to subtract are never equal.
pub fn approx_eq(a: Decimal, b: Decimal) -> bool {
    a.checked_sub(b).map_or(false, |diff| diff.abs() <= EPSILON)
}

/// Sum `values`, failing instead of overflowing.
pub fn checked_sum<'a>(values: impl IntoIterator<Item = &'a Decimal>) -> Result<Decimal, ValidationError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(*v))
        .ok_or(ValidationError::AmountOverflow)
}

/// Balance after adding `delta` to `current`; negligible results become zero.
pub(crate) fn next_balance(current: Decimal, delta: Decimal) -> Result<Decimal, ValidationError> {
    let next = current
        .checked_add(delta)
        .ok_or(ValidationError::AmountOverflow)?;
    Ok(if is_negligible(next) { Decimal::ZERO } else { next })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negligible() {
        assert!(is_negligible(dec!(0.009)));
        assert!(is_negligible(dec!(-0.0099)));
        assert!(!is_negligible(dec!(0.01)));
        assert!(!is_negligible(dec!(-5)));
    }

    #[test]
    fn test_approx_eq() {
        assert!(approx_eq(dec!(100), dec!(99.99)));
        assert!(approx_eq(dec!(33.333333), dec!(33.33)));
        assert!(!approx_eq(dec!(100), dec!(99.98)));
        assert!(!approx_eq(Decimal::MAX, Decimal::MIN));
    }

    #[test]
    fn test_checked_sum_overflow() {
        assert_eq!(checked_sum(&[dec!(1.5), dec!(2.5)]), Ok(dec!(4)));
        assert_eq!(
            checked_sum(&[Decimal::MAX, Decimal::MAX]),
            Err(ValidationError::AmountOverflow)
        );
    }

    #[test]
    fn test_next_balance() {
        assert_eq!(next_balance(dec!(50), dec!(-49.995)), Ok(Decimal::ZERO));
        assert_eq!(next_balance(dec!(-20), dec!(5)), Ok(dec!(-15)));
        assert_eq!(
            next_balance(Decimal::MAX, dec!(1)),
            Err(ValidationError::AmountOverflow)
        );
    }
}
