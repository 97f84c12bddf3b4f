//! Pure HR core: no I/O, no clock reads. Handlers load rows, call in here and
//! persist whatever comes back.

pub mod approval;
pub mod attendance;
pub mod leave_ledger;
pub mod lifecycle;
pub mod payroll;
pub mod tax;

use rust_decimal::{Decimal, RoundingStrategy};

/// Two decimal places, half away from zero. Applied only when a value is
/// assigned to a record, never to intermediate sums.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(dec!(2.345)), dec!(2.35));
        assert_eq!(round_money(dec!(-2.345)), dec!(-2.35));
        assert_eq!(round_money(dec!(2.344)), dec!(2.34));
    }
}
