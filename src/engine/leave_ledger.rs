//! Annual leave entitlement with a lazy anniversary reset.
//!
//! The reset is applied on every balance-affecting read, so a balance that
//! has sat untouched past its anniversary is refreshed before it is checked
//! or debited.

use chrono::{Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};

pub const DEFAULT_ENTITLEMENT_DAYS: u32 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct LeaveBalance {
    #[schema(value_type = String, example = "15")]
    pub days: Decimal,
    #[schema(value_type = String, format = "date")]
    pub reset_date: NaiveDate,
}

#[derive(Debug, Clone, Copy)]
pub struct LeaveLedger {
    entitlement: Decimal,
}

impl Default for LeaveLedger {
    fn default() -> Self {
        Self::new(Decimal::from(DEFAULT_ENTITLEMENT_DAYS))
    }
}

impl LeaveLedger {
    pub fn new(entitlement: Decimal) -> Self {
        Self { entitlement }
    }

    /// Restores the entitlement if the anniversary has been reached and moves
    /// the anniversary past `today`. Returns whether a reset happened.
    pub fn refresh(&self, balance: &mut LeaveBalance, today: NaiveDate) -> bool {
        if today < balance.reset_date {
            return false;
        }
        balance.days = self.entitlement;
        while balance.reset_date <= today {
            match balance.reset_date.checked_add_months(Months::new(12)) {
                Some(next) => balance.reset_date = next,
                None => break,
            }
        }
        true
    }

    /// Submission-time check. Nothing is deducted here.
    pub fn ensure_available(
        &self,
        balance: &mut LeaveBalance,
        requested: Decimal,
        today: NaiveDate,
    ) -> HrResult<()> {
        if requested <= Decimal::ZERO {
            return Err(HrError::validation("requested leave must cover at least one working day"));
        }
        self.refresh(balance, today);
        if requested > balance.days {
            return Err(HrError::InsufficientLeaveBalance {
                requested,
                available: balance.days,
            });
        }
        Ok(())
    }

    /// Deducts on terminal approval only; callers hang this off
    /// `ChainOutcome::Finalized`.
    pub fn debit(&self, balance: &mut LeaveBalance, days: Decimal, today: NaiveDate) -> HrResult<()> {
        self.ensure_available(balance, days, today)?;
        balance.days -= days;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::approval::{Actor, ApprovalChain, ChainOutcome, Workflow};
    use crate::model::role::Role;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn balance(days: Decimal, reset: NaiveDate) -> LeaveBalance {
        LeaveBalance {
            days,
            reset_date: reset,
        }
    }

    #[test]
    fn no_reset_before_anniversary() {
        let ledger = LeaveLedger::default();
        let mut bal = balance(dec!(3), date(2026, 6, 1));
        assert!(!ledger.refresh(&mut bal, date(2026, 5, 31)));
        assert_eq!(bal.days, dec!(3));
    }

    #[test]
    fn reset_on_anniversary_advances_one_year() {
        let ledger = LeaveLedger::default();
        let mut bal = balance(dec!(3), date(2026, 6, 1));
        assert!(ledger.refresh(&mut bal, date(2026, 6, 1)));
        assert_eq!(bal.days, dec!(15));
        assert_eq!(bal.reset_date, date(2027, 6, 1));
    }

    #[test]
    fn stale_anniversary_lands_in_the_future() {
        let ledger = LeaveLedger::new(dec!(10));
        let mut bal = balance(dec!(0), date(2023, 3, 15));
        ledger.refresh(&mut bal, date(2026, 4, 1));
        assert_eq!(bal.days, dec!(10));
        assert_eq!(bal.reset_date, date(2027, 3, 15));
    }

    #[test]
    fn leap_day_anniversary_clamps() {
        let ledger = LeaveLedger::default();
        let mut bal = balance(dec!(1), date(2024, 2, 29));
        ledger.refresh(&mut bal, date(2024, 3, 1));
        assert_eq!(bal.reset_date, date(2025, 2, 28));
    }

    #[test]
    fn submission_over_balance_is_rejected() {
        let ledger = LeaveLedger::default();
        let mut bal = balance(dec!(2), date(2027, 1, 1));
        let err = ledger
            .ensure_available(&mut bal, dec!(3), date(2026, 5, 1))
            .unwrap_err();
        assert!(matches!(err, HrError::InsufficientLeaveBalance { .. }));
    }

    #[test]
    fn lazy_reset_happens_before_the_balance_check() {
        let ledger = LeaveLedger::default();
        let mut bal = balance(dec!(0), date(2026, 1, 1));
        ledger
            .ensure_available(&mut bal, dec!(5), date(2026, 1, 2))
            .unwrap();
        assert_eq!(bal.days, dec!(15));
    }

    #[test]
    fn debit_happens_once_across_a_two_step_chain() {
        let ledger = LeaveLedger::default();
        let mut bal = balance(dec!(15), date(2027, 1, 1));
        let today = date(2026, 3, 2);
        let at = DateTime::<Utc>::from_timestamp(1_772_409_600, 0).unwrap();
        let mut chain = ApprovalChain::new(
            Workflow::Leave,
            Actor {
                user_id: 1,
                role: Role::Employee,
            },
        )
        .unwrap();

        let approvers = [(2, Role::Supervisor), (3, Role::Manager), (4, Role::Hr)];
        for (user_id, role) in approvers {
            if let Ok(ChainOutcome::Finalized) = chain.approve(Actor { user_id, role }, None, at) {
                ledger.debit(&mut bal, dec!(3), today).unwrap();
            }
        }
        assert_eq!(bal.days, dec!(12));
    }
}
