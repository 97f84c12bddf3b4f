//! Bracket lookups for government contributions and withholding tax.
//!
//! Lookups never fail. A missing bracket yields zero, but the outcome keeps
//! "nothing configured for this amount" apart from "legitimately nothing
//! owed" so the caller can flag the record instead of quietly paying out.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::model::tax_table::{ContributionBracket, TaxBracket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum ContributionLookup {
    Matched(Decimal),
    NoBracket,
}

impl ContributionLookup {
    pub fn amount(self) -> Decimal {
        match self {
            ContributionLookup::Matched(amount) => amount,
            ContributionLookup::NoBracket => Decimal::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum WithholdingOutcome {
    /// Employee is flagged exempt; brackets were not consulted.
    Exempt,
    /// Taxable income is zero or below, nothing to withhold.
    NonPositiveIncome,
    Taxed(Decimal),
    /// No bracket covers the income: the table is incomplete.
    NoBracket,
}

impl WithholdingOutcome {
    pub fn amount(self) -> Decimal {
        match self {
            WithholdingOutcome::Taxed(amount) => amount,
            _ => Decimal::ZERO,
        }
    }

    pub fn is_missing_configuration(self) -> bool {
        self == WithholdingOutcome::NoBracket
    }
}

/// Flat contribution of the single bracket whose `[min, max]` holds `amount`.
pub fn contribution_for(amount: Decimal, brackets: &[ContributionBracket]) -> ContributionLookup {
    brackets
        .iter()
        .find(|b| b.range.contains_inclusive(amount))
        .map_or(ContributionLookup::NoBracket, |b| {
            ContributionLookup::Matched(b.contribution)
        })
}

/// Withholding on `taxable_income` using the bracket with `min < income <= max`.
pub fn withholding_for(
    taxable_income: Decimal,
    brackets: &[TaxBracket],
    tax_exempt: bool,
) -> WithholdingOutcome {
    if tax_exempt {
        return WithholdingOutcome::Exempt;
    }
    if taxable_income <= Decimal::ZERO {
        return WithholdingOutcome::NonPositiveIncome;
    }

    let Some(bracket) = brackets
        .iter()
        .find(|b| b.range.contains_upper_inclusive(taxable_income))
    else {
        return WithholdingOutcome::NoBracket;
    };

    let excess = taxable_income - bracket.range.min;
    let tax = excess * bracket.rate / Decimal::ONE_HUNDRED + bracket.fixed_offset;
    WithholdingOutcome::Taxed(tax.max(Decimal::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tax_table::SalaryRange;
    use rust_decimal_macros::dec;

    fn contributions() -> Vec<ContributionBracket> {
        vec![
            ContributionBracket {
                range: SalaryRange::new(dec!(0), Some(dec!(14999.99))),
                contribution: dec!(300),
            },
            ContributionBracket {
                range: SalaryRange::new(dec!(15000), Some(dec!(25000))),
                contribution: dec!(500),
            },
        ]
    }

    fn progressive() -> Vec<TaxBracket> {
        vec![
            TaxBracket {
                range: SalaryRange::new(dec!(0), Some(dec!(20833))),
                rate: dec!(0),
                fixed_offset: dec!(0),
            },
            TaxBracket {
                range: SalaryRange::new(dec!(20833), Some(dec!(33332))),
                rate: dec!(15),
                fixed_offset: dec!(0),
            },
            TaxBracket {
                range: SalaryRange::new(dec!(33332), None),
                rate: dec!(20),
                fixed_offset: dec!(1875),
            },
        ]
    }

    #[test]
    fn contribution_bounds_are_inclusive() {
        let table = contributions();
        assert_eq!(contribution_for(dec!(15000), &table), ContributionLookup::Matched(dec!(500)));
        assert_eq!(contribution_for(dec!(25000), &table), ContributionLookup::Matched(dec!(500)));
        assert_eq!(contribution_for(dec!(0), &table), ContributionLookup::Matched(dec!(300)));
    }

    #[test]
    fn contribution_outside_every_bracket_is_flagged() {
        let lookup = contribution_for(dec!(30000), &contributions());
        assert_eq!(lookup, ContributionLookup::NoBracket);
        assert_eq!(lookup.amount(), Decimal::ZERO);
    }

    #[test]
    fn boundary_income_resolves_to_the_lower_bracket_only() {
        let table = progressive();
        // 20833 sits on the edge of the first two brackets
        assert_eq!(withholding_for(dec!(20833), &table, false), WithholdingOutcome::Taxed(dec!(0)));
        assert_eq!(
            withholding_for(dec!(20834), &table, false),
            WithholdingOutcome::Taxed(dec!(0.15))
        );
        let at_edge: Vec<_> = table
            .iter()
            .filter(|b| b.range.contains_upper_inclusive(dec!(33332)))
            .collect();
        assert_eq!(at_edge.len(), 1);
    }

    #[test]
    fn top_bracket_applies_offset() {
        let tax = withholding_for(dec!(43332), &progressive(), false);
        assert_eq!(tax, WithholdingOutcome::Taxed(dec!(3875)));
    }

    #[test]
    fn negative_formula_result_is_clamped() {
        let table = vec![TaxBracket {
            range: SalaryRange::new(dec!(0), None),
            rate: dec!(10),
            fixed_offset: dec!(-500),
        }];
        assert_eq!(withholding_for(dec!(1000), &table, false), WithholdingOutcome::Taxed(dec!(0)));
    }

    #[test]
    fn exemption_bypasses_brackets() {
        assert_eq!(withholding_for(dec!(50000), &[], true), WithholdingOutcome::Exempt);
        assert!(!WithholdingOutcome::Exempt.is_missing_configuration());
    }

    #[test]
    fn missing_brackets_differ_from_exemption() {
        let outcome = withholding_for(dec!(50000), &[], false);
        assert_eq!(outcome, WithholdingOutcome::NoBracket);
        assert!(outcome.is_missing_configuration());
        assert_eq!(outcome.amount(), Decimal::ZERO);
    }

    #[test]
    fn zero_income_is_not_a_configuration_gap() {
        assert_eq!(
            withholding_for(Decimal::ZERO, &progressive(), false),
            WithholdingOutcome::NonPositiveIncome
        );
    }
}
