use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter};
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};

/// Inclusive-or-exclusive bounds are decided by the lookup, not the range.
/// `max = None` means unbounded above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalaryRange {
    #[schema(value_type = String, example = "15000.00")]
    pub min: Decimal,
    #[schema(value_type = Option<String>, example = "25000.00")]
    pub max: Option<Decimal>,
}

impl SalaryRange {
    pub fn new(min: Decimal, max: Option<Decimal>) -> Self {
        Self { min, max }
    }

    /// `[min, max]`, both ends included.
    pub fn contains_inclusive(&self, amount: Decimal) -> bool {
        amount >= self.min && self.max.is_none_or(|max| amount <= max)
    }

    /// `(min, max]`, so an amount on a shared edge lands in the lower bracket.
    pub fn contains_upper_inclusive(&self, amount: Decimal) -> bool {
        amount > self.min && self.max.is_none_or(|max| amount <= max)
    }
}

/// Salary range mapped to a flat monthly contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ContributionBracket {
    pub range: SalaryRange,
    #[schema(value_type = String, example = "500.00")]
    pub contribution: Decimal,
}

/// Progressive withholding bracket: `(income - min) * rate% + fixed_offset`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaxBracket {
    pub range: SalaryRange,
    #[schema(value_type = String, example = "15")]
    pub rate: Decimal,
    #[schema(value_type = String, example = "0")]
    pub fixed_offset: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr, EnumIter, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContributionScheme {
    Sss,
    Philhealth,
    Pagibig,
}

/// Every bracket list a payroll run consults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TaxBrackets {
    pub sss: Vec<ContributionBracket>,
    pub philhealth: Vec<ContributionBracket>,
    pub pagibig: Vec<ContributionBracket>,
    pub withholding: Vec<TaxBracket>,
}

impl TaxBrackets {
    pub fn contributions(&self, scheme: ContributionScheme) -> &[ContributionBracket] {
        match scheme {
            ContributionScheme::Sss => &self.sss,
            ContributionScheme::Philhealth => &self.philhealth,
            ContributionScheme::Pagibig => &self.pagibig,
        }
    }

    /// Rejects lists a lookup could not resolve to exactly one bracket.
    pub fn validate(&self) -> HrResult<()> {
        for scheme in ContributionScheme::iter() {
            let brackets = self.contributions(scheme);
            for b in brackets {
                if b.contribution < Decimal::ZERO {
                    return Err(HrError::validation(format!(
                        "{scheme} contribution cannot be negative"
                    )));
                }
            }
            let ranges: Vec<SalaryRange> = brackets.iter().map(|b| b.range).collect();
            // inclusive on both ends, so touching edges would double-match
            check_ranges(scheme.as_ref(), &ranges, true)?;
        }

        for b in &self.withholding {
            if b.rate < Decimal::ZERO || b.rate > Decimal::ONE_HUNDRED {
                return Err(HrError::validation(
                    "withholding rate must be between 0 and 100",
                ));
            }
        }
        let ranges: Vec<SalaryRange> = self.withholding.iter().map(|b| b.range).collect();
        check_ranges("withholding", &ranges, false)
    }
}

fn check_ranges(list: &str, ranges: &[SalaryRange], edges_inclusive: bool) -> HrResult<()> {
    for (idx, range) in ranges.iter().enumerate() {
        if range.min < Decimal::ZERO {
            return Err(HrError::validation(format!(
                "{list} bracket {idx} has a negative minimum"
            )));
        }
        if let Some(max) = range.max {
            if max < range.min {
                return Err(HrError::validation(format!(
                    "{list} bracket {idx} has max below min"
                )));
            }
        }
        if let Some(prev) = idx.checked_sub(1).map(|i| ranges[i]) {
            let Some(prev_max) = prev.max else {
                return Err(HrError::validation(format!(
                    "{list}: only the last bracket may be unbounded"
                )));
            };
            let overlaps = if edges_inclusive {
                range.min <= prev_max
            } else {
                range.min < prev_max
            };
            if overlaps || range.min < prev.min {
                return Err(HrError::validation(format!(
                    "{list} brackets {} and {idx} overlap or are out of order",
                    idx - 1
                )));
            }
        }
    }
    Ok(())
}

/// A stored table version. Only one row is active at a time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaxTable {
    pub id: u64,
    pub name: String,
    pub brackets: TaxBrackets,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TaxTableRow {
    pub id: u64,
    pub name: String,
    pub brackets: Json<TaxBrackets>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<TaxTableRow> for TaxTable {
    fn from(row: TaxTableRow) -> Self {
        TaxTable {
            id: row.id,
            name: row.name,
            brackets: row.brackets.0,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn contribution(min: Decimal, max: Option<Decimal>, amount: Decimal) -> ContributionBracket {
        ContributionBracket {
            range: SalaryRange::new(min, max),
            contribution: amount,
        }
    }

    fn bracket(min: Decimal, max: Option<Decimal>) -> TaxBracket {
        TaxBracket {
            range: SalaryRange::new(min, max),
            rate: dec!(10),
            fixed_offset: Decimal::ZERO,
        }
    }

    #[test]
    fn withholding_brackets_may_share_an_edge() {
        let table = TaxBrackets {
            withholding: vec![bracket(dec!(0), Some(dec!(20000))), bracket(dec!(20000), None)],
            ..Default::default()
        };
        assert!(table.validate().is_ok());
    }

    #[test]
    fn contribution_brackets_may_not_share_an_edge() {
        let table = TaxBrackets {
            sss: vec![
                contribution(dec!(0), Some(dec!(10000)), dec!(100)),
                contribution(dec!(10000), Some(dec!(20000)), dec!(200)),
            ],
            ..Default::default()
        };
        assert!(matches!(table.validate(), Err(HrError::Validation(_))));
    }

    #[test]
    fn unbounded_bracket_must_be_last() {
        let table = TaxBrackets {
            withholding: vec![bracket(dec!(0), None), bracket(dec!(20000), Some(dec!(30000)))],
            ..Default::default()
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn negative_contribution_is_rejected() {
        let table = TaxBrackets {
            pagibig: vec![contribution(dec!(0), None, dec!(-1))],
            ..Default::default()
        };
        assert!(table.validate().is_err());
    }

    #[test]
    fn range_bounds_follow_each_convention() {
        let range = SalaryRange::new(dec!(100), Some(dec!(200)));
        assert!(range.contains_inclusive(dec!(100)));
        assert!(!range.contains_upper_inclusive(dec!(100)));
        assert!(range.contains_inclusive(dec!(200)));
        assert!(range.contains_upper_inclusive(dec!(200)));
    }
}
