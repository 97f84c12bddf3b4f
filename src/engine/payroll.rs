//! One employee's pay for one period.
//!
//! Earnings come first, gross pay is their sum, deductions are keyed on the
//! gross, and net is the difference of the two rounded totals. Raw values are
//! carried unrounded until they are assigned to the breakdown.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use utoipa::ToSchema;

use crate::engine::attendance::AttendanceSummary;
use crate::engine::round_money;
use crate::engine::tax::{ContributionLookup, WithholdingOutcome, contribution_for, withholding_for};
use crate::error::{HrError, HrResult};
use crate::model::payroll::Adjustment;
use crate::model::salary::SalaryConfig;
use crate::model::tax_table::{ContributionScheme, TaxTable};

const MINUTES_PER_HOUR: Decimal = dec!(60);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Earnings {
    #[schema(value_type = String)]
    pub basic_salary: Decimal,
    #[schema(value_type = String)]
    pub overtime_pay: Decimal,
    #[schema(value_type = String)]
    pub night_diff_pay: Decimal,
    #[schema(value_type = String)]
    pub holiday_pay: Decimal,
    #[schema(value_type = String)]
    pub paid_leave_pay: Decimal,
    #[schema(value_type = String)]
    pub allowances: Decimal,
    #[schema(value_type = String)]
    pub adjustments: Decimal,
    #[schema(value_type = String)]
    pub gross_pay: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Deductions {
    #[schema(value_type = String)]
    pub late: Decimal,
    #[schema(value_type = String)]
    pub undertime: Decimal,
    #[schema(value_type = String)]
    pub absence: Decimal,
    #[schema(value_type = String)]
    pub sss: Decimal,
    #[schema(value_type = String)]
    pub philhealth: Decimal,
    #[schema(value_type = String)]
    pub pagibig: Decimal,
    #[schema(value_type = String)]
    pub taxable_income: Decimal,
    #[schema(value_type = String)]
    pub withholding_tax: Decimal,
    /// Loans and other recurring deductions from the salary configuration.
    #[schema(value_type = String)]
    pub fixed: Decimal,
    #[schema(value_type = String)]
    pub total: Decimal,
}

/// Conditions an approver should see before signing a record off.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComputationWarning {
    /// No bracket in `list` covered the amount; zero was used.
    TaxConfigurationMissing { list: String },
    /// No attendance existed for the cutoff and full attendance was assumed.
    AttendanceFallback,
    NegativeNetPay,
}

/// Everything a compute pass produces, snapshotted onto the record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PayrollComputation {
    pub summary: AttendanceSummary,
    #[schema(value_type = String)]
    pub daily_rate: Decimal,
    #[schema(value_type = String)]
    pub hourly_rate: Decimal,
    pub earnings: Earnings,
    pub deductions: Deductions,
    #[schema(value_type = String)]
    pub net_pay: Decimal,
    pub tax_exempt: bool,
    pub tax_table_id: u64,
    pub warnings: Vec<ComputationWarning>,
}

impl PayrollComputation {
    pub fn gross_pay(&self) -> Decimal {
        self.earnings.gross_pay
    }

    pub fn total_deductions(&self) -> Decimal {
        self.deductions.total
    }
}

pub fn validate_adjustments(adjustments: &[Adjustment]) -> HrResult<()> {
    for adjustment in adjustments {
        if adjustment.amount < Decimal::ZERO {
            return Err(HrError::validation(format!(
                "adjustment '{}' cannot be negative",
                adjustment.description
            )));
        }
        if adjustment.description.trim().is_empty() {
            return Err(HrError::validation("adjustments need a description"));
        }
    }
    Ok(())
}

pub struct PayrollComputer<'a> {
    salary: &'a SalaryConfig,
    tax_table: &'a TaxTable,
}

impl<'a> PayrollComputer<'a> {
    pub fn new(salary: &'a SalaryConfig, tax_table: &'a TaxTable) -> Self {
        Self { salary, tax_table }
    }

    /// Deterministic in its inputs: the same summary, salary, adjustments and
    /// table always give the same breakdown.
    pub fn compute(&self, summary: AttendanceSummary, adjustments: &[Adjustment]) -> PayrollComputation {
        let daily = self.salary.daily_rate();
        let hourly = self.salary.hourly_rate();
        let mut warnings = Vec::new();
        if summary.attendance_fallback {
            warnings.push(ComputationWarning::AttendanceFallback);
        }

        let earnings = self.earnings(&summary, adjustments, daily, hourly);
        let deductions = self.deductions(&summary, earnings.gross_pay, daily, hourly, &mut warnings);

        let net_pay = earnings.gross_pay - deductions.total;
        if net_pay < Decimal::ZERO {
            warnings.push(ComputationWarning::NegativeNetPay);
        }

        PayrollComputation {
            summary,
            daily_rate: round_money(daily),
            hourly_rate: round_money(hourly),
            earnings,
            deductions,
            net_pay,
            tax_exempt: self.salary.tax_exempt,
            tax_table_id: self.tax_table.id,
            warnings,
        }
    }

    fn earnings(
        &self,
        summary: &AttendanceSummary,
        adjustments: &[Adjustment],
        daily: Decimal,
        hourly: Decimal,
    ) -> Earnings {
        let m = &self.salary.multipliers;
        let basic = daily * Decimal::from(summary.present_days);
        let overtime = summary.overtime_hours * hourly * m.overtime;
        let night = summary.night_diff_hours * hourly * m.night_differential;
        let holiday = summary.special_holiday_hours * hourly * m.special_holiday
            + summary.regular_holiday_hours * hourly * m.regular_holiday;
        let paid_leave = summary.paid_leave_days * daily;
        let allowances = self.salary.total_allowances();
        let extra: Decimal = adjustments.iter().map(|a| a.amount).sum();

        let mut earnings = Earnings {
            basic_salary: round_money(basic),
            overtime_pay: round_money(overtime),
            night_diff_pay: round_money(night),
            holiday_pay: round_money(holiday),
            paid_leave_pay: round_money(paid_leave),
            allowances: round_money(allowances),
            adjustments: round_money(extra),
            gross_pay: Decimal::ZERO,
        };
        // gross is the sum of the lines as shown, so the breakdown always adds up
        earnings.gross_pay = earnings.basic_salary
            + earnings.overtime_pay
            + earnings.night_diff_pay
            + earnings.holiday_pay
            + earnings.paid_leave_pay
            + earnings.allowances
            + earnings.adjustments;
        earnings
    }

    fn deductions(
        &self,
        summary: &AttendanceSummary,
        gross: Decimal,
        daily: Decimal,
        hourly: Decimal,
        warnings: &mut Vec<ComputationWarning>,
    ) -> Deductions {
        let late = Decimal::from(summary.tardiness_minutes) / MINUTES_PER_HOUR * hourly;
        let undertime = Decimal::from(summary.undertime_minutes) / MINUTES_PER_HOUR * hourly;
        let absence = daily * Decimal::from(summary.absence_days);

        let brackets = &self.tax_table.brackets;
        let mut contributions = [Decimal::ZERO; 3];
        for (slot, scheme) in contributions.iter_mut().zip(ContributionScheme::iter()) {
            let lookup = contribution_for(gross, brackets.contributions(scheme));
            if lookup == ContributionLookup::NoBracket {
                warnings.push(ComputationWarning::TaxConfigurationMissing {
                    list: scheme.to_string(),
                });
            }
            *slot = lookup.amount();
        }
        let [sss, philhealth, pagibig] = contributions;

        let taxable = gross - sss - philhealth - pagibig;
        let withholding = withholding_for(taxable, &brackets.withholding, self.salary.tax_exempt);
        if let WithholdingOutcome::NoBracket = withholding {
            warnings.push(ComputationWarning::TaxConfigurationMissing {
                list: "withholding".to_string(),
            });
        }
        let tax = withholding.amount();
        let fixed = self.salary.total_fixed_deductions();

        let mut deductions = Deductions {
            late: round_money(late),
            undertime: round_money(undertime),
            absence: round_money(absence),
            sss: round_money(sss),
            philhealth: round_money(philhealth),
            pagibig: round_money(pagibig),
            taxable_income: round_money(taxable),
            withholding_tax: round_money(tax),
            fixed: round_money(fixed),
            total: Decimal::ZERO,
        };
        deductions.total = deductions.late
            + deductions.undertime
            + deductions.absence
            + deductions.sss
            + deductions.philhealth
            + deductions.pagibig
            + deductions.withholding_tax
            + deductions.fixed;
        deductions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::payroll::AdjustmentKind;
    use crate::model::salary::{LineItem, Multipliers, RateType};
    use crate::model::tax_table::{ContributionBracket, SalaryRange, TaxBracket, TaxBrackets};
    use chrono::{DateTime, Utc};

    fn salary(daily: Decimal) -> SalaryConfig {
        SalaryConfig {
            employee_id: 7,
            rate_type: RateType::Daily,
            base_rate: daily,
            multipliers: Multipliers::default(),
            allowances: vec![],
            deductions: vec![],
            tax_exempt: false,
            tax_exempt_reason: None,
        }
    }

    fn flat(amount: Decimal) -> Vec<ContributionBracket> {
        vec![ContributionBracket {
            range: SalaryRange::new(dec!(15000), Some(dec!(25000))),
            contribution: amount,
        }]
    }

    fn table(withholding: Vec<TaxBracket>) -> TaxTable {
        TaxTable {
            id: 3,
            name: "test".into(),
            brackets: TaxBrackets {
                sss: flat(dec!(500)),
                philhealth: flat(dec!(500)),
                pagibig: flat(dec!(500)),
                withholding,
            },
            is_active: true,
            created_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    fn zero_rate() -> Vec<TaxBracket> {
        vec![TaxBracket {
            range: SalaryRange::new(dec!(0), Some(dec!(250000))),
            rate: dec!(0),
            fixed_offset: dec!(0),
        }]
    }

    fn present(days: u32) -> AttendanceSummary {
        AttendanceSummary {
            work_days: days,
            present_days: days,
            ..Default::default()
        }
    }

    #[test]
    fn twenty_days_at_one_thousand() {
        let salary = salary(dec!(1000));
        let table = table(zero_rate());
        let result = PayrollComputer::new(&salary, &table).compute(present(20), &[]);

        assert_eq!(result.gross_pay(), dec!(20000));
        assert_eq!(result.total_deductions(), dec!(1500));
        assert_eq!(result.net_pay, dec!(18500));
        assert_eq!(result.deductions.taxable_income, dec!(18500));
        assert!(result.warnings.is_empty());
        assert_eq!(result.tax_table_id, 3);
    }

    #[test]
    fn recomputation_is_identical() {
        let mut salary = salary(dec!(733.33));
        salary.allowances.push(LineItem {
            name: "transport".into(),
            amount: dec!(1000),
        });
        let table = table(zero_rate());
        let summary = AttendanceSummary {
            work_days: 22,
            present_days: 19,
            absence_days: 3,
            tardiness_minutes: 47,
            overtime_hours: dec!(3.25),
            night_diff_hours: dec!(1.5),
            ..Default::default()
        };
        let computer = PayrollComputer::new(&salary, &table);
        let first = computer.compute(summary.clone(), &[]);
        let second = computer.compute(summary, &[]);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn net_is_always_gross_minus_deductions() {
        let salary = salary(dec!(333.333));
        let table = table(zero_rate());
        let summary = AttendanceSummary {
            present_days: 17,
            absence_days: 4,
            tardiness_minutes: 13,
            undertime_minutes: 29,
            ..Default::default()
        };
        let result = PayrollComputer::new(&salary, &table).compute(summary, &[]);
        assert_eq!(result.net_pay, result.gross_pay() - result.total_deductions());
        assert_eq!(result.gross_pay().scale(), 2);
    }

    #[test]
    fn totals_are_the_sum_of_the_rounded_lines() {
        // two lines of 0.005: the raw sum rounds to 0.01, the lines as shown add to 0.02
        let salary = salary(dec!(0.04));
        let table = table(zero_rate());
        let summary = AttendanceSummary {
            tardiness_minutes: 60,
            undertime_minutes: 60,
            ..Default::default()
        };
        let d = PayrollComputer::new(&salary, &table).compute(summary, &[]).deductions;
        assert_eq!(d.late, dec!(0.01));
        assert_eq!(d.undertime, dec!(0.01));
        assert_eq!(
            d.total,
            d.late + d.undertime + d.absence + d.sss + d.philhealth + d.pagibig
                + d.withholding_tax + d.fixed
        );
        assert_eq!(d.total, dec!(0.02));

        let summary = AttendanceSummary {
            present_days: 3,
            overtime_hours: dec!(1),
            night_diff_hours: dec!(1),
            ..Default::default()
        };
        let e = PayrollComputer::new(&self::salary(dec!(333.333)), &table).compute(summary, &[]).earnings;
        assert_eq!(
            e.gross_pay,
            e.basic_salary + e.overtime_pay + e.night_diff_pay + e.holiday_pay
                + e.paid_leave_pay + e.allowances + e.adjustments
        );
    }

    #[test]
    fn premiums_use_the_hourly_rate() {
        let salary = salary(dec!(800));
        let table = table(zero_rate());
        let summary = AttendanceSummary {
            present_days: 1,
            overtime_hours: dec!(2),
            night_diff_hours: dec!(4),
            special_holiday_hours: dec!(8),
            regular_holiday_hours: dec!(8),
            paid_leave_days: dec!(1),
            ..Default::default()
        };
        let earnings = PayrollComputer::new(&salary, &table)
            .compute(summary, &[])
            .earnings;
        // hourly = 100
        assert_eq!(earnings.overtime_pay, dec!(250));
        assert_eq!(earnings.night_diff_pay, dec!(40));
        assert_eq!(earnings.holiday_pay, dec!(2640));
        assert_eq!(earnings.paid_leave_pay, dec!(800));
        assert_eq!(earnings.gross_pay, dec!(4530));
    }

    #[test]
    fn attendance_deductions() {
        let salary = salary(dec!(800));
        let table = table(zero_rate());
        let summary = AttendanceSummary {
            present_days: 20,
            absence_days: 2,
            tardiness_minutes: 30,
            undertime_minutes: 90,
            ..Default::default()
        };
        let deductions = PayrollComputer::new(&salary, &table)
            .compute(summary, &[])
            .deductions;
        assert_eq!(deductions.late, dec!(50));
        assert_eq!(deductions.undertime, dec!(150));
        assert_eq!(deductions.absence, dec!(1600));
    }

    #[test]
    fn withholding_is_keyed_on_income_after_contributions() {
        let salary = salary(dec!(1000));
        let table = table(vec![TaxBracket {
            range: SalaryRange::new(dec!(10000), None),
            rate: dec!(10),
            fixed_offset: dec!(0),
        }]);
        let result = PayrollComputer::new(&salary, &table).compute(present(20), &[]);
        // (18500 - 10000) * 10%
        assert_eq!(result.deductions.withholding_tax, dec!(850));
        assert_eq!(result.net_pay, dec!(17650));
    }

    #[test]
    fn exempt_employee_pays_no_tax_and_raises_no_warning() {
        let mut salary = salary(dec!(1000));
        salary.tax_exempt = true;
        salary.tax_exempt_reason = Some("minimum wage earner".into());
        let table = table(vec![]);
        let result = PayrollComputer::new(&salary, &table).compute(present(20), &[]);
        assert_eq!(result.deductions.withholding_tax, Decimal::ZERO);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn uncovered_amounts_are_flagged_per_list() {
        let salary = salary(dec!(2000));
        let table = table(vec![]);
        // 40000 gross is above every contribution bracket
        let result = PayrollComputer::new(&salary, &table).compute(present(20), &[]);
        assert_eq!(result.deductions.sss, Decimal::ZERO);
        let lists: Vec<_> = result
            .warnings
            .iter()
            .filter_map(|w| match w {
                ComputationWarning::TaxConfigurationMissing { list } => Some(list.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(lists, ["sss", "philhealth", "pagibig", "withholding"]);
    }

    #[test]
    fn fallback_is_carried_as_a_warning() {
        let salary = salary(dec!(1000));
        let table = table(zero_rate());
        let mut summary = present(20);
        summary.attendance_fallback = true;
        let result = PayrollComputer::new(&salary, &table).compute(summary, &[]);
        assert_eq!(result.warnings, [ComputationWarning::AttendanceFallback]);
    }

    #[test]
    fn adjustments_and_fixed_deductions() {
        let mut salary = salary(dec!(1000));
        salary.deductions.push(LineItem {
            name: "salary loan".into(),
            amount: dec!(1200),
        });
        let table = table(zero_rate());
        let bonus = [Adjustment {
            kind: AdjustmentKind::Bonus,
            description: "quarterly".into(),
            amount: dec!(2500),
        }];
        let result = PayrollComputer::new(&salary, &table).compute(present(20), &bonus);
        assert_eq!(result.earnings.adjustments, dec!(2500));
        assert_eq!(result.gross_pay(), dec!(22500));
        assert_eq!(result.deductions.fixed, dec!(1200));
        assert_eq!(result.total_deductions(), dec!(2700));
    }

    #[test]
    fn negative_net_is_reported() {
        let mut salary = salary(dec!(100));
        salary.deductions.push(LineItem {
            name: "cash advance".into(),
            amount: dec!(5000),
        });
        let table = table(zero_rate());
        let result = PayrollComputer::new(&salary, &table).compute(present(1), &[]);
        assert!(result.net_pay < Decimal::ZERO);
        assert!(result.warnings.contains(&ComputationWarning::NegativeNetPay));
    }

    #[test]
    fn negative_adjustment_is_invalid() {
        let refund = [Adjustment {
            kind: AdjustmentKind::Other,
            description: "clawback".into(),
            amount: dec!(-10),
        }];
        assert!(validate_adjustments(&refund).is_err());
    }
}
