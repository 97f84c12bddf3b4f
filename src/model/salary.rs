use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};
use crate::model::parse_column;

/// Paid working days in a month, used to turn a monthly rate into a daily one.
pub const WORKING_DAYS_PER_MONTH: Decimal = dec!(26);
pub const HOURS_PER_DAY: Decimal = dec!(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RateType {
    Hourly,
    Daily,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Multipliers {
    #[schema(value_type = String, example = "1.25")]
    pub overtime: Decimal,
    #[schema(value_type = String, example = "0.10")]
    pub night_differential: Decimal,
    #[schema(value_type = String, example = "1.30")]
    pub special_holiday: Decimal,
    #[schema(value_type = String, example = "2.00")]
    pub regular_holiday: Decimal,
}

impl Default for Multipliers {
    fn default() -> Self {
        Self {
            overtime: dec!(1.25),
            night_differential: dec!(0.10),
            special_holiday: dec!(1.30),
            regular_holiday: dec!(2.00),
        }
    }
}

/// Named recurring amount: an allowance or a fixed deduction such as a loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LineItem {
    pub name: String,
    #[schema(value_type = String, example = "1500.00")]
    pub amount: Decimal,
}

/// Pay basis of one employee. Only one of the three rates is stored; the
/// others are derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalaryConfig {
    pub employee_id: u64,
    pub rate_type: RateType,
    #[schema(value_type = String, example = "1000.00")]
    pub base_rate: Decimal,
    pub multipliers: Multipliers,
    pub allowances: Vec<LineItem>,
    pub deductions: Vec<LineItem>,
    pub tax_exempt: bool,
    pub tax_exempt_reason: Option<String>,
}

impl SalaryConfig {
    pub fn daily_rate(&self) -> Decimal {
        match self.rate_type {
            RateType::Daily => self.base_rate,
            RateType::Monthly => self.base_rate / WORKING_DAYS_PER_MONTH,
            RateType::Hourly => self.base_rate * HOURS_PER_DAY,
        }
    }

    pub fn hourly_rate(&self) -> Decimal {
        match self.rate_type {
            RateType::Hourly => self.base_rate,
            _ => self.daily_rate() / HOURS_PER_DAY,
        }
    }

    pub fn monthly_rate(&self) -> Decimal {
        match self.rate_type {
            RateType::Monthly => self.base_rate,
            _ => self.daily_rate() * WORKING_DAYS_PER_MONTH,
        }
    }

    pub fn total_allowances(&self) -> Decimal {
        self.allowances.iter().map(|a| a.amount).sum()
    }

    pub fn total_fixed_deductions(&self) -> Decimal {
        self.deductions.iter().map(|d| d.amount).sum()
    }

    pub fn validate(&self) -> HrResult<()> {
        if self.base_rate < Decimal::ZERO {
            return Err(HrError::validation("base rate cannot be negative"));
        }
        let m = &self.multipliers;
        if [m.overtime, m.night_differential, m.special_holiday, m.regular_holiday]
            .iter()
            .any(|v| *v < Decimal::ZERO)
        {
            return Err(HrError::validation("multipliers cannot be negative"));
        }
        if let Some(item) = self
            .allowances
            .iter()
            .chain(&self.deductions)
            .find(|i| i.amount < Decimal::ZERO || i.name.trim().is_empty())
        {
            return Err(HrError::validation(format!(
                "line item '{}' needs a name and a non-negative amount",
                item.name
            )));
        }
        let has_reason = self
            .tax_exempt_reason
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if self.tax_exempt && !has_reason {
            return Err(HrError::validation("tax-exempt employees need an exemption reason"));
        }
        Ok(())
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct SalaryConfigRow {
    pub employee_id: u64,
    pub rate_type: String,
    pub base_rate: Decimal,
    pub multipliers: Json<Multipliers>,
    pub allowances: Json<Vec<LineItem>>,
    pub deductions: Json<Vec<LineItem>>,
    pub tax_exempt: bool,
    pub tax_exempt_reason: Option<String>,
}

pub const SALARY_COLUMNS: &str = "employee_id, rate_type, base_rate, multipliers, allowances, \
     deductions, tax_exempt, tax_exempt_reason";

impl TryFrom<SalaryConfigRow> for SalaryConfig {
    type Error = HrError;

    fn try_from(row: SalaryConfigRow) -> HrResult<Self> {
        Ok(SalaryConfig {
            employee_id: row.employee_id,
            rate_type: parse_column("rate_type", &row.rate_type)?,
            base_rate: row.base_rate,
            multipliers: row.multipliers.0,
            allowances: row.allowances.0,
            deductions: row.deductions.0,
            tax_exempt: row.tax_exempt,
            tax_exempt_reason: row.tax_exempt_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selected_columns_are_the_row_fields() {
        let columns: Vec<&str> = SALARY_COLUMNS.split(',').map(str::trim).collect();
        assert_eq!(
            columns,
            [
                "employee_id",
                "rate_type",
                "base_rate",
                "multipliers",
                "allowances",
                "deductions",
                "tax_exempt",
                "tax_exempt_reason"
            ]
        );
    }

    fn config(rate_type: RateType, base_rate: Decimal) -> SalaryConfig {
        SalaryConfig {
            employee_id: 1,
            rate_type,
            base_rate,
            multipliers: Multipliers::default(),
            allowances: vec![],
            deductions: vec![],
            tax_exempt: false,
            tax_exempt_reason: None,
        }
    }

    #[test]
    fn monthly_rate_derives_daily_and_hourly() {
        let salary = config(RateType::Monthly, dec!(26000));
        assert_eq!(salary.daily_rate(), dec!(1000));
        assert_eq!(salary.hourly_rate(), dec!(125));
        assert_eq!(salary.monthly_rate(), dec!(26000));
    }

    #[test]
    fn hourly_rate_derives_upwards() {
        let salary = config(RateType::Hourly, dec!(100));
        assert_eq!(salary.daily_rate(), dec!(800));
        assert_eq!(salary.monthly_rate(), dec!(20800));
    }

    #[test]
    fn exemption_requires_reason() {
        let mut salary = config(RateType::Daily, dec!(500));
        salary.tax_exempt = true;
        assert!(salary.validate().is_err());
        salary.tax_exempt_reason = Some("minimum wage earner".into());
        assert!(salary.validate().is_ok());
    }

    #[test]
    fn negative_allowance_is_rejected() {
        let mut salary = config(RateType::Daily, dec!(500));
        salary.allowances.push(LineItem {
            name: "rice".into(),
            amount: dec!(-1),
        });
        assert!(salary.validate().is_err());
    }
}
