use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::{NaiveTime, Weekday};
use rust_decimal::Decimal;

use crate::engine::attendance::{AttendanceFallback, ShiftSchedule};
use crate::engine::leave_ledger::{DEFAULT_ENTITLEMENT_DAYS, LeaveLedger};
use crate::engine::lifecycle::ComputePolicy;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub api_prefix: String,
    pub log_level: tracing::Level,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_write_per_min: u32,

    // HR policy
    pub rest_day: Weekday,
    pub attendance_fallback: AttendanceFallback,
    pub leave_entitlement: Decimal,
    pub shift: ShiftSchedule,
    pub tax_table_ttl: Duration,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = var_or(name, default);
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("{name}='{raw}' is invalid: {e}"))
}

fn parse_clock(name: &str, default: &str) -> Result<NaiveTime> {
    let raw = var_or(name, default);
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("{name}='{raw}' must be HH:MM"))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let shift = ShiftSchedule {
            start: parse_clock("SHIFT_START", "08:00")?,
            end: parse_clock("SHIFT_END", "17:00")?,
            late_grace_minutes: parse_var("LATE_GRACE_MINUTES", "0")?,
            night_start: parse_clock("NIGHT_START", "22:00")?,
            night_end: parse_clock("NIGHT_END", "06:00")?,
        };

        Ok(Self {
            server_addr: env::var("SERVER_ADDR").context("SERVER_ADDR must be set")?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            jwt_secret: env::var("JWT_SECRET").context("JWT_SECRET must be set")?,
            api_prefix: var_or("API_PREFIX", "/api"),
            log_level: parse_var("LOG_LEVEL", "debug")?,

            rate_protected_per_min: parse_var("RATE_PROTECTED_PER_MIN", "1000")?,
            rate_write_per_min: parse_var("RATE_WRITE_PER_MIN", "120")?,

            rest_day: parse_var::<Weekday>("REST_DAY", "sunday")
                .map_err(|_| anyhow!("REST_DAY must name a weekday"))?,
            attendance_fallback: parse_var("ATTENDANCE_FALLBACK", "assume_full_attendance")?,
            leave_entitlement: parse_var(
                "DEFAULT_LEAVE_ENTITLEMENT",
                &DEFAULT_ENTITLEMENT_DAYS.to_string(),
            )?,
            shift,
            tax_table_ttl: Duration::from_secs(parse_var("TAX_TABLE_CACHE_SECS", "300")?),
        })
    }

    pub fn leave_ledger(&self) -> LeaveLedger {
        LeaveLedger::new(self.leave_entitlement)
    }

    pub fn compute_policy(&self) -> ComputePolicy {
        ComputePolicy {
            rest_day: self.rest_day,
            fallback: self.attendance_fallback,
        }
    }
}

#[cfg(test)]
impl Config {
    /// Defaults without touching the process environment.
    pub fn for_tests() -> Self {
        Self {
            database_url: "mysql://localhost/hrm_test".into(),
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            api_prefix: "/api".into(),
            log_level: tracing::Level::DEBUG,
            rate_protected_per_min: 1000,
            rate_write_per_min: 120,
            rest_day: Weekday::Sun,
            attendance_fallback: AttendanceFallback::default(),
            leave_entitlement: Decimal::from(DEFAULT_ENTITLEMENT_DAYS),
            shift: ShiftSchedule::default(),
            tax_table_ttl: Duration::from_secs(300),
        }
    }
}
