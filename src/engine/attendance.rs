//! Attendance metrics and period aggregation.
//!
//! [`ShiftSchedule`] turns a check-in/check-out pair into the per-day
//! numbers stored on the attendance row. [`summarize_period`] reduces those
//! rows, approved leave and the period's holidays into the totals payroll
//! consumes.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::engine::round_money;
use crate::error::{HrError, HrResult};
use crate::model::DateRange;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::leave_request::LeaveType;
use crate::model::payroll::{HolidayKind, SpecialDay};

/// Hours credited for a worked holiday regardless of the punches.
pub const HOLIDAY_HOURS: Decimal = dec!(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftSchedule {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub late_grace_minutes: u32,
    pub night_start: NaiveTime,
    pub night_end: NaiveTime,
}

impl Default for ShiftSchedule {
    fn default() -> Self {
        Self {
            start: clock(8, 0),
            end: clock(17, 0),
            late_grace_minutes: 0,
            night_start: clock(22, 0),
            night_end: clock(6, 0),
        }
    }
}

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or_default()
}

/// Numbers derived from one day's punches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DailyMetrics {
    pub total_hours: Decimal,
    pub late_minutes: u32,
    pub undertime_minutes: u32,
    pub overtime_hours: Decimal,
    pub night_diff_hours: Decimal,
}

impl ShiftSchedule {
    fn shift_window(&self, date: NaiveDate) -> (NaiveDateTime, NaiveDateTime) {
        let start = date.and_time(self.start);
        let end = if self.end > self.start {
            date.and_time(self.end)
        } else {
            (date + Duration::days(1)).and_time(self.end)
        };
        (start, end)
    }

    pub fn check_in_status(&self, check_in: NaiveDateTime) -> AttendanceStatus {
        if self.late_minutes(check_in) > 0 {
            AttendanceStatus::Late
        } else {
            AttendanceStatus::Present
        }
    }

    /// Minutes after shift start, or zero while inside the grace period.
    fn late_minutes(&self, check_in: NaiveDateTime) -> u32 {
        let (shift_start, _) = self.shift_window(check_in.date());
        let late = (check_in - shift_start).num_minutes();
        if late > i64::from(self.late_grace_minutes) {
            late as u32
        } else {
            0
        }
    }

    /// An open check-in stays closable until the next shift starts, which
    /// covers night shifts and overtime past midnight but not a check-in left
    /// open from a previous day.
    pub fn can_close(&self, check_in: NaiveDateTime, check_out: NaiveDateTime) -> bool {
        let (next_start, _) = self.shift_window(check_in.date() + Duration::days(1));
        check_out > check_in && check_out < next_start
    }

    pub fn derive(&self, check_in: NaiveDateTime, check_out: NaiveDateTime) -> HrResult<DailyMetrics> {
        if check_out <= check_in {
            return Err(HrError::validation("check-out must be after check-in"));
        }
        let (_, shift_end) = self.shift_window(check_in.date());

        let worked = (check_out - check_in).num_minutes();
        let undertime = (shift_end - check_out).num_minutes().max(0);
        let overtime = (check_out - shift_end).num_minutes().max(0);

        Ok(DailyMetrics {
            total_hours: minutes_to_hours(worked),
            late_minutes: self.late_minutes(check_in),
            undertime_minutes: undertime as u32,
            overtime_hours: minutes_to_hours(overtime),
            night_diff_hours: minutes_to_hours(self.night_minutes(check_in, check_out)),
        })
    }

    /// Overlap with the night windows that could touch the interval: the one
    /// opening the evening before check-in and each one opening after it.
    fn night_minutes(&self, check_in: NaiveDateTime, check_out: NaiveDateTime) -> i64 {
        let mut day = check_in.date() - Duration::days(1);
        let mut total = 0;
        while day <= check_out.date() {
            let open = day.and_time(self.night_start);
            let close = if self.night_end > self.night_start {
                day.and_time(self.night_end)
            } else {
                (day + Duration::days(1)).and_time(self.night_end)
            };
            let from = open.max(check_in);
            let to = close.min(check_out);
            if to > from {
                total += (to - from).num_minutes();
            }
            day += Duration::days(1);
        }
        total
    }
}

fn minutes_to_hours(minutes: i64) -> Decimal {
    round_money(Decimal::from(minutes) / dec!(60))
}

/// What to do when an employee has no attendance rows in the cutoff window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceFallback {
    /// Treat every non-rest day of the pay period as present and flag it.
    #[default]
    AssumeFullAttendance,
    /// Fail the employee's computation with `NoAttendanceData`.
    RequireAttendance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApprovedLeave {
    pub leave_type: LeaveType,
    pub range: DateRange,
}

/// Windows and policy a summary is computed under.
#[derive(Debug, Clone, Copy)]
pub struct AggregationWindow {
    /// Attendance cutoff; may differ from the pay dates.
    pub cutoff: DateRange,
    pub pay_period: DateRange,
    pub rest_day: Weekday,
    pub fallback: AttendanceFallback,
}

/// Period totals for one employee, snapshotted onto the payroll record.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct AttendanceSummary {
    pub work_days: u32,
    pub present_days: u32,
    pub absence_days: u32,
    pub tardiness_minutes: u32,
    pub undertime_minutes: u32,
    #[schema(value_type = String)]
    pub overtime_hours: Decimal,
    #[schema(value_type = String)]
    pub night_diff_hours: Decimal,
    #[schema(value_type = String)]
    pub paid_leave_days: Decimal,
    #[schema(value_type = String)]
    pub unpaid_leave_days: Decimal,
    #[schema(value_type = String)]
    pub sick_leave_days: Decimal,
    #[schema(value_type = String)]
    pub vacation_leave_days: Decimal,
    #[schema(value_type = String)]
    pub special_holiday_hours: Decimal,
    #[schema(value_type = String)]
    pub regular_holiday_hours: Decimal,
    /// Presence was assumed because no attendance existed for the cutoff.
    pub attendance_fallback: bool,
}

pub fn summarize_period(
    employee_id: u64,
    window: &AggregationWindow,
    attendance: &[AttendanceRecord],
    leaves: &[ApprovedLeave],
    holidays: &[SpecialDay],
) -> HrResult<AttendanceSummary> {
    let in_cutoff: BTreeMap<NaiveDate, &AttendanceRecord> = attendance
        .iter()
        .filter(|r| r.employee_id == employee_id && window.cutoff.contains(r.date))
        .map(|r| (r.date, r))
        .collect();

    let mut summary = AttendanceSummary {
        work_days: window.cutoff.working_days(window.rest_day),
        ..Default::default()
    };

    if in_cutoff.is_empty() {
        match window.fallback {
            AttendanceFallback::AssumeFullAttendance => {
                summary.present_days = window.pay_period.working_days(window.rest_day).max(1);
                summary.attendance_fallback = true;
            }
            AttendanceFallback::RequireAttendance => {
                return Err(HrError::NoAttendanceData { employee_id });
            }
        }
    } else {
        for record in in_cutoff.values().filter(|r| r.is_complete()) {
            summary.present_days += 1;
            summary.tardiness_minutes += record.late_minutes;
            summary.undertime_minutes += record.undertime_minutes;
            summary.overtime_hours += record.overtime_hours;
            summary.night_diff_hours += record.night_diff_hours;
        }
        summary.absence_days = summary.work_days.saturating_sub(summary.present_days);
    }

    add_leave(&mut summary, window, leaves);

    for holiday in holidays {
        let worked = in_cutoff
            .get(&holiday.date)
            .is_some_and(|r| r.check_in.is_some());
        if !worked {
            continue;
        }
        match holiday.kind {
            HolidayKind::Special => summary.special_holiday_hours += HOLIDAY_HOURS,
            HolidayKind::Regular => summary.regular_holiday_hours += HOLIDAY_HOURS,
        }
    }

    Ok(summary)
}

/// Leave is counted over the pay period, not the attendance cutoff.
fn add_leave(summary: &mut AttendanceSummary, window: &AggregationWindow, leaves: &[ApprovedLeave]) {
    for leave in leaves {
        let Some(overlap) = leave.range.intersect(&window.pay_period) else {
            continue;
        };
        let days = Decimal::from(overlap.working_days(window.rest_day));
        if leave.leave_type.is_paid() {
            summary.paid_leave_days += days;
        } else {
            summary.unpaid_leave_days += days;
        }
        match leave.leave_type {
            LeaveType::Sick => summary.sick_leave_days += days,
            LeaveType::Vacation => summary.vacation_leave_days += days,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        date(d).and_hms_opt(h, m, 0).unwrap()
    }

    fn range(from: u32, to: u32) -> DateRange {
        DateRange::new(date(from), date(to)).unwrap()
    }

    fn record(d: u32, check_in: (u32, u32), check_out: Option<(u32, u32)>) -> AttendanceRecord {
        let shift = ShiftSchedule::default();
        let check_in = at(d, check_in.0, check_in.1);
        let check_out = check_out.map(|(h, m)| at(d, h, m));
        let metrics = check_out
            .map(|out| shift.derive(check_in, out).unwrap())
            .unwrap_or_default();
        AttendanceRecord {
            id: u64::from(d),
            employee_id: 7,
            date: date(d),
            check_in: Some(check_in),
            check_out,
            status: AttendanceStatus::CheckedOut,
            total_hours: metrics.total_hours,
            late_minutes: metrics.late_minutes,
            undertime_minutes: metrics.undertime_minutes,
            overtime_hours: metrics.overtime_hours,
            night_diff_hours: metrics.night_diff_hours,
        }
    }

    fn window(fallback: AttendanceFallback) -> AggregationWindow {
        // 2026-02-01 is a Sunday
        AggregationWindow {
            cutoff: range(1, 7),
            pay_period: range(1, 14),
            rest_day: Weekday::Sun,
            fallback,
        }
    }


    #[test]
    fn open_check_in_closes_only_before_the_next_shift() {
        let day = ShiftSchedule::default();
        assert!(day.can_close(at(2, 8, 0), at(2, 17, 30)));
        // overtime running past midnight
        assert!(day.can_close(at(2, 8, 0), at(3, 2, 0)));
        // yesterday's forgotten check-in
        assert!(!day.can_close(at(2, 8, 0), at(3, 17, 0)));
        assert!(!day.can_close(at(2, 8, 0), at(2, 7, 0)));

        let night = ShiftSchedule {
            start: clock(22, 0),
            end: clock(6, 0),
            ..ShiftSchedule::default()
        };
        assert!(night.can_close(at(2, 22, 0), at(3, 6, 15)));
        assert!(!night.can_close(at(2, 22, 0), at(3, 23, 0)));
    }
    #[test]
    fn late_check_in_outside_grace() {
        let shift = ShiftSchedule {
            late_grace_minutes: 5,
            ..Default::default()
        };
        assert_eq!(shift.check_in_status(at(2, 8, 5)), AttendanceStatus::Present);
        assert_eq!(shift.check_in_status(at(2, 8, 6)), AttendanceStatus::Late);
        let metrics = shift.derive(at(2, 8, 20), at(2, 17, 0)).unwrap();
        assert_eq!(metrics.late_minutes, 20);
    }

    #[test]
    fn early_leave_and_overtime() {
        let shift = ShiftSchedule::default();
        let early = shift.derive(at(2, 8, 0), at(2, 16, 30)).unwrap();
        assert_eq!(early.undertime_minutes, 30);
        assert_eq!(early.overtime_hours, Decimal::ZERO);
        assert_eq!(early.total_hours, dec!(8.5));

        let long = shift.derive(at(2, 8, 0), at(2, 19, 30)).unwrap();
        assert_eq!(long.undertime_minutes, 0);
        assert_eq!(long.overtime_hours, dec!(2.5));
    }

    #[test]
    fn night_hours_across_midnight() {
        let shift = ShiftSchedule::default();
        let metrics = shift.derive(at(2, 20, 0), at(3, 2, 0)).unwrap();
        assert_eq!(metrics.night_diff_hours, dec!(4));

        let early_morning = shift.derive(at(3, 4, 0), at(3, 9, 0)).unwrap();
        assert_eq!(early_morning.night_diff_hours, dec!(2));
    }

    #[test]
    fn check_out_before_check_in_is_invalid() {
        let shift = ShiftSchedule::default();
        assert!(shift.derive(at(2, 9, 0), at(2, 8, 0)).is_err());
    }

    #[test]
    fn present_only_when_checked_out() {
        let attendance = vec![
            record(2, (8, 10), Some((17, 0))),
            record(3, (8, 0), Some((19, 0))),
            record(4, (8, 0), None),
        ];
        let summary = summarize_period(7, &window(AttendanceFallback::default()), &attendance, &[], &[])
            .unwrap();

        assert_eq!(summary.work_days, 6);
        assert_eq!(summary.present_days, 2);
        assert_eq!(summary.absence_days, 4);
        assert_eq!(summary.tardiness_minutes, 10);
        assert_eq!(summary.overtime_hours, dec!(2));
        assert!(!summary.attendance_fallback);
    }

    #[test]
    fn attendance_outside_cutoff_is_ignored() {
        let attendance = vec![record(10, (8, 0), Some((17, 0)))];
        let summary = summarize_period(
            7,
            &window(AttendanceFallback::AssumeFullAttendance),
            &attendance,
            &[],
            &[],
        )
        .unwrap();
        assert!(summary.attendance_fallback);
    }

    #[test]
    fn fallback_assumes_full_pay_period() {
        let summary = summarize_period(7, &window(AttendanceFallback::AssumeFullAttendance), &[], &[], &[])
            .unwrap();
        // Feb 1-14 holds two Sundays
        assert_eq!(summary.present_days, 12);
        assert_eq!(summary.absence_days, 0);
        assert!(summary.attendance_fallback);
    }

    #[test]
    fn fallback_never_reports_zero_presence() {
        let mut only_sunday = window(AttendanceFallback::AssumeFullAttendance);
        only_sunday.pay_period = range(1, 1);
        let summary = summarize_period(7, &only_sunday, &[], &[], &[]).unwrap();
        assert_eq!(summary.present_days, 1);
    }

    #[test]
    fn strict_policy_reports_missing_attendance() {
        let result = summarize_period(7, &window(AttendanceFallback::RequireAttendance), &[], &[], &[]);
        assert!(matches!(result, Err(HrError::NoAttendanceData { employee_id: 7 })));
    }

    #[test]
    fn leave_is_split_by_type_and_clipped_to_pay_period() {
        let leaves = vec![
            ApprovedLeave {
                leave_type: LeaveType::Sick,
                range: range(2, 3),
            },
            ApprovedLeave {
                leave_type: LeaveType::Vacation,
                range: range(13, 20),
            },
            ApprovedLeave {
                leave_type: LeaveType::Unpaid,
                range: range(5, 5),
            },
        ];
        let summary = summarize_period(7, &window(AttendanceFallback::default()), &[], &leaves, &[])
            .unwrap();

        assert_eq!(summary.sick_leave_days, dec!(2));
        // 13th and 14th fall inside the period
        assert_eq!(summary.vacation_leave_days, dec!(2));
        assert_eq!(summary.paid_leave_days, dec!(4));
        assert_eq!(summary.unpaid_leave_days, dec!(1));
    }

    #[test]
    fn worked_holidays_credit_fixed_hours() {
        let attendance = vec![
            record(2, (8, 0), Some((12, 0))),
            record(3, (8, 0), Some((17, 0))),
        ];
        let holidays = vec![
            SpecialDay {
                date: date(2),
                kind: HolidayKind::Regular,
                name: "Founders Day".into(),
            },
            SpecialDay {
                date: date(3),
                kind: HolidayKind::Special,
                name: "Local holiday".into(),
            },
            SpecialDay {
                date: date(4),
                kind: HolidayKind::Special,
                name: "Not worked".into(),
            },
        ];
        let summary =
            summarize_period(7, &window(AttendanceFallback::default()), &attendance, &[], &holidays)
                .unwrap();
        assert_eq!(summary.regular_holiday_hours, HOLIDAY_HOURS);
        assert_eq!(summary.special_holiday_hours, HOLIDAY_HOURS);
    }
}
