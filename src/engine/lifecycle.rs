//! Payroll period state machine and the batch operations it gates.
//!
//! Every function here takes the period and its records by reference,
//! checks the guard, mutates in memory and reports. Persisting the result
//! with an optimistic status check is the caller's job.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc, Weekday};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::engine::approval::{Actor, ApprovalChain, ChainOutcome, Workflow};
use crate::engine::attendance::{AggregationWindow, ApprovedLeave, AttendanceFallback, summarize_period};
use crate::engine::payroll::{
    ComputationWarning, PayrollComputation, PayrollComputer, validate_adjustments,
};
use crate::error::{HrError, HrResult};
use crate::model::DateRange;
use crate::model::attendance::AttendanceRecord;
use crate::model::payroll::{
    Adjustment, PayrollPeriod, PayrollRecord, PeriodStatus, PeriodTotals, RecordStatus, SpecialDay,
};
use crate::model::payslip::NewPayslip;
use crate::model::salary::SalaryConfig;
use crate::model::tax_table::TaxTable;

use PeriodStatus::*;

const TRANSITIONS: &[(PeriodStatus, &[PeriodStatus])] = &[
    (Draft, &[PendingComputation, Cancelled]),
    (PendingComputation, &[ComputationCompleted, Cancelled]),
    (ComputationCompleted, &[PendingApproval, PendingComputation, Cancelled]),
    (PendingApproval, &[Approved, ComputationCompleted, Cancelled]),
    (Approved, &[Locked, Cancelled]),
    (Locked, &[PayrollRun]),
    (PayrollRun, &[]),
    (Cancelled, &[]),
];

pub fn can_transition(from: PeriodStatus, to: PeriodStatus) -> bool {
    TRANSITIONS
        .iter()
        .find(|(state, _)| *state == from)
        .is_some_and(|(_, next)| next.contains(&to))
}

pub fn transition(period: &mut PayrollPeriod, to: PeriodStatus) -> HrResult<()> {
    if !can_transition(period.status, to) {
        return Err(HrError::InvalidTransition {
            from: period.status.to_string(),
            to: to.to_string(),
        });
    }
    period.status = to;
    Ok(())
}

/// Guard for anything that writes to a record of `period`.
pub fn ensure_mutable(period: &PayrollPeriod) -> HrResult<()> {
    if period.is_locked() {
        return Err(HrError::PeriodLocked {
            period_id: period.id,
        });
    }
    Ok(())
}

/// Fields a new period is created from.
#[derive(Debug, Clone)]
pub struct NewPeriod {
    pub name: String,
    pub range: DateRange,
    pub cutoff: DateRange,
    pub pay_date: Option<NaiveDate>,
    pub special_days: Vec<SpecialDay>,
}

/// Checks a new period against itself and every period already on file.
pub fn validate_new_period(new: &NewPeriod, existing: &[PayrollPeriod]) -> HrResult<()> {
    if new.name.trim().is_empty() {
        return Err(HrError::validation("period name is required"));
    }
    if let Some(pay_date) = new.pay_date {
        if pay_date < new.range.start {
            return Err(HrError::validation("pay date cannot precede the period start"));
        }
    }
    let mut seen = HashSet::new();
    for day in &new.special_days {
        if !new.range.contains(day.date) && !new.cutoff.contains(day.date) {
            return Err(HrError::validation(format!(
                "holiday {} falls outside the period",
                day.date
            )));
        }
        if !seen.insert(day.date) {
            return Err(HrError::validation(format!("holiday {} is declared twice", day.date)));
        }
    }
    if let Some(clash) = existing
        .iter()
        .find(|p| p.status != Cancelled && p.range.overlaps(&new.range))
    {
        return Err(HrError::OverlappingPeriod {
            existing_id: clash.id,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InitializeReport {
    pub period_id: u64,
    pub records_created: u32,
    /// Nobody eligible: the period exists but there is nothing to compute.
    pub no_employee_data: bool,
}

/// Plans one draft record per eligible employee and opens the period for
/// computation. `eligible` are active employees with a salary configuration.
pub fn initialize(
    period: &mut PayrollPeriod,
    eligible: &[u64],
) -> HrResult<(Vec<PayrollRecord>, InitializeReport)> {
    transition(period, PendingComputation)?;

    let unique: HashSet<u64> = eligible.iter().copied().collect();
    let mut ids: Vec<u64> = unique.into_iter().collect();
    ids.sort_unstable();
    let records: Vec<PayrollRecord> = ids
        .into_iter()
        .map(|employee_id| PayrollRecord::draft(period.id, employee_id))
        .collect();

    period.totals = PeriodTotals {
        employee_count: records.len() as u32,
        ..Default::default()
    };
    let report = InitializeReport {
        period_id: period.id,
        records_created: records.len() as u32,
        no_employee_data: records.is_empty(),
    };
    if report.no_employee_data {
        warn!(period_id = period.id, "payroll period initialized without employee data");
    }
    Ok((records, report))
}

/// Everything compute-all reads, loaded up front by the caller.
#[derive(Debug, Default)]
pub struct PeriodInputs {
    pub salaries: HashMap<u64, SalaryConfig>,
    pub attendance: HashMap<u64, Vec<AttendanceRecord>>,
    pub leaves: HashMap<u64, Vec<ApprovedLeave>>,
}

#[derive(Debug, Clone, Copy)]
pub struct ComputePolicy {
    pub rest_day: Weekday,
    pub fallback: AttendanceFallback,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayrollFailure {
    pub employee_id: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecordWarnings {
    pub employee_id: u64,
    pub warnings: Vec<ComputationWarning>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ComputeAllReport {
    pub period_id: u64,
    pub computed: u32,
    /// Records already approved and left alone.
    pub skipped: u32,
    pub failed: u32,
    pub failures: Vec<PayrollFailure>,
    pub fallback_employees: Vec<u64>,
    pub warnings: Vec<RecordWarnings>,
    pub totals: PeriodTotals,
    /// Ids of records whose row must be rewritten.
    #[serde(skip)]
    pub touched: Vec<u64>,
}

fn compute_one(
    period: &PayrollPeriod,
    record: &PayrollRecord,
    inputs: &PeriodInputs,
    tax_table: &TaxTable,
    policy: ComputePolicy,
) -> HrResult<PayrollComputation> {
    let employee_id = record.employee_id;
    let salary = inputs
        .salaries
        .get(&employee_id)
        .ok_or(HrError::SalaryConfigMissing { employee_id })?;
    salary.validate()?;

    let window = AggregationWindow {
        cutoff: period.cutoff,
        pay_period: period.range,
        rest_day: policy.rest_day,
        fallback: policy.fallback,
    };
    let summary = summarize_period(
        employee_id,
        &window,
        inputs.attendance.get(&employee_id).map_or(&[], Vec::as_slice),
        inputs.leaves.get(&employee_id).map_or(&[], Vec::as_slice),
        &period.special_days,
    )?;

    Ok(PayrollComputer::new(salary, tax_table).compute(summary, &record.adjustments))
}

/// Sequential pass over the period's records. One employee failing never
/// aborts the batch: the failure is logged, counted and the record is left
/// in draft.
pub fn compute_all(
    period: &mut PayrollPeriod,
    records: &mut [PayrollRecord],
    inputs: &PeriodInputs,
    tax_table: &TaxTable,
    policy: ComputePolicy,
    actor: Actor,
    at: DateTime<Utc>,
) -> HrResult<ComputeAllReport> {
    ensure_mutable(period)?;
    match period.status {
        PendingComputation => transition(period, ComputationCompleted)?,
        ComputationCompleted => {}
        other => {
            return Err(HrError::InvalidTransition {
                from: other.to_string(),
                to: ComputationCompleted.to_string(),
            });
        }
    }
    // fails up front for roles that may not put a record up for approval
    let chain = ApprovalChain::new(Workflow::PayrollRecord, actor)?;

    let mut report = ComputeAllReport {
        period_id: period.id,
        computed: 0,
        skipped: 0,
        failed: 0,
        failures: Vec::new(),
        fallback_employees: Vec::new(),
        warnings: Vec::new(),
        totals: PeriodTotals::default(),
        touched: Vec::new(),
    };

    for record in records.iter_mut() {
        if !record.status.is_computable() {
            report.skipped += 1;
            continue;
        }
        report.touched.push(record.id);

        match compute_one(period, record, inputs, tax_table, policy) {
            Ok(computation) => {
                if computation.summary.attendance_fallback {
                    report.fallback_employees.push(record.employee_id);
                }
                if !computation.warnings.is_empty() {
                    warn!(
                        period_id = period.id,
                        employee_id = record.employee_id,
                        warnings = ?computation.warnings,
                        "payroll computed with warnings"
                    );
                    report.warnings.push(RecordWarnings {
                        employee_id: record.employee_id,
                        warnings: computation.warnings.clone(),
                    });
                }
                record.gross_pay = computation.gross_pay();
                record.total_deductions = computation.total_deductions();
                record.net_pay = computation.net_pay;
                record.computation = Some(computation);
                record.status = RecordStatus::Computed;
                record.chain = Some(chain.clone());
                record.computed_at = Some(at);
                report.computed += 1;
            }
            Err(e) => {
                warn!(
                    period_id = period.id,
                    employee_id = record.employee_id,
                    error = %e,
                    "payroll computation failed"
                );
                record.reset_to_draft();
                report.failures.push(PayrollFailure {
                    employee_id: record.employee_id,
                    reason: e.to_string(),
                });
                report.failed += 1;
            }
        }
    }

    period.totals = totals(records, report.failed);
    report.totals = period.totals.clone();
    info!(
        period_id = period.id,
        computed = report.computed,
        failed = report.failed,
        skipped = report.skipped,
        "payroll compute-all finished"
    );
    Ok(report)
}

/// Aggregates over every record that currently holds figures.
fn totals(records: &[PayrollRecord], failed: u32) -> PeriodTotals {
    let mut totals = PeriodTotals {
        employee_count: records.len() as u32,
        failed_count: failed,
        ..Default::default()
    };
    for record in records.iter().filter(|r| r.computation.is_some()) {
        totals.computed_count += 1;
        totals.gross_pay += record.gross_pay;
        totals.total_deductions += record.total_deductions;
        totals.net_pay += record.net_pay;
    }
    totals
}

pub fn submit_for_approval(period: &mut PayrollPeriod, records: &[PayrollRecord]) -> HrResult<()> {
    if period.status == ComputationCompleted
        && !records.iter().any(|r| r.status == RecordStatus::Computed || r.status.is_approved())
    {
        return Err(HrError::validation("no computed records to submit"));
    }
    transition(period, PendingApproval)
}

fn ensure_reviewable(period: &PayrollPeriod, record: &PayrollRecord) -> HrResult<()> {
    ensure_mutable(period)?;
    if record.period_id != period.id {
        return Err(HrError::NotFound("payroll record"));
    }
    if period.status != PendingApproval {
        return Err(HrError::InvalidTransition {
            from: period.status.to_string(),
            to: "record review".to_string(),
        });
    }
    if record.status != RecordStatus::Computed {
        return Err(HrError::AlreadyFinalized {
            status: record.status.to_string(),
        });
    }
    Ok(())
}

fn chain_of(record: &mut PayrollRecord) -> HrResult<&mut ApprovalChain> {
    let id = record.id;
    record
        .chain
        .as_mut()
        .ok_or_else(|| HrError::Corrupt(format!("computed payroll record {id} has no approval chain")))
}

pub fn approve_record(
    period: &PayrollPeriod,
    record: &mut PayrollRecord,
    actor: Actor,
    comment: Option<String>,
    at: DateTime<Utc>,
) -> HrResult<ChainOutcome> {
    ensure_reviewable(period, record)?;
    let outcome = chain_of(record)?.approve(actor, comment, at)?;
    if outcome == ChainOutcome::Finalized {
        record.status = RecordStatus::Approved;
    }
    Ok(outcome)
}

/// Rejects a record back to the computing team. The period drops back to
/// `computation_completed` so the record can be recomputed.
pub fn reject_record(
    period: &mut PayrollPeriod,
    record: &mut PayrollRecord,
    actor: Actor,
    reason: &str,
    at: DateTime<Utc>,
) -> HrResult<()> {
    ensure_reviewable(period, record)?;
    chain_of(record)?.reject(actor, reason, at)?;
    record.status = RecordStatus::Rejected;
    transition(period, ComputationCompleted)
}

fn ensure_all_approved(records: &[PayrollRecord]) -> HrResult<()> {
    let pending = records.iter().filter(|r| !r.status.is_approved()).count();
    if pending > 0 {
        return Err(HrError::RecordsNotApproved { pending });
    }
    Ok(())
}

pub fn approve_period(period: &mut PayrollPeriod, records: &[PayrollRecord]) -> HrResult<()> {
    if period.status == PendingApproval {
        ensure_all_approved(records)?;
    }
    transition(period, Approved)
}

/// One-way. Afterwards no record in the period may change.
pub fn lock(period: &mut PayrollPeriod, records: &mut [PayrollRecord]) -> HrResult<()> {
    if period.status == Approved {
        ensure_all_approved(records)?;
    }
    transition(period, Locked)?;
    for record in records.iter_mut() {
        record.status = RecordStatus::Locked;
    }
    Ok(())
}

pub fn mark_payroll_run(period: &mut PayrollPeriod, at: DateTime<Utc>) -> HrResult<()> {
    transition(period, PayrollRun)?;
    period.paid_at = Some(at);
    Ok(())
}

pub fn cancel(period: &mut PayrollPeriod) -> HrResult<()> {
    ensure_mutable(period)?;
    transition(period, Cancelled)
}

/// Replaces a record's one-off adjustments; its figures are stale
/// afterwards, so it goes back to draft.
pub fn set_adjustments(
    period: &PayrollPeriod,
    record: &mut PayrollRecord,
    adjustments: Vec<Adjustment>,
) -> HrResult<()> {
    ensure_mutable(period)?;
    if !record.status.is_computable() {
        return Err(HrError::AlreadyFinalized {
            status: record.status.to_string(),
        });
    }
    validate_adjustments(&adjustments)?;
    record.adjustments = adjustments;
    record.reset_to_draft();
    Ok(())
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PayslipReport {
    pub period_id: u64,
    pub generated: u32,
    pub skipped: u32,
}

/// Payslips for approved records that do not have one yet. Running it twice
/// generates nothing the second time.
pub fn plan_payslips(
    period: &PayrollPeriod,
    records: &[PayrollRecord],
    already_issued: &HashSet<u64>,
) -> HrResult<(Vec<NewPayslip>, PayslipReport)> {
    if matches!(period.status, Draft | Cancelled) {
        return Err(HrError::InvalidTransition {
            from: period.status.to_string(),
            to: "payslip generation".to_string(),
        });
    }
    let mut planned = Vec::new();
    let mut skipped = 0;
    for record in records.iter().filter(|r| r.status.is_approved()) {
        if already_issued.contains(&record.id) {
            skipped += 1;
            continue;
        }
        planned.push(NewPayslip::from_record(record)?);
    }
    let report = PayslipReport {
        period_id: period.id,
        generated: planned.len() as u32,
        skipped,
    };
    Ok((planned, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::approval::ChainStatus;
    use crate::model::payroll::HolidayKind;
    use crate::model::role::Role;
    use crate::model::salary::{Multipliers, RateType};
    use crate::model::tax_table::{ContributionBracket, SalaryRange, TaxBracket, TaxBrackets};
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    fn range(from: u32, to: u32) -> DateRange {
        DateRange::new(date(from), date(to)).unwrap()
    }

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_772_000_000, 0).unwrap()
    }

    fn hr() -> Actor {
        Actor {
            user_id: 50,
            role: Role::Hr,
        }
    }

    fn admin() -> Actor {
        Actor {
            user_id: 60,
            role: Role::Admin,
        }
    }

    fn period(status: PeriodStatus) -> PayrollPeriod {
        PayrollPeriod {
            id: 1,
            name: "Feb 1-14".into(),
            range: range(1, 14),
            cutoff: range(1, 14),
            pay_date: Some(date(15)),
            special_days: vec![],
            status,
            totals: PeriodTotals::default(),
            created_by: 50,
            paid_at: None,
            created_at: now(),
            version: 0,
        }
    }

    fn record(id: u64, employee_id: u64) -> PayrollRecord {
        let mut record = PayrollRecord::draft(1, employee_id);
        record.id = id;
        record
    }

    fn salary(employee_id: u64) -> SalaryConfig {
        SalaryConfig {
            employee_id,
            rate_type: RateType::Daily,
            base_rate: dec!(1000),
            multipliers: Multipliers::default(),
            allowances: vec![],
            deductions: vec![],
            tax_exempt: false,
            tax_exempt_reason: None,
        }
    }

    fn tax_table() -> TaxTable {
        let flat = vec![ContributionBracket {
            range: SalaryRange::new(dec!(0), None),
            contribution: dec!(100),
        }];
        TaxTable {
            id: 9,
            name: "2026".into(),
            brackets: TaxBrackets {
                sss: flat.clone(),
                philhealth: flat.clone(),
                pagibig: flat,
                withholding: vec![TaxBracket {
                    range: SalaryRange::new(dec!(0), None),
                    rate: dec!(0),
                    fixed_offset: dec!(0),
                }],
            },
            is_active: true,
            created_at: now(),
        }
    }

    fn policy() -> ComputePolicy {
        ComputePolicy {
            rest_day: Weekday::Sun,
            fallback: AttendanceFallback::AssumeFullAttendance,
        }
    }

    fn computed_period() -> (PayrollPeriod, Vec<PayrollRecord>) {
        let mut period = period(PendingComputation);
        let mut records = vec![record(1, 101), record(2, 102)];
        let inputs = PeriodInputs {
            salaries: [(101, salary(101)), (102, salary(102))].into(),
            ..Default::default()
        };
        compute_all(&mut period, &mut records, &inputs, &tax_table(), policy(), hr(), now()).unwrap();
        (period, records)
    }

    #[test]
    fn adjacency_table_is_closed() {
        assert!(can_transition(Draft, PendingComputation));
        assert!(can_transition(PendingApproval, ComputationCompleted));
        assert!(!can_transition(Draft, Approved));
        assert!(!can_transition(Locked, Cancelled));
        assert!(!can_transition(PayrollRun, Locked));
        assert!(!can_transition(Cancelled, Draft));
    }

    #[test]
    fn illegal_transition_is_named() {
        let mut p = period(Draft);
        let err = transition(&mut p, Locked).unwrap_err();
        assert!(matches!(err, HrError::InvalidTransition { .. }));
        assert_eq!(p.status, Draft);
    }

    #[test]
    fn overlapping_periods_are_refused_unless_cancelled() {
        let new = NewPeriod {
            name: "Feb 10-24".into(),
            range: range(10, 24),
            cutoff: range(8, 22),
            pay_date: None,
            special_days: vec![],
        };
        let existing = vec![period(Draft)];
        assert!(matches!(
            validate_new_period(&new, &existing),
            Err(HrError::OverlappingPeriod { existing_id: 1 })
        ));
        let cancelled = vec![period(Cancelled)];
        assert!(validate_new_period(&new, &cancelled).is_ok());
    }

    #[test]
    fn holidays_must_sit_inside_the_period() {
        let new = NewPeriod {
            name: "Feb".into(),
            range: range(1, 14),
            cutoff: range(1, 14),
            pay_date: None,
            special_days: vec![SpecialDay {
                date: date(20),
                kind: HolidayKind::Regular,
                name: "late".into(),
            }],
        };
        assert!(validate_new_period(&new, &[]).is_err());
    }

    #[test]
    fn initialize_without_employees_is_reported_not_fatal() {
        let mut p = period(Draft);
        let (records, report) = initialize(&mut p, &[]).unwrap();
        assert!(records.is_empty());
        assert!(report.no_employee_data);
        assert_eq!(p.status, PendingComputation);
    }

    #[test]
    fn initialize_plans_one_draft_per_employee() {
        let mut p = period(Draft);
        let (records, report) = initialize(&mut p, &[7, 3, 7]).unwrap();
        assert_eq!(report.records_created, 2);
        assert_eq!(records.iter().map(|r| r.employee_id).collect::<Vec<_>>(), [3, 7]);
        assert!(records.iter().all(|r| r.status == RecordStatus::Draft));
        assert_eq!(p.totals.employee_count, 2);
    }

    #[test]
    fn one_bad_employee_does_not_abort_the_batch() {
        let mut p = period(PendingComputation);
        let mut records = vec![record(1, 101), record(2, 102), record(3, 103)];
        let inputs = PeriodInputs {
            salaries: [(101, salary(101)), (103, salary(103))].into(),
            ..Default::default()
        };
        let report =
            compute_all(&mut p, &mut records, &inputs, &tax_table(), policy(), hr(), now()).unwrap();

        assert_eq!(report.computed, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failures[0].employee_id, 102);
        assert_eq!(records[1].status, RecordStatus::Draft);
        assert_eq!(p.status, ComputationCompleted);

        // 12 working days at 1000, 300 in contributions each
        assert_eq!(p.totals.computed_count, 2);
        assert_eq!(p.totals.failed_count, 1);
        assert_eq!(p.totals.gross_pay, dec!(24000));
        assert_eq!(p.totals.total_deductions, dec!(600));
        assert_eq!(p.totals.net_pay, dec!(23400));
        assert_eq!(report.fallback_employees, [101, 103]);
    }

    #[test]
    fn strict_attendance_policy_fails_only_that_employee() {
        let mut p = period(PendingComputation);
        let mut records = vec![record(1, 101)];
        let inputs = PeriodInputs {
            salaries: [(101, salary(101))].into(),
            ..Default::default()
        };
        let strict = ComputePolicy {
            fallback: AttendanceFallback::RequireAttendance,
            ..policy()
        };
        let report = compute_all(&mut p, &mut records, &inputs, &tax_table(), strict, hr(), now()).unwrap();
        assert_eq!(report.failed, 1);
        assert!(report.failures[0].reason.contains("attendance"));
    }

    #[test]
    fn only_hr_and_admin_can_run_payroll() {
        let mut p = period(PendingComputation);
        let clerk = Actor {
            user_id: 5,
            role: Role::Employee,
        };
        let result = compute_all(&mut p, &mut [], &PeriodInputs::default(), &tax_table(), policy(), clerk, now());
        assert!(matches!(result, Err(HrError::NoApprovalRoute { .. })));
    }

    #[test]
    fn recompute_is_idempotent() {
        let (mut p, mut records) = computed_period();
        let before: Vec<_> = records.iter().map(|r| r.computation.clone()).collect();
        let inputs = PeriodInputs {
            salaries: [(101, salary(101)), (102, salary(102))].into(),
            ..Default::default()
        };
        compute_all(&mut p, &mut records, &inputs, &tax_table(), policy(), hr(), now()).unwrap();
        let after: Vec<_> = records.iter().map(|r| r.computation.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn full_cycle_to_payroll_run() {
        let (mut p, mut records) = computed_period();
        submit_for_approval(&mut p, &records).unwrap();
        assert_eq!(p.status, PendingApproval);

        for record in records.iter_mut() {
            let outcome = approve_record(&p, record, admin(), None, now()).unwrap();
            assert_eq!(outcome, ChainOutcome::Finalized);
            assert_eq!(record.status, RecordStatus::Approved);
        }
        approve_period(&mut p, &records).unwrap();
        lock(&mut p, &mut records).unwrap();
        assert!(records.iter().all(|r| r.status == RecordStatus::Locked));

        mark_payroll_run(&mut p, now()).unwrap();
        assert_eq!(p.status, PayrollRun);
        assert_eq!(p.paid_at, Some(now()));
    }

    #[test]
    fn computing_officer_cannot_approve_their_own_run() {
        let (mut p, mut records) = computed_period();
        submit_for_approval(&mut p, &records).unwrap();
        let own = Actor {
            user_id: 50,
            role: Role::Admin,
        };
        assert!(matches!(
            approve_record(&p, &mut records[0], own, None, now()),
            Err(HrError::SelfApproval)
        ));
    }

    #[test]
    fn period_approval_needs_every_record() {
        let (mut p, mut records) = computed_period();
        submit_for_approval(&mut p, &records).unwrap();
        approve_record(&p, &mut records[0], admin(), None, now()).unwrap();
        assert!(matches!(
            approve_period(&mut p, &records),
            Err(HrError::RecordsNotApproved { pending: 1 })
        ));
        assert_eq!(p.status, PendingApproval);
    }

    #[test]
    fn lock_refuses_unapproved_records() {
        let (mut p, mut records) = computed_period();
        p.status = Approved;
        assert!(matches!(
            lock(&mut p, &mut records),
            Err(HrError::RecordsNotApproved { pending: 2 })
        ));
        assert_eq!(p.status, Approved);
    }

    #[test]
    fn rejected_record_goes_back_for_recompute() {
        let (mut p, mut records) = computed_period();
        submit_for_approval(&mut p, &records).unwrap();
        reject_record(&mut p, &mut records[0], admin(), "wrong overtime", now()).unwrap();
        assert_eq!(records[0].status, RecordStatus::Rejected);
        assert_eq!(
            records[0].chain.as_ref().map(|c| c.status),
            Some(ChainStatus::Rejected)
        );
        assert_eq!(p.status, ComputationCompleted);

        let inputs = PeriodInputs {
            salaries: [(101, salary(101)), (102, salary(102))].into(),
            ..Default::default()
        };
        let report =
            compute_all(&mut p, &mut records, &inputs, &tax_table(), policy(), hr(), now()).unwrap();
        assert_eq!(report.computed, 2);
        assert_eq!(records[0].status, RecordStatus::Computed);
        assert_eq!(records[0].chain.as_ref().map(|c| c.status), Some(ChainStatus::Pending));
    }

    #[test]
    fn locked_period_rejects_every_write() {
        let mut p = period(Locked);
        let mut rec = record(1, 101);
        assert!(matches!(cancel(&mut p), Err(HrError::PeriodLocked { period_id: 1 })));
        assert!(matches!(
            set_adjustments(&p, &mut rec, vec![]),
            Err(HrError::PeriodLocked { .. })
        ));
        assert!(matches!(
            compute_all(&mut p, &mut [rec], &PeriodInputs::default(), &tax_table(), policy(), hr(), now()),
            Err(HrError::PeriodLocked { .. })
        ));
    }

    #[test]
    fn approved_period_can_still_be_cancelled() {
        let mut p = period(Approved);
        cancel(&mut p).unwrap();
        assert_eq!(p.status, Cancelled);
    }

    #[test]
    fn payslip_generation_is_idempotent() {
        let (mut p, mut records) = computed_period();
        submit_for_approval(&mut p, &records).unwrap();
        approve_record(&p, &mut records[0], admin(), None, now()).unwrap();

        let (first, report) = plan_payslips(&p, &records, &HashSet::new()).unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(first[0].payslip_number, "PS-1-101");

        let issued: HashSet<u64> = first.iter().map(|s| s.payroll_record_id).collect();
        let (second, report) = plan_payslips(&p, &records, &issued).unwrap();
        assert!(second.is_empty());
        assert_eq!(report.skipped, 1);
    }
}
