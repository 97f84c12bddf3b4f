use crate::api::attendance::{AttendanceListResponse, AttendanceQuery};
use crate::api::employee::{CreateEmployee, EmployeeListResponse, EmployeeQuery};
use crate::api::leave_request::{CreateLeave, LeaveFilter, LeaveListResponse};
use crate::api::payroll::{
    CreatePeriod, PeriodListResponse, PeriodQuery, RecordListResponse, SetAdjustments,
};
use crate::api::payslip::{PayslipListResponse, PayslipQuery};
use crate::api::salary::SalaryPayload;
use crate::api::tax_table::UploadTaxTable;
use crate::api::time_correction::{CorrectionFilter, CorrectionListResponse, CreateTimeCorrection};
use crate::api::{ApproveRequest, RejectRequest};
use crate::engine::approval::{ApprovalAction, ApprovalChain, ApprovalEntry, Workflow};
use crate::engine::attendance::AttendanceSummary;
use crate::engine::leave_ledger::LeaveBalance;
use crate::engine::lifecycle::{
    ComputeAllReport, InitializeReport, PayrollFailure, PayslipReport, RecordWarnings,
};
use crate::engine::payroll::{ComputationWarning, Deductions, Earnings, PayrollComputation};
use crate::model::DateRange;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::employee::Employee;
use crate::model::leave_request::{LeaveRequest, LeaveType};
use crate::model::payroll::{
    Adjustment, AdjustmentKind, HolidayKind, PayrollPeriod, PayrollRecord, PeriodStatus,
    PeriodTotals, RecordStatus, SpecialDay,
};
use crate::model::payslip::{Payslip, PayslipAccess, PayslipAction, PayslipStatus};
use crate::model::role::Role;
use crate::model::salary::{LineItem, Multipliers, RateType, SalaryConfig};
use crate::model::tax_table::{
    ContributionBracket, ContributionScheme, SalaryRange, TaxBracket, TaxBrackets, TaxTable,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "HRM Payroll API",
        version = "1.0.0",
        description = r#"
## HR / Payroll back office

Attendance capture, leave and time-correction approvals, salary and tax
configuration, and the payroll period lifecycle from draft to payroll run.

### Key Features
- **Attendance**: daily check-in and check-out with late, undertime, overtime and night-differential metrics
- **Leave**: multi-level approval chains routed by the submitter's role, annual entitlement with anniversary reset
- **Time corrections**: approved corrections overwrite the day's attendance
- **Payroll**: period lifecycle (`draft` → `pending_computation` → `computation_completed` → `pending_approval` → `approved` → `locked` → `payroll_run`), batch computation with per-employee failure isolation
- **Payslips**: immutable snapshots of approved records with a view/download audit trail

### Security
Every endpoint expects a **JWT Bearer** access token issued by the identity provider.
Role claims decide who may approve what.

### Errors
Errors are JSON: `{"error": "<code>", "message": "..."}`.
"#,
    ),
    paths(
        crate::api::employee::create_employee,
        crate::api::employee::get_employee,
        crate::api::employee::list_employees,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::attendance_list,

        crate::api::leave_request::create_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::pending_approvals,
        crate::api::leave_request::leave_balance,

        crate::api::time_correction::create_correction,
        crate::api::time_correction::approve_correction,
        crate::api::time_correction::reject_correction,
        crate::api::time_correction::get_correction,
        crate::api::time_correction::correction_list,

        crate::api::salary::upsert_salary,
        crate::api::salary::get_salary,

        crate::api::tax_table::upload_tax_table,
        crate::api::tax_table::active_tax_table,
        crate::api::tax_table::list_tax_tables,

        crate::api::payroll::create_period,
        crate::api::payroll::list_periods,
        crate::api::payroll::get_period,
        crate::api::payroll::initialize_period,
        crate::api::payroll::compute_period,
        crate::api::payroll::submit_period,
        crate::api::payroll::approve_period,
        crate::api::payroll::lock_period_handler,
        crate::api::payroll::mark_payroll_run,
        crate::api::payroll::cancel_period,
        crate::api::payroll::generate_payslips,
        crate::api::payroll::list_records,
        crate::api::payroll::get_record,
        crate::api::payroll::set_adjustments,
        crate::api::payroll::approve_record,
        crate::api::payroll::reject_record,

        crate::api::payslip::payslip_list,
        crate::api::payslip::view_payslip,
        crate::api::payslip::download_payslip
    ),
    components(
        schemas(
            Role,
            DateRange,
            ApproveRequest,
            RejectRequest,
            Workflow,
            ApprovalAction,
            ApprovalEntry,
            ApprovalChain,
            CreateEmployee,
            EmployeeQuery,
            Employee,
            EmployeeListResponse,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceQuery,
            AttendanceListResponse,
            LeaveType,
            CreateLeave,
            LeaveFilter,
            LeaveRequest,
            LeaveListResponse,
            LeaveBalance,
            CreateTimeCorrection,
            CorrectionFilter,
            CorrectionListResponse,
            crate::model::time_correction::TimeCorrection,
            RateType,
            Multipliers,
            LineItem,
            SalaryConfig,
            SalaryPayload,
            SalaryRange,
            ContributionBracket,
            ContributionScheme,
            TaxBracket,
            TaxBrackets,
            TaxTable,
            UploadTaxTable,
            HolidayKind,
            SpecialDay,
            PeriodStatus,
            PeriodTotals,
            PayrollPeriod,
            CreatePeriod,
            PeriodQuery,
            PeriodListResponse,
            RecordStatus,
            AdjustmentKind,
            Adjustment,
            SetAdjustments,
            AttendanceSummary,
            Earnings,
            Deductions,
            ComputationWarning,
            PayrollComputation,
            PayrollRecord,
            RecordListResponse,
            InitializeReport,
            PayrollFailure,
            RecordWarnings,
            ComputeAllReport,
            PayslipReport,
            PayslipStatus,
            PayslipAction,
            PayslipAccess,
            Payslip,
            PayslipQuery,
            PayslipListResponse
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Employee", description = "Employee records"),
        (name = "Attendance", description = "Daily check-in and check-out"),
        (name = "Leave", description = "Leave requests, approvals and balances"),
        (name = "TimeCorrection", description = "Attendance correction requests"),
        (name = "Salary", description = "Per-employee pay configuration"),
        (name = "TaxTable", description = "Contribution and withholding brackets"),
        (name = "Payroll", description = "Payroll periods and records"),
        (name = "Payslip", description = "Issued payslips"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
