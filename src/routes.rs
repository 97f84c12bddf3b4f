use crate::{
    api::{attendance, employee, leave_request, payroll, payslip, salary, tax_table, time_correction},
    auth::middleware::auth_middleware,
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use anyhow::{Result, anyhow};
use std::sync::Arc;

type Limiter = Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>;

/// Rate limiters shared by every worker, so the budget is per process and
/// not per worker thread.
#[derive(Clone)]
pub struct Limiters {
    protected: Limiter,
    write: Limiter,
}

impl Limiters {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
            write: Arc::new(build_limiter(config.rate_write_per_min)?),
        })
    }
}

fn build_limiter(requests_per_min: u32) -> Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow!("invalid rate limit of {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(
                web::scope("/employees")
                    // /employees
                    .service(
                        web::resource("")
                            .route(web::post().to(employee::create_employee))
                            .route(web::get().to(employee::list_employees)),
                    )
                    // /employees/{id}
                    .service(web::resource("/{id}").route(web::get().to(employee::get_employee))),
            )
            .service(
                web::scope("/attendance")
                    .service(web::resource("").route(web::get().to(attendance::attendance_list)))
                    .service(
                        web::resource("/check-in")
                            .wrap(limiters.write.clone())
                            .route(web::post().to(attendance::check_in)),
                    )
                    .service(
                        web::resource("/check-out")
                            .wrap(limiters.write.clone())
                            .route(web::post().to(attendance::check_out)),
                    ),
            )
            .service(
                web::scope("/leave")
                    // /leave
                    .service(
                        web::resource("")
                            .route(web::get().to(leave_request::leave_list))
                            .route(web::post().to(leave_request::create_leave)),
                    )
                    .service(
                        web::resource("/balance").route(web::get().to(leave_request::leave_balance)),
                    )
                    .service(
                        web::resource("/pending-approvals")
                            .route(web::get().to(leave_request::pending_approvals)),
                    )
                    // /leave/{id}
                    .service(web::resource("/{id}").route(web::get().to(leave_request::get_leave)))
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(leave_request::approve_leave)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(leave_request::reject_leave)),
                    ),
            )
            .service(
                web::scope("/time-corrections")
                    .service(
                        web::resource("")
                            .route(web::get().to(time_correction::correction_list))
                            .route(web::post().to(time_correction::create_correction)),
                    )
                    .service(
                        web::resource("/{id}").route(web::get().to(time_correction::get_correction)),
                    )
                    .service(
                        web::resource("/{id}/approve")
                            .route(web::put().to(time_correction::approve_correction)),
                    )
                    .service(
                        web::resource("/{id}/reject")
                            .route(web::put().to(time_correction::reject_correction)),
                    ),
            )
            .service(
                web::scope("/salary").service(
                    web::resource("/{employee_id}")
                        .route(web::get().to(salary::get_salary))
                        .route(web::put().to(salary::upsert_salary)),
                ),
            )
            .service(
                web::scope("/tax-tables")
                    .service(
                        web::resource("")
                            .route(web::get().to(tax_table::list_tax_tables))
                            .route(web::post().to(tax_table::upload_tax_table)),
                    )
                    .service(
                        web::resource("/active").route(web::get().to(tax_table::active_tax_table)),
                    ),
            )
            .service(
                web::scope("/payroll")
                    // /payroll/periods
                    .service(
                        web::resource("/periods")
                            .route(web::get().to(payroll::list_periods))
                            .route(web::post().to(payroll::create_period)),
                    )
                    .service(
                        web::resource("/periods/{id}").route(web::get().to(payroll::get_period)),
                    )
                    .service(
                        web::resource("/periods/{id}/initialize")
                            .route(web::post().to(payroll::initialize_period)),
                    )
                    .service(
                        web::resource("/periods/{id}/compute")
                            .route(web::post().to(payroll::compute_period)),
                    )
                    .service(
                        web::resource("/periods/{id}/submit")
                            .route(web::post().to(payroll::submit_period)),
                    )
                    .service(
                        web::resource("/periods/{id}/approve")
                            .route(web::post().to(payroll::approve_period)),
                    )
                    .service(
                        web::resource("/periods/{id}/lock")
                            .route(web::post().to(payroll::lock_period_handler)),
                    )
                    .service(
                        web::resource("/periods/{id}/payroll-run")
                            .route(web::post().to(payroll::mark_payroll_run)),
                    )
                    .service(
                        web::resource("/periods/{id}/cancel")
                            .route(web::post().to(payroll::cancel_period)),
                    )
                    .service(
                        web::resource("/periods/{id}/payslips")
                            .route(web::post().to(payroll::generate_payslips)),
                    )
                    .service(
                        web::resource("/periods/{id}/records")
                            .route(web::get().to(payroll::list_records)),
                    )
                    // /payroll/records/{record_id}
                    .service(
                        web::resource("/records/{record_id}")
                            .route(web::get().to(payroll::get_record)),
                    )
                    .service(
                        web::resource("/records/{record_id}/adjustments")
                            .route(web::put().to(payroll::set_adjustments)),
                    )
                    .service(
                        web::resource("/records/{record_id}/approve")
                            .route(web::put().to(payroll::approve_record)),
                    )
                    .service(
                        web::resource("/records/{record_id}/reject")
                            .route(web::put().to(payroll::reject_record)),
                    ),
            )
            .service(
                web::scope("/payslips")
                    .service(web::resource("").route(web::get().to(payslip::payslip_list)))
                    .service(web::resource("/{id}").route(web::get().to(payslip::view_payslip)))
                    .service(
                        web::resource("/{id}/download")
                            .route(web::get().to(payslip::download_payslip)),
                    ),
            ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_still_builds_a_limiter() {
        assert!(build_limiter(0).is_ok());
        assert!(build_limiter(120).is_ok());
    }
}
