//! Generic multi-step approval chain.
//!
//! Who approves what is one declarative table keyed by workflow and the
//! submitter's role. Leave, time corrections and payroll records are all
//! instances of the same [`ApprovalChain`]; they differ only in their row of
//! [`approval_route`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

use crate::error::{HrError, HrResult};
use crate::model::parse_column;
use crate::model::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Workflow {
    Leave,
    TimeCorrection,
    PayrollRecord,
}

use Role::{Admin, Employee, Hr, Manager, Supervisor};

const LEAVE_ROUTES: &[(Role, &[Role])] = &[
    (Employee, &[Supervisor, Manager]),
    (Supervisor, &[Manager, Hr]),
    (Manager, &[Hr]),
    (Hr, &[Admin]),
    (Admin, &[Admin]),
];

const TIME_CORRECTION_ROUTES: &[(Role, &[Role])] = &[
    (Employee, &[Supervisor, Hr]),
    (Supervisor, &[Manager, Hr]),
    (Manager, &[Hr]),
    (Hr, &[Admin]),
    (Admin, &[Admin]),
];

const PAYROLL_RECORD_ROUTES: &[(Role, &[Role])] = &[(Hr, &[Admin]), (Admin, &[Admin])];

/// Ordered approver roles for a request; its length is the chain depth.
pub fn approval_route(workflow: Workflow, submitter: Role) -> Option<&'static [Role]> {
    let table = match workflow {
        Workflow::Leave => LEAVE_ROUTES,
        Workflow::TimeCorrection => TIME_CORRECTION_ROUTES,
        Workflow::PayrollRecord => PAYROLL_RECORD_ROUTES,
    };
    table
        .iter()
        .find(|(role, _)| *role == submitter)
        .map(|(_, route)| *route)
}

/// `(submitter_role, current_level)` pairs at which `approver` is the role due
/// to act, so open requests awaiting them can be selected without loading the
/// chains.
pub fn due_slots(workflow: Workflow, approver: Role) -> Vec<(Role, u8)> {
    Role::iter()
        .filter_map(|submitter| approval_route(workflow, submitter).map(|route| (submitter, route)))
        .flat_map(|(submitter, route)| {
            route
                .iter()
                .enumerate()
                .filter(move |(_, role)| **role == approver)
                .map(move |(level, _)| (submitter, level as u8))
        })
        .collect()
}

/// Chain status as stored and sent over the wire: `pending`,
/// `approved_by_<role>`, `approved` or `rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChainStatus {
    Pending,
    ApprovedBy(Role),
    Approved,
    Rejected,
}

impl ChainStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChainStatus::Approved | ChainStatus::Rejected)
    }
}

impl fmt::Display for ChainStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainStatus::Pending => f.write_str("pending"),
            ChainStatus::ApprovedBy(role) => write!(f, "approved_by_{role}"),
            ChainStatus::Approved => f.write_str("approved"),
            ChainStatus::Rejected => f.write_str("rejected"),
        }
    }
}

impl FromStr for ChainStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ChainStatus::Pending),
            "approved" => Ok(ChainStatus::Approved),
            "rejected" => Ok(ChainStatus::Rejected),
            other => other
                .strip_prefix("approved_by_")
                .and_then(|role| Role::from_str(role).ok())
                .map(ChainStatus::ApprovedBy)
                .ok_or_else(|| format!("unknown approval status '{other}'")),
        }
    }
}

impl From<ChainStatus> for String {
    fn from(status: ChainStatus) -> Self {
        status.to_string()
    }
}

impl TryFrom<String> for ChainStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalAction {
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ApprovalEntry {
    pub approver_id: u64,
    pub role: Role,
    pub action: ApprovalAction,
    pub comment: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub at: DateTime<Utc>,
}

/// Whoever is acting on a chain, as reported by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: u64,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// More approvals are needed; `next` is the role due to act.
    Advanced { next: Role },
    /// Terminal approval. Side effects hang off this, and it happens once.
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ApprovalChain {
    pub workflow: Workflow,
    pub submitter_id: u64,
    pub submitter_role: Role,
    #[schema(value_type = String, example = "approved_by_supervisor")]
    pub status: ChainStatus,
    pub approvals: Vec<ApprovalEntry>,
    pub current_level: u8,
    pub required_levels: u8,
}

impl ApprovalChain {
    /// Depth is fixed here from the submitter's role and never recomputed.
    pub fn new(workflow: Workflow, submitter: Actor) -> HrResult<Self> {
        let route = approval_route(workflow, submitter.role).ok_or_else(|| {
            HrError::NoApprovalRoute {
                workflow: workflow.to_string(),
                submitter: submitter.role,
            }
        })?;
        Ok(Self {
            workflow,
            submitter_id: submitter.user_id,
            submitter_role: submitter.role,
            status: ChainStatus::Pending,
            approvals: Vec::new(),
            current_level: 0,
            required_levels: route.len() as u8,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Role due to act, or `None` once the chain is finished.
    pub fn next_approver(&self) -> Option<Role> {
        if self.is_terminal() {
            return None;
        }
        approval_route(self.workflow, self.submitter_role)
            .and_then(|route| route.get(usize::from(self.current_level)).copied())
    }

    fn authorize(&self, actor: Actor) -> HrResult<Role> {
        if self.is_terminal() {
            return Err(HrError::AlreadyFinalized {
                status: self.status.to_string(),
            });
        }
        if actor.user_id == self.submitter_id {
            return Err(HrError::SelfApproval);
        }
        if self.approvals.iter().any(|a| a.approver_id == actor.user_id) {
            return Err(HrError::DuplicateApprover {
                approver_id: actor.user_id,
            });
        }
        let expected = self.next_approver().ok_or_else(|| HrError::NoApprovalRoute {
            workflow: self.workflow.to_string(),
            submitter: self.submitter_role,
        })?;
        if actor.role != expected {
            return Err(HrError::NotAuthorizedApprover {
                expected,
                actual: actor.role,
            });
        }
        Ok(expected)
    }

    pub fn approve(
        &mut self,
        actor: Actor,
        comment: Option<String>,
        at: DateTime<Utc>,
    ) -> HrResult<ChainOutcome> {
        let role = self.authorize(actor)?;

        self.approvals.push(ApprovalEntry {
            approver_id: actor.user_id,
            role,
            action: ApprovalAction::Approved,
            comment,
            at,
        });
        self.current_level += 1;

        if self.current_level >= self.required_levels {
            self.status = ChainStatus::Approved;
            return Ok(ChainOutcome::Finalized);
        }

        self.status = ChainStatus::ApprovedBy(role);
        let next = self.next_approver().ok_or_else(|| HrError::NoApprovalRoute {
            workflow: self.workflow.to_string(),
            submitter: self.submitter_role,
        })?;
        Ok(ChainOutcome::Advanced { next })
    }

    pub fn reject(&mut self, actor: Actor, reason: &str, at: DateTime<Utc>) -> HrResult<()> {
        if reason.trim().is_empty() {
            return Err(HrError::validation("a rejection reason is required"));
        }
        let role = self.authorize(actor)?;

        self.approvals.push(ApprovalEntry {
            approver_id: actor.user_id,
            role,
            action: ApprovalAction::Rejected,
            comment: Some(reason.trim().to_string()),
            at,
        });
        self.status = ChainStatus::Rejected;
        Ok(())
    }
}

/// Chain columns shared by every table that embeds an approval chain.
#[derive(Debug, sqlx::FromRow)]
pub struct ApprovalChainRow {
    pub submitter_id: u64,
    pub submitter_role: String,
    pub status: String,
    pub current_level: u8,
    pub required_levels: u8,
    pub approvals: Json<Vec<ApprovalEntry>>,
}

pub const CHAIN_COLUMNS: &str =
    "submitter_id, submitter_role, status, current_level, required_levels, approvals";

impl ApprovalChainRow {
    pub fn into_chain(self, workflow: Workflow) -> HrResult<ApprovalChain> {
        Ok(ApprovalChain {
            workflow,
            submitter_id: self.submitter_id,
            submitter_role: parse_column("submitter_role", &self.submitter_role)?,
            status: parse_column("status", &self.status)?,
            approvals: self.approvals.0,
            current_level: self.current_level,
            required_levels: self.required_levels,
        })
    }
}
