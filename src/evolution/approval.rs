//! Commit approval hook. Runs after a candidate passes the safety test and
//! before it is published.

use crate::evolution::TestReport;
use crate::evolution::mutation::Mutation;
use crate::state::{CognitiveParams, CognitiveState};

/// What the hook gets to look at.
pub struct ApprovalRequest<'a> {
    pub base: &'a CognitiveState,
    pub candidate: &'a CognitiveParams,
    pub mutation: &'a Mutation,
    pub report: &'a TestReport,
}

pub trait CommitApproval: Send + Sync {
    fn approve(&self, request: &ApprovalRequest<'_>) -> bool;
}

/// Default policy: every candidate that passed testing is approved.
pub struct AutoApprove;

impl CommitApproval for AutoApprove {
    fn approve(&self, _request: &ApprovalRequest<'_>) -> bool {
        true
    }
}

/// Holds every candidate for review. Installed when
/// `evolution.require_approval` is set and no other hook has been provided.
pub struct HoldForReview;

impl CommitApproval for HoldForReview {
    fn approve(&self, request: &ApprovalRequest<'_>) -> bool {
        tracing::info!(
            "holding {} mutation of [{}] on v{} for review",
            request.mutation.origin.as_str(),
            request.mutation.fields().join(", "),
            request.base.version
        );
        false
    }
}
