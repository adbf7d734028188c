//! Phase transition graph authority.
//!
//! This module is the single encoding point for named [`PhaseTag`] edges and
//! legality checks. The runtime consults it for every committed transition instead
//! of embedding the graph at call sites.

use crate::state::PhaseTag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseEdge {
    StartLoad,
    CommitLoad,
    AbandonLoad,
    FailLoad,
    StartApply,
    FinishApply,
    FailApply,
    FailRefresh,
    ClearError,
}

impl PhaseEdge {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StartLoad => "start_load",
            Self::CommitLoad => "commit_load",
            Self::AbandonLoad => "abandon_load",
            Self::FailLoad => "fail_load",
            Self::StartApply => "start_apply",
            Self::FinishApply => "finish_apply",
            Self::FailApply => "fail_apply",
            Self::FailRefresh => "fail_refresh",
            Self::ClearError => "clear_error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransitionReceipt {
    from: PhaseTag,
    edge: PhaseEdge,
    to: PhaseTag,
}

impl TransitionReceipt {
    #[must_use]
    pub(crate) const fn from(self) -> PhaseTag {
        self.from
    }

    #[must_use]
    pub(crate) const fn edge(self) -> PhaseEdge {
        self.edge
    }

    #[must_use]
    pub(crate) const fn to(self) -> PhaseTag {
        self.to
    }
}

#[must_use]
pub(crate) fn transition_receipt(from: PhaseTag, to: PhaseTag) -> Option<TransitionReceipt> {
    transition_edge(from, to).map(|edge| TransitionReceipt { from, edge, to })
}

#[must_use]
pub(crate) fn receipt_is_legal(receipt: TransitionReceipt) -> bool {
    is_legal_transition(receipt.from, receipt.edge, receipt.to)
}

/// Named edge for a phase change, or `None` when the pair has no edge.
#[must_use]
pub fn transition_edge(from: PhaseTag, to: PhaseTag) -> Option<PhaseEdge> {
    use PhaseEdge::{
        AbandonLoad, ClearError, CommitLoad, FailApply, FailLoad, FailRefresh, FinishApply,
        StartApply, StartLoad,
    };
    use PhaseTag::{Applying, Empty, Error, Loading, Ready};

    match (from, to) {
        (Empty | Ready | Error, Loading) => Some(StartLoad),
        (Loading, Ready) => Some(CommitLoad),
        (Loading, Empty) => Some(AbandonLoad),
        (Loading, Error) => Some(FailLoad),
        (Ready | Error, Applying) => Some(StartApply),
        (Applying, Ready) => Some(FinishApply),
        (Applying, Error) => Some(FailApply),
        (Ready, Error) => Some(FailRefresh),
        (Error, Ready | Empty) => Some(ClearError),
        _ => None,
    }
}

#[must_use]
pub fn is_legal_transition(from: PhaseTag, edge: PhaseEdge, to: PhaseTag) -> bool {
    use PhaseEdge::{
        AbandonLoad, ClearError, CommitLoad, FailApply, FailLoad, FailRefresh, FinishApply,
        StartApply, StartLoad,
    };
    use PhaseTag::{Applying, Empty, Error, Loading, Ready};

    match edge {
        StartLoad => to == Loading && matches!(from, Empty | Ready | Error),
        CommitLoad => from == Loading && to == Ready,
        AbandonLoad => from == Loading && to == Empty,
        FailLoad => from == Loading && to == Error,
        StartApply => to == Applying && matches!(from, Ready | Error),
        FinishApply => from == Applying && to == Ready,
        FailApply => from == Applying && to == Error,
        FailRefresh => from == Ready && to == Error,
        ClearError => from == Error && matches!(to, Ready | Empty),
    }
}
