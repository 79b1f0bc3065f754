//! Unlock decisions over the prerequisite graph.
//!
//! Completion is a set-membership fact: a milestone is complete when a record
//! for it exists. The gate is evaluated at submission time only, so removing a
//! prerequisite later never re-locks work that was already accepted.

use std::collections::BTreeSet;
use serde::{Deserialize, Serialize};
use crate::milestone::MilestoneType;

/// Outcome of an unlock check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnlockResult {
    /// Submission is permitted
    Unlocked,
    /// The prerequisite has not been completed yet
    Locked {
        /// Prerequisite that is missing
        missing: MilestoneType,
    },
}

impl UnlockResult {
    /// Whether the submission may proceed.
    pub fn is_unlocked(&self) -> bool {
        matches!(self, UnlockResult::Unlocked)
    }

    /// Human-readable name of the missing prerequisite, if locked.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            UnlockResult::Unlocked => None,
            UnlockResult::Locked { missing } => Some(missing.label()),
        }
    }
}

/// Decide whether `requested` may be submitted given the completed set.
pub fn is_unlocked(requested: MilestoneType, completed: &BTreeSet<MilestoneType>) -> UnlockResult {
    match requested.prerequisite() {
        None => UnlockResult::Unlocked,
        Some(p) if completed.contains(&p) => UnlockResult::Unlocked,
        Some(p) => UnlockResult::Locked { missing: p },
    }
}

/// Where a single milestone stands for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MilestoneStatus {
    /// A record exists
    Completed,
    /// No record yet, but submission is unlocked
    Available,
    /// No record and the prerequisite is missing
    Locked {
        /// Prerequisite that is missing
        missing: MilestoneType,
    },
}

/// One row of a [`MilestoneBoard`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardEntry {
    /// Milestone
    pub milestone: MilestoneType,
    /// Current status
    pub status: MilestoneStatus,
    /// Whether the milestone may be skipped
    pub optional: bool,
}

/// Status of every milestone for one project, in canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneBoard {
    /// Rows in canonical order
    pub entries: Vec<BoardEntry>,
}

impl MilestoneBoard {
    /// Status of a single milestone.
    pub fn status_of(&self, milestone: MilestoneType) -> MilestoneStatus {
        self.entries
            .iter()
            .find(|e| e.milestone == milestone)
            .map(|e| e.status)
            .unwrap_or(MilestoneStatus::Locked { missing: MilestoneType::Registration })
    }

    /// Number of completed milestones.
    pub fn completed_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.status == MilestoneStatus::Completed)
            .count()
    }

    /// First required milestone that is open for submission.
    pub fn next_available(&self) -> Option<MilestoneType> {
        self.entries
            .iter()
            .find(|e| !e.optional && e.status == MilestoneStatus::Available)
            .map(|e| e.milestone)
    }

    /// Whether the final submission has been handed in.
    pub fn is_finished(&self) -> bool {
        self.status_of(MilestoneType::FinalSubmission) == MilestoneStatus::Completed
    }
}

/// Build the status board for a completed set.
pub fn milestone_board(completed: &BTreeSet<MilestoneType>) -> MilestoneBoard {
    let entries = MilestoneType::ALL
        .into_iter()
        .map(|milestone| {
            let status = if completed.contains(&milestone) {
                MilestoneStatus::Completed
            } else {
                match is_unlocked(milestone, completed) {
                    UnlockResult::Unlocked => MilestoneStatus::Available,
                    UnlockResult::Locked { missing } => MilestoneStatus::Locked { missing },
                }
            };
            BoardEntry {
                milestone,
                status,
                optional: milestone.is_optional(),
            }
        })
        .collect();

    MilestoneBoard { entries }
}
