//! Buildathon core data models.
//!
//! This crate defines the registration data and the milestone progression
//! engine: the milestone enumeration, its prerequisite graph, unlock decisions
//! and per-milestone payload validation. Everything here is pure and
//! synchronous; persistence and request handling live in other crates.

#![warn(missing_docs)]

// Core identities
mod id;

// Teams and projects
mod team;
mod project;
mod registration;
mod tracks;

// Milestone progression
mod milestone;
mod progression;
mod validation;

// Re-exports
pub use id::*;

// Teams & Projects
pub use team::{Team, TeamMember, GithubRepo};
pub use project::Project;
pub use registration::{TeamRegistration, MemberDraft, ProjectDraft, RegistrationError};
pub use tracks::{
    TrackSelection, TrackSubmission, TrackSubmissionDraft, TrackSubmissionError, ValidatedTrackSubmission,
};

// Milestones
pub use milestone::{MilestoneType, MilestoneFields, MilestoneRecord, ParseMilestoneError};
pub use progression::{
    is_unlocked, milestone_board, UnlockResult, MilestoneStatus, MilestoneBoard, BoardEntry,
};
pub use validation::{
    validate_payload, ValidatedFields, FieldError, FieldName, KARMA_PROJECT_PREFIX,
    is_absolute_url, is_evm_address, is_karma_project_url, is_valid_contract_address,
};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
