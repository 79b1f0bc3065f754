//! Buildathon services
//!
//! Request handling on top of the core rules and a store: milestone
//! submission, team and project registration, progress queries and
//! organizer removals.

#![warn(missing_docs)]

pub mod error;
pub mod submission;
pub mod registration;
pub mod tracker;
pub mod admin;

pub use error::{parse_id, Result, ServiceError};
pub use submission::{record_submission, SubmissionRequest, SubmissionService};
pub use registration::RegistrationService;
pub use tracker::{CountryCount, Dashboard, MilestoneTracker, ProgressTracker, ProjectOverview, TeamOverview};
pub use admin::AdminService;
