//! Project model - what a team builds and submits milestones for.

use serde::{Deserialize, Serialize};
use crate::id::{ProjectId, TeamId};
use crate::Time;

/// A project owned by a team. Milestone records hang off the project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    /// Unique identifier
    pub id: ProjectId,

    /// Owning team
    pub team_id: TeamId,

    /// Project name
    pub name: String,

    /// Short pitch
    pub description: Option<String>,

    /// Source repository
    pub github_repo: Option<String>,

    /// When created
    pub created_at: Time,
}
