//! Storage trait abstraction.

use std::collections::BTreeSet;
use async_trait::async_trait;
use buildathon_core::{
    MilestoneFields, MilestoneId, MilestoneRecord, MilestoneType, Project, ProjectId, Team, TeamId,
    TrackSubmission, ValidatedTrackSubmission,
};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for buildathon data.
///
/// Implementations enforce the `(project, milestone type)` uniqueness of
/// milestone records themselves; callers never coordinate around it.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Team operations ===

    /// Save a team (create or update).
    ///
    /// Fails with [`StorageError::Conflict`] when a member e-mail already
    /// belongs to another team.
    async fn save_team(&mut self, team: &Team) -> Result<()>;

    /// Load a team by ID.
    async fn load_team(&self, id: TeamId) -> Result<Option<Team>>;

    /// List all teams, newest first.
    async fn list_teams(&self) -> Result<Vec<Team>>;

    /// Find the team a member e-mail belongs to (case-insensitive).
    async fn find_team_by_member_email(&self, email: &str) -> Result<Option<Team>>;

    /// Delete a team together with its projects, their milestones and the
    /// team's track submission.
    async fn delete_team(&mut self, id: TeamId) -> Result<()>;

    // === Project operations ===

    /// Save a project (create or update).
    async fn save_project(&mut self, project: &Project) -> Result<()>;

    /// Load a project by ID.
    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>>;

    /// List projects, optionally for one team, newest first.
    async fn list_projects(&self, team_id: Option<TeamId>) -> Result<Vec<Project>>;

    /// Delete a project together with its milestones.
    async fn delete_project(&mut self, id: ProjectId) -> Result<()>;

    // === Milestone operations ===

    /// Create the record for `(project_id, milestone_type)` or replace the
    /// fields of the existing one. Returns the stored record.
    async fn upsert_milestone(
        &mut self,
        project_id: ProjectId,
        milestone_type: MilestoneType,
        fields: &MilestoneFields,
    ) -> Result<MilestoneRecord>;

    /// Load a milestone record by ID.
    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<MilestoneRecord>>;

    /// List a project's milestone records, newest first.
    async fn list_milestones(&self, project_id: ProjectId) -> Result<Vec<MilestoneRecord>>;

    /// Milestone types that have a record for the project.
    ///
    /// Must agree with [`Storage::list_milestones`].
    async fn completed_milestones(&self, project_id: ProjectId) -> Result<BTreeSet<MilestoneType>> {
        Ok(self
            .list_milestones(project_id)
            .await?
            .into_iter()
            .map(|r| r.milestone_type)
            .collect())
    }

    /// Delete a single milestone record. Other records are untouched.
    async fn delete_milestone(&mut self, id: MilestoneId) -> Result<()>;

    // === Track submission operations ===

    /// Create the team's track submission or replace the existing one.
    async fn upsert_submission(&mut self, submission: &ValidatedTrackSubmission) -> Result<TrackSubmission>;

    /// Load a team's track submission.
    async fn load_submission(&self, team_id: TeamId) -> Result<Option<TrackSubmission>>;
}
