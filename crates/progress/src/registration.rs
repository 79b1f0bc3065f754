//! Team and project registration.

use buildathon_core::{
    validate_payload, MilestoneFields, MilestoneType, Project, ProjectDraft, Team, TeamId,
    TeamRegistration, TrackSubmission, TrackSubmissionDraft,
};
use buildathon_storage::Storage;
use tracing::{info, warn};

use crate::error::{Result, ServiceError};
use crate::submission::record_submission;

/// Registration service over a store.
pub struct RegistrationService<'a, S: Storage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: Storage + ?Sized> RegistrationService<'a, S> {
    /// Create a service writing to `storage`.
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Reject e-mails already registered on a team other than `own`.
    async fn check_emails_free(&self, emails: &[String], own: Option<TeamId>) -> Result<()> {
        for email in emails {
            if let Some(other) = self.storage.find_team_by_member_email(email).await? {
                if Some(other.id) != own {
                    warn!(email = %email, team_id = %other.id, "Rejected registration: e-mail already registered");
                    return Err(ServiceError::Conflict(format!(
                        "Email {} is already registered with team \"{}\"",
                        email, other.team_name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Register a new team.
    pub async fn register_team(&mut self, registration: TeamRegistration) -> Result<Team> {
        let emails = registration.member_emails();
        let team = registration.into_team().map_err(|e| {
            warn!("Rejected registration: {}", e);
            ServiceError::Registration(e)
        })?;
        self.check_emails_free(&emails, None).await?;

        self.storage.save_team(&team).await?;
        info!(team_id = %team.id, name = %team.team_name, members = team.members.len(), "Team registered");
        Ok(team)
    }

    /// Replace a team's details and member list.
    pub async fn update_team(&mut self, team_id: TeamId, registration: TeamRegistration) -> Result<Team> {
        let mut team = self
            .storage
            .load_team(team_id)
            .await?
            .ok_or(ServiceError::TeamNotFound(team_id))?;

        let emails = registration.member_emails();
        registration.apply_to(&mut team).map_err(|e| {
            warn!(team_id = %team_id, "Rejected team update: {}", e);
            ServiceError::Registration(e)
        })?;
        self.check_emails_free(&emails, Some(team_id)).await?;

        self.storage.save_team(&team).await?;
        info!(team_id = %team.id, members = team.members.len(), "Team updated");
        Ok(team)
    }

    /// Look up the team a member e-mail belongs to.
    pub async fn find_team_by_email(&self, email: &str) -> Result<Option<Team>> {
        Ok(self.storage.find_team_by_member_email(email.trim()).await?)
    }

    /// Create a project for an existing team.
    ///
    /// Creating the project is the act of registration, so the
    /// `Registration` milestone is recorded along with it. If that record
    /// cannot be written the project is removed again.
    pub async fn create_project(&mut self, draft: ProjectDraft) -> Result<Project> {
        let team_id = draft.team_id;
        if self.storage.load_team(team_id).await?.is_none() {
            return Err(ServiceError::TeamNotFound(team_id));
        }
        let project = draft.into_project()?;
        self.storage.save_project(&project).await?;

        let validated = validate_payload(MilestoneType::Registration, &MilestoneFields::default())?;
        if let Err(e) = record_submission(&mut *self.storage, project.id, validated).await {
            warn!(project_id = %project.id, "Registration milestone not stored, removing project: {}", e);
            self.storage.delete_project(project.id).await?;
            return Err(e);
        }

        info!(project_id = %project.id, team_id = %team_id, name = %project.name, "Project created");
        Ok(project)
    }

    /// Hand in (or replace) a team's track submission.
    pub async fn submit_tracks(&mut self, draft: TrackSubmissionDraft) -> Result<TrackSubmission> {
        let validated = draft.validate().map_err(|e| {
            warn!(team_id = %draft.team_id, "Rejected track submission: {}", e);
            ServiceError::Tracks(e)
        })?;
        let team_id = validated.team_id();
        if self.storage.load_team(team_id).await?.is_none() {
            warn!(team_id = %team_id, "Rejected track submission: unknown team");
            return Err(ServiceError::TeamNotFound(team_id));
        }

        let submission = self.storage.upsert_submission(&validated).await?;
        info!(
            team_id = %team_id,
            submission = %submission.id,
            tracks = ?submission.tracks.names(),
            "Track submission accepted"
        );
        Ok(submission)
    }

    /// A team's track submission, if handed in.
    pub async fn load_submission(&self, team_id: TeamId) -> Result<Option<TrackSubmission>> {
        Ok(self.storage.load_submission(team_id).await?)
    }

    /// List projects, optionally restricted to one team.
    pub async fn list_projects(&self, team_id: Option<TeamId>) -> Result<Vec<Project>> {
        Ok(self.storage.list_projects(team_id).await?)
    }

    /// List all teams, newest first.
    pub async fn list_teams(&self) -> Result<Vec<Team>> {
        Ok(self.storage.list_teams().await?)
    }
}
