//! Organizer-only removals.
//!
//! Deleting a milestone record only returns that `(project, type)` pair to
//! absent. Milestones completed on top of it stay completed.

use buildathon_core::{MilestoneId, MilestoneRecord, Project, ProjectId, Team, TeamId};
use buildathon_storage::Storage;
use tracing::info;

use crate::error::{Result, ServiceError};

/// Administrative removals over a store.
pub struct AdminService<'a, S: Storage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: Storage + ?Sized> AdminService<'a, S> {
    /// Create a service writing to `storage`.
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Delete a team with its projects and milestone records.
    pub async fn delete_team(&mut self, team_id: TeamId) -> Result<Team> {
        let team = self
            .storage
            .load_team(team_id)
            .await?
            .ok_or(ServiceError::TeamNotFound(team_id))?;
        let projects = self.storage.list_projects(Some(team_id)).await?.len();

        self.storage.delete_team(team_id).await?;
        info!(team_id = %team_id, name = %team.team_name, projects, "Team deleted");
        Ok(team)
    }

    /// Delete a project with its milestone records.
    pub async fn delete_project(&mut self, project_id: ProjectId) -> Result<Project> {
        let project = self
            .storage
            .load_project(project_id)
            .await?
            .ok_or(ServiceError::ProjectNotFound(project_id))?;

        self.storage.delete_project(project_id).await?;
        info!(project_id = %project_id, name = %project.name, "Project deleted");
        Ok(project)
    }

    /// Delete a single milestone record.
    pub async fn delete_milestone(&mut self, milestone_id: MilestoneId) -> Result<MilestoneRecord> {
        let record = self
            .storage
            .load_milestone(milestone_id)
            .await?
            .ok_or(ServiceError::MilestoneNotFound(milestone_id))?;

        self.storage.delete_milestone(milestone_id).await?;
        info!(
            milestone_id = %milestone_id,
            project_id = %record.project_id,
            kind = record.milestone_type.slug(),
            "Milestone deleted"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildathon_core::{
        MemberDraft, MilestoneFields, MilestoneStatus, MilestoneType, ProjectDraft, TeamRegistration,
    };
    use buildathon_storage::JsonStorage;
    use tempfile::TempDir;
    use crate::registration::RegistrationService;
    use crate::submission::SubmissionService;
    use crate::tracker::{MilestoneTracker, ProgressTracker};

    const ADDRESS: &str = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";

    async fn team_with_project(storage: &mut JsonStorage) -> (Team, Project) {
        let mut registrations = RegistrationService::new(storage);
        let team = registrations
            .register_team(TeamRegistration {
                team_name: "Celo Builders".to_string(),
                wallet_address: ADDRESS.to_string(),
                github_repo: None,
                karma_gap_link: None,
                members: vec![MemberDraft {
                    member_name: "Ana".to_string(),
                    member_email: "ana@example.com".to_string(),
                    member_github: None,
                    country: "Argentina".to_string(),
                }],
            })
            .await
            .unwrap();
        let project = registrations
            .create_project(ProjectDraft {
                team_id: team.id,
                name: "Pay Links".to_string(),
                description: None,
                github_repo: None,
            })
            .await
            .unwrap();
        (team, project)
    }

    #[tokio::test]
    async fn test_delete_milestone_does_not_relock() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let (_team, project) = team_with_project(&mut storage).await;

        let fields = MilestoneFields {
            contract_address: Some(ADDRESS.to_string()),
            ..Default::default()
        };
        let testnet = SubmissionService::new(&mut storage)
            .submit_milestone(project.id, MilestoneType::Testnet, &fields)
            .await
            .unwrap();
        let karma = MilestoneFields {
            karma_gap_link: Some("https://www.karmahq.xyz/project/pay-links".to_string()),
            ..Default::default()
        };
        SubmissionService::new(&mut storage)
            .submit_milestone(project.id, MilestoneType::KarmaGap, &karma)
            .await
            .unwrap();

        let deleted = AdminService::new(&mut storage)
            .delete_milestone(testnet.id)
            .await
            .unwrap();
        assert_eq!(deleted.milestone_type, MilestoneType::Testnet);

        let board = MilestoneTracker::new(&storage).board(project.id).await.unwrap();
        assert_eq!(board.status_of(MilestoneType::Testnet), MilestoneStatus::Available);
        assert_eq!(board.status_of(MilestoneType::KarmaGap), MilestoneStatus::Completed);
        assert_eq!(board.status_of(MilestoneType::Mainnet), MilestoneStatus::Available);

        assert!(matches!(
            AdminService::new(&mut storage).delete_milestone(testnet.id).await.unwrap_err(),
            ServiceError::MilestoneNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_delete_team_cascades() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let (team, project) = team_with_project(&mut storage).await;

        let mut admin = AdminService::new(&mut storage);
        admin.delete_team(team.id).await.unwrap();
        assert!(matches!(
            admin.delete_team(team.id).await.unwrap_err(),
            ServiceError::TeamNotFound(_)
        ));

        assert!(storage.load_project(project.id).await.unwrap().is_none());
        assert!(storage.list_milestones(project.id).await.unwrap().is_empty());
        // E-mail is free again
        assert!(storage.find_team_by_member_email("ana@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_project() {
        let dir = TempDir::new().unwrap();
        let mut storage = JsonStorage::new(dir.path()).await.unwrap();
        let (team, project) = team_with_project(&mut storage).await;

        let deleted = AdminService::new(&mut storage).delete_project(project.id).await.unwrap();
        assert_eq!(deleted.id, project.id);
        assert!(storage.list_projects(Some(team.id)).await.unwrap().is_empty());
        assert!(storage.load_team(team.id).await.unwrap().is_some());
    }
}
