//! Milestone progress queries.

use std::collections::BTreeMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use buildathon_core::{
    milestone_board, MilestoneBoard, MilestoneRecord, Project, ProjectId, Team, TrackSubmission,
};
use buildathon_storage::Storage;
use serde::Serialize;

use crate::error::{Result, ServiceError};

/// Read-only progress queries.
#[async_trait]
pub trait ProgressTracker: Send + Sync {
    /// Status of every milestone for a project.
    async fn board(&self, project_id: ProjectId) -> Result<MilestoneBoard>;

    /// A project's milestone records, newest first.
    async fn history(&self, project_id: ProjectId) -> Result<Vec<MilestoneRecord>>;

    /// Every team with its projects and their progress.
    async fn dashboard(&self) -> Result<Dashboard>;

    /// How many registered members live in each country.
    async fn country_distribution(&self) -> Result<Vec<CountryCount>>;
}

/// One project on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectOverview {
    /// Project
    pub project: Project,
    /// Milestone status
    pub board: MilestoneBoard,
}

/// One team on the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct TeamOverview {
    /// Team
    pub team: Team,
    /// Team projects, newest first
    pub projects: Vec<ProjectOverview>,
    /// Track submission, if handed in
    pub submission: Option<TrackSubmission>,
}

/// Everything registered, as seen by an organizer.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// When the dashboard was built
    pub timestamp: DateTime<Utc>,
    /// Teams, newest first
    pub teams: Vec<TeamOverview>,
}

impl Dashboard {
    /// Total registered members.
    pub fn member_count(&self) -> usize {
        self.teams.iter().map(|t| t.team.members.len()).sum()
    }

    /// Total projects.
    pub fn project_count(&self) -> usize {
        self.teams.iter().map(|t| t.projects.len()).sum()
    }

    /// Teams that handed in a track submission.
    pub fn submitted_count(&self) -> usize {
        self.teams.iter().filter(|t| t.submission.is_some()).count()
    }

    /// Projects that handed in their final submission.
    pub fn finished_count(&self) -> usize {
        self.teams
            .iter()
            .flat_map(|t| &t.projects)
            .filter(|p| p.board.is_finished())
            .count()
    }
}

/// Members per country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCount {
    /// Country as entered at registration
    pub country: String,
    /// Number of members
    pub count: usize,
}

/// Tracker reading from a store.
pub struct MilestoneTracker<'a, S: Storage + ?Sized> {
    storage: &'a S,
}

impl<'a, S: Storage + ?Sized> MilestoneTracker<'a, S> {
    /// Create a tracker over `storage`.
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    async fn project_board(&self, project_id: ProjectId) -> Result<MilestoneBoard> {
        let completed = self.storage.completed_milestones(project_id).await?;
        Ok(milestone_board(&completed))
    }
}

#[async_trait]
impl<'a, S: Storage + ?Sized> ProgressTracker for MilestoneTracker<'a, S> {
    async fn board(&self, project_id: ProjectId) -> Result<MilestoneBoard> {
        if self.storage.load_project(project_id).await?.is_none() {
            return Err(ServiceError::ProjectNotFound(project_id));
        }
        self.project_board(project_id).await
    }

    async fn history(&self, project_id: ProjectId) -> Result<Vec<MilestoneRecord>> {
        if self.storage.load_project(project_id).await?.is_none() {
            return Err(ServiceError::ProjectNotFound(project_id));
        }
        Ok(self.storage.list_milestones(project_id).await?)
    }

    async fn dashboard(&self) -> Result<Dashboard> {
        let mut teams = Vec::new();
        for team in self.storage.list_teams().await? {
            let mut projects = Vec::new();
            for project in self.storage.list_projects(Some(team.id)).await? {
                let board = self.project_board(project.id).await?;
                projects.push(ProjectOverview { project, board });
            }
            let submission = self.storage.load_submission(team.id).await?;
            teams.push(TeamOverview { team, projects, submission });
        }

        Ok(Dashboard {
            timestamp: Utc::now(),
            teams,
        })
    }

    async fn country_distribution(&self) -> Result<Vec<CountryCount>> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for team in self.storage.list_teams().await? {
            for member in &team.members {
                *counts.entry(member.country.trim().to_string()).or_default() += 1;
            }
        }

        let mut distribution: Vec<CountryCount> = counts
            .into_iter()
            .map(|(country, count)| CountryCount { country, count })
            .collect();
        // BTreeMap already yields names in order; stable sort keeps it for ties.
        distribution.sort_by(|a, b| b.count.cmp(&a.count));
        Ok(distribution)
    }
}
