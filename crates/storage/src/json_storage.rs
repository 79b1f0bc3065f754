//! JSON file storage implementation.
//!
//! Stores data as JSON files under a root directory and keeps small per-object
//! meta markers (version + updated_at). Milestone records are stored at
//! `milestones/<project>/<milestone>.json`, so the file path itself is the
//! `(project, milestone type)` uniqueness key; their meta markers are keyed
//! the same way. Track submissions live at `submissions/<team>.json`.
//!
//! Files that fail to parse are skipped with a warning and treated as absent
//! by every read, and an upsert overwrites them.

use std::path::{Path, PathBuf};
use buildathon_core::{
    MilestoneFields, MilestoneId, MilestoneRecord, MilestoneType, Project, ProjectId, Team, TeamId,
    TrackSubmission, ValidatedTrackSubmission,
};
use super::{Storage, StorageError, Result};
use tokio::fs;
use tracing::{debug, warn};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage, creating the data and meta directories as needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Ensure primary directories
        fs::create_dir_all(root.join("teams")).await?;
        fs::create_dir_all(root.join("projects")).await?;
        fs::create_dir_all(root.join("milestones")).await?;
        fs::create_dir_all(root.join("submissions")).await?;

        // Directories for meta markers
        fs::create_dir_all(root.join("meta").join("teams")).await?;
        fs::create_dir_all(root.join("meta").join("projects")).await?;
        fs::create_dir_all(root.join("meta").join("milestones")).await?;
        fs::create_dir_all(root.join("meta").join("submissions")).await?;

        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn team_path(&self, id: TeamId) -> PathBuf {
        self.root.join("teams").join(format!("{}.json", id))
    }
    fn project_path(&self, id: ProjectId) -> PathBuf {
        self.root.join("projects").join(format!("{}.json", id))
    }
    fn project_milestones_dir(&self, project_id: ProjectId) -> PathBuf {
        self.root.join("milestones").join(project_id.to_string())
    }
    fn milestone_path(&self, project_id: ProjectId, milestone_type: MilestoneType) -> PathBuf {
        self.project_milestones_dir(project_id)
            .join(format!("{}.json", milestone_type.slug()))
    }

    fn submission_path(&self, team_id: TeamId) -> PathBuf {
        self.root.join("submissions").join(format!("{}.json", team_id))
    }

    /// Meta key of a milestone record: its `(project, type)` slot, not its id.
    fn milestone_key(project_id: ProjectId, milestone_type: MilestoneType) -> String {
        format!("{}-{}", project_id, milestone_type.slug())
    }

    fn meta_path(&self, kind: &str, id: &str) -> PathBuf {
        self.root.join("meta").join(kind).join(format!("{}.meta.json", id))
    }

    /// Read and increment per-object version, return new version.
    async fn bump_version(&self, kind: &str, id: &str) -> Result<u64> {
        let path = self.meta_path(kind, id);
        let mut version = 0u64;
        if let Ok(s) = fs::read_to_string(&path).await {
            if let Ok(json) = serde_json::from_str::<serde_json::Value>(&s) {
                if let Some(v) = json.get("version").and_then(|v| v.as_u64()) {
                    version = v;
                }
            }
        }
        version += 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    async fn drop_meta(&self, kind: &str, id: &str) -> Result<()> {
        remove_if_exists(&self.meta_path(kind, id)).await
    }

    async fn all_milestones(&self) -> Result<Vec<MilestoneRecord>> {
        let mut records = Vec::new();
        let mut rd = fs::read_dir(self.root.join("milestones")).await?;
        while let Some(entry) = rd.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                records.extend(list_dir::<MilestoneRecord>(&entry.path()).await?);
            }
        }
        Ok(records)
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_team(&mut self, team: &Team) -> Result<()> {
        let others: Vec<Team> = list_dir(&self.root.join("teams")).await?;
        for other in others.iter().filter(|t| t.id != team.id) {
            if let Some(m) = team.members.iter().find(|m| other.has_member_email(&m.member_email)) {
                return Err(StorageError::Conflict(format!(
                    "email {} is already registered with another team",
                    m.member_email
                )));
            }
        }

        let json = serde_json::to_string_pretty(team)?;
        fs::write(self.team_path(team.id), json.as_bytes()).await?;
        let ver = self.bump_version("teams", &team.id.to_string()).await?;
        debug!(team_id = %team.id, version = ver, "saved team");
        Ok(())
    }

    async fn load_team(&self, id: TeamId) -> Result<Option<Team>> {
        read_json(&self.team_path(id)).await
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        let mut teams: Vec<Team> = list_dir(&self.root.join("teams")).await?;
        teams.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(teams)
    }

    async fn find_team_by_member_email(&self, email: &str) -> Result<Option<Team>> {
        let teams: Vec<Team> = list_dir(&self.root.join("teams")).await?;
        Ok(teams.into_iter().find(|t| t.has_member_email(email)))
    }

    async fn delete_team(&mut self, id: TeamId) -> Result<()> {
        for project in self.list_projects(Some(id)).await? {
            self.delete_project(project.id).await?;
        }
        remove_if_exists(&self.submission_path(id)).await?;
        self.drop_meta("submissions", &id.to_string()).await?;
        remove_if_exists(&self.team_path(id)).await?;
        self.drop_meta("teams", &id.to_string()).await?;
        Ok(())
    }

    async fn save_project(&mut self, project: &Project) -> Result<()> {
        let json = serde_json::to_string_pretty(project)?;
        fs::write(self.project_path(project.id), json.as_bytes()).await?;
        let ver = self.bump_version("projects", &project.id.to_string()).await?;
        debug!(project_id = %project.id, version = ver, "saved project");
        Ok(())
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        read_json(&self.project_path(id)).await
    }

    async fn list_projects(&self, team_id: Option<TeamId>) -> Result<Vec<Project>> {
        let all: Vec<Project> = list_dir(&self.root.join("projects")).await?;
        let mut projects: Vec<Project> = all
            .into_iter()
            .filter(|p| team_id.map_or(true, |t| p.team_id == t))
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        for milestone_type in MilestoneType::ALL {
            self.drop_meta("milestones", &Self::milestone_key(id, milestone_type)).await?;
        }
        match fs::remove_dir_all(self.project_milestones_dir(id)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        remove_if_exists(&self.project_path(id)).await?;
        self.drop_meta("projects", &id.to_string()).await?;
        Ok(())
    }

    async fn upsert_milestone(
        &mut self,
        project_id: ProjectId,
        milestone_type: MilestoneType,
        fields: &MilestoneFields,
    ) -> Result<MilestoneRecord> {
        let path = self.milestone_path(project_id, milestone_type);
        let record = match read_lenient::<MilestoneRecord>(&path).await? {
            Some(mut existing) => {
                existing.replace_fields(fields.clone());
                existing
            }
            None => {
                fs::create_dir_all(self.project_milestones_dir(project_id)).await?;
                MilestoneRecord::new(project_id, milestone_type, fields.clone())
            }
        };

        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&path, json.as_bytes()).await?;
        let ver = self
            .bump_version("milestones", &Self::milestone_key(project_id, milestone_type))
            .await?;
        debug!(%project_id, milestone = milestone_type.slug(), version = ver, "upserted milestone");
        Ok(record)
    }

    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<MilestoneRecord>> {
        Ok(self.all_milestones().await?.into_iter().find(|r| r.id == id))
    }

    async fn list_milestones(&self, project_id: ProjectId) -> Result<Vec<MilestoneRecord>> {
        let mut records: Vec<MilestoneRecord> = list_dir(&self.project_milestones_dir(project_id)).await?;
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn delete_milestone(&mut self, id: MilestoneId) -> Result<()> {
        if let Some(record) = self.load_milestone(id).await? {
            remove_if_exists(&self.milestone_path(record.project_id, record.milestone_type)).await?;
            self.drop_meta("milestones", &Self::milestone_key(record.project_id, record.milestone_type))
                .await?;
        }
        Ok(())
    }

    async fn upsert_submission(&mut self, submission: &ValidatedTrackSubmission) -> Result<TrackSubmission> {
        let team_id = submission.team_id();
        let path = self.submission_path(team_id);
        let record = match read_lenient::<TrackSubmission>(&path).await? {
            Some(mut existing) => {
                existing.replace(submission);
                existing
            }
            None => TrackSubmission::new(submission),
        };

        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&path, json.as_bytes()).await?;
        let ver = self.bump_version("submissions", &team_id.to_string()).await?;
        debug!(%team_id, version = ver, "upserted track submission");
        Ok(record)
    }

    async fn load_submission(&self, team_id: TeamId) -> Result<Option<TrackSubmission>> {
        read_lenient(&self.submission_path(team_id)).await
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Like [`read_json`], but an unparseable file counts as absent.
async fn read_lenient<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_json(path).await {
        Err(StorageError::Json(e)) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable record");
            Ok(None)
        }
        other => other,
    }
}

async fn list_dir<T: serde::de::DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = match fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(items),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Some(item) = read_lenient(&entry.path()).await? {
            items.push(item);
        }
    }
    Ok(items)
}
