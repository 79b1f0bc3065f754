//! SQLite storage backend.
//!
//! Teams and projects are stored as JSON documents; milestone records get
//! real columns so that `UNIQUE(project_id, milestone_type)` is enforced by
//! the database and resubmissions go through `INSERT ... ON CONFLICT DO UPDATE`.

use std::collections::BTreeSet;
use std::path::Path;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use buildathon_core::{
    MilestoneFields, MilestoneId, MilestoneRecord, MilestoneType, Project, ProjectId, SubmissionId,
    Team, TeamId, TrackSelection, TrackSubmission, ValidatedTrackSubmission,
};
use tracing::debug;

use super::trait_::{Storage, StorageError, Result};

const MILESTONE_COLUMNS: &str = "id, project_id, milestone_type, contract_address, karma_gap_link, \
     farcaster_link, slides_link, pitch_deck_link, created_at, updated_at";

/// SQLite storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
    /// Database connection pool
    pool: sqlx::SqlitePool,
}

fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Conflict(db.message().to_string()),
        _ => StorageError::Other(e.to_string()),
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::Other(format!("bad timestamp {value:?}: {e}")))
}

fn record_from_row(row: &SqliteRow) -> Result<MilestoneRecord> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let project_id: String = row.try_get("project_id").map_err(db_err)?;
    let milestone_type: String = row.try_get("milestone_type").map_err(db_err)?;
    let created_at: String = row.try_get("created_at").map_err(db_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(db_err)?;

    Ok(MilestoneRecord {
        id: id.parse().map_err(|e| StorageError::Other(format!("bad milestone id: {e}")))?,
        project_id: project_id.parse().map_err(|e| StorageError::Other(format!("bad project id: {e}")))?,
        milestone_type: milestone_type
            .parse()
            .map_err(|e: buildathon_core::ParseMilestoneError| StorageError::Other(e.to_string()))?,
        fields: MilestoneFields {
            contract_address: row.try_get("contract_address").map_err(db_err)?,
            karma_gap_link: row.try_get("karma_gap_link").map_err(db_err)?,
            farcaster_link: row.try_get("farcaster_link").map_err(db_err)?,
            slides_link: row.try_get("slides_link").map_err(db_err)?,
            pitch_deck_link: row.try_get("pitch_deck_link").map_err(db_err)?,
        },
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

const SUBMISSION_COLUMNS: &str = "id, team_id, karma_gap_link, track_open_track, \
     track_farcaster_miniapp, track_self, track_v0, created_at, updated_at";

fn submission_from_row(row: &SqliteRow) -> Result<TrackSubmission> {
    let id: String = row.try_get("id").map_err(db_err)?;
    let team_id: String = row.try_get("team_id").map_err(db_err)?;
    let created_at: String = row.try_get("created_at").map_err(db_err)?;
    let updated_at: String = row.try_get("updated_at").map_err(db_err)?;

    Ok(TrackSubmission {
        id: id
            .parse::<SubmissionId>()
            .map_err(|e| StorageError::Other(format!("bad submission id: {e}")))?,
        team_id: team_id
            .parse::<TeamId>()
            .map_err(|e| StorageError::Other(format!("bad team id: {e}")))?,
        karma_gap_link: row.try_get("karma_gap_link").map_err(db_err)?,
        tracks: TrackSelection {
            open_track: row.try_get("track_open_track").map_err(db_err)?,
            farcaster_miniapp: row.try_get("track_farcaster_miniapp").map_err(db_err)?,
            self_protocol: row.try_get("track_self").map_err(db_err)?,
            v0: row.try_get("track_v0").map_err(db_err)?,
        },
        created_at: parse_time(&created_at)?,
        updated_at: parse_time(&updated_at)?,
    })
}

fn document<T: serde::de::DeserializeOwned>(row: &SqliteRow) -> Result<T> {
    let data: String = row.try_get("data").map_err(db_err)?;
    Ok(serde_json::from_str(&data)?)
}

impl SqliteStorage {
    /// Open (or create) a database file.
    pub async fn new_from_path(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Create an in-memory SQLite storage for testing.
    pub async fn in_memory() -> Result<Self> {
        // Every connection to `:memory:` is its own database, so keep one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let storage = Self { pool };
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Initialize the database schema.
    async fn init_schema(&self) -> Result<()> {
        let statements = [
            "CREATE TABLE IF NOT EXISTS teams (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS team_members (
                email TEXT PRIMARY KEY,
                team_id TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                team_id TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS milestones (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                milestone_type TEXT NOT NULL,
                contract_address TEXT,
                karma_gap_link TEXT,
                farcaster_link TEXT,
                slides_link TEXT,
                pitch_deck_link TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (project_id, milestone_type)
            )",
            "CREATE TABLE IF NOT EXISTS submissions (
                id TEXT PRIMARY KEY,
                team_id TEXT NOT NULL UNIQUE,
                karma_gap_link TEXT NOT NULL,
                track_open_track BOOLEAN NOT NULL,
                track_farcaster_miniapp BOOLEAN NOT NULL,
                track_self BOOLEAN NOT NULL,
                track_v0 BOOLEAN NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_projects_team ON projects(team_id)",
        ];

        for sql in statements {
            sqlx::query(sql).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    /// Check that the database answers.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    // === Team operations ===

    async fn save_team(&mut self, team: &Team) -> Result<()> {
        let data = serde_json::to_string(team)?;
        let team_id = team.id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM team_members WHERE team_id = ?")
            .bind(&team_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        for member in &team.members {
            let email = member.member_email.trim().to_ascii_lowercase();
            sqlx::query("INSERT INTO team_members (email, team_id) VALUES (?, ?)")
                .bind(&email)
                .bind(&team_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| match db_err(e) {
                    StorageError::Conflict(_) => StorageError::Conflict(format!(
                        "email {} is already registered with another team",
                        member.member_email
                    )),
                    other => other,
                })?;
        }

        sqlx::query(
            "INSERT INTO teams (id, data, created_at, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        )
        .bind(&team_id)
        .bind(data)
        .bind(team.created_at.to_rfc3339())
        .bind(team.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        debug!(team_id = %team.id, "saved team");
        Ok(())
    }

    async fn load_team(&self, id: TeamId) -> Result<Option<Team>> {
        let row = sqlx::query("SELECT data FROM teams WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(document::<Team>).transpose()
    }

    async fn list_teams(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query("SELECT data FROM teams ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter().map(document::<Team>).collect()
    }

    async fn find_team_by_member_email(&self, email: &str) -> Result<Option<Team>> {
        let row = sqlx::query(
            "SELECT t.data FROM teams t JOIN team_members m ON m.team_id = t.id WHERE m.email = ?",
        )
        .bind(email.trim().to_ascii_lowercase())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(document::<Team>).transpose()
    }

    async fn delete_team(&mut self, id: TeamId) -> Result<()> {
        let team_id = id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let statements = [
            "DELETE FROM milestones WHERE project_id IN (SELECT id FROM projects WHERE team_id = ?)",
            "DELETE FROM projects WHERE team_id = ?",
            "DELETE FROM submissions WHERE team_id = ?",
            "DELETE FROM team_members WHERE team_id = ?",
            "DELETE FROM teams WHERE id = ?",
        ];
        for sql in statements {
            sqlx::query(sql)
                .bind(&team_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    // === Project operations ===

    async fn save_project(&mut self, project: &Project) -> Result<()> {
        let data = serde_json::to_string(project)?;
        sqlx::query(
            "INSERT INTO projects (id, team_id, data, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET team_id = excluded.team_id, data = excluded.data",
        )
        .bind(project.id.to_string())
        .bind(project.team_id.to_string())
        .bind(data)
        .bind(project.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn load_project(&self, id: ProjectId) -> Result<Option<Project>> {
        let row = sqlx::query("SELECT data FROM projects WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(document::<Project>).transpose()
    }

    async fn list_projects(&self, team_id: Option<TeamId>) -> Result<Vec<Project>> {
        let rows = match team_id {
            Some(team_id) => {
                sqlx::query("SELECT data FROM projects WHERE team_id = ? ORDER BY created_at DESC")
                    .bind(team_id.to_string())
                    .fetch_all(&self.pool)
                    .await
            }
            None => {
                sqlx::query("SELECT data FROM projects ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(db_err)?;
        rows.iter().map(document::<Project>).collect()
    }

    async fn delete_project(&mut self, id: ProjectId) -> Result<()> {
        let project_id = id.to_string();
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for sql in ["DELETE FROM milestones WHERE project_id = ?", "DELETE FROM projects WHERE id = ?"] {
            sqlx::query(sql)
                .bind(&project_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    // === Milestone operations ===

    async fn upsert_milestone(
        &mut self,
        project_id: ProjectId,
        milestone_type: MilestoneType,
        fields: &MilestoneFields,
    ) -> Result<MilestoneRecord> {
        let now = Utc::now().to_rfc3339();

        sqlx::query(&format!(
            "INSERT INTO milestones ({MILESTONE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(project_id, milestone_type) DO UPDATE SET
                contract_address = excluded.contract_address,
                karma_gap_link = excluded.karma_gap_link,
                farcaster_link = excluded.farcaster_link,
                slides_link = excluded.slides_link,
                pitch_deck_link = excluded.pitch_deck_link,
                updated_at = excluded.updated_at"
        ))
        .bind(MilestoneId::new().to_string())
        .bind(project_id.to_string())
        .bind(milestone_type.slug())
        .bind(fields.contract_address.as_deref())
        .bind(fields.karma_gap_link.as_deref())
        .bind(fields.farcaster_link.as_deref())
        .bind(fields.slides_link.as_deref())
        .bind(fields.pitch_deck_link.as_deref())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let row = sqlx::query(&format!(
            "SELECT {MILESTONE_COLUMNS} FROM milestones WHERE project_id = ? AND milestone_type = ?"
        ))
        .bind(project_id.to_string())
        .bind(milestone_type.slug())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        debug!(%project_id, milestone = milestone_type.slug(), "upserted milestone");
        record_from_row(&row)
    }

    async fn load_milestone(&self, id: MilestoneId) -> Result<Option<MilestoneRecord>> {
        let row = sqlx::query(&format!("SELECT {MILESTONE_COLUMNS} FROM milestones WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_milestones(&self, project_id: ProjectId) -> Result<Vec<MilestoneRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {MILESTONE_COLUMNS} FROM milestones WHERE project_id = ? ORDER BY created_at DESC"
        ))
        .bind(project_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter().map(record_from_row).collect()
    }

    async fn completed_milestones(&self, project_id: ProjectId) -> Result<BTreeSet<MilestoneType>> {
        let rows = sqlx::query("SELECT milestone_type FROM milestones WHERE project_id = ?")
            .bind(project_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let value: String = row.try_get("milestone_type").map_err(db_err)?;
                value
                    .parse::<MilestoneType>()
                    .map_err(|e| StorageError::Other(e.to_string()))
            })
            .collect()
    }

    async fn delete_milestone(&mut self, id: MilestoneId) -> Result<()> {
        sqlx::query("DELETE FROM milestones WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // === Track submission operations ===

    async fn upsert_submission(&mut self, submission: &ValidatedTrackSubmission) -> Result<TrackSubmission> {
        let now = Utc::now().to_rfc3339();
        let team_id = submission.team_id();
        let tracks = submission.tracks();

        sqlx::query(&format!(
            "INSERT INTO submissions ({SUBMISSION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(team_id) DO UPDATE SET
                karma_gap_link = excluded.karma_gap_link,
                track_open_track = excluded.track_open_track,
                track_farcaster_miniapp = excluded.track_farcaster_miniapp,
                track_self = excluded.track_self,
                track_v0 = excluded.track_v0,
                updated_at = excluded.updated_at"
        ))
        .bind(SubmissionId::new().to_string())
        .bind(team_id.to_string())
        .bind(submission.karma_gap_link())
        .bind(tracks.open_track)
        .bind(tracks.farcaster_miniapp)
        .bind(tracks.self_protocol)
        .bind(tracks.v0)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        debug!(%team_id, "upserted track submission");
        self.load_submission(team_id)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("submission for team {team_id}")))
    }

    async fn load_submission(&self, team_id: TeamId) -> Result<Option<TrackSubmission>> {
        let row = sqlx::query(&format!("SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE team_id = ?"))
            .bind(team_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(submission_from_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use buildathon_core::{MemberDraft, ProjectDraft, TeamRegistration, TrackSubmissionDraft};

    const ADDRESS: &str = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";

    fn team(email: &str) -> Team {
        TeamRegistration {
            team_name: "Celo Builders".to_string(),
            wallet_address: ADDRESS.to_string(),
            github_repo: None,
            karma_gap_link: None,
            members: vec![MemberDraft {
                member_name: "Ana".to_string(),
                member_email: email.to_string(),
                member_github: None,
                country: "Argentina".to_string(),
            }],
        }
        .into_team()
        .unwrap()
    }

    fn project(team_id: TeamId) -> Project {
        ProjectDraft {
            team_id,
            name: "Pay Links".to_string(),
            description: Some("Payment links on Celo".to_string()),
            github_repo: None,
        }
        .into_project()
        .unwrap()
    }

    fn tracks(team_id: TeamId, link: &str) -> ValidatedTrackSubmission {
        TrackSubmissionDraft {
            team_id,
            karma_gap_link: link.to_string(),
            tracks: TrackSelection {
                farcaster_miniapp: true,
                v0: true,
                ..Default::default()
            },
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn test_track_submission_is_unique_per_team() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let team_id = TeamId::new();

        let first = storage.upsert_submission(&tracks(team_id, "https://a.example.com")).await.unwrap();
        let second = storage.upsert_submission(&tracks(team_id, "https://b.example.com")).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.karma_gap_link, "https://b.example.com");
        assert!(second.tracks.farcaster_miniapp && second.tracks.v0);
        assert!(!second.tracks.open_track);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions")
            .fetch_one(&storage.pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_health_check() {
        let storage = SqliteStorage::in_memory().await.unwrap();
        assert!(storage.health_check().await);
    }

    #[tokio::test]
    async fn test_team_operations() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let t = team("ana@example.com");
        storage.save_team(&t).await.unwrap();

        let loaded = storage.load_team(t.id).await.unwrap().unwrap();
        assert_eq!(loaded.team_name, t.team_name);

        let found = storage.find_team_by_member_email("ANA@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, t.id);

        let err = storage.save_team(&team("ana@example.com")).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
        assert_eq!(storage.list_teams().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_is_unique_per_project_and_type() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let p = project(TeamId::new());
        storage.save_project(&p).await.unwrap();

        let first = storage
            .upsert_milestone(
                p.id,
                MilestoneType::Farcaster,
                &MilestoneFields {
                    farcaster_link: Some("https://farcaster.xyz/a".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = storage
            .upsert_milestone(
                p.id,
                MilestoneType::Farcaster,
                &MilestoneFields {
                    farcaster_link: Some("https://farcaster.xyz/b".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        let records = storage.list_milestones(p.id).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].fields.farcaster_link.as_deref(), Some("https://farcaster.xyz/b"));

        let completed = storage.completed_milestones(p.id).await.unwrap();
        assert!(completed.contains(&MilestoneType::Farcaster));
    }

    #[tokio::test]
    async fn test_plain_insert_race_is_a_conflict() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let p = project(TeamId::new());
        storage
            .upsert_milestone(p.id, MilestoneType::Registration, &MilestoneFields::default())
            .await
            .unwrap();

        let err = sqlx::query(
            "INSERT INTO milestones (id, project_id, milestone_type, created_at, updated_at)
             VALUES (?, ?, 'registration', '2026-01-19T00:00:00Z', '2026-01-19T00:00:00Z')",
        )
        .bind(MilestoneId::new().to_string())
        .bind(p.id.to_string())
        .execute(&storage.pool)
        .await
        .map_err(db_err)
        .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_team_cascades() {
        let mut storage = SqliteStorage::in_memory().await.unwrap();
        let t = team("ana@example.com");
        storage.save_team(&t).await.unwrap();
        let p = project(t.id);
        storage.save_project(&p).await.unwrap();
        storage
            .upsert_milestone(p.id, MilestoneType::Registration, &MilestoneFields::default())
            .await
            .unwrap();
        storage.upsert_submission(&tracks(t.id, "https://a.example.com")).await.unwrap();

        storage.delete_team(t.id).await.unwrap();
        assert!(storage.load_team(t.id).await.unwrap().is_none());
        assert!(storage.load_submission(t.id).await.unwrap().is_none());
        assert!(storage.load_project(p.id).await.unwrap().is_none());
        assert!(storage.completed_milestones(p.id).await.unwrap().is_empty());
        // The e-mail is free again.
        storage.save_team(&team("ana@example.com")).await.unwrap();
    }
}
