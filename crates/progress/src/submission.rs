//! Milestone submission handling.
//!
//! A submission passes through four gates in a fixed order: the milestone
//! type must parse, the project must exist, the milestone must be unlocked
//! and the payload must validate. Only then is the record written.

use buildathon_core::{
    is_unlocked, validate_payload, MilestoneFields, MilestoneRecord, MilestoneType, ProjectId,
    UnlockResult, ValidatedFields,
};
use buildathon_storage::Storage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{parse_id, Result, ServiceError};

/// A raw submission, as received from a client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    /// Target project
    pub project_id: String,
    /// Milestone name, e.g. `MAINNET` or `final-submission`
    pub milestone_type: String,
    /// Payload
    #[serde(flatten)]
    pub fields: MilestoneFields,
}

/// Persist an accepted submission.
///
/// Creates the `(project, type)` record or replaces the fields of the
/// existing one. Callers must have checked the unlock state first.
pub async fn record_submission<S: Storage + ?Sized>(
    storage: &mut S,
    project_id: ProjectId,
    validated: ValidatedFields,
) -> Result<MilestoneRecord> {
    let milestone_type = validated.milestone_type();
    let record = storage
        .upsert_milestone(project_id, milestone_type, validated.fields())
        .await?;
    Ok(record)
}

/// Submission boundary over a store.
pub struct SubmissionService<'a, S: Storage + ?Sized> {
    storage: &'a mut S,
}

impl<'a, S: Storage + ?Sized> SubmissionService<'a, S> {
    /// Create a service writing to `storage`.
    pub fn new(storage: &'a mut S) -> Self {
        Self { storage }
    }

    /// Handle a raw request.
    pub async fn submit(&mut self, request: &SubmissionRequest) -> Result<MilestoneRecord> {
        let milestone_type: MilestoneType = match request.milestone_type.parse() {
            Ok(t) => t,
            Err(e) => {
                warn!(milestone = %request.milestone_type, "Rejected submission: unknown milestone type");
                return Err(ServiceError::UnknownMilestoneType(e));
            }
        };
        let project_id: ProjectId = parse_id("project", &request.project_id)?;
        self.submit_milestone(project_id, milestone_type, &request.fields).await
    }

    /// Handle an already typed request.
    pub async fn submit_milestone(
        &mut self,
        project_id: ProjectId,
        milestone_type: MilestoneType,
        fields: &MilestoneFields,
    ) -> Result<MilestoneRecord> {
        if self.storage.load_project(project_id).await?.is_none() {
            warn!(project_id = %project_id, "Rejected submission: unknown project");
            return Err(ServiceError::ProjectNotFound(project_id));
        }

        let completed = self.storage.completed_milestones(project_id).await?;
        debug!(project_id = %project_id, completed = completed.len(), "Loaded completed milestones");

        if let UnlockResult::Locked { missing } = is_unlocked(milestone_type, &completed) {
            warn!(
                project_id = %project_id,
                milestone = milestone_type.slug(),
                missing = missing.slug(),
                "Rejected submission: prerequisite not met"
            );
            return Err(ServiceError::PrerequisiteNotMet {
                missing,
                requested: milestone_type,
            });
        }

        let validated = validate_payload(milestone_type, fields).map_err(|e| {
            warn!(
                project_id = %project_id,
                milestone = milestone_type.slug(),
                field = e.field().as_str(),
                "Rejected submission: {}",
                e
            );
            ServiceError::Field(e)
        })?;

        let resubmission = completed.contains(&milestone_type);
        let record = record_submission(&mut *self.storage, project_id, validated)
            .await
            .map_err(|e| {
                warn!(project_id = %project_id, milestone = milestone_type.slug(), "Submission not stored: {}", e);
                e
            })?;

        info!(
            project_id = %project_id,
            milestone = milestone_type.slug(),
            record = %record.id,
            resubmission,
            "Milestone submission accepted"
        );
        Ok(record)
    }
}
