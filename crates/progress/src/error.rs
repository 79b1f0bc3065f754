//! Errors surfaced to callers of the buildathon services.

use buildathon_core::{
    FieldError, MilestoneId, MilestoneType, ParseMilestoneError, ProjectId, RegistrationError, TeamId,
    TrackSubmissionError,
};
use buildathon_storage::StorageError;

/// Result alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// A rejected or failed request.
///
/// Everything except [`ServiceError::Storage`] is a rejection of the caller's
/// input and carries a message fit to show back to them.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Milestone type outside the enumeration
    #[error(transparent)]
    UnknownMilestoneType(#[from] ParseMilestoneError),

    /// The milestone is still locked
    #[error("Please complete \"{}\" before submitting \"{}\".", .missing.label(), .requested.label())]
    PrerequisiteNotMet {
        /// Prerequisite that has no record yet
        missing: MilestoneType,
        /// Milestone that was submitted
        requested: MilestoneType,
    },

    /// Payload field missing or malformed
    #[error(transparent)]
    Field(#[from] FieldError),

    /// Team or project input rejected
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Track submission rejected
    #[error(transparent)]
    Tracks(#[from] TrackSubmissionError),

    /// A uniqueness rule of the store rejected the write
    #[error("{0}")]
    Conflict(String),

    /// Identifier that does not parse
    #[error("Invalid {kind} ID: {value}")]
    InvalidId {
        /// Entity kind
        kind: &'static str,
        /// Raw value
        value: String,
    },

    /// No such project
    #[error("Project not found: {0}")]
    ProjectNotFound(ProjectId),

    /// No such team
    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    /// No such milestone record
    #[error("Milestone not found: {0}")]
    MilestoneNotFound(MilestoneId),

    /// Storage failure
    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Storage(other),
        }
    }
}

impl ServiceError {
    /// Whether the caller's input was at fault (as opposed to the store).
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ServiceError::Storage(_))
    }
}

/// Parse an identifier, reporting which kind of entity it was meant for.
pub fn parse_id<T: std::str::FromStr>(kind: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ServiceError::InvalidId {
        kind,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prerequisite_message() {
        let err = ServiceError::PrerequisiteNotMet {
            missing: MilestoneType::Mainnet,
            requested: MilestoneType::Farcaster,
        };
        assert_eq!(err.to_string(), "Please complete \"Mainnet\" before submitting \"Farcaster\".");
        assert!(err.is_rejection());
    }

    #[test]
    fn test_storage_conflict_becomes_rejection() {
        let err: ServiceError = StorageError::Conflict("email taken".to_string()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert!(err.is_rejection());

        let err: ServiceError = StorageError::Other("disk".to_string()).into();
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_parse_id() {
        let id = ProjectId::new();
        let parsed: ProjectId = parse_id("project", &id.to_string()).unwrap();
        assert_eq!(parsed, id);

        let err = parse_id::<ProjectId>("project", "nope").unwrap_err();
        assert_eq!(err.to_string(), "Invalid project ID: nope");
    }
}
