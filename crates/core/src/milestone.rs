//! Milestone model - the checkpoints a project moves through during the event.

use serde::{Deserialize, Serialize};
use crate::id::{MilestoneId, ProjectId};
use crate::Time;

/// A named checkpoint a project must (or may) complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneType {
    /// Project registered for the event
    Registration,
    /// Contract deployed to testnet
    Testnet,
    /// Project published on Karma GAP
    KarmaGap,
    /// Contract deployed to mainnet
    Mainnet,
    /// Farcaster mini app (optional)
    Farcaster,
    /// Slides and pitch deck handed in
    FinalSubmission,
}

impl MilestoneType {
    /// Every milestone in canonical order.
    pub const ALL: [MilestoneType; 6] = [
        MilestoneType::Registration,
        MilestoneType::Testnet,
        MilestoneType::KarmaGap,
        MilestoneType::Mainnet,
        MilestoneType::Farcaster,
        MilestoneType::FinalSubmission,
    ];

    /// Human-readable name.
    pub const fn label(self) -> &'static str {
        match self {
            MilestoneType::Registration => "Registration",
            MilestoneType::Testnet => "Testnet",
            MilestoneType::KarmaGap => "Karma Gap",
            MilestoneType::Mainnet => "Mainnet",
            MilestoneType::Farcaster => "Farcaster",
            MilestoneType::FinalSubmission => "Final submission",
        }
    }

    /// Slug used in request payloads and on the command line.
    pub const fn slug(self) -> &'static str {
        match self {
            MilestoneType::Registration => "registration",
            MilestoneType::Testnet => "testnet",
            MilestoneType::KarmaGap => "karma-gap",
            MilestoneType::Mainnet => "mainnet",
            MilestoneType::Farcaster => "farcaster",
            MilestoneType::FinalSubmission => "final-submission",
        }
    }

    /// The single milestone that must be completed before this one.
    pub const fn prerequisite(self) -> Option<MilestoneType> {
        match self {
            MilestoneType::Registration => None,
            MilestoneType::Testnet => Some(MilestoneType::Registration),
            MilestoneType::KarmaGap => Some(MilestoneType::Testnet),
            MilestoneType::Mainnet => Some(MilestoneType::KarmaGap),
            // Optional, but still only after Mainnet.
            MilestoneType::Farcaster => Some(MilestoneType::Mainnet),
            // Farcaster is not required for the final submission.
            MilestoneType::FinalSubmission => Some(MilestoneType::Mainnet),
        }
    }

    /// Whether the milestone can be skipped entirely.
    pub const fn is_optional(self) -> bool {
        matches!(self, MilestoneType::Farcaster)
    }
}

impl std::fmt::Display for MilestoneType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A milestone type string that names none of the known milestones.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid milestone type: {0:?}")]
pub struct ParseMilestoneError(pub String);

impl std::str::FromStr for MilestoneType {
    type Err = ParseMilestoneError;

    /// Accepts slugs (`karma-gap`) as well as the stored form (`KARMA_GAP`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        MilestoneType::ALL
            .into_iter()
            .find(|t| t.slug() == normalized)
            .ok_or_else(|| ParseMilestoneError(s.to_string()))
    }
}

/// Payload fields a milestone submission may carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneFields {
    /// Deployed contract address (testnet / mainnet)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,

    /// Karma GAP project page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub karma_gap_link: Option<String>,

    /// Farcaster mini app link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farcaster_link: Option<String>,

    /// Presentation slides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slides_link: Option<String>,

    /// Pitch deck
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch_deck_link: Option<String>,
}

/// A completed milestone for a project. At most one exists per
/// `(project_id, milestone_type)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    /// Unique identifier
    pub id: MilestoneId,

    /// Owning project
    pub project_id: ProjectId,

    /// Which milestone this record completes
    pub milestone_type: MilestoneType,

    /// Submitted payload
    pub fields: MilestoneFields,

    /// First accepted submission
    pub created_at: Time,

    /// Latest accepted submission
    pub updated_at: Time,
}

impl MilestoneRecord {
    /// Create a record for a first submission.
    pub fn new(project_id: ProjectId, milestone_type: MilestoneType, fields: MilestoneFields) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: MilestoneId::new(),
            project_id,
            milestone_type,
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the payload on resubmission, keeping identity and creation time.
    pub fn replace_fields(&mut self, fields: MilestoneFields) {
        self.fields = fields;
        self.updated_at = chrono::Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_slugs_and_stored_form() {
        assert_eq!("karma-gap".parse::<MilestoneType>().unwrap(), MilestoneType::KarmaGap);
        assert_eq!("KARMA_GAP".parse::<MilestoneType>().unwrap(), MilestoneType::KarmaGap);
        assert_eq!(" Final-Submission ".parse::<MilestoneType>().unwrap(), MilestoneType::FinalSubmission);
        for t in MilestoneType::ALL {
            assert_eq!(t.slug().parse::<MilestoneType>().unwrap(), t);
        }
    }

    #[test]
    fn test_parse_unknown_type() {
        let err = "demo-day".parse::<MilestoneType>().unwrap_err();
        assert_eq!(err, ParseMilestoneError("demo-day".to_string()));
        assert!("".parse::<MilestoneType>().is_err());
    }

    #[test]
    fn test_serde_uses_stored_form() {
        let json = serde_json::to_string(&MilestoneType::FinalSubmission).unwrap();
        assert_eq!(json, "\"FINAL_SUBMISSION\"");
        let back: MilestoneType = serde_json::from_str("\"KARMA_GAP\"").unwrap();
        assert_eq!(back, MilestoneType::KarmaGap);
    }

    #[test]
    fn test_prerequisite_chain_reaches_registration() {
        for t in MilestoneType::ALL {
            let mut current = t;
            let mut steps = 0;
            while let Some(p) = current.prerequisite() {
                assert!(p < current);
                current = p;
                steps += 1;
                assert!(steps <= MilestoneType::ALL.len());
            }
            assert_eq!(current, MilestoneType::Registration);
        }
    }

    #[test]
    fn test_only_farcaster_is_optional() {
        let optional: Vec<_> = MilestoneType::ALL.into_iter().filter(|t| t.is_optional()).collect();
        assert_eq!(optional, vec![MilestoneType::Farcaster]);
    }

    #[test]
    fn test_replace_fields_keeps_identity() {
        let mut record = MilestoneRecord::new(
            ProjectId::new(),
            MilestoneType::Testnet,
            MilestoneFields {
                contract_address: Some("0x1".to_string()),
                ..Default::default()
            },
        );
        let id = record.id;
        let created = record.created_at;

        record.replace_fields(MilestoneFields {
            contract_address: Some("0x2".to_string()),
            ..Default::default()
        });

        assert_eq!(record.id, id);
        assert_eq!(record.created_at, created);
        assert_eq!(record.fields.contract_address.as_deref(), Some("0x2"));
        assert!(record.updated_at >= created);
    }
}
