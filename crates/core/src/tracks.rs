//! Team track submission.
//!
//! Separate from milestone progress: each team hands in one submission
//! choosing the prize tracks it competes in. Resubmitting replaces it.

use serde::{Deserialize, Serialize};
use crate::id::{SubmissionId, TeamId};
use crate::validation::{is_absolute_url, normalize};
use crate::Time;

/// Rejected track submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackSubmissionError {
    /// Karma GAP link blank
    #[error("Karma Gap link is required")]
    MissingKarmaGapLink,

    /// Neither Open Track nor MiniApps chosen
    #[error("Please select at least one primary track: Open Track or MiniApps")]
    NoPrimaryTrack,

    /// Karma GAP link not an absolute URL
    #[error("Invalid URL format")]
    InvalidUrl,
}

/// Prize tracks a team enters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSelection {
    /// Open Track (primary)
    #[serde(rename = "trackOpenTrack", default)]
    pub open_track: bool,
    /// Farcaster MiniApps (primary)
    #[serde(rename = "trackFarcasterMiniapp", default)]
    pub farcaster_miniapp: bool,
    /// Self protocol bounty
    #[serde(rename = "trackSelf", default)]
    pub self_protocol: bool,
    /// v0 bounty
    #[serde(rename = "trackV0", default)]
    pub v0: bool,
}

impl TrackSelection {
    /// Whether a primary track is among the selection.
    pub fn has_primary(&self) -> bool {
        self.open_track || self.farcaster_miniapp
    }

    /// Display names of the selected tracks.
    pub fn names(&self) -> Vec<&'static str> {
        [
            (self.open_track, "Open Track"),
            (self.farcaster_miniapp, "MiniApps"),
            (self.self_protocol, "Self"),
            (self.v0, "v0"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect()
    }
}

/// A track submission as received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSubmissionDraft {
    /// Submitting team
    pub team_id: TeamId,
    /// Karma GAP project URL
    #[serde(default)]
    pub karma_gap_link: String,
    /// Chosen tracks
    #[serde(flatten)]
    pub tracks: TrackSelection,
}

/// A track submission that passed [`TrackSubmissionDraft::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTrackSubmission {
    team_id: TeamId,
    karma_gap_link: String,
    tracks: TrackSelection,
}

impl ValidatedTrackSubmission {
    /// Submitting team.
    pub fn team_id(&self) -> TeamId {
        self.team_id
    }

    /// Trimmed Karma GAP URL.
    pub fn karma_gap_link(&self) -> &str {
        &self.karma_gap_link
    }

    /// Chosen tracks.
    pub fn tracks(&self) -> TrackSelection {
        self.tracks
    }
}

impl TrackSubmissionDraft {
    /// Check the link and track choice. Team existence is up to the caller.
    pub fn validate(&self) -> Result<ValidatedTrackSubmission, TrackSubmissionError> {
        let link = normalize(Some(self.karma_gap_link.as_str()))
            .ok_or(TrackSubmissionError::MissingKarmaGapLink)?;
        if !self.tracks.has_primary() {
            return Err(TrackSubmissionError::NoPrimaryTrack);
        }
        if !is_absolute_url(&link) {
            return Err(TrackSubmissionError::InvalidUrl);
        }
        Ok(ValidatedTrackSubmission {
            team_id: self.team_id,
            karma_gap_link: link,
            tracks: self.tracks,
        })
    }
}

/// A team's stored track submission. At most one exists per team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSubmission {
    /// Unique identifier
    pub id: SubmissionId,
    /// Owning team
    pub team_id: TeamId,
    /// Karma GAP project URL
    pub karma_gap_link: String,
    /// Chosen tracks
    pub tracks: TrackSelection,
    /// First submission
    pub created_at: Time,
    /// Latest submission
    pub updated_at: Time,
}

impl TrackSubmission {
    /// Create the record for a first submission.
    pub fn new(validated: &ValidatedTrackSubmission) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: SubmissionId::new(),
            team_id: validated.team_id,
            karma_gap_link: validated.karma_gap_link.clone(),
            tracks: validated.tracks,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace link and tracks on resubmission.
    pub fn replace(&mut self, validated: &ValidatedTrackSubmission) {
        self.karma_gap_link = validated.karma_gap_link.clone();
        self.tracks = validated.tracks;
        self.updated_at = chrono::Utc::now();
    }
}
