//! Team model - who is building.

use std::sync::OnceLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use crate::id::{MemberId, TeamId};
use crate::Time;

/// A team registered for the buildathon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Unique identifier
    pub id: TeamId,

    /// Team name
    pub team_name: String,

    /// EVM wallet receiving prizes
    pub wallet_address: String,

    /// Public repository, if already created
    pub github_repo: Option<String>,

    /// Karma GAP project page, if already created
    pub karma_gap_link: Option<String>,

    /// Team members
    pub members: Vec<TeamMember>,

    /// When registered
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,
}

impl Team {
    /// Whether a member with this e-mail belongs to the team.
    pub fn has_member_email(&self, email: &str) -> bool {
        let email = email.trim();
        self.members
            .iter()
            .any(|m| m.member_email.eq_ignore_ascii_case(email))
    }

    /// `owner/repo` when the repository lives on GitHub.
    pub fn github_slug(&self) -> Option<GithubRepo> {
        self.github_repo.as_deref().and_then(GithubRepo::parse)
    }
}

/// A person on a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMember {
    /// Unique identifier
    pub id: MemberId,

    /// Display name
    pub member_name: String,

    /// Contact e-mail, unique across all teams
    pub member_email: String,

    /// GitHub handle
    pub member_github: Option<String>,

    /// Country of residence
    pub country: String,
}

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubRepo {
    /// Account or organization
    pub owner: String,
    /// Repository name, without `.git`
    pub repo: String,
}

impl GithubRepo {
    /// Parse `https://github.com/owner/repo[.git][/...]`.
    pub fn parse(url: &str) -> Option<Self> {
        static PATTERN: OnceLock<Regex> = OnceLock::new();
        let pattern = PATTERN.get_or_init(|| {
            Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://(?:www\.)?github\.com/([^/\s?#]+)/([^/\s?#]+)")
                .expect("static GitHub pattern")
        });

        let caps = pattern.captures(url.trim())?;
        let owner = caps.get(1)?.as_str().trim().to_string();
        let repo = caps.get(2)?.as_str().trim();
        let repo = if repo.to_ascii_lowercase().ends_with(".git") {
            &repo[..repo.len() - 4]
        } else {
            repo
        };

        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self { owner, repo: repo.to_string() })
    }
}

impl std::fmt::Display for GithubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}
