//! Team and project registration input, and the rules it must satisfy.

use std::collections::HashSet;
use serde::{Deserialize, Serialize};
use crate::id::{MemberId, ProjectId, TeamId};
use crate::project::Project;
use crate::team::{Team, TeamMember};
use crate::validation::{is_absolute_url, is_evm_address, normalize};

/// Rejected registration input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// Team name blank
    #[error("teamName is required")]
    MissingTeamName,

    /// Wallet not an EVM address
    #[error("Please enter a valid EVM wallet address (0x + 40 hex characters)")]
    InvalidWallet,

    /// Empty member list
    #[error("At least one team member is required")]
    NoMembers,

    /// Member without name, e-mail or country
    #[error("All members must have name, email, and country (member #{position})")]
    IncompleteMember {
        /// 1-based position in the submitted list
        position: usize,
    },

    /// E-mail that cannot be an address
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    /// Same e-mail twice in one submission
    #[error("Duplicate email addresses in team members: {0}")]
    DuplicateEmail(String),

    /// Optional link present but not an absolute URL
    #[error("Invalid URL in {0}")]
    InvalidUrl(&'static str),

    /// Project name blank
    #[error("Project name is required")]
    MissingProjectName,
}

/// A team member as submitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberDraft {
    /// Display name
    pub member_name: String,
    /// Contact e-mail
    pub member_email: String,
    /// GitHub handle
    #[serde(default)]
    pub member_github: Option<String>,
    /// Country of residence
    pub country: String,
}

/// Registration (or full replacement) of a team.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamRegistration {
    /// Team name
    pub team_name: String,
    /// EVM wallet
    pub wallet_address: String,
    /// Optional repository URL
    #[serde(default)]
    pub github_repo: Option<String>,
    /// Optional Karma GAP URL
    #[serde(default)]
    pub karma_gap_link: Option<String>,
    /// Members, at least one
    pub members: Vec<MemberDraft>,
}

struct CheckedMember {
    name: String,
    email: String,
    github: Option<String>,
    country: String,
}

struct CheckedRegistration {
    team_name: String,
    wallet_address: String,
    github_repo: Option<String>,
    karma_gap_link: Option<String>,
    members: Vec<CheckedMember>,
}

fn is_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.contains(char::is_whitespace)
        }
        None => false,
    }
}

fn optional_url(value: Option<&str>, field: &'static str) -> Result<Option<String>, RegistrationError> {
    match normalize(value) {
        Some(v) if !is_absolute_url(&v) => Err(RegistrationError::InvalidUrl(field)),
        other => Ok(other),
    }
}

impl TeamRegistration {
    fn check(&self) -> Result<CheckedRegistration, RegistrationError> {
        let team_name = normalize(Some(self.team_name.as_str())).ok_or(RegistrationError::MissingTeamName)?;

        let wallet_address = self.wallet_address.trim().to_string();
        if !is_evm_address(&wallet_address) {
            return Err(RegistrationError::InvalidWallet);
        }

        let github_repo = optional_url(self.github_repo.as_deref(), "githubRepo")?;
        let karma_gap_link = optional_url(self.karma_gap_link.as_deref(), "karmaGapLink")?;

        if self.members.is_empty() {
            return Err(RegistrationError::NoMembers);
        }

        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(self.members.len());
        for (i, m) in self.members.iter().enumerate() {
            let position = i + 1;
            let (Some(name), Some(email), Some(country)) = (
                normalize(Some(m.member_name.as_str())),
                normalize(Some(m.member_email.as_str())),
                normalize(Some(m.country.as_str())),
            ) else {
                return Err(RegistrationError::IncompleteMember { position });
            };

            if !is_email(&email) {
                return Err(RegistrationError::InvalidEmail(email));
            }
            if !seen.insert(email.to_ascii_lowercase()) {
                return Err(RegistrationError::DuplicateEmail(email));
            }

            members.push(CheckedMember {
                name,
                email,
                github: normalize(m.member_github.as_deref()),
                country,
            });
        }

        Ok(CheckedRegistration {
            team_name,
            wallet_address,
            github_repo,
            karma_gap_link,
            members,
        })
    }

    /// E-mails as submitted, trimmed.
    pub fn member_emails(&self) -> Vec<String> {
        self.members
            .iter()
            .map(|m| m.member_email.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Validate and build a new team.
    pub fn into_team(self) -> Result<Team, RegistrationError> {
        let checked = self.check()?;
        let now = chrono::Utc::now();
        Ok(Team {
            id: TeamId::new(),
            team_name: checked.team_name,
            wallet_address: checked.wallet_address,
            github_repo: checked.github_repo,
            karma_gap_link: checked.karma_gap_link,
            members: checked
                .members
                .into_iter()
                .map(|m| TeamMember {
                    id: MemberId::new(),
                    member_name: m.name,
                    member_email: m.email,
                    member_github: m.github,
                    country: m.country,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Validate and replace an existing team's details and members.
    ///
    /// Members whose e-mail matches an existing member keep their id; members
    /// left out of the new list are dropped. `team` is untouched on error.
    pub fn apply_to(self, team: &mut Team) -> Result<(), RegistrationError> {
        let checked = self.check()?;

        let members = checked
            .members
            .into_iter()
            .map(|m| {
                let id = team
                    .members
                    .iter()
                    .find(|existing| existing.member_email.eq_ignore_ascii_case(&m.email))
                    .map(|existing| existing.id)
                    .unwrap_or_default();
                TeamMember {
                    id,
                    member_name: m.name,
                    member_email: m.email,
                    member_github: m.github,
                    country: m.country,
                }
            })
            .collect();

        team.team_name = checked.team_name;
        team.wallet_address = checked.wallet_address;
        team.github_repo = checked.github_repo;
        team.karma_gap_link = checked.karma_gap_link;
        team.members = members;
        team.updated_at = chrono::Utc::now();
        Ok(())
    }
}

/// A project as submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDraft {
    /// Owning team
    pub team_id: TeamId,
    /// Project name
    pub name: String,
    /// Short pitch
    #[serde(default)]
    pub description: Option<String>,
    /// Source repository
    #[serde(default)]
    pub github_repo: Option<String>,
}

impl ProjectDraft {
    /// Validate and build a new project.
    pub fn into_project(self) -> Result<Project, RegistrationError> {
        let name = normalize(Some(self.name.as_str())).ok_or(RegistrationError::MissingProjectName)?;
        Ok(Project {
            id: ProjectId::new(),
            team_id: self.team_id,
            name,
            description: normalize(self.description.as_deref()),
            github_repo: optional_url(self.github_repo.as_deref(), "githubRepo")?,
            created_at: chrono::Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALLET: &str = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";

    fn member(name: &str, email: &str, country: &str) -> MemberDraft {
        MemberDraft {
            member_name: name.to_string(),
            member_email: email.to_string(),
            member_github: None,
            country: country.to_string(),
        }
    }

    fn registration() -> TeamRegistration {
        TeamRegistration {
            team_name: "  Celo Builders ".to_string(),
            wallet_address: WALLET.to_string(),
            github_repo: Some("https://github.com/celo-builders/app".to_string()),
            karma_gap_link: None,
            members: vec![
                member("Ana", "ana@example.com", "Argentina"),
                member("Bruno", "bruno@example.com", "Brazil"),
            ],
        }
    }

    #[test]
    fn test_into_team_normalizes() {
        let team = registration().into_team().unwrap();
        assert_eq!(team.team_name, "Celo Builders");
        assert_eq!(team.members.len(), 2);
        assert_ne!(team.members[0].id, team.members[1].id);
        assert!(team.has_member_email("ANA@example.com"));
        assert_eq!(team.github_slug().unwrap().to_string(), "celo-builders/app");
    }

    #[test]
    fn test_rejects_missing_name_and_bad_wallet() {
        let mut reg = registration();
        reg.team_name = "   ".to_string();
        assert_eq!(reg.into_team().unwrap_err(), RegistrationError::MissingTeamName);

        let mut reg = registration();
        reg.wallet_address = "0x123".to_string();
        assert_eq!(reg.into_team().unwrap_err(), RegistrationError::InvalidWallet);
    }

    #[test]
    fn test_rejects_member_problems() {
        let mut reg = registration();
        reg.members.clear();
        assert_eq!(reg.into_team().unwrap_err(), RegistrationError::NoMembers);

        let mut reg = registration();
        reg.members[1].country = String::new();
        assert_eq!(
            reg.into_team().unwrap_err(),
            RegistrationError::IncompleteMember { position: 2 }
        );

        let mut reg = registration();
        reg.members[1].member_email = "ANA@example.com".to_string();
        assert!(matches!(reg.into_team().unwrap_err(), RegistrationError::DuplicateEmail(_)));

        let mut reg = registration();
        reg.members[0].member_email = "ana.example.com".to_string();
        assert!(matches!(reg.into_team().unwrap_err(), RegistrationError::InvalidEmail(_)));
    }

    #[test]
    fn test_rejects_relative_links() {
        let mut reg = registration();
        reg.github_repo = Some("github.com/celo".to_string());
        assert_eq!(reg.into_team().unwrap_err(), RegistrationError::InvalidUrl("githubRepo"));

        let mut reg = registration();
        reg.github_repo = Some(" ".to_string());
        assert_eq!(reg.into_team().unwrap().github_repo, None);
    }

    #[test]
    fn test_apply_to_keeps_matching_member_ids() {
        let mut team = registration().into_team().unwrap();
        let ana_id = team.members[0].id;

        let mut update = registration();
        update.team_name = "Renamed".to_string();
        update.members = vec![
            member("Ana G.", "Ana@Example.com", "Argentina"),
            member("Carla", "carla@example.com", "Chile"),
        ];
        update.apply_to(&mut team).unwrap();

        assert_eq!(team.team_name, "Renamed");
        assert_eq!(team.members.len(), 2);
        assert_eq!(team.members[0].id, ana_id);
        assert_eq!(team.members[0].member_name, "Ana G.");
        assert!(!team.has_member_email("bruno@example.com"));
    }

    #[test]
    fn test_apply_to_leaves_team_on_error() {
        let mut team = registration().into_team().unwrap();
        let before = team.clone();

        let mut update = registration();
        update.members.clear();
        assert!(update.apply_to(&mut team).is_err());
        assert_eq!(team, before);
    }

    #[test]
    fn test_project_draft() {
        let draft = ProjectDraft {
            team_id: TeamId::new(),
            name: " Pay Links ".to_string(),
            description: Some("".to_string()),
            github_repo: None,
        };
        let project = draft.into_project().unwrap();
        assert_eq!(project.name, "Pay Links");
        assert_eq!(project.description, None);

        let draft = ProjectDraft {
            team_id: TeamId::new(),
            name: "".to_string(),
            description: None,
            github_repo: None,
        };
        assert_eq!(draft.into_project().unwrap_err(), RegistrationError::MissingProjectName);
    }
}
