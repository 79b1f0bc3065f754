//! Buildathon CLI - team registration and milestone tracking.

mod config;

use std::path::PathBuf;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use buildathon_core::{
    MemberDraft, MilestoneFields, MilestoneId, MilestoneRecord, MilestoneStatus, ProjectDraft,
    ProjectId, Team, TeamId, TeamRegistration, TrackSelection, TrackSubmission, TrackSubmissionDraft,
};
use buildathon_progress::{
    parse_id, AdminService, MilestoneTracker, ProgressTracker, RegistrationService, ServiceError,
    SubmissionRequest, SubmissionService,
};
use buildathon_storage::{JsonStorage, Storage};

use config::{Backend, BuildathonConfig};

#[derive(Parser)]
#[command(name = "buildathon")]
#[command(about = "Buildathon registration and milestone tracking", long_about = None)]
struct Cli {
    /// Config file (defaults to ./buildathon.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Data directory
    #[arg(long, global = true)]
    storage: Option<PathBuf>,
    /// Storage backend
    #[arg(long, global = true, value_enum)]
    backend: Option<Backend>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new team
    Register {
        /// Team name
        #[arg(long)]
        name: String,
        /// Team wallet (0x + 40 hex)
        #[arg(long)]
        wallet: String,
        /// Member as "name,email,country[,github]" (repeatable)
        #[arg(long = "member", value_parser = parse_member, required = true)]
        members: Vec<MemberDraft>,
        /// Repository URL
        #[arg(long)]
        github_repo: Option<String>,
        /// Karma GAP project URL
        #[arg(long)]
        karma_gap_link: Option<String>,
    },
    /// Update a team; a given member list replaces the current one
    UpdateTeam {
        /// Team ID
        id: String,
        /// Team name
        #[arg(long)]
        name: Option<String>,
        /// Team wallet
        #[arg(long)]
        wallet: Option<String>,
        /// Member as "name,email,country[,github]" (repeatable)
        #[arg(long = "member", value_parser = parse_member)]
        members: Vec<MemberDraft>,
        /// Repository URL ("" clears it)
        #[arg(long)]
        github_repo: Option<String>,
        /// Karma GAP project URL ("" clears it)
        #[arg(long)]
        karma_gap_link: Option<String>,
    },
    /// Find the team a member e-mail belongs to
    FindTeam {
        /// Member e-mail
        #[arg(long)]
        email: String,
    },
    /// List teams
    Teams,
    /// Hand in (or replace) a team's prize track submission
    SubmitTracks {
        /// Team ID
        team: String,
        /// Karma GAP project URL
        #[arg(long)]
        karma_gap_link: String,
        /// Enter the Open Track
        #[arg(long)]
        open_track: bool,
        /// Enter the Farcaster MiniApps track
        #[arg(long)]
        miniapp: bool,
        /// Enter the Self bounty
        #[arg(long = "self")]
        self_protocol: bool,
        /// Enter the v0 bounty
        #[arg(long)]
        v0: bool,
    },
    /// Create a project (records the Registration milestone)
    AddProject {
        /// Owning team ID
        #[arg(long)]
        team: String,
        /// Project name
        #[arg(long)]
        name: String,
        /// Short description
        #[arg(long)]
        description: Option<String>,
        /// Repository URL
        #[arg(long)]
        github_repo: Option<String>,
    },
    /// List projects
    Projects {
        /// Only this team's projects
        #[arg(long)]
        team: Option<String>,
    },
    /// Submit a milestone
    Submit {
        /// Project ID
        project: String,
        /// Milestone (registration, testnet, karma-gap, mainnet, farcaster, final-submission)
        milestone: String,
        /// Deployed contract address
        #[arg(long)]
        contract_address: Option<String>,
        /// Karma GAP project URL
        #[arg(long)]
        karma_gap_link: Option<String>,
        /// Farcaster mini app URL
        #[arg(long)]
        farcaster_link: Option<String>,
        /// Slides URL
        #[arg(long)]
        slides_link: Option<String>,
        /// Pitch deck URL
        #[arg(long)]
        pitch_deck_link: Option<String>,
    },
    /// Show a project's milestone board
    Status {
        /// Project ID
        project: String,
    },
    /// Show a project's milestone records
    History {
        /// Project ID
        project: String,
    },
    /// Organizer commands
    #[command(subcommand)]
    Admin(AdminCommands),
}

#[derive(Subcommand)]
enum AdminCommands {
    /// All teams, projects and milestone progress
    Dashboard,
    /// Members per country
    Countries,
    /// Delete a team with its projects
    DeleteTeam {
        /// Team ID
        id: String,
    },
    /// Delete a project with its milestones
    DeleteProject {
        /// Project ID
        id: String,
    },
    /// Delete one milestone record
    DeleteMilestone {
        /// Milestone record ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = BuildathonConfig::load(cli.config.as_deref())
        .await?
        .with_overrides(cli.storage, cli.backend);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(storage = %config.storage_path.display(), backend = ?config.backend, "Opening storage");
    match config.backend {
        Backend::Json => {
            let mut storage = JsonStorage::new(&config.storage_path).await?;
            run(&mut storage, cli.command).await
        }
        Backend::Sqlite => open_sqlite(&config, cli.command).await,
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(config: &BuildathonConfig, command: Commands) -> Result<()> {
    tokio::fs::create_dir_all(&config.storage_path).await?;
    let db = config.storage_path.join("buildathon.db");
    let mut storage = buildathon_storage::SqliteStorage::new_from_path(&db).await?;
    run(&mut storage, command).await
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_config: &BuildathonConfig, _command: Commands) -> Result<()> {
    anyhow::bail!("SQLite backend not available; rebuild with --features sqlite")
}

async fn run<S: Storage>(storage: &mut S, command: Commands) -> Result<()> {
    match command {
        Commands::Register { name, wallet, members, github_repo, karma_gap_link } => {
            let registration = TeamRegistration {
                team_name: name,
                wallet_address: wallet,
                github_repo,
                karma_gap_link,
                members,
            };
            let team = RegistrationService::new(storage).register_team(registration).await?;
            println!("Registered team: {} - {}", team.id, team.team_name);
        }
        Commands::UpdateTeam { id, name, wallet, members, github_repo, karma_gap_link } => {
            let team_id: TeamId = parse_id("team", &id)?;
            let current = storage
                .load_team(team_id)
                .await?
                .ok_or(ServiceError::TeamNotFound(team_id))?;

            let members = if members.is_empty() {
                current
                    .members
                    .into_iter()
                    .map(|m| MemberDraft {
                        member_name: m.member_name,
                        member_email: m.member_email,
                        member_github: m.member_github,
                        country: m.country,
                    })
                    .collect()
            } else {
                members
            };
            let registration = TeamRegistration {
                team_name: name.unwrap_or(current.team_name),
                wallet_address: wallet.unwrap_or(current.wallet_address),
                github_repo: github_repo.or(current.github_repo),
                karma_gap_link: karma_gap_link.or(current.karma_gap_link),
                members,
            };
            let team = RegistrationService::new(storage).update_team(team_id, registration).await?;
            println!("Updated team: {} - {}", team.id, team.team_name);
        }
        Commands::FindTeam { email } => {
            let service = RegistrationService::new(storage);
            match service.find_team_by_email(&email).await? {
                Some(team) => {
                    print_team(&team);
                    if let Some(submission) = service.load_submission(team.id).await? {
                        print_submission(&submission);
                    }
                }
                None => println!("No team found for {}", email),
            }
        }
        Commands::SubmitTracks { team, karma_gap_link, open_track, miniapp, self_protocol, v0 } => {
            let draft = TrackSubmissionDraft {
                team_id: parse_id("team", &team)?,
                karma_gap_link,
                tracks: TrackSelection {
                    open_track,
                    farcaster_miniapp: miniapp,
                    self_protocol,
                    v0,
                },
            };
            let submission = RegistrationService::new(storage).submit_tracks(draft).await?;
            println!("Submitted tracks for team {}: {}", submission.team_id, submission.tracks.names().join(", "));
        }
        Commands::Teams => {
            let teams = RegistrationService::new(storage).list_teams().await?;
            println!("Teams ({})", teams.len());
            for team in teams {
                println!("  {} | {} | {} members | {}",
                    team.id,
                    team.team_name,
                    team.members.len(),
                    team.wallet_address,
                );
            }
        }
        Commands::AddProject { team, name, description, github_repo } => {
            let draft = ProjectDraft {
                team_id: parse_id("team", &team)?,
                name,
                description,
                github_repo,
            };
            let project = RegistrationService::new(storage).create_project(draft).await?;
            println!("Added project: {} - {}", project.id, project.name);
        }
        Commands::Projects { team } => {
            let team_id: Option<TeamId> = team.as_deref().map(|t| parse_id("team", t)).transpose()?;
            let projects = RegistrationService::new(storage).list_projects(team_id).await?;
            println!("Projects ({})", projects.len());
            for project in projects {
                println!("  {} | team {} | {}", project.id, project.team_id, project.name);
            }
        }
        Commands::Submit {
            project,
            milestone,
            contract_address,
            karma_gap_link,
            farcaster_link,
            slides_link,
            pitch_deck_link,
        } => {
            let request = SubmissionRequest {
                project_id: project,
                milestone_type: milestone,
                fields: MilestoneFields {
                    contract_address,
                    karma_gap_link,
                    farcaster_link,
                    slides_link,
                    pitch_deck_link,
                },
            };
            let record = SubmissionService::new(storage).submit(&request).await?;
            println!("Submitted {} for project {} ({})", record.milestone_type, record.project_id, record.id);
        }
        Commands::Status { project } => {
            let project_id: ProjectId = parse_id("project", &project)?;
            let board = MilestoneTracker::new(&*storage).board(project_id).await?;

            println!("Milestones for {}", project_id);
            for entry in &board.entries {
                let optional = if entry.optional { " (optional)" } else { "" };
                println!("  {:<9} {}{}", format_status(entry.status), entry.milestone, optional);
            }
            match board.next_available() {
                Some(next) => println!("Next: {}", next),
                None if board.is_finished() => println!("Final submission handed in"),
                None => {}
            }
        }
        Commands::History { project } => {
            let project_id: ProjectId = parse_id("project", &project)?;
            let records = MilestoneTracker::new(&*storage).history(project_id).await?;
            println!("Milestone records ({})", records.len());
            for record in records {
                print_record(&record);
            }
        }
        Commands::Admin(admin) => run_admin(storage, admin).await?,
    }

    Ok(())
}

async fn run_admin<S: Storage>(storage: &mut S, command: AdminCommands) -> Result<()> {
    match command {
        AdminCommands::Dashboard => {
            let dashboard = MilestoneTracker::new(&*storage).dashboard().await?;
            println!("Buildathon Dashboard");
            println!("  Teams: {}", dashboard.teams.len());
            println!("  Members: {}", dashboard.member_count());
            println!("  Projects: {}", dashboard.project_count());
            println!("  Finished: {}", dashboard.finished_count());
            println!("  Track submissions: {}", dashboard.submitted_count());
            for overview in &dashboard.teams {
                let tracks = overview
                    .submission
                    .as_ref()
                    .map(|s| s.tracks.names().join(", "))
                    .unwrap_or_else(|| "no track submission".to_string());
                println!("{} | {} | {}", overview.team.id, overview.team.team_name, tracks);
                for p in &overview.projects {
                    println!("  {} | {} | {}/{} milestones",
                        p.project.id,
                        p.project.name,
                        p.board.completed_count(),
                        p.board.entries.len(),
                    );
                }
            }
        }
        AdminCommands::Countries => {
            let distribution = MilestoneTracker::new(&*storage).country_distribution().await?;
            println!("Members by country");
            for c in distribution {
                println!("  {:<20} {}", c.country, c.count);
            }
        }
        AdminCommands::DeleteTeam { id } => {
            let team = AdminService::new(storage).delete_team(parse_id("team", &id)?).await?;
            println!("Deleted team: {} - {}", team.id, team.team_name);
        }
        AdminCommands::DeleteProject { id } => {
            let project = AdminService::new(storage).delete_project(parse_id("project", &id)?).await?;
            println!("Deleted project: {} - {}", project.id, project.name);
        }
        AdminCommands::DeleteMilestone { id } => {
            let milestone_id: MilestoneId = parse_id("milestone", &id)?;
            let record = AdminService::new(storage).delete_milestone(milestone_id).await?;
            println!("Deleted {} record for project {}", record.milestone_type, record.project_id);
        }
    }
    Ok(())
}

/// Parse `name,email,country[,github]`.
fn parse_member(s: &str) -> std::result::Result<MemberDraft, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [name, email, country] => Ok(MemberDraft {
            member_name: name.to_string(),
            member_email: email.to_string(),
            member_github: None,
            country: country.to_string(),
        }),
        [name, email, country, github] => Ok(MemberDraft {
            member_name: name.to_string(),
            member_email: email.to_string(),
            member_github: Some(github.to_string()).filter(|g| !g.is_empty()),
            country: country.to_string(),
        }),
        _ => Err(format!("expected \"name,email,country[,github]\", got {:?}", s)),
    }
}

fn format_status(status: MilestoneStatus) -> &'static str {
    match status {
        MilestoneStatus::Completed => "DONE",
        MilestoneStatus::Available => "AVAILABLE",
        MilestoneStatus::Locked { .. } => "LOCKED",
    }
}

fn print_team(team: &Team) {
    println!("Team: {}", team.id);
    println!("  Name: {}", team.team_name);
    println!("  Wallet: {}", team.wallet_address);
    if let Some(repo) = team.github_slug() {
        println!("  GitHub: {}", repo);
    }
    if let Some(link) = &team.karma_gap_link {
        println!("  Karma GAP: {}", link);
    }
    println!("  Members:");
    for m in &team.members {
        let github = m.member_github.as_deref().map(|g| format!(" @{}", g)).unwrap_or_default();
        println!("    {} <{}> {}{}", m.member_name, m.member_email, m.country, github);
    }
    println!("  Created: {}", team.created_at);
}

fn print_submission(submission: &TrackSubmission) {
    println!("  Track submission: {}", submission.id);
    println!("    Karma GAP: {}", submission.karma_gap_link);
    println!("    Tracks: {}", submission.tracks.names().join(", "));
    println!("    Updated: {}", submission.updated_at);
}

fn print_record(record: &MilestoneRecord) {
    println!("  {} | {} | updated {}", record.id, record.milestone_type, record.updated_at);
    let f = &record.fields;
    for (label, value) in [
        ("contractAddress", &f.contract_address),
        ("karmaGapLink", &f.karma_gap_link),
        ("farcasterLink", &f.farcaster_link),
        ("slidesLink", &f.slides_link),
        ("pitchDeckLink", &f.pitch_deck_link),
    ] {
        if let Some(v) = value {
            println!("    {}: {}", label, v);
        }
    }
}
