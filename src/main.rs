use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use releaser::aggregator::{Aggregator, ReleaseCandidate};
use releaser::config::Config;
use releaser::github::{GitHubClient, Owner, Release, RepositoryHost};
use releaser::release::{next_version, publish_releases, ReleaseNotes, VersionChange};

#[derive(Parser)]
#[command(name = "releaser", version)]
#[command(about = "Find repositories with unreleased commits across a GitHub organization and release them")]
struct Cli {
    /// GitHub token (can also be set via GITHUB_TOKEN env var)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Config file (defaults to <config dir>/releaser/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// github.com or a GitHub Enterprise hostname
    #[arg(long)]
    host: Option<String>,

    /// Give up on the whole run after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    /// Organization or user whose repositories are scanned
    #[arg(short, long)]
    owner: String,

    /// Treat the owner as a user account instead of an organization
    #[arg(long)]
    user: bool,

    /// Branch to check for unreleased commits (default branch when missing)
    #[arg(short, long)]
    branch: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List the authenticated user and their organizations
    Orgs,

    /// List repositories with commits newer than their latest tag
    Scan {
        #[command(flatten)]
        target: Target,

        #[arg(short = 'f', long, value_enum, default_value = "text")]
        format: Format,
    },

    /// Tag and release every repository with unreleased commits
    Publish {
        #[command(flatten)]
        target: Target,

        /// Version component to bump
        #[arg(long, value_enum)]
        change: Option<VersionChange>,

        /// Handlebars template for release notes
        #[arg(long)]
        template_path: Option<PathBuf>,

        /// Also create a branch named after the new version
        #[arg(long)]
        create_branch: bool,

        /// Only release these repositories
        #[arg(short, long, value_delimiter = ',')]
        repos: Vec<String>,

        /// Print the releases instead of creating them
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("releaser=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    let token = cli.token.or_else(|| config.github.token.clone()).unwrap_or_default();
    let host = cli.host.unwrap_or_else(|| config.github.host.clone());
    let client = GitHubClient::builder()
        .host(&host)
        .token(token)
        .build()
        .context("failed to create GitHub client")?;

    let timeout = cli
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.scan.timeout());
    let aggregator = Aggregator::new(Arc::new(client)).with_deadline(Instant::now() + timeout);

    match cli.command {
        Commands::Orgs => list_organizations(&aggregator).await,
        Commands::Scan { target, format } => {
            let owner = aggregator.resolve_owner(&target.owner, target.user).await?;
            let branch = target.branch.or_else(|| config.scan.branch().map(String::from));

            let mut seen = 0;
            stream_candidates(&aggregator, owner, branch, |candidate| {
                seen += 1;
                match format {
                    Format::Text => println!(
                        "[{}/{}] {} on {}: {} unreleased since {}",
                        seen,
                        candidate.total,
                        candidate.repository.full_name(),
                        candidate.branch,
                        candidate.commits.len(),
                        candidate.previous_version().unwrap_or("the first commit"),
                    ),
                    Format::Json => match serde_json::to_string(candidate) {
                        Ok(line) => println!("{}", line),
                        Err(err) => eprintln!("failed to serialize {}: {}", candidate.repository.name, err),
                    },
                }
            })
            .await?;
            Ok(())
        }
        Commands::Publish {
            target,
            change,
            template_path,
            create_branch,
            repos,
            dry_run,
        } => {
            let owner = aggregator.resolve_owner(&target.owner, target.user).await?;
            let branch = target.branch.or_else(|| config.scan.branch().map(String::from));
            let change = change.unwrap_or(config.release.change);
            let create_branch = create_branch || config.release.create_branch;
            let notes = release_notes(&config, template_path)?;

            let candidates = stream_candidates(&aggregator, owner.clone(), branch, |candidate| {
                info!(repo = %candidate.repository.full_name(), commits = candidate.commits.len(), "found release candidate");
            })
            .await?;

            let mut releases = Vec::new();
            for candidate in candidates
                .iter()
                .filter(|c| repos.is_empty() || repos.contains(&c.repository.name))
            {
                let version = next_version(candidate.previous_version(), change);
                let body = if dry_run {
                    notes.preview(candidate, &version)
                } else {
                    notes
                        .render(candidate, &version)
                        .with_context(|| format!("failed to render notes for {}", candidate.repository.name))?
                };
                releases.push(Release::from_candidate(candidate, version, body, create_branch));
            }

            if dry_run {
                for release in &releases {
                    println!("=== {}/{} {} ===", owner.login(), release.repository, release.version);
                    println!("{}", release.body);
                }
                return Ok(());
            }

            publish(&aggregator, &owner, releases).await
        }
    }
}

fn release_notes(config: &Config, template_path: Option<PathBuf>) -> Result<ReleaseNotes> {
    if let Some(path) = template_path {
        return Ok(ReleaseNotes::from_file(&path)?);
    }

    let notes = match (&config.release.template, &config.release.template_path) {
        (Some(template), _) => ReleaseNotes::from_template(template)?,
        (None, Some(path)) => ReleaseNotes::from_file(path)?,
        (None, None) => ReleaseNotes::new()?,
    };
    Ok(notes)
}

/// `err` followed by each of its causes.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Drain a candidate scan, calling `each` as candidates arrive.
async fn stream_candidates<H, F>(
    aggregator: &Aggregator<H>,
    owner: Owner,
    branch: Option<String>,
    mut each: F,
) -> Result<Vec<ReleaseCandidate>>
where
    H: RepositoryHost + 'static,
    F: FnMut(&ReleaseCandidate),
{
    let (mut receiver, scan) = aggregator.release_candidates(owner, branch);
    let driver = tokio::spawn(scan.run());

    let mut candidates = Vec::new();
    while let Some(candidate) = receiver.recv().await {
        each(&candidate);
        candidates.push(candidate);
    }

    driver.await.context("scan task panicked")??;
    Ok(candidates)
}

async fn list_organizations<H: RepositoryHost + 'static>(aggregator: &Aggregator<H>) -> Result<()> {
    let (mut receiver, scan) = aggregator.organizations();
    let driver = tokio::spawn(scan.run());

    while let Some(entry) = receiver.recv().await {
        let kind = if entry.personal { "user" } else { "org" };
        println!(
            "{:<4} {:<30} {}",
            kind,
            entry.organization.login,
            entry.organization.description.as_deref().unwrap_or("")
        );
    }

    driver.await.context("organization listing panicked")??;
    Ok(())
}

async fn publish<H: RepositoryHost + 'static>(
    aggregator: &Aggregator<H>,
    owner: &Owner,
    releases: Vec<Release>,
) -> Result<()> {
    if releases.is_empty() {
        println!("Nothing to release.");
        return Ok(());
    }

    let results = publish_releases(Arc::clone(aggregator.host()), owner.login(), releases).await;

    let mut failed = 0;
    for result in &results {
        match &result.outcome {
            Ok(url) => println!("✓ {} {}: {}", result.release.repository, result.release.version, url),
            Err(err) => {
                failed += 1;
                println!("✗ {} {}: {}", result.release.repository, result.release.version, error_chain(err));
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} releases failed", failed, results.len());
    }
    Ok(())
}
