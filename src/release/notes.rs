//! Release bodies rendered from Handlebars templates.
//!
//! Templates see one candidate at a time:
//!
//! | key | value |
//! |-----|-------|
//! | `version` | version being released |
//! | `branch` | branch the commits come from |
//! | `previous_version` | latest tag, or null |
//! | `repository` | `name`, `owner`, `url`, `description`, `default_branch` |
//! | `commits` | pending commits, newest first |
//! | `sections` | commits grouped by kind: `title`, `kind`, `commits` |
//! | `contributors` | distinct author logins |
//!
//! Each commit has `sha`, `short_sha`, `url`, `summary`, `message`, `kind`,
//! `scope`, `breaking`, `issues`, `pull_request`, and `author`/`committer`
//! with `username`, `name`, `email`, `date`, `url`.

use handlebars::{handlebars_helper, Handlebars};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::commit_analyzer::{group_by_kind, AnalyzedCommit, CommitAnalyzer};
use crate::aggregator::ReleaseCandidate;
use crate::github::types::{Account, Commit, Signature};

const TEMPLATE_NAME: &str = "release";
const DEFAULT_TEMPLATE: &str = include_str!("../../templates/default.md.hbs");

#[derive(Debug, Error)]
pub enum NotesError {
    #[error("invalid release template: {0}")]
    Template(#[from] Box<handlebars::TemplateError>),

    #[error("failed to render release notes: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid commit pattern: {0}")]
    Pattern(#[from] regex::Error),
}

handlebars_helper!(short_sha: |sha: str| sha.chars().take(7).collect::<String>());

pub struct ReleaseNotes {
    registry: Handlebars<'static>,
    analyzer: CommitAnalyzer,
    template: String,
}

impl ReleaseNotes {
    /// Notes rendered with the bundled template.
    pub fn new() -> Result<Self, NotesError> {
        Self::from_template(DEFAULT_TEMPLATE)
    }

    pub fn from_template(template: &str) -> Result<Self, NotesError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("short_sha", Box::new(short_sha));
        registry
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(Box::new)?;

        Ok(Self {
            registry,
            analyzer: CommitAnalyzer::new()?,
            template: template.to_string(),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, NotesError> {
        let template = std::fs::read_to_string(path).map_err(|source| NotesError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_template(&template)
    }

    pub fn render(&self, candidate: &ReleaseCandidate, version: &str) -> Result<String, NotesError> {
        let context = self.context(candidate, version);
        Ok(self.registry.render(TEMPLATE_NAME, &context)?)
    }

    /// Like [`render`](Self::render), but a failure shows the template with
    /// the error appended instead of failing.
    pub fn preview(&self, candidate: &ReleaseCandidate, version: &str) -> String {
        match self.render(candidate, version) {
            Ok(body) => body,
            Err(err) => format!("{}\n\n# Error: {}", self.template, err),
        }
    }

    pub fn context(&self, candidate: &ReleaseCandidate, version: &str) -> Value {
        let analyzed = self.analyzer.analyze_all(&candidate.commits);
        let commits: Vec<Value> = candidate
            .commits
            .iter()
            .zip(&analyzed)
            .map(|(commit, analysis)| commit_context(commit, analysis))
            .collect();

        let sections: Vec<Value> = group_by_kind(&analyzed)
            .into_iter()
            .map(|(kind, members)| {
                let members: Vec<&Value> = members.into_iter().map(|index| &commits[index]).collect();
                json!({
                    "title": kind.to_string(),
                    "kind": kind,
                    "commits": members,
                })
            })
            .collect();

        let repository = &candidate.repository;
        json!({
            "version": version,
            "branch": candidate.branch,
            "previous_version": candidate.previous_version(),
            "repository": {
                "name": repository.name,
                "owner": repository.owner.login,
                "url": repository.html_url,
                "description": repository.description,
                "default_branch": repository.default_branch(),
            },
            "commits": commits,
            "sections": sections,
            "contributors": contributors(&candidate.commits),
        })
    }
}

fn person(account: Option<&Account>, signature: Option<&Signature>) -> Value {
    json!({
        "username": account.map(|a| a.login.as_str()),
        "url": account.and_then(|a| a.html_url.as_deref()),
        "name": signature.and_then(|s| s.name.as_deref()),
        "email": signature.and_then(|s| s.email.as_deref()),
        "date": signature.and_then(|s| s.date).map(|d| d.to_rfc3339()),
    })
}

fn commit_context(commit: &Commit, analysis: &AnalyzedCommit) -> Value {
    json!({
        "sha": commit.sha,
        "short_sha": commit.sha.chars().take(7).collect::<String>(),
        "url": commit.html_url,
        "summary": analysis.summary,
        "message": commit.commit.message,
        "kind": analysis.kind,
        "scope": analysis.scope,
        "breaking": analysis.breaking,
        "issues": analysis.issues,
        "pull_request": analysis.pull_request,
        "author": person(commit.author.as_ref(), commit.commit.author.as_ref()),
        "committer": person(commit.committer.as_ref(), commit.commit.committer.as_ref()),
    })
}

/// Author logins in order of first appearance, falling back to the git name.
fn contributors(commits: &[Commit]) -> Vec<String> {
    let mut seen = Vec::new();
    for commit in commits {
        let name = commit
            .author
            .as_ref()
            .map(|a| a.login.clone())
            .or_else(|| commit.commit.author.as_ref().and_then(|s| s.name.clone()));
        if let Some(name) = name {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
    }
    seen
}
