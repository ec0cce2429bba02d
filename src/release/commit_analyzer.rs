use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::github::types::Commit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitKind {
    Feature,
    Fix,
    Documentation,
    Performance,
    Refactor,
    Test,
    Build,
    Ci,
    Chore,
    Style,
    Other,
}

impl CommitKind {
    /// Order sections appear in release notes.
    pub const ALL: [CommitKind; 11] = [
        CommitKind::Feature,
        CommitKind::Fix,
        CommitKind::Performance,
        CommitKind::Refactor,
        CommitKind::Documentation,
        CommitKind::Style,
        CommitKind::Test,
        CommitKind::Build,
        CommitKind::Ci,
        CommitKind::Chore,
        CommitKind::Other,
    ];

    fn from_type(commit_type: &str) -> Self {
        match commit_type.to_lowercase().as_str() {
            "feat" | "feature" => CommitKind::Feature,
            "fix" | "bugfix" => CommitKind::Fix,
            "docs" | "doc" | "documentation" => CommitKind::Documentation,
            "perf" | "performance" => CommitKind::Performance,
            "refactor" => CommitKind::Refactor,
            "test" | "tests" => CommitKind::Test,
            "build" | "deps" => CommitKind::Build,
            "ci" | "cd" => CommitKind::Ci,
            "chore" => CommitKind::Chore,
            "style" => CommitKind::Style,
            _ => CommitKind::Other,
        }
    }
}

impl fmt::Display for CommitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitKind::Feature => write!(f, "✨ Features"),
            CommitKind::Fix => write!(f, "🐛 Bug Fixes"),
            CommitKind::Documentation => write!(f, "📚 Documentation"),
            CommitKind::Performance => write!(f, "⚡ Performance"),
            CommitKind::Refactor => write!(f, "♻️ Refactoring"),
            CommitKind::Test => write!(f, "✅ Tests"),
            CommitKind::Build => write!(f, "📦 Build System"),
            CommitKind::Ci => write!(f, "👷 CI/CD"),
            CommitKind::Chore => write!(f, "🔧 Chores"),
            CommitKind::Style => write!(f, "💄 Style"),
            CommitKind::Other => write!(f, "📝 Other Changes"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzedCommit {
    pub sha: String,
    pub kind: CommitKind,
    pub scope: Option<String>,
    pub breaking: bool,
    /// First line without its conventional-commit prefix, capitalized.
    pub summary: String,
    pub issues: Vec<u64>,
    pub pull_request: Option<u64>,
}

pub struct CommitAnalyzer {
    header: Regex,
    issue: Regex,
    pull_request: Regex,
}

impl CommitAnalyzer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            header: Regex::new(r"^(?P<type>[A-Za-z]+)(?:\((?P<scope>[^)]*)\))?(?P<bang>!)?:\s*(?P<subject>.*)$")?,
            issue: Regex::new(r"(?:(?:fix|fixes|fixed|close|closes|closed|resolve|resolves|resolved)\s+)?#(\d+)")?,
            pull_request: Regex::new(r"\(#(\d+)\)\s*$")?,
        })
    }

    pub fn analyze(&self, commit: &Commit) -> AnalyzedCommit {
        let message = commit.commit.message.as_str();
        let first_line = message.lines().next().unwrap_or("").trim();

        let (kind, scope, bang, subject) = match self.header.captures(first_line) {
            Some(caps) => (
                CommitKind::from_type(&caps["type"]),
                caps.name("scope").map(|s| s.as_str().to_string()).filter(|s| !s.is_empty()),
                caps.name("bang").is_some(),
                caps.name("subject").map_or("", |s| s.as_str()),
            ),
            None => (CommitKind::Other, None, false, first_line),
        };

        let pull_request = self
            .pull_request
            .captures(first_line)
            .and_then(|caps| caps[1].parse().ok());

        let mut issues: Vec<u64> = self
            .issue
            .captures_iter(message)
            .filter_map(|caps| caps[1].parse().ok())
            .filter(|number| Some(*number) != pull_request)
            .collect();
        issues.sort_unstable();
        issues.dedup();

        AnalyzedCommit {
            sha: commit.sha.clone(),
            kind,
            scope,
            breaking: bang || message.contains("BREAKING CHANGE") || message.contains("BREAKING-CHANGE"),
            summary: capitalize(subject.trim()),
            issues,
            pull_request,
        }
    }

    pub fn analyze_all(&self, commits: &[Commit]) -> Vec<AnalyzedCommit> {
        commits.iter().map(|commit| self.analyze(commit)).collect()
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Indices into `commits` grouped by kind in [`CommitKind::ALL`] order,
/// skipping empty groups. Indices ascend within a group.
pub fn group_by_kind(commits: &[AnalyzedCommit]) -> Vec<(CommitKind, Vec<usize>)> {
    let mut grouped: HashMap<CommitKind, Vec<usize>> = HashMap::new();
    for (index, commit) in commits.iter().enumerate() {
        grouped.entry(commit.kind).or_default().push(index);
    }

    CommitKind::ALL
        .iter()
        .filter_map(|kind| grouped.remove(kind).map(|commits| (*kind, commits)))
        .collect()
}
