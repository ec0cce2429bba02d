use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version assigned when a repository has never been tagged.
pub const INITIAL_VERSION: &str = "v0.1.0";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VersionChange {
    Major,
    Minor,
    #[default]
    Patch,
}

impl fmt::Display for VersionChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionChange::Major => write!(f, "major"),
            VersionChange::Minor => write!(f, "minor"),
            VersionChange::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for VersionChange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(VersionChange::Major),
            "minor" => Ok(VersionChange::Minor),
            "patch" => Ok(VersionChange::Patch),
            _ => Err(format!(
                "invalid version change '{}', expected one of 'major', 'minor', 'patch'",
                s
            )),
        }
    }
}

/// Parse a tag like `v1.2`, `1.2.3` or `v2.0.0-rc.1` as semver.
fn parse_tag(tag: &str) -> Option<Version> {
    let trimmed = tag.trim();
    let bare = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(bare) {
        return Some(version);
    }

    // Short forms: `1` and `1.2` are padded with zeros.
    let (core, rest) = match bare.find(['-', '+']) {
        Some(at) => bare.split_at(at),
        None => (bare, ""),
    };
    let components = core.split('.').count();
    if !(1..=2).contains(&components) {
        return None;
    }
    let padded = format!("{}{}{}", core, ".0".repeat(3 - components), rest);
    Version::parse(&padded).ok()
}

/// The version that follows `latest`.
///
/// Untagged repositories start at [`INITIAL_VERSION`]. Tags that aren't
/// semantic versions (`nightly`, `beta`) are returned unchanged. A patch
/// bump of a pre-release drops the pre-release instead of incrementing.
pub fn next_version(latest: Option<&str>, change: VersionChange) -> String {
    let Some(latest) = latest.filter(|l| !l.trim().is_empty()) else {
        return INITIAL_VERSION.to_string();
    };

    let Some(mut version) = parse_tag(latest) else {
        return latest.to_string();
    };

    match change {
        VersionChange::Major => {
            version.major += 1;
            version.minor = 0;
            version.patch = 0;
        }
        VersionChange::Minor => {
            version.minor += 1;
            version.patch = 0;
        }
        VersionChange::Patch => {
            if version.pre.is_empty() && version.build.is_empty() {
                version.patch += 1;
            }
        }
    }
    version.pre = Prerelease::EMPTY;
    version.build = BuildMetadata::EMPTY;

    format!("v{}", version)
}
