//! TOML configuration.
//!
//! Loaded from `--config <path>` or `<config dir>/releaser/config.toml`;
//! a missing default file means built-in defaults. CLI flags override it.
//!
//! ```toml
//! [github]
//! host = "github.com"
//! token = "ghp_..."
//!
//! [scan]
//! timeout_secs = 120
//! branch = ""
//!
//! [release]
//! change = "patch"
//! template_path = "notes.hbs"
//! create_branch = false
//! ```

mod types;

pub use types::{Config, GithubConfig, ReleaseConfig, ScanConfig};

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// `<config dir>/releaser/config.toml`, when the platform has a config dir.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("releaser").join("config.toml"))
}

impl Config {
    /// Load `path`, or the default location when `None`. Only an explicit
    /// path has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => {
                    debug!("no config file, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::release::VersionChange;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("releaser-{}-{}.toml", name, std::process::id()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults() {
        let config = Config::default();

        assert_eq!(config.github.host, "github.com");
        assert_eq!(config.scan.timeout(), Duration::from_secs(120));
        assert_eq!(config.scan.branch(), None);
        assert_eq!(config.release.change, VersionChange::Patch);
        assert!(!config.release.create_branch);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let path = write_config(
            "partial",
            r#"
[github]
host = "github.example.com"

[scan]
branch = "develop"

[release]
change = "minor"
create_branch = true
"#,
        );

        let config = Config::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.github.host, "github.example.com");
        assert_eq!(config.github.token, None);
        assert_eq!(config.scan.branch(), Some("develop"));
        assert_eq!(config.scan.timeout_secs, 120);
        assert_eq!(config.release.change, VersionChange::Minor);
        assert!(config.release.create_branch);
    }

    #[test]
    fn invalid_change_is_a_parse_error() {
        let path = write_config("invalid", "[release]\nchange = \"huge\"\n");

        let err = Config::load(Some(&path)).unwrap_err();
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn explicit_path_must_exist() {
        let err = Config::load(Some(Path::new("/nonexistent/releaser.toml"))).unwrap_err();

        assert!(matches!(err, ConfigError::Read { .. }), "{err}");
    }
}
