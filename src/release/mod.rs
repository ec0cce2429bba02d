pub mod commit_analyzer;
pub mod notes;
pub mod publish;
pub mod version;

pub use notes::{NotesError, ReleaseNotes};
pub use publish::{publish_releases, ReleaseResult};
pub use version::{next_version, VersionChange};
