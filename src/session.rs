//! Assessment sessions and their working directories.
//!
//! A session exclusively owns its working directory for the duration of a
//! run; directories are never reused across sessions.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use crate::error::Result;

/// A submitted inventory file descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmittedFile {
    pub file_name: String,
    /// HTTP(S) URL or a local filesystem path.
    pub file_url: String,
    /// Caller-declared inventory type, honored when recognized.
    #[serde(default, rename = "type")]
    pub declared_type: Option<String>,
}

/// One assessment request, owned by exactly one pipeline worker.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub email: String,
    pub goal: String,
    pub files: Vec<SubmittedFile>,
    /// Caller-supplied completion webhook; the configured default is used
    /// when absent.
    pub webhook: Option<Url>,
    workdir: PathBuf,
}

impl Session {
    pub fn new(
        id: String,
        email: String,
        goal: String,
        files: Vec<SubmittedFile>,
        webhook: Option<Url>,
        output_root: &Path,
    ) -> Self {
        let workdir = output_root.join(safe_dir_name(&id));
        Self {
            id,
            email,
            goal,
            files,
            webhook,
            workdir,
        }
    }

    /// The session working directory, created on first use.
    pub fn workdir(&self) -> Result<&Path> {
        std::fs::create_dir_all(&self.workdir)?;
        Ok(&self.workdir)
    }

    /// Directory for rendered charts under the working directory.
    pub fn charts_dir(&self) -> Result<PathBuf> {
        let dir = self.workdir()?.join("charts");
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Session ids come from callers and are used as path components; anything
/// outside a conservative character set is replaced with a random name.
fn safe_dir_name(id: &str) -> String {
    let ok = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if ok && id != "." && id != ".." {
        id.to_string()
    } else {
        format!("session-{}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_id(id: &str, root: &Path) -> Session {
        Session::new(
            id.to_string(),
            "ops@example.com".to_string(),
            "general".to_string(),
            vec![],
            None,
            root,
        )
    }

    #[test]
    fn workdir_uses_session_id() {
        let root = tempfile::tempdir().unwrap();
        let session = session_with_id("abc-123", root.path());
        let dir = session.workdir().unwrap();
        assert!(dir.ends_with("abc-123"));
        assert!(dir.exists());
    }

    #[test]
    fn hostile_ids_do_not_escape_the_root() {
        let root = tempfile::tempdir().unwrap();
        for id in ["../evil", "a/b", "", "..", "x\\y"] {
            let session = session_with_id(id, root.path());
            let dir = session.workdir().unwrap();
            assert!(dir.starts_with(root.path()), "{id} escaped: {dir:?}");
        }
    }
}
