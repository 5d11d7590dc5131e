use std::path::Path;

use chrono::{DateTime, Utc};
use tempfile::TempDir;
use uuid::Uuid;

use super::error::{BrowserError, BrowserResult};

/// Throwaway user-data directory for one browser launch. The directory is
/// removed when the profile is dropped.
#[derive(Debug)]
pub struct BrowserProfile {
    id: String,
    dir: TempDir,
    created_at: DateTime<Utc>,
}

impl BrowserProfile {
    pub fn ephemeral() -> BrowserResult<Self> {
        let id = Uuid::new_v4().to_string();
        let dir = tempfile::Builder::new()
            .prefix(&format!("streamscout-{id}-"))
            .tempdir()
            .map_err(|err| BrowserError::Profile(format!("failed to create profile dir: {err}")))?;
        Ok(Self {
            id,
            dir,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
