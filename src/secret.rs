use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

/// Contents of the secret file: a flat JSON object.
pub type Document = Map<String, Value>;

/// JSON secret file on disk.
///
/// Writes merge into whatever is already stored; unrelated keys survive.
/// There is no locking between writers, the last one wins. File I/O runs
/// off the async executor.
#[derive(Debug, Clone)]
pub struct SecretFile {
    path: PathBuf,
}

impl SecretFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns [`Error::SecretNotFound`] when the file is absent.
    pub async fn read(&self) -> Result<Document> {
        debug!(path = %self.path.display(), "reading secret file");
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::SecretNotFound(self.path.clone()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&text)?)
    }

    /// Shallow-merges `partial` over the stored document and persists it.
    pub async fn write(&self, partial: &Document) -> Result<()> {
        let mut merged = match self.read().await {
            Ok(doc) => doc,
            Err(Error::SecretNotFound(_)) => Document::new(),
            Err(err) => return Err(err),
        };
        for (key, value) in partial {
            merged.insert(key.clone(), value.clone());
        }
        let bytes = serde_json::to_vec(&merged)?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || persist(&path, &bytes))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))?
    }
}

fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    debug!(path = %path.display(), "writing secret file");
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    // Same directory as the target so the rename stays on one filesystem.
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
