//! Persistence of the OAuth credential.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::auth::credential::Credential;
use crate::error::{Error, Result};

/// Load/save contract for the persisted credential.
pub trait TokenStore: Send {
    /// Read the persisted credential, if any.
    fn load(&self) -> Result<Option<Credential>>;

    /// Replace the persisted credential.
    fn save(&mut self, credential: &Credential) -> Result<()>;

    /// Forget the persisted credential.
    fn clear(&mut self) -> Result<()>;
}

/// Credential stored as a JSON document on disk.
///
/// Writes go to a sibling temp file that is opened exclusively, synced, and
/// then renamed over the real file, so a reader never observes a partial
/// document.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Open a store at `path`, removing any temp file left by an
    /// interrupted write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };

        match fs::remove_file(store.temp_path()) {
            Ok(()) => tracing::debug!(
                "Removed stale credential temp file {}",
                store.temp_path().display()
            ),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::Io(e)),
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "credentials".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<Credential>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        let credential = serde_json::from_str(&text).map_err(|e| {
            Error::Credential(format!(
                "Corrupt credential file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(Some(credential))
    }

    fn save(&mut self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&temp).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                Error::Credential(format!(
                    "{} is being written by another process",
                    self.path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let json = serde_json::to_vec_pretty(credential)?;
        if let Err(e) = file.write_all(&json).and_then(|_| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&temp);
            return Err(Error::Io(e));
        }
        drop(file);

        fs::rename(&temp, &self.path)?;
        tracing::debug!("Credential saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!("Credential file {} removed", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// In-memory credential store.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    credential: Option<Credential>,
    saves: usize,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Some(credential),
            saves: 0,
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.credential.clone())
    }

    fn save(&mut self, credential: &Credential) -> Result<()> {
        self.credential = Some(credential.clone());
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.credential = None;
        Ok(())
    }
}
