//! Filter document persistence
//!
//! Each filter is a standalone JSON file (`<name>.json`) holding the rule tree
//! and its undo/redo history, with a `<name>.json.sha256` sidecar written
//! next to it. Files live under the application's data directory in
//! `filters/` unless a store is opened on an explicit path.

use crate::core::error::StorageError;
use crate::core::filter::{FORMAT_VERSION, Filter};
use crate::utils::get_data_dir;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const DOCUMENT_EXTENSION: &str = "json";
const CHECKSUM_EXTENSION: &str = "json.sha256";

/// Validates a filter name for filesystem safety.
///
/// Constraints:
/// - Alphanumeric, spaces, underscores, and hyphens only
/// - Max 64 chars
/// - No leading or trailing whitespace
/// - Rejects "." and ".."
pub fn validate_filter_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() {
        return Err(StorageError::InvalidName("Name cannot be empty".into()));
    }

    if name.len() > 64 {
        return Err(StorageError::InvalidName(
            "Name too long (max 64 chars)".into(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ')
    {
        return Err(StorageError::InvalidName(
            "Name contains invalid characters (use only a-z, 0-9, _, -, space)".into(),
        ));
    }

    if name.trim() != name {
        return Err(StorageError::InvalidName(
            "Name cannot start or end with a space".into(),
        ));
    }

    // Prevent path traversal
    if name == "." || name == ".." {
        return Err(StorageError::InvalidName("Invalid name".into()));
    }

    Ok(())
}

pub(crate) fn checksum(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Writes `contents` to `path` atomically.
///
/// The data goes to a sibling `.tmp` file first (mode 0o600 on unix), is
/// synced, then renamed over the target, so a crash never leaves a torn file.
pub(crate) async fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);

    #[cfg(unix)]
    {
        use tokio::fs::OpenOptions;
        use tokio::io::AsyncWriteExt;

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(&temp_path)
            .await?;

        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
    }

    #[cfg(not(unix))]
    {
        use tokio::io::AsyncWriteExt;

        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&temp_path, path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::StorageFull {
            std::io::Error::new(
                std::io::ErrorKind::StorageFull,
                format!("Disk full: cannot write {}", path.display()),
            )
        } else {
            e
        }
    })
}

/// Directory of saved filter documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStore {
    root: PathBuf,
}

impl FilterStore {
    /// Opens a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store under the XDG data directory (`~/.local/share/lootrule/filters`)
    pub fn default_location() -> Result<Self, StorageError> {
        let mut path = get_data_dir().ok_or(StorageError::DataDirUnavailable)?;
        path.push("filters");
        Ok(Self::new(path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        if !tokio::fs::try_exists(&self.root).await? {
            tokio::fs::create_dir_all(&self.root).await?;
        }
        Ok(())
    }

    /// Returns the path of a filter document.
    /// Validates the name first so a name can never escape the store directory.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_filter_name(name)?;
        Ok(self.root.join(format!("{name}.{DOCUMENT_EXTENSION}")))
    }

    fn checksum_path(path: &Path) -> PathBuf {
        path.with_extension(CHECKSUM_EXTENSION)
    }

    pub async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.path_for(name)?;
        Ok(tokio::fs::try_exists(&path).await?)
    }

    /// Lists saved filter names, sorted.
    pub async fn list(&self) -> Result<Vec<String>, StorageError> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            if path.is_file()
                && path.extension().and_then(|s| s.to_str()) == Some(DOCUMENT_EXTENSION)
                && let Some(name) = path.file_stem().and_then(|s| s.to_str())
            {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Loads a filter by name.
    ///
    /// A checksum mismatch is logged but does not fail the load; the document
    /// may have been edited by hand. Parent links are rebuilt during
    /// deserialization.
    pub async fn load(&self, name: &str) -> Result<Filter, StorageError> {
        let path = self.path_for(name)?;

        if !tokio::fs::try_exists(&path).await? {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let json = tokio::fs::read_to_string(&path).await?;

        if let Ok(expected) = tokio::fs::read_to_string(Self::checksum_path(&path)).await {
            let actual = checksum(&json);
            if expected.trim() != actual {
                tracing::warn!(
                    "Filter '{name}' checksum mismatch (expected: {}, got: {actual})",
                    expected.trim()
                );
            }
        }

        let mut filter: Filter = serde_json::from_str(&json)?;
        if filter.version > FORMAT_VERSION {
            tracing::warn!(
                "Filter '{name}' was saved with format version {} (this build reads {FORMAT_VERSION})",
                filter.version
            );
        }
        // The file name is authoritative if the document was renamed on disk
        if filter.name != name {
            tracing::debug!("Filter file '{name}' stores name '{}'", filter.name);
            filter.name = name.to_string();
        }

        tracing::debug!("Loaded filter '{name}' ({} nodes)", filter.rules().len());
        Ok(filter)
    }

    /// Saves a filter atomically under its own name, then writes its checksum.
    pub async fn save(&self, filter: &Filter) -> Result<(), StorageError> {
        let path = self.path_for(&filter.name)?;
        self.ensure_dir().await?;

        let json = serde_json::to_string_pretty(filter)?;
        write_atomic(&path, &json).await?;
        tokio::fs::write(Self::checksum_path(&path), checksum(&json)).await?;

        tracing::info!("Saved filter '{}' to {}", filter.name, path.display());
        Ok(())
    }

    /// Deletes a filter and its checksum. Deleting a missing filter is a no-op.
    pub async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        if tokio::fs::try_exists(&path).await? {
            tokio::fs::remove_file(&path).await?;
        }
        let checksum_path = Self::checksum_path(&path);
        if tokio::fs::try_exists(&checksum_path).await? {
            tokio::fs::remove_file(checksum_path).await?;
        }
        Ok(())
    }

    /// Renames a saved filter, returning the document under its new name.
    ///
    /// Fails with `AlreadyExists` rather than overwriting another filter.
    pub async fn rename(&self, old_name: &str, new_name: &str) -> Result<Filter, StorageError> {
        validate_filter_name(new_name)?;
        if old_name == new_name {
            return self.load(old_name).await;
        }
        if self.exists(new_name).await? {
            return Err(StorageError::AlreadyExists(new_name.to_string()));
        }

        let mut filter = self.load(old_name).await?;
        filter.name = new_name.to_string();
        self.save(&filter).await?;
        self.delete(old_name).await?;
        Ok(filter)
    }
}
