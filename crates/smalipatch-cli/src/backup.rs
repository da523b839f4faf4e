//! Backups of listings before they are rewritten
//!
//! Each run gets a timestamped session directory mirroring the original
//! paths, so the same suffix under two roots never collides.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_BACKUP_DIR: &str = ".smalipatch-backup";

#[derive(Debug, Clone)]
pub struct BackupManager {
    session_dir: PathBuf,
}

impl BackupManager {
    /// Start a backup session below `backup_dir`
    pub fn init_session(backup_dir: &Path) -> Result<Self> {
        let timestamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let session_dir = backup_dir.join(timestamp);

        fs::create_dir_all(&session_dir)
            .with_context(|| format!("Failed to create backup directory: {}", session_dir.display()))?;

        Ok(Self { session_dir })
    }

    /// Copy `path` into the session before it is modified
    pub fn backup_file(&self, path: &Path) -> Result<PathBuf> {
        let backup_path = self.session_dir.join(mirrored(path));

        if let Some(parent) = backup_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create backup directory: {}", parent.display()))?;
        }

        fs::copy(path, &backup_path).with_context(|| {
            format!(
                "Failed to backup file: {} -> {}",
                path.display(),
                backup_path.display()
            )
        })?;

        Ok(backup_path)
    }

    /// Restore a file from backup
    pub fn restore_file(&self, original_path: &Path, backup_path: &Path) -> Result<()> {
        fs::copy(backup_path, original_path).with_context(|| {
            format!(
                "Failed to restore file: {} -> {}",
                backup_path.display(),
                original_path.display()
            )
        })?;
        Ok(())
    }

    pub fn session_path(&self) -> &Path {
        &self.session_dir
    }
}

/// `path` reduced to its normal components
fn mirrored(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_backup_session() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::init_session(&temp.path().join("backups")).unwrap();

        assert!(manager.session_path().exists());
        assert!(manager.session_path().starts_with(temp.path().join("backups")));
    }

    #[test]
    fn test_backup_file() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::init_session(&temp.path().join("backups")).unwrap();

        let listing = temp.path().join("classes/android/util/jar/StrictJarFile.smali");
        fs::create_dir_all(listing.parent().unwrap()).unwrap();
        fs::write(&listing, ".class public final Landroid/util/jar/StrictJarFile;\n").unwrap();

        let backup = manager.backup_file(&listing).unwrap();
        assert!(backup.exists());
        assert!(backup.ends_with("classes/android/util/jar/StrictJarFile.smali"));
        assert_eq!(fs::read(&backup).unwrap(), fs::read(&listing).unwrap());
    }

    #[test]
    fn test_same_suffix_backed_up_separately() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::init_session(&temp.path().join("backups")).unwrap();

        let mut backups = Vec::new();
        for root in ["classes", "classes2"] {
            let listing = temp.path().join(root).join("a/B.smali");
            fs::create_dir_all(listing.parent().unwrap()).unwrap();
            fs::write(&listing, root).unwrap();
            backups.push(manager.backup_file(&listing).unwrap());
        }

        assert_ne!(backups[0], backups[1]);
        assert_eq!(fs::read_to_string(&backups[1]).unwrap(), "classes2");
    }

    #[test]
    fn test_restore_file() {
        let temp = TempDir::new().unwrap();
        let manager = BackupManager::init_session(&temp.path().join("backups")).unwrap();

        let listing = temp.path().join("Foo.smali");
        fs::write(&listing, "original").unwrap();
        let backup = manager.backup_file(&listing).unwrap();

        fs::write(&listing, "modified").unwrap();
        manager.restore_file(&listing, &backup).unwrap();

        assert_eq!(fs::read_to_string(&listing).unwrap(), "original");
    }
}
