//! Best-effort file removal. Failures are logged and counted, never raised.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use tether_core::BridgeError;

/// Remove one file. A file that is already gone counts as removed.
pub async fn remove_file(path: &Path) -> Result<(), BridgeError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BridgeError::ResourceCleanup {
            path: path.display().to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Remove each path independently; one failure does not stop the rest.
/// Returns how many removals failed.
pub async fn remove_all<'a>(paths: impl IntoIterator<Item = &'a Path>) -> usize {
    let mut failed = 0;
    for path in paths {
        if let Err(e) = remove_file(path).await {
            warn!(error = %e, kind = e.error_kind(), "cleanup failed");
            failed += 1;
        }
    }
    failed
}

/// Outcome of purging transient storage.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: usize,
    pub failed: Vec<PathBuf>,
}

/// Delete every entry under each root, leaving the roots in place.
/// Missing roots are skipped.
pub async fn purge_roots(roots: &[PathBuf]) -> PurgeReport {
    let mut report = PurgeReport::default();
    for root in roots {
        let mut entries = match tokio::fs::read_dir(root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "cannot list transient root");
                report.failed.push(root.clone());
                continue;
            }
        };
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "listing interrupted");
                    report.failed.push(root.clone());
                    break;
                }
            };
            let path = entry.path();
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            let result = if is_dir {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "purge entry failed");
                    report.failed.push(path);
                }
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        assert!(remove_file(&dir.path().join("gone.jpg")).await.is_ok());
    }

    #[tokio::test]
    async fn directory_is_a_cleanup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = remove_file(dir.path()).await.unwrap_err();
        assert_eq!(err.error_kind(), "resource_cleanup");
    }

    #[tokio::test]
    async fn remove_all_continues_past_failures() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"1").unwrap();
        std::fs::write(&b, b"2").unwrap();

        let failed = remove_all([a.as_path(), dir.path(), b.as_path()]).await;
        assert_eq!(failed, 1);
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[tokio::test]
    async fn purge_empties_roots_but_keeps_them() {
        let temp = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("x.jpg"), b"x").unwrap();
        std::fs::create_dir_all(temp.path().join("nested/deeper")).unwrap();
        std::fs::write(temp.path().join("nested/deeper/y"), b"y").unwrap();
        std::fs::write(cache.path().join("z"), b"z").unwrap();

        let roots = vec![
            temp.path().to_path_buf(),
            cache.path().to_path_buf(),
            temp.path().join("does-not-exist"),
        ];
        let report = purge_roots(&roots).await;

        assert_eq!(report.removed, 3);
        assert!(report.failed.is_empty());
        assert!(temp.path().exists());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
        assert_eq!(std::fs::read_dir(cache.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn unlistable_root_does_not_stop_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("plain-file");
        std::fs::write(&not_a_dir, b"x").unwrap();
        let cache = dir.path().join("cache");
        std::fs::create_dir(&cache).unwrap();
        std::fs::write(cache.join("a"), b"a").unwrap();
        std::fs::write(cache.join("b"), b"b").unwrap();

        let report = purge_roots(&[not_a_dir.clone(), cache.clone()]).await;

        assert_eq!(report.failed, vec![not_a_dir.clone()]);
        assert_eq!(report.removed, 2);
        assert!(not_a_dir.exists());
        assert_eq!(std::fs::read_dir(&cache).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stuck_entry_does_not_stop_the_purge() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let locked = root.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::write(locked.join("inner"), b"i").unwrap();
        std::fs::write(root.path().join("x.jpg"), b"x").unwrap();
        std::fs::write(root.path().join("y.jpg"), b"y").unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        // Privileged users ignore directory permissions; nothing to observe then.
        let canary = locked.join("canary");
        if std::fs::write(&canary, b"c").is_ok() {
            std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let report = purge_roots(&[root.path().to_path_buf()]).await;
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(report.failed, vec![locked.clone()]);
        assert_eq!(report.removed, 2);
        assert!(!root.path().join("x.jpg").exists());
        assert!(!root.path().join("y.jpg").exists());
        assert!(locked.join("inner").exists());
    }
}
