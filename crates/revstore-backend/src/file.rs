use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use revstore_types::{ErrorCode, StorError, StorResult, WaitScope};
use tokio::fs;
use tracing::{debug, instrument};

use crate::traits::Storage;

/// Suffix of the sibling file a save writes before renaming into place.
const TMP_SUFFIX: &str = ".tmp";

/// Distinguishes temp files of concurrent saves within this process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem blob store rooted at a folder.
///
/// Keys are relative, `/`-separated paths below the folder:
/// ```text
/// {folder}/
///   {key}          <- committed value
///   .{name}.{pid}.{n}.tmp  <- in-flight write, renamed over {key} when complete
/// ```
/// The folder and any intermediate directories are created on first save.
#[derive(Debug, Clone)]
pub struct FileStorage {
    folder: PathBuf,
}

impl FileStorage {
    /// Create a store rooted at `folder`. No I/O happens until first use.
    pub fn new(folder: impl AsRef<Path>) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Resolve `key` below the folder, rejecting keys that could escape it.
    fn path_for(&self, key: &str) -> StorResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(StorError::new(ErrorCode::InvalidKey, &[&key]));
        }
        Ok(self.folder.join(relative))
    }

    async fn ensure_parent(&self, path: &Path) -> StorResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorError::wrap(ErrorCode::Mkdir, e, &[&parent.display()]))?;
        }
        Ok(())
    }
}

/// Unique sibling of `path` for one in-flight write.
fn temp_path_for(path: &Path) -> PathBuf {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let name = path.file_name().unwrap_or_default().to_string_lossy();
    path.with_file_name(format!(".{name}.{}.{n}{TMP_SUFFIX}", std::process::id()))
}

fn io_error(err: io::Error, path: &Path) -> StorError {
    StorError::wrap(ErrorCode::FileIo, err, &[&path.display()])
}

fn cancelled(op: &str, key: &str) -> StorError {
    StorError::new(ErrorCode::Cancelled, &[&op, &key])
}

#[async_trait]
impl Storage for FileStorage {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self, scope), level = "debug")]
    async fn exists(&self, scope: &WaitScope, key: &str) -> StorResult<bool> {
        let path = self.path_for(key)?;
        match scope.run(fs::metadata(&path)).await {
            None => Err(cancelled("exists", key)),
            Some(Ok(meta)) => Ok(meta.is_file()),
            Some(Err(e)) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Some(Err(e)) => Err(io_error(e, &path)),
        }
    }

    #[instrument(skip(self, scope), level = "debug")]
    async fn get(&self, scope: &WaitScope, key: &str) -> StorResult<Vec<u8>> {
        let path = self.path_for(key)?;
        match scope.run(fs::read(&path)).await {
            None => Err(cancelled("get", key)),
            Some(Ok(data)) => {
                debug!(len = data.len(), "file read");
                Ok(data)
            }
            Some(Err(e)) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorError::wrap(ErrorCode::KeyNotFound, e, &[&key]))
            }
            Some(Err(e)) => Err(io_error(e, &path)),
        }
    }

    #[instrument(skip(self, scope, data), level = "debug", fields(data_len = data.len()))]
    async fn save(&self, scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()> {
        let path = self.path_for(key)?;
        let temp_path = temp_path_for(&path);

        let write = async {
            self.ensure_parent(&path).await?;
            fs::write(&temp_path, data)
                .await
                .map_err(|e| io_error(e, &temp_path))?;
            fs::rename(&temp_path, &path)
                .await
                .map_err(|e| io_error(e, &path))
        };

        match scope.run(write).await {
            Some(result) => result?,
            None => {
                // The rename may not have happened; drop the partial file.
                let _ = fs::remove_file(&temp_path).await;
                return Err(cancelled("save", key));
            }
        }

        debug!(path = %path.display(), "file saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn save_creates_nested_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path().join("root"));
        let scope = WaitScope::unbounded();

        store.save(&scope, "a/b/c.json", b"{}").await.unwrap();
        assert!(dir.path().join("root/a/b/c.json").is_file());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("root/a/b"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("c.json")]);
        assert_eq!(store.get(&scope, "a/b/c.json").await.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn exists_reports_absent_and_present() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let scope = WaitScope::unbounded();

        assert!(!store.exists(&scope, "x.bin").await.unwrap());
        store.save(&scope, "x.bin", &[1, 2, 3]).await.unwrap();
        assert!(store.exists(&scope, "x.bin").await.unwrap());
    }

    #[tokio::test]
    async fn directories_are_not_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let scope = WaitScope::unbounded();

        store.save(&scope, "d/inner", b"v").await.unwrap();
        assert!(!store.exists(&scope, "d").await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let err = store
            .get(&WaitScope::unbounded(), "missing")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let scope = WaitScope::unbounded();

        store.save(&scope, "k", b"first, longer value").await.unwrap();
        store.save(&scope, "k", b"second").await.unwrap();
        assert_eq!(store.get(&scope, "k").await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn tmp_named_key_is_an_ordinary_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let scope = WaitScope::unbounded();

        store.save(&scope, "k.tmp", b"user data").await.unwrap();
        store.save(&scope, "k", b"value").await.unwrap();
        assert_eq!(store.get(&scope, "k.tmp").await.unwrap(), b"user data");
        assert_eq!(store.get(&scope, "k").await.unwrap(), b"value");
    }

    #[tokio::test]
    async fn concurrent_saves_of_one_key_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(FileStorage::new(dir.path()));

        let handles: Vec<_> = (0..16u8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .save(&WaitScope::unbounded(), "shared", &[i; 256])
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let data = store.get(&WaitScope::unbounded(), "shared").await.unwrap();
        assert_eq!(data.len(), 256);
        assert!(data.iter().all(|b| *b == data[0]));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn escaping_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let scope = WaitScope::unbounded();

        for key in ["", "../outside", "/etc/passwd", "a/../../b"] {
            let err = store.save(&scope, key, b"x").await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidKey, "key {key:?}");
        }
    }

    #[tokio::test]
    async fn cancelled_scope_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStorage::new(dir.path());
        let scope = WaitScope::with_timeout(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let err = store.save(&scope, "k", b"x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Cancelled);
        assert!(!dir.path().join("k").exists());
    }

    #[tokio::test]
    async fn unwritable_root_reports_mkdir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not dir").unwrap();
        let store = FileStorage::new(&blocker);

        let err = store
            .save(&WaitScope::unbounded(), "sub/k", b"x")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Mkdir);
    }
}
