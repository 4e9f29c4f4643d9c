//! Save/load orchestration over a [`Storable`] and a [`Storage`].
//!
//! Locks are held as guards, so every return path releases them. Backend
//! I/O never runs under the data lock: a save only holds it (shared) for
//! the dirty check and the byte snapshot.

use revstore_backend::Storage;
use revstore_types::{BoxError, ErrorCode, Rv, StorError, StorResult, WaitScope};
use tracing::{debug, instrument, warn};

use crate::storable::Storable;

/// A caller-supplied step run at a fixed point of [`save_extend`].
pub type Hook<'a> = Box<dyn FnOnce() -> Result<(), BoxError> + Send + 'a>;

/// Optional extension points of [`save_extend`].
#[derive(Default)]
pub struct SaveHooks<'a> {
    /// Runs under the store lock, before the data lock is taken.
    pub before_get_data: Option<Hook<'a>>,
    /// Runs after the snapshot, outside any data lock, before the write.
    pub before_save: Option<Hook<'a>>,
    /// Runs after a successful write. On failure the object stays dirty.
    pub after_save: Option<Hook<'a>>,
}

impl<'a> SaveHooks<'a> {
    pub fn before_get_data(
        mut self,
        hook: impl FnOnce() -> Result<(), BoxError> + Send + 'a,
    ) -> Self {
        self.before_get_data = Some(Box::new(hook));
        self
    }

    pub fn before_save(mut self, hook: impl FnOnce() -> Result<(), BoxError> + Send + 'a) -> Self {
        self.before_save = Some(Box::new(hook));
        self
    }

    pub fn after_save(mut self, hook: impl FnOnce() -> Result<(), BoxError> + Send + 'a) -> Self {
        self.after_save = Some(Box::new(hook));
        self
    }
}

/// Result of a successful save.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to persist; no backend call was made.
    Clean,
    /// Bytes for this revision were written and the object marked clean up
    /// to it.
    Saved(Rv),
}

/// Result of a successful [`load_if_exists`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The key is absent; the object was not touched.
    NotFound,
    /// The key exists but the fill check declined it.
    Skipped,
    /// The object now holds the stored state.
    Loaded,
}

impl LoadOutcome {
    /// `true` unless the key was absent.
    pub fn found(self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Persist `object` under `key` if it has unsaved changes.
pub async fn save<S: Storable>(
    scope: &WaitScope,
    storage: Option<&dyn Storage>,
    key: &str,
    object: &S,
) -> StorResult<SaveOutcome> {
    save_extend(scope, storage, key, object, SaveHooks::default()).await
}

/// [`save`] with hooks.
///
/// `rv_stor` is set to the revision seen at the dirty check, not the
/// revision current when the write completes: a mutation racing with the
/// write leaves the object dirty for the next save.
#[instrument(skip_all, fields(key = %key))]
pub async fn save_extend<S: Storable>(
    scope: &WaitScope,
    storage: Option<&dyn Storage>,
    key: &str,
    object: &S,
    hooks: SaveHooks<'_>,
) -> StorResult<SaveOutcome> {
    let storage = storage.ok_or_else(|| StorError::new(ErrorCode::SaveStorageMissing, &[]))?;

    let _store = object
        .lock_store(scope)
        .await
        .ok_or_else(|| StorError::new(ErrorCode::SaveStoreLock, &[]))?;

    if let Some(hook) = hooks.before_get_data {
        hook().map_err(|e| StorError::wrap(ErrorCode::SaveBeforeGetData, e, &[]))?;
    }

    let data = object
        .read_data(scope)
        .await
        .ok_or_else(|| StorError::new(ErrorCode::SaveDataReadLock, &[]))?;

    let rv = object.rv_last();
    if rv == object.rv_stor() {
        drop(data);
        debug!(rv, "object clean; nothing to save");
        return Ok(SaveOutcome::Clean);
    }

    let body = object
        .to_bytes(&*data)
        .map_err(|e| StorError::wrap(ErrorCode::SaveToBytes, e, &[]));
    drop(data);
    let body = body?;

    if let Some(hook) = hooks.before_save {
        hook().map_err(|e| StorError::wrap(ErrorCode::SaveBeforeSave, e, &[]))?;
    }

    storage
        .save(scope, key, &body)
        .await
        .map_err(|e| StorError::wrap(ErrorCode::SaveWrite, e, &[&key]))?;

    if let Some(hook) = hooks.after_save {
        if let Err(e) = hook() {
            warn!(rv, error = %e, "after-save hook failed; bytes written but object left dirty");
            return Err(StorError::wrap(ErrorCode::SaveAfterSave, e, &[]));
        }
    }

    object.set_rv_stor(rv);
    debug!(rv, bytes = body.len(), backend = storage.backend_name(), "object saved");
    Ok(SaveOutcome::Saved(rv))
}

/// Load `object` from `key`, failing if the key does not exist.
pub async fn load<S: Storable>(
    scope: &WaitScope,
    storage: Option<&dyn Storage>,
    key: &str,
    object: &S,
) -> StorResult<()> {
    match load_if_exists(scope, storage, key, object, |_, _| Ok(true)).await? {
        LoadOutcome::NotFound => Err(StorError::new(ErrorCode::LoadKeyMissing, &[&key])),
        LoadOutcome::Skipped | LoadOutcome::Loaded => Ok(()),
    }
}

/// Load `object` from `key` if it exists and `do_fill` approves.
///
/// `do_fill` sees the current in-memory data and the fetched bytes while the
/// data lock is held exclusively; returning `Ok(false)` keeps the in-memory
/// state. On [`LoadOutcome::Loaded`] both revisions equal the loaded one.
#[instrument(skip_all, fields(key = %key))]
pub async fn load_if_exists<S, F>(
    scope: &WaitScope,
    storage: Option<&dyn Storage>,
    key: &str,
    object: &S,
    do_fill: F,
) -> StorResult<LoadOutcome>
where
    S: Storable,
    F: FnOnce(&S::Data, &[u8]) -> Result<bool, BoxError> + Send,
{
    let storage = storage.ok_or_else(|| StorError::new(ErrorCode::LoadStorageMissing, &[]))?;

    let _store = object
        .lock_store(scope)
        .await
        .ok_or_else(|| StorError::new(ErrorCode::LoadStoreLock, &[]))?;

    let exists = storage
        .exists(scope, key)
        .await
        .map_err(|e| StorError::wrap(ErrorCode::LoadExists, e, &[&key]))?;
    if !exists {
        debug!("key absent; object untouched");
        return Ok(LoadOutcome::NotFound);
    }

    let body = storage
        .get(scope, key)
        .await
        .map_err(|e| StorError::wrap(ErrorCode::LoadGet, e, &[&key]))?;

    let mut data = object
        .write_data(scope)
        .await
        .ok_or_else(|| StorError::new(ErrorCode::LoadDataLock, &[]))?;

    let apply = do_fill(&*data, &body)
        .map_err(|e| StorError::wrap(ErrorCode::LoadFillCheck, e, &[]))?;
    if !apply {
        debug!(bytes = body.len(), "fill check declined stored state");
        return Ok(LoadOutcome::Skipped);
    }

    object
        .from_bytes(&mut *data, &body)
        .map_err(|e| StorError::wrap(ErrorCode::LoadFromBytes, e, &[&key]))?;
    let rv = object.rv_last();
    object.set_rv_stor(rv);
    debug!(rv, bytes = body.len(), backend = storage.backend_name(), "object loaded");
    Ok(LoadOutcome::Loaded)
}
