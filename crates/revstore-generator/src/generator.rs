use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use revstore_backend::{CompressStorage, DoubleSaveStorage, FileStorage, MapStorage, Storage};
use revstore_types::{ErrorCode, StorError, StorResult, WaitScope};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::mount::{GeneratorInfo, Mount, StorageType};

/// Builds a backend for `(mount, relative_path)`.
pub type StorConstructor =
    Arc<dyn Fn(&Mount, &str) -> StorResult<Box<dyn Storage>> + Send + Sync>;

/// Backend factory.
///
/// Maps a mount name plus a relative path to a freshly built [`Storage`],
/// using a registry of constructors keyed by [`StorageType`]. The registry
/// sits behind one `RwLock`: [`Generator::create`] takes it shared, so
/// concurrent creations proceed in parallel, while
/// [`Generator::add_stor_generator`] briefly takes it exclusive.
///
/// Instances are not cached; every `create` call builds a new one owned by
/// the caller.
pub struct Generator {
    registry: RwLock<HashMap<StorageType, StorConstructor>>,
    info: GeneratorInfo,
}

impl Generator {
    /// Create a generator over `info` with the built-in kinds registered.
    pub fn new(info: GeneratorInfo) -> Self {
        let mut registry: HashMap<StorageType, StorConstructor> = HashMap::new();
        registry.insert(StorageType::Map, Arc::new(build_map));
        registry.insert(StorageType::File, Arc::new(build_file));
        registry.insert(StorageType::FileDoubleSave, Arc::new(build_file_double_save));
        registry.insert(
            StorageType::FileDoubleSaveCompressed,
            Arc::new(build_file_double_save_compressed),
        );
        Self {
            registry: RwLock::new(registry),
            info,
        }
    }

    pub fn info(&self) -> &GeneratorInfo {
        &self.info
    }

    pub fn mounts(&self) -> &BTreeMap<String, Mount> {
        &self.info.mounts
    }

    pub fn mount(&self, name: &str) -> Option<&Mount> {
        self.info.mounts.get(name)
    }

    /// Register (or replace) the constructor for `kind`. Last writer wins.
    pub async fn add_stor_generator<F>(&self, kind: StorageType, constructor: F)
    where
        F: Fn(&Mount, &str) -> StorResult<Box<dyn Storage>> + Send + Sync + 'static,
    {
        let mut registry = self.registry.write().await;
        debug!(%kind, "registering storage constructor");
        registry.insert(kind, Arc::new(constructor));
    }

    /// Kinds that currently have a constructor, sorted.
    pub async fn registered_kinds(&self) -> Vec<StorageType> {
        let registry = self.registry.read().await;
        let mut kinds: Vec<StorageType> = registry.keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Build a backend for `relative_path` under the mount `mount_name`.
    #[instrument(skip(self, scope), level = "debug")]
    pub async fn create(
        &self,
        scope: &WaitScope,
        mount_name: &str,
        relative_path: &str,
    ) -> StorResult<Box<dyn Storage>> {
        let registry = scope
            .run(self.registry.read())
            .await
            .ok_or_else(|| StorError::new(ErrorCode::GeneratorLockWait, &[]))?;

        let mount = self
            .info
            .mounts
            .get(mount_name)
            .ok_or_else(|| StorError::new(ErrorCode::MountNotFound, &[&mount_name]))?;

        let constructor = registry
            .get(&mount.provider)
            .ok_or_else(|| StorError::new(ErrorCode::StorageTypeNotFound, &[&mount.provider]))?;

        let storage = constructor(mount, relative_path)?;
        debug!(provider = %mount.provider, backend = storage.backend_name(), "storage created");
        Ok(storage)
    }
}

impl std::fmt::Debug for Generator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generator")
            .field("mounts", &self.mounts().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn build_map(_mount: &Mount, _relative_path: &str) -> StorResult<Box<dyn Storage>> {
    Ok(Box::new(MapStorage::new()))
}

fn build_file(mount: &Mount, relative_path: &str) -> StorResult<Box<dyn Storage>> {
    Ok(Box::new(FileStorage::new(mount.folder(relative_path)?)))
}

fn build_file_double_save(mount: &Mount, relative_path: &str) -> StorResult<Box<dyn Storage>> {
    let file = FileStorage::new(mount.folder(relative_path)?);
    Ok(Box::new(DoubleSaveStorage::new(file)))
}

fn build_file_double_save_compressed(
    mount: &Mount,
    relative_path: &str,
) -> StorResult<Box<dyn Storage>> {
    let file = FileStorage::new(mount.folder(relative_path)?);
    let compressed = CompressStorage::new(
        file,
        mount.compress_alg.unwrap_or_default(),
        mount.file_extension.clone(),
    )
    .with_level(mount.compress_level());
    Ok(Box::new(DoubleSaveStorage::new(compressed)))
}
