use std::fmt;

use async_trait::async_trait;
use revstore_types::{StorResult, WaitScope};

/// Key/value blob store keyed by a relative path.
///
/// All implementations must satisfy these invariants:
/// - `save` has full-overwrite semantics and is safe to repeat with
///   identical bytes.
/// - `get` on an absent key fails with
///   [`ErrorCode::KeyNotFound`](revstore_types::ErrorCode::KeyNotFound).
/// - Every operation honours the caller's [`WaitScope`].
/// - Decorators (durability, compression) keep this exact contract, so a
///   caller cannot tell a decorated store from a base one.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Short identifier of the concrete backend, for logs.
    fn backend_name(&self) -> &'static str;

    /// Check whether `key` holds a value.
    async fn exists(&self, scope: &WaitScope, key: &str) -> StorResult<bool>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, scope: &WaitScope, key: &str) -> StorResult<Vec<u8>>;

    /// Store `data` under `key`, replacing any previous value.
    async fn save(&self, scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()>;
}

impl fmt::Debug for dyn Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend_name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for Box<S> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn exists(&self, scope: &WaitScope, key: &str) -> StorResult<bool> {
        (**self).exists(scope, key).await
    }

    async fn get(&self, scope: &WaitScope, key: &str) -> StorResult<Vec<u8>> {
        (**self).get(scope, key).await
    }

    async fn save(&self, scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()> {
        (**self).save(scope, key, data).await
    }
}

#[async_trait]
impl<S: Storage + ?Sized> Storage for std::sync::Arc<S> {
    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }

    async fn exists(&self, scope: &WaitScope, key: &str) -> StorResult<bool> {
        (**self).exists(scope, key).await
    }

    async fn get(&self, scope: &WaitScope, key: &str) -> StorResult<Vec<u8>> {
        (**self).get(scope, key).await
    }

    async fn save(&self, scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()> {
        (**self).save(scope, key, data).await
    }
}
