//! Embeddable bases implementing the lock and revision half of
//! [`Storable`](crate::Storable).
//!
//! [`ObjectProto`] is the core: one store mutex, one data `RwLock`, and the
//! two revision counters. [`SaveProto`] wraps it with a default storage
//! target, a wait-scope factory and a revision generator, which is what most
//! domain objects want to embed.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use revstore_backend::Storage;
use revstore_types::{Rv, RvGenerator, StorResult, WaitScope};
use tokio::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::protocol::{self, LoadOutcome, SaveOutcome};
use crate::storable::{Storable, StoreGuard};

/// Locks plus revisions around a value of type `T`.
pub struct ObjectProto<T> {
    store: Mutex<()>,
    data: RwLock<T>,
    rv: AtomicI64,
    stor_rv: AtomicI64,
}

impl<T> ObjectProto<T> {
    /// A clean object at revision zero.
    pub fn new(data: T) -> Self {
        Self {
            store: Mutex::new(()),
            data: RwLock::new(data),
            rv: AtomicI64::new(0),
            stor_rv: AtomicI64::new(0),
        }
    }

    pub fn rv(&self) -> Rv {
        self.rv.load(Ordering::Acquire)
    }

    pub fn stor_rv(&self) -> Rv {
        self.stor_rv.load(Ordering::Acquire)
    }

    pub fn set_rv(&self, rv: Rv) {
        self.rv.store(rv, Ordering::Release);
    }

    pub fn set_stor_rv(&self, rv: Rv) {
        self.stor_rv.store(rv, Ordering::Release);
    }

    /// `rv = rv + 1`, returning the new revision.
    pub fn bump_rv(&self) -> Rv {
        self.advance_rv(None)
    }

    /// Move `rv` forward to `candidate`, or by one if `candidate` would not
    /// move it forward. Returns the new revision.
    pub fn advance_rv(&self, candidate: Option<Rv>) -> Rv {
        let mut current = self.rv();
        loop {
            let next = match candidate {
                Some(c) if c > current => c,
                _ => current + 1,
            };
            match self
                .rv
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// `true` while there are changes not yet persisted.
    pub fn is_dirty(&self) -> bool {
        self.rv() != self.stor_rv()
    }

    pub async fn lock_store(&self, scope: &WaitScope) -> Option<StoreGuard<'_>> {
        scope.run(self.store.lock()).await
    }

    pub async fn read(&self, scope: &WaitScope) -> Option<RwLockReadGuard<'_, T>> {
        scope.run(self.data.read()).await
    }

    pub async fn write(&self, scope: &WaitScope) -> Option<RwLockWriteGuard<'_, T>> {
        scope.run(self.data.write()).await
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for ObjectProto<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> fmt::Debug for ObjectProto<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProto")
            .field("rv", &self.rv())
            .field("stor_rv", &self.stor_rv())
            .finish_non_exhaustive()
    }
}

/// How [`SaveProto`] builds a wait scope for its own saves and loads.
#[derive(Clone, Default)]
pub enum ScopeFactory {
    /// Wait until done.
    #[default]
    Unbounded,
    /// Give up after a fixed time.
    Timeout(Duration),
    /// Caller-provided scope, e.g. tied to a shutdown token.
    Custom(Arc<dyn Fn() -> WaitScope + Send + Sync>),
}

impl ScopeFactory {
    pub fn scope(&self) -> WaitScope {
        match self {
            Self::Unbounded => WaitScope::unbounded(),
            Self::Timeout(timeout) if timeout.is_zero() => WaitScope::unbounded(),
            Self::Timeout(timeout) => WaitScope::with_timeout(*timeout),
            Self::Custom(make) => make(),
        }
    }
}

impl fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => f.write_str("Unbounded"),
            Self::Timeout(timeout) => f.debug_tuple("Timeout").field(timeout).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Where a [`SaveProto`] persists itself by default.
#[derive(Clone)]
pub struct SaveTarget {
    pub storage: Arc<dyn Storage>,
    pub key: String,
}

impl fmt::Debug for SaveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveTarget")
            .field("backend", &self.storage.backend_name())
            .field("key", &self.key)
            .finish()
    }
}

/// [`ObjectProto`] plus a default target, a scope factory and a revision
/// generator.
///
/// ```ignore
/// let base = SaveProto::new(Balance::default())
///     .with_target(storage, "accounts/7.json")
///     .with_timeout(Duration::from_secs(5))
///     .with_rv_generator(rvg);
/// ```
#[derive(Debug)]
pub struct SaveProto<T> {
    object: ObjectProto<T>,
    target: Option<SaveTarget>,
    scope_factory: ScopeFactory,
    rv_generator: Option<Arc<RvGenerator>>,
}

impl<T> SaveProto<T> {
    pub fn new(data: T) -> Self {
        Self {
            object: ObjectProto::new(data),
            target: None,
            scope_factory: ScopeFactory::Unbounded,
            rv_generator: None,
        }
    }

    pub fn with_target(mut self, storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        self.target = Some(SaveTarget {
            storage,
            key: key.into(),
        });
        self
    }

    pub fn with_scope_factory(mut self, factory: ScopeFactory) -> Self {
        self.scope_factory = factory;
        self
    }

    /// Shorthand for `with_scope_factory(ScopeFactory::Timeout(timeout))`.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_scope_factory(ScopeFactory::Timeout(timeout))
    }

    pub fn with_rv_generator(mut self, generator: Arc<RvGenerator>) -> Self {
        self.rv_generator = Some(generator);
        self
    }

    pub fn object(&self) -> &ObjectProto<T> {
        &self.object
    }

    pub fn target(&self) -> Option<&SaveTarget> {
        self.target.as_ref()
    }

    pub fn storage(&self) -> Option<&dyn Storage> {
        self.target.as_ref().map(|t| t.storage.as_ref())
    }

    pub fn key(&self) -> Option<&str> {
        self.target.as_ref().map(|t| t.key.as_str())
    }

    /// A fresh scope from the configured factory.
    pub fn scope(&self) -> WaitScope {
        self.scope_factory.scope()
    }

    /// Stamp a new revision from the generator (or `rv + 1` without one).
    /// Never moves `rv` backwards.
    pub fn set_next_rv(&self) -> Rv {
        let candidate = self.rv_generator.as_ref().map(|g| g.next());
        self.object.advance_rv(candidate)
    }

    /// Apply `f` under the data write lock and stamp a new revision.
    ///
    /// Returns `None` without calling `f` if the lock is not acquired within
    /// `scope`.
    pub async fn mutate<R>(&self, scope: &WaitScope, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut data = self.object.write(scope).await?;
        let out = f(&mut *data);
        let rv = self.set_next_rv();
        drop(data);
        debug!(rv, "object mutated");
        Some(out)
    }

    /// Save `object` to the default target under a fresh scope.
    pub async fn persist<S: Storable>(&self, object: &S) -> StorResult<SaveOutcome> {
        let scope = self.scope();
        protocol::save(&scope, self.storage(), self.key().unwrap_or_default(), object).await
    }

    /// Load `object` from the default target under a fresh scope, if the key
    /// exists.
    pub async fn restore<S: Storable>(&self, object: &S) -> StorResult<LoadOutcome> {
        let scope = self.scope();
        protocol::load_if_exists(
            &scope,
            self.storage(),
            self.key().unwrap_or_default(),
            object,
            |_, _| Ok(true),
        )
        .await
    }
}

impl<T: Default> Default for SaveProto<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> AsRef<ObjectProto<T>> for SaveProto<T> {
    fn as_ref(&self) -> &ObjectProto<T> {
        &self.object
    }
}
