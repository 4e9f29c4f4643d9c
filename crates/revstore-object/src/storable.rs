//! The persistable-object contract.

use async_trait::async_trait;
use revstore_types::{BoxError, Rv, WaitScope};
use tokio::sync::{MutexGuard, RwLockReadGuard, RwLockWriteGuard};

use crate::proto::ObjectProto;

/// Held for the whole of a save or load. Dropping it releases the store lock.
pub type StoreGuard<'a> = MutexGuard<'a, ()>;

/// What an in-memory object must provide to be saved and loaded.
///
/// An object carries two independent lock domains:
///
/// - the *store lock*, exclusive, serializes whole save/load sequences so at
///   most one is in flight per object;
/// - the *data lock*, shared/exclusive, guards the fields in `Data`.
///
/// Every acquisition is bounded by a [`WaitScope`] and yields `None` when
/// the scope ends first. Releasing a lock is dropping its guard.
///
/// Revisions: `rv_last` is bumped by the object's own logic on every
/// mutation, `rv_stor` records the revision last confirmed persisted.
/// `rv_stor() <= rv_last()` holds at all times and equality means clean.
///
/// Most types implement [`ProtoStorable`] instead and get this trait from
/// the blanket impl.
#[async_trait]
pub trait Storable: Send + Sync {
    /// The fields guarded by the data lock.
    type Data: Send + Sync;

    async fn lock_store<'a>(&'a self, scope: &WaitScope) -> Option<StoreGuard<'a>>;

    async fn read_data<'a>(
        &'a self,
        scope: &WaitScope,
    ) -> Option<RwLockReadGuard<'a, Self::Data>>;

    async fn write_data<'a>(
        &'a self,
        scope: &WaitScope,
    ) -> Option<RwLockWriteGuard<'a, Self::Data>>;

    fn rv_last(&self) -> Rv;

    fn rv_stor(&self) -> Rv;

    fn set_rv_stor(&self, rv: Rv);

    /// Serialize `data`. Called with the data lock held in shared mode.
    fn to_bytes(&self, data: &Self::Data) -> Result<Vec<u8>, BoxError>;

    /// Replace `data` with the state decoded from `bytes` and advance
    /// `rv_last` to the revision that state carries. Called with the data
    /// lock held exclusively.
    fn from_bytes(&self, data: &mut Self::Data, bytes: &[u8]) -> Result<(), BoxError>;
}

/// A domain type that embeds an [`ObjectProto`] and adds serialization.
///
/// The locking and revision half of [`Storable`] comes from the embedded
/// base; implementors only say how their data maps to bytes.
///
/// ```ignore
/// struct Account {
///     base: SaveProto<Balance>,
/// }
///
/// impl ProtoStorable for Account {
///     type Data = Balance;
///
///     fn proto(&self) -> &ObjectProto<Balance> {
///         self.base.object()
///     }
///
///     fn encode(&self, data: &Balance) -> Result<Vec<u8>, BoxError> { ... }
///
///     fn decode(&self, data: &mut Balance, bytes: &[u8]) -> Result<Rv, BoxError> { ... }
/// }
/// ```
pub trait ProtoStorable: Send + Sync {
    type Data: Send + Sync;

    fn proto(&self) -> &ObjectProto<Self::Data>;

    fn encode(&self, data: &Self::Data) -> Result<Vec<u8>, BoxError>;

    /// Decode `bytes` into `data`, returning the revision of the decoded
    /// state. Should leave `data` untouched on error.
    fn decode(&self, data: &mut Self::Data, bytes: &[u8]) -> Result<Rv, BoxError>;
}

#[async_trait]
impl<P: ProtoStorable> Storable for P {
    type Data = <P as ProtoStorable>::Data;

    async fn lock_store<'a>(&'a self, scope: &WaitScope) -> Option<StoreGuard<'a>> {
        self.proto().lock_store(scope).await
    }

    async fn read_data<'a>(
        &'a self,
        scope: &WaitScope,
    ) -> Option<RwLockReadGuard<'a, <P as ProtoStorable>::Data>> {
        self.proto().read(scope).await
    }

    async fn write_data<'a>(
        &'a self,
        scope: &WaitScope,
    ) -> Option<RwLockWriteGuard<'a, <P as ProtoStorable>::Data>> {
        self.proto().write(scope).await
    }

    fn rv_last(&self) -> Rv {
        self.proto().rv()
    }

    fn rv_stor(&self) -> Rv {
        self.proto().stor_rv()
    }

    fn set_rv_stor(&self, rv: Rv) {
        self.proto().set_stor_rv(rv);
    }

    fn to_bytes(&self, data: &<P as ProtoStorable>::Data) -> Result<Vec<u8>, BoxError> {
        self.encode(data)
    }

    fn from_bytes(
        &self,
        data: &mut <P as ProtoStorable>::Data,
        bytes: &[u8],
    ) -> Result<(), BoxError> {
        let rv = self.decode(data, bytes)?;
        self.proto().set_rv(rv);
        Ok(())
    }
}
