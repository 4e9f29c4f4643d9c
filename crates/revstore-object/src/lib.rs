//! Persistence for mutable in-memory objects.
//!
//! An object implements [`Storable`] (usually by embedding a [`SaveProto`]
//! and implementing [`ProtoStorable`]); the protocol functions decide when it
//! must be written, snapshot it under its locks and hand the bytes to a
//! [`Storage`](revstore_backend::Storage) backend.
//!
//! ```ignore
//! let storage = generator.create(&scope, "state", "accounts").await?;
//! account.base.mutate(&scope, |b| b.amount += 10).await;
//! save(&scope, Some(&storage), "7.json", &account).await?;
//! ```
//!
//! # Revisions
//!
//! Each object tracks `rv` (bumped on every in-memory change) and `stor_rv`
//! (last revision confirmed written). [`save`] is a no-op while they are
//! equal; a successful save or load brings them together again.

pub mod proto;
pub mod protocol;
pub mod storable;

#[cfg(test)]
mod test_support;

pub use proto::{ObjectProto, SaveProto, SaveTarget, ScopeFactory};
pub use protocol::{
    load, load_if_exists, save, save_extend, Hook, LoadOutcome, SaveHooks, SaveOutcome,
};
pub use storable::{ProtoStorable, Storable, StoreGuard};
