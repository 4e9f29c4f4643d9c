//! Foundation types for revstore.
//!
//! Every other revstore crate depends on `revstore-types`.
//!
//! # Key Types
//!
//! - [`StorError`] / [`ErrorCode`] -- the coded error catalog
//! - [`WaitScope`] -- cancellable, optionally time-bounded wait scope
//! - [`Rv`] / [`RvGenerator`] -- object revisions and their generator

pub mod error;
pub mod revision;
pub mod scope;

pub use error::{BoxError, ErrorCode, StorError, StorResult, UnknownErrorCode};
pub use revision::{Rv, RvGenerator, PARTITION_SLOTS};
pub use scope::WaitScope;
