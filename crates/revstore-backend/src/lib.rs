//! Byte-store backends for revstore.
//!
//! Every backend implements the [`Storage`] trait: a key/value blob store
//! keyed by a relative path, exposing `exists`, `get` and `save`, each bounded
//! by a [`WaitScope`](revstore_types::WaitScope).
//!
//! # Backends
//!
//! - [`MapStorage`] -- `HashMap`-based store for tests and embedding
//! - [`FileStorage`] -- files below a root folder, written via temp + rename
//!
//! # Decorators
//!
//! - [`DoubleSaveStorage`] -- writes a checksummed shadow copy before the
//!   primary so a crash mid-write never loses the last good value
//! - [`CompressStorage`] -- transparent zstd compression
//!
//! Decorators own their inner store and keep the [`Storage`] contract
//! exactly; chains such as `DoubleSave(Compress(File))` are assembled by the
//! generator at construction time.

pub mod compress;
pub mod double;
pub mod file;
pub mod memory;
pub mod traits;

pub use compress::{CompressAlg, CompressStorage, UnsupportedAlg};
pub use double::DoubleSaveStorage;
pub use file::FileStorage;
pub use memory::MapStorage;
pub use traits::Storage;
