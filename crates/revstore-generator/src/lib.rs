//! Backend factory for revstore.
//!
//! A [`Generator`] turns a named [`Mount`] plus a relative path into a live
//! [`Storage`](revstore_backend::Storage) instance. Mounts are declared once,
//! usually in a TOML or JSON file (see [`GeneratorInfo::load`]); backend
//! kinds map to constructor functions in a registry that can be extended at
//! runtime with [`Generator::add_stor_generator`].
//!
//! # Built-in kinds
//!
//! | tag | backend |
//! |---|---|
//! | `map` | `MapStorage` |
//! | `file` | `FileStorage(home_path/relative_path)` |
//! | `file_dbl_save` | `DoubleSave(File)` |
//! | `file_dbl_save_gzip` | `DoubleSave(Compress(File))` |

pub mod generator;
pub mod mount;

pub use generator::{Generator, StorConstructor};
pub use mount::{GeneratorInfo, Mount, StorageType};
