//! Mount configuration.
//!
//! A [`Mount`] names one logical storage location: which backend kind to
//! build, where it lives, and how values are compressed. A
//! [`GeneratorInfo`] is the named collection of mounts handed to the
//! [`Generator`](crate::Generator) at construction.
//!
//! ```toml
//! [mounts.state]
//! provider = "file_dbl_save_gzip"
//! home_path = "/var/lib/app/"
//! compress_alg = "zstd"
//! file_extension = ".zst"
//! params = { level = "9" }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use revstore_backend::compress::DEFAULT_LEVEL;
use revstore_backend::CompressAlg;
use revstore_types::{BoxError, ErrorCode, StorError, StorResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Backend kind tag.
///
/// The four built-in kinds serialize as `map`, `file`, `file_dbl_save` and
/// `file_dbl_save_gzip`. Any other string is kept verbatim as
/// [`StorageType::Custom`], so kinds registered at runtime can be named in
/// configuration files.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StorageType {
    /// In-memory map store.
    Map,
    /// Files below `home_path + relative_path`.
    File,
    /// File store behind the durability-doubling decorator.
    FileDoubleSave,
    /// File store behind compression and durability doubling.
    FileDoubleSaveCompressed,
    /// A kind registered at runtime.
    Custom(String),
}

impl StorageType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Map => "map",
            Self::File => "file",
            Self::FileDoubleSave => "file_dbl_save",
            Self::FileDoubleSaveCompressed => "file_dbl_save_gzip",
            Self::Custom(name) => name,
        }
    }
}

impl From<String> for StorageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "map" => Self::Map,
            "file" => Self::File,
            "file_dbl_save" => Self::FileDoubleSave,
            "file_dbl_save_gzip" => Self::FileDoubleSaveCompressed,
            _ => Self::Custom(value),
        }
    }
}

impl From<&str> for StorageType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<StorageType> for String {
    fn from(value: StorageType) -> Self {
        match value {
            StorageType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named storage location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    /// Which constructor builds the backend.
    pub provider: StorageType,
    /// Root prefix for file-backed kinds.
    #[serde(default)]
    pub home_path: String,
    /// Compression algorithm for compressing kinds (zstd when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compress_alg: Option<CompressAlg>,
    /// Extension appended to compressed keys.
    #[serde(default, alias = "file_extention", skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    /// Free-form backend parameters.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl Mount {
    /// A mount of `provider` kind rooted at `home_path`.
    pub fn new(provider: StorageType, home_path: impl Into<String>) -> Self {
        Self {
            provider,
            home_path: home_path.into(),
            compress_alg: None,
            file_extension: None,
            params: BTreeMap::new(),
        }
    }

    pub fn with_compression(mut self, alg: CompressAlg, extension: Option<String>) -> Self {
        self.compress_alg = Some(alg);
        self.file_extension = extension;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Folder for `relative_path` under this mount's home path.
    ///
    /// Leading `/` on the relative path is ignored and `..` components are
    /// rejected, so the folder always lands below the home path.
    pub fn folder(&self, relative_path: &str) -> StorResult<PathBuf> {
        let relative = Path::new(relative_path.trim_start_matches('/'));
        let valid = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !valid {
            return Err(StorError::new(ErrorCode::InvalidKey, &[&relative_path]));
        }
        Ok(Path::new(&self.home_path).join(relative))
    }

    /// Compression level from `params["level"]`, or the default.
    pub fn compress_level(&self) -> i32 {
        match self.params.get("level") {
            None => DEFAULT_LEVEL,
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(level = %raw, "invalid compression level; using default");
                DEFAULT_LEVEL
            }),
        }
    }
}

/// Named mounts: the generator's startup input.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorInfo {
    #[serde(default)]
    pub mounts: BTreeMap<String, Mount>,
}

impl GeneratorInfo {
    pub fn with_mount(mut self, name: impl Into<String>, mount: Mount) -> Self {
        self.mounts.insert(name.into(), mount);
        self
    }

    pub fn from_toml_str(text: &str) -> StorResult<Self> {
        toml::from_str(text).map_err(|e| StorError::wrap(ErrorCode::ConfigParse, e, &[&"toml"]))
    }

    pub fn from_json_str(text: &str) -> StorResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| StorError::wrap(ErrorCode::ConfigParse, e, &[&"json"]))
    }

    /// Read a mount file. `.json` files are parsed as JSON, anything else as
    /// TOML.
    pub fn load(path: &Path) -> StorResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorError::wrap(ErrorCode::ConfigRead, e, &[&path.display()]))?;
        let parsed: Result<Self, BoxError> = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&text).map_err(Into::into)
        } else {
            toml::from_str(&text).map_err(Into::into)
        };
        parsed.map_err(|e| StorError::wrap(ErrorCode::ConfigParse, e, &[&path.display()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_type_tags() {
        for (tag, kind) in [
            ("map", StorageType::Map),
            ("file", StorageType::File),
            ("file_dbl_save", StorageType::FileDoubleSave),
            ("file_dbl_save_gzip", StorageType::FileDoubleSaveCompressed),
        ] {
            assert_eq!(StorageType::from(tag), kind);
            assert_eq!(kind.to_string(), tag);
        }
        assert_eq!(
            StorageType::from("s3"),
            StorageType::Custom("s3".to_string())
        );
        assert_eq!(String::from(StorageType::Custom("s3".into())), "s3");
    }

    #[test]
    fn parse_toml_mounts() {
        let info = GeneratorInfo::from_toml_str(
            r#"
            [mounts.cache]
            provider = "map"

            [mounts.state]
            provider = "file_dbl_save_gzip"
            home_path = "/var/lib/app/"
            compress_alg = "zstd"
            file_extention = ".z"
            params = { level = "9" }

            [mounts.remote]
            provider = "s3"
            params = { bucket = "objects" }
            "#,
        )
        .unwrap();

        assert_eq!(info.mounts.len(), 3);
        let cache = &info.mounts["cache"];
        assert_eq!(cache.provider, StorageType::Map);
        assert!(cache.home_path.is_empty());
        assert!(cache.params.is_empty());

        let state = &info.mounts["state"];
        assert_eq!(state.provider, StorageType::FileDoubleSaveCompressed);
        assert_eq!(state.compress_alg, Some(CompressAlg::Zstd));
        assert_eq!(state.file_extension.as_deref(), Some(".z"));
        assert_eq!(state.compress_level(), 9);

        let remote = &info.mounts["remote"];
        assert_eq!(remote.provider, StorageType::Custom("s3".into()));
        assert_eq!(remote.params["bucket"], "objects");
    }

    #[test]
    fn parse_json_mounts() {
        let info = GeneratorInfo::from_json_str(
            r#"{"mounts":{"m":{"provider":"file","home_path":"/data","params":{}}}}"#,
        )
        .unwrap();
        assert_eq!(info.mounts["m"].provider, StorageType::File);
    }

    #[test]
    fn serialize_roundtrip_keeps_tags() {
        let info = GeneratorInfo::default().with_mount(
            "docs",
            Mount::new(StorageType::FileDoubleSave, "/srv").with_param("k", "v"),
        );
        let text = serde_json::to_string(&info).unwrap();
        assert!(text.contains("\"provider\":\"file_dbl_save\""));
        assert_eq!(GeneratorInfo::from_json_str(&text).unwrap(), info);
    }

    #[test]
    fn unsupported_compression_is_named_in_parse_error() {
        let err = GeneratorInfo::from_toml_str(
            r#"
            [mounts.state]
            provider = "file_dbl_save_gzip"
            compress_alg = "gzip"
            "#,
        )
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigParse);
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(cause.contains("`gzip`"), "{cause}");
        assert!(cause.contains("supported: zstd, raw"), "{cause}");
    }

    #[test]
    fn malformed_config_is_parse_error() {
        let err = GeneratorInfo::from_toml_str("mounts = 5").unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigParse);
    }

    #[test]
    fn load_reads_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("mounts.toml");
        std::fs::write(&toml_path, "[mounts.a]\nprovider = \"map\"\n").unwrap();
        assert!(GeneratorInfo::load(&toml_path).unwrap().mounts.contains_key("a"));

        let json_path = dir.path().join("mounts.json");
        std::fs::write(&json_path, r#"{"mounts":{"b":{"provider":"file"}}}"#).unwrap();
        assert!(GeneratorInfo::load(&json_path).unwrap().mounts.contains_key("b"));

        let err = GeneratorInfo::load(&dir.path().join("absent.toml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigRead);

        std::fs::write(&json_path, "{").unwrap();
        let err = GeneratorInfo::load(&json_path).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConfigParse);
        assert!(err.message().contains("mounts.json"));
    }

    #[test]
    fn folder_stays_under_home() {
        let mount = Mount::new(StorageType::File, "/data");
        assert_eq!(mount.folder("users/1").unwrap(), PathBuf::from("/data/users/1"));
        assert_eq!(mount.folder("/users/1").unwrap(), PathBuf::from("/data/users/1"));
        assert_eq!(mount.folder("").unwrap(), PathBuf::from("/data"));
    }

    #[test]
    fn folder_rejects_parent_components() {
        let mount = Mount::new(StorageType::File, "/data");
        for relative in ["../x", "users/../../x", "/../x"] {
            let err = mount.folder(relative).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidKey, "{relative:?}");
        }
    }

    #[test]
    fn bad_level_falls_back_to_default() {
        let mount = Mount::new(StorageType::FileDoubleSaveCompressed, "/d").with_param("level", "max");
        assert_eq!(mount.compress_level(), DEFAULT_LEVEL);
    }
}
