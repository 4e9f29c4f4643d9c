use std::fmt;

use async_trait::async_trait;
use revstore_types::{ErrorCode, StorError, StorResult, WaitScope};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::traits::Storage;

/// Default zstd compression level.
pub const DEFAULT_LEVEL: i32 = 3;

/// Compression algorithm applied by [`CompressStorage`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompressAlg {
    /// zstd frame compression.
    #[default]
    Zstd,
    /// No compression; bytes pass through unchanged.
    Raw,
}

impl CompressAlg {
    /// Every supported algorithm, by configuration tag.
    pub const SUPPORTED: [CompressAlg; 2] = [Self::Zstd, Self::Raw];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zstd => "zstd",
            Self::Raw => "raw",
        }
    }

    /// File extension appended to keys when none is configured.
    pub fn default_extension(self) -> &'static str {
        match self {
            Self::Zstd => ".zst",
            Self::Raw => "",
        }
    }

    pub fn compress(self, data: &[u8], level: i32) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Zstd => zstd::encode_all(data, level),
            Self::Raw => Ok(data.to_vec()),
        }
    }

    pub fn decompress(self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Zstd => zstd::decode_all(data),
            Self::Raw => Ok(data.to_vec()),
        }
    }
}

impl fmt::Display for CompressAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `compress_alg` tag naming no supported algorithm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedAlg(pub String);

impl fmt::Display for UnsupportedAlg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported compression algorithm `{}` (supported: ", self.0)?;
        for (i, alg) in CompressAlg::SUPPORTED.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(alg.as_str())?;
        }
        f.write_str(")")
    }
}

impl std::error::Error for UnsupportedAlg {}

impl std::str::FromStr for CompressAlg {
    type Err = UnsupportedAlg;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Self::SUPPORTED
            .into_iter()
            .find(|alg| alg.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| UnsupportedAlg(tag.to_string()))
    }
}

impl TryFrom<String> for CompressAlg {
    type Error = UnsupportedAlg;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        tag.parse()
    }
}

impl From<CompressAlg> for String {
    fn from(alg: CompressAlg) -> Self {
        alg.as_str().to_string()
    }
}

/// Compression decorator.
///
/// Values are compressed before they reach the inner store and decompressed
/// on the way out. Every key is suffixed with the configured extension, so
/// `save("a.json")` lands in the inner store as `a.json.zst`.
pub struct CompressStorage<S> {
    inner: S,
    alg: CompressAlg,
    level: i32,
    extension: String,
}

impl<S: Storage> CompressStorage<S> {
    /// Wrap `inner`. `extension` defaults to [`CompressAlg::default_extension`].
    pub fn new(inner: S, alg: CompressAlg, extension: Option<String>) -> Self {
        Self {
            inner,
            alg,
            level: DEFAULT_LEVEL,
            extension: extension.unwrap_or_else(|| alg.default_extension().to_string()),
        }
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn alg(&self) -> CompressAlg {
        self.alg
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn inner_key(&self, key: &str) -> String {
        format!("{key}{}", self.extension)
    }
}

#[async_trait]
impl<S: Storage> Storage for CompressStorage<S> {
    fn backend_name(&self) -> &'static str {
        "compress"
    }

    async fn exists(&self, scope: &WaitScope, key: &str) -> StorResult<bool> {
        self.inner.exists(scope, &self.inner_key(key)).await
    }

    async fn get(&self, scope: &WaitScope, key: &str) -> StorResult<Vec<u8>> {
        let compressed = self.inner.get(scope, &self.inner_key(key)).await?;
        self.alg
            .decompress(&compressed)
            .map_err(|e| StorError::wrap(ErrorCode::Decompress, e, &[&self.alg, &key]))
    }

    async fn save(&self, scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()> {
        let compressed = self
            .alg
            .compress(data, self.level)
            .map_err(|e| StorError::wrap(ErrorCode::Compress, e, &[&self.alg, &key]))?;
        debug!(key, raw = data.len(), compressed = compressed.len(), alg = %self.alg, "compressed");
        self.inner.save(scope, &self.inner_key(key), &compressed).await
    }
}

impl<S> fmt::Debug for CompressStorage<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressStorage")
            .field("alg", &self.alg)
            .field("level", &self.level)
            .field("extension", &self.extension)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MapStorage;

    fn scope() -> WaitScope {
        WaitScope::unbounded()
    }

    #[tokio::test]
    async fn zstd_roundtrip_shrinks_repetitive_data() {
        let store = CompressStorage::new(MapStorage::new(), CompressAlg::Zstd, None);
        let data = vec![0xABu8; 100_000];
        store.save(&scope(), "big", &data).await.unwrap();

        let raw = store.inner().get(&scope(), "big.zst").await.unwrap();
        assert!(raw.len() < data.len());
        assert_eq!(store.get(&scope(), "big").await.unwrap(), data);
    }

    #[tokio::test]
    async fn custom_extension_is_used_for_every_operation() {
        let store =
            CompressStorage::new(MapStorage::new(), CompressAlg::Zstd, Some(".gz".into()));
        assert!(!store.exists(&scope(), "a").await.unwrap());
        store.save(&scope(), "a", b"abc").await.unwrap();
        assert!(store.exists(&scope(), "a").await.unwrap());
        assert_eq!(store.inner().keys(), vec!["a.gz"]);
    }

    #[tokio::test]
    async fn raw_passes_bytes_through() {
        let store = CompressStorage::new(MapStorage::new(), CompressAlg::Raw, None);
        store.save(&scope(), "k", b"plain").await.unwrap();
        assert_eq!(store.inner().get(&scope(), "k").await.unwrap(), b"plain");
    }

    #[tokio::test]
    async fn garbage_fails_decompression() {
        let store = CompressStorage::new(MapStorage::new(), CompressAlg::Zstd, None);
        store
            .inner()
            .save(&scope(), "bad.zst", b"not zstd at all")
            .await
            .unwrap();
        let err = store.get(&scope(), "bad").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Decompress);
        assert!(err.message().contains("zstd"));
    }

    #[tokio::test]
    async fn missing_key_stays_not_found() {
        let store = CompressStorage::new(MapStorage::new(), CompressAlg::Zstd, None);
        assert!(store.get(&scope(), "nope").await.unwrap_err().is_not_found());
    }

    #[test]
    fn alg_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&CompressAlg::Zstd).unwrap(), "\"zstd\"");
        let alg: CompressAlg = serde_json::from_str("\"raw\"").unwrap();
        assert_eq!(alg, CompressAlg::Raw);
    }

    #[test]
    fn unsupported_alg_names_the_supported_ones() {
        let err = serde_json::from_str::<CompressAlg>("\"gzip\"").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("`gzip`"), "{message}");
        assert!(message.contains("supported: zstd, raw"), "{message}");

        assert_eq!("ZSTD".parse::<CompressAlg>(), Ok(CompressAlg::Zstd));
    }
}
