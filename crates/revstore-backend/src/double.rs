use async_trait::async_trait;
use revstore_types::{ErrorCode, StorError, StorResult, WaitScope};
use tracing::{debug, warn};

use crate::traits::Storage;

/// Suffix of the shadow copy written before the primary.
pub const SHADOW_SUFFIX: &str = ".dbl";

/// Frame magic for copies written by [`DoubleSaveStorage`].
const MAGIC: &[u8; 4] = b"RVDS";

/// Header size: 4 bytes magic + 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 12;

/// Durability-doubling decorator.
///
/// Every value is written twice through the inner store: first to the shadow
/// key `{key}.dbl`, then to `{key}`. Each copy is framed as
///
/// ```text
/// [4 bytes: magic "RVDS"]
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload]
/// ```
///
/// A crash while the shadow is written leaves the previous primary intact; a
/// crash while the primary is written leaves the new shadow intact. Reads
/// prefer the primary and fall back to the shadow when the primary is missing
/// or fails its checksum.
pub struct DoubleSaveStorage<S> {
    inner: S,
}

impl<S: Storage> DoubleSaveStorage<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Fetch and validate one copy. Only cancellation is returned as an
    /// error; any other failure marks the copy unusable so the other one is
    /// still tried.
    async fn read_copy(&self, scope: &WaitScope, key: &str) -> StorResult<CopyState> {
        let framed = match self.inner.get(scope, key).await {
            Ok(framed) => framed,
            Err(e) if e.is_not_found() => return Ok(CopyState::Missing),
            Err(e) if e.is(ErrorCode::Cancelled) => return Err(e),
            Err(e) => {
                warn!(key, error = %e, "copy unreadable; ignoring");
                return Ok(CopyState::Unusable(Some(e)));
            }
        };
        match decode_frame(&framed) {
            Some(payload) => Ok(CopyState::Intact(payload.to_vec())),
            None => {
                warn!(key, len = framed.len(), "torn or corrupt copy; ignoring");
                Ok(CopyState::Unusable(None))
            }
        }
    }
}

enum CopyState {
    Intact(Vec<u8>),
    Missing,
    /// Present but torn, or failed to read; keeps the read error if any.
    Unusable(Option<StorError>),
}

/// Shadow keys live in the inner store next to user keys, so a user key may
/// never look like one.
fn check_key(key: &str) -> StorResult<()> {
    if key.ends_with(SHADOW_SUFFIX) {
        return Err(StorError::new(ErrorCode::InvalidKey, &[&key]));
    }
    Ok(())
}

fn shadow_key(key: &str) -> String {
    format!("{key}{SHADOW_SUFFIX}")
}

/// Wrap `payload` in a checksummed frame.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(HEADER_SIZE + payload.len());
    framed.extend_from_slice(MAGIC);
    framed.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    framed.extend_from_slice(&crc32fast::hash(payload).to_le_bytes());
    framed.extend_from_slice(payload);
    framed
}

/// Validate a frame and return its payload, or `None` if it is torn.
pub fn decode_frame(framed: &[u8]) -> Option<&[u8]> {
    if framed.len() < HEADER_SIZE || &framed[0..4] != MAGIC {
        return None;
    }
    let length = u32::from_le_bytes([framed[4], framed[5], framed[6], framed[7]]) as usize;
    let expected_crc = u32::from_le_bytes([framed[8], framed[9], framed[10], framed[11]]);
    let payload = &framed[HEADER_SIZE..];
    if payload.len() != length || crc32fast::hash(payload) != expected_crc {
        return None;
    }
    Some(payload)
}

#[async_trait]
impl<S: Storage> Storage for DoubleSaveStorage<S> {
    fn backend_name(&self) -> &'static str {
        "double_save"
    }

    async fn exists(&self, scope: &WaitScope, key: &str) -> StorResult<bool> {
        check_key(key)?;
        if self.inner.exists(scope, key).await? {
            return Ok(true);
        }
        self.inner.exists(scope, &shadow_key(key)).await
    }

    async fn get(&self, scope: &WaitScope, key: &str) -> StorResult<Vec<u8>> {
        check_key(key)?;
        let primary = match self.read_copy(scope, key).await? {
            CopyState::Intact(payload) => return Ok(payload),
            other => other,
        };
        let shadow = match self.read_copy(scope, &shadow_key(key)).await? {
            CopyState::Intact(payload) => {
                debug!(key, "primary unusable; served shadow copy");
                return Ok(payload);
            }
            other => other,
        };
        match (primary, shadow) {
            (CopyState::Missing, CopyState::Missing) => {
                Err(StorError::new(ErrorCode::KeyNotFound, &[&key]))
            }
            (CopyState::Unusable(Some(cause)), _) | (_, CopyState::Unusable(Some(cause))) => {
                Err(StorError::wrap(ErrorCode::NoIntactCopy, cause, &[&key]))
            }
            _ => Err(StorError::new(ErrorCode::NoIntactCopy, &[&key])),
        }
    }

    async fn save(&self, scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()> {
        check_key(key)?;
        let framed = encode_frame(data);
        self.inner.save(scope, &shadow_key(key), &framed).await?;
        self.inner.save(scope, key, &framed).await?;
        debug!(key, len = data.len(), "double save complete");
        Ok(())
    }
}

impl<S> std::fmt::Debug for DoubleSaveStorage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DoubleSaveStorage").finish_non_exhaustive()
    }
}
