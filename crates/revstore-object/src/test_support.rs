//! Fixtures shared by the unit tests of this crate.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use revstore_backend::{MapStorage, Storage};
use revstore_types::{BoxError, ErrorCode, Rv, StorError, StorResult, WaitScope};
use serde::{Deserialize, Serialize};

use crate::proto::{ObjectProto, SaveProto};
use crate::storable::ProtoStorable;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub visits: u32,
}

#[derive(Serialize, Deserialize)]
struct Snapshot<T> {
    rv: Rv,
    data: T,
}

/// A domain object embedding `SaveProto`. Refuses to encode a profile named
/// `unserializable`.
pub struct ProfileDoc {
    pub base: SaveProto<Profile>,
}

impl ProfileDoc {
    pub fn new(profile: Profile) -> Self {
        Self::with_base(SaveProto::new(profile))
    }

    pub fn with_base(base: SaveProto<Profile>) -> Self {
        Self { base }
    }
}

impl ProtoStorable for ProfileDoc {
    type Data = Profile;

    fn proto(&self) -> &ObjectProto<Profile> {
        self.base.object()
    }

    fn encode(&self, data: &Profile) -> Result<Vec<u8>, BoxError> {
        if data.name == "unserializable" {
            return Err("profile cannot be encoded".into());
        }
        let snapshot = Snapshot {
            rv: self.proto().rv(),
            data,
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    fn decode(&self, data: &mut Profile, bytes: &[u8]) -> Result<Rv, BoxError> {
        let snapshot: Snapshot<Profile> = serde_json::from_slice(bytes)?;
        *data = snapshot.data;
        Ok(snapshot.rv)
    }
}

/// Map storage that counts calls, can slow down or record its saves, and can
/// be told to fail `exists` or `get` with a `FileIo` error.
#[derive(Default)]
pub struct CountingStorage {
    inner: MapStorage,
    exists_calls: AtomicUsize,
    get_calls: AtomicUsize,
    save_calls: AtomicUsize,
    save_delay: Option<Duration>,
    events: Option<Arc<Mutex<Vec<String>>>>,
    failing_exists: AtomicBool,
    failing_get: AtomicBool,
}

impl CountingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save_delay(mut self, delay: Duration) -> Self {
        self.save_delay = Some(delay);
        self
    }

    pub fn with_events(mut self, events: Arc<Mutex<Vec<String>>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn fail_exists(&self, fail: bool) {
        self.failing_exists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_get(&self, fail: bool) {
        self.failing_get.store(fail, Ordering::SeqCst);
    }

    /// `(exists, get, save)` call counts.
    pub fn calls(&self) -> (usize, usize, usize) {
        (
            self.exists_calls.load(Ordering::SeqCst),
            self.get_calls.load(Ordering::SeqCst),
            self.save_calls.load(Ordering::SeqCst),
        )
    }

    /// Peek at stored bytes without counting.
    pub async fn stored(&self, scope: &WaitScope, key: &str) -> Option<Vec<u8>> {
        self.inner.get(scope, key).await.ok()
    }

    fn record(&self, event: &str) {
        if let Some(events) = &self.events {
            events.lock().unwrap().push(event.to_string());
        }
    }
}

#[async_trait]
impl Storage for CountingStorage {
    fn backend_name(&self) -> &'static str {
        "counting"
    }

    async fn exists(&self, scope: &WaitScope, key: &str) -> StorResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_exists.load(Ordering::SeqCst) {
            return Err(StorError::new(ErrorCode::FileIo, &[&key]));
        }
        self.inner.exists(scope, key).await
    }

    async fn get(&self, scope: &WaitScope, key: &str) -> StorResult<Vec<u8>> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_get.load(Ordering::SeqCst) {
            return Err(StorError::new(ErrorCode::FileIo, &[&key]));
        }
        self.inner.get(scope, key).await
    }

    async fn save(&self, scope: &WaitScope, key: &str, data: &[u8]) -> StorResult<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.record("save-begin");
        if let Some(delay) = self.save_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.inner.save(scope, key, data).await;
        self.record("save-end");
        result
    }
}
