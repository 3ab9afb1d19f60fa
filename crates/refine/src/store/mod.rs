//! Persistence of refiner selections across requests.
//!
//! A [`Store`] is a per-request view of one entry in a [`StoreDriver`]. Reads
//! are lazy and happen at most once; writes are buffered with
//! [`Store::put`] and flushed together by [`Store::persist`].
//!
//! Two drivers ship with the crate:
//!
//! - [`SessionStore`]: transient, kept in memory until cleared
//! - [`CookieStore`]: durable, with an expiry per entry
//!
//! Both keep the serialized JSON object exactly as it would travel over the
//! wire, so a payload that is not a JSON object can reach the store. Such
//! payloads resolve as absent.

mod cookie;
mod session;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

pub use cookie::{Cookie, CookieStore};
pub use session::SessionStore;

/// Identifies the persistence backend of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Lives for the session.
    Transient,
    /// Survives the session, with a lifetime.
    Durable,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Transient => write!(f, "transient"),
            StoreKind::Durable => write!(f, "durable"),
        }
    }
}

/// Backing storage for persisted selections.
///
/// Drivers are shared handles: cloning one, or sharing it behind an `Arc`,
/// must give access to the same entries.
pub trait StoreDriver: Send + Sync + fmt::Debug {
    /// Returns the kind of this driver.
    fn kind(&self) -> StoreKind;

    /// Reads the raw payload stored under `key`.
    fn read(&self, key: &str) -> StoreResult<Option<String>>;

    /// Replaces the payload stored under `key`.
    fn write(&self, key: &str, payload: String) -> StoreResult<()>;

    /// Removes the entry stored under `key`.
    fn forget(&self, key: &str) -> StoreResult<()>;
}

/// One persisted entry with a lazy read cache and a write buffer.
#[derive(Debug)]
pub struct Store {
    key: String,
    driver: Arc<dyn StoreDriver>,
    data: Map<String, Value>,
    resolved: Option<Option<Map<String, Value>>>,
}

impl Store {
    /// Creates a store for `key` backed by `driver`.
    pub fn new(key: impl Into<String>, driver: Arc<dyn StoreDriver>) -> Self {
        Self {
            key: key.into(),
            driver,
            data: Map::new(),
            resolved: None,
        }
    }

    /// Returns the entry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the driver kind.
    pub fn kind(&self) -> StoreKind {
        self.driver.kind()
    }

    /// Reads the stored entry once and caches it.
    ///
    /// Returns None when nothing is stored, the entry expired, or the payload
    /// is not a JSON object.
    pub fn resolve(&mut self) -> StoreResult<Option<&Map<String, Value>>> {
        if self.resolved.is_none() {
            let payload = self.driver.read(&self.key)?;
            self.resolved = Some(payload.and_then(|raw| self.decode(&raw)));
        }
        Ok(self.resolved.as_ref().and_then(Option::as_ref))
    }

    fn decode(&self, raw: &str) -> Option<Map<String, Value>> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Some(map),
            Ok(other) => {
                tracing::debug!(
                    key = %self.key,
                    payload = %other,
                    "ignoring stored payload that is not an object"
                );
                None
            }
            Err(e) => {
                tracing::debug!(key = %self.key, error = %e, "ignoring malformed stored payload");
                None
            }
        }
    }

    /// Returns one stored value.
    pub fn get(&mut self, key: &str) -> StoreResult<Option<Value>> {
        Ok(self.resolve()?.and_then(|map| map.get(key).cloned()))
    }

    /// Returns a copy of the whole stored entry.
    pub fn all(&mut self) -> StoreResult<Option<Map<String, Value>>> {
        Ok(self.resolve()?.cloned())
    }

    /// Buffers a value for the next [`persist`](Self::persist).
    pub fn put(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Buffers every value of `values`.
    pub fn put_all(&mut self, values: Map<String, Value>) {
        self.data.extend(values);
    }

    /// Returns the buffered values.
    pub fn buffered(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Flushes the buffer.
    ///
    /// An empty buffer removes the stored entry. Otherwise the buffer replaces
    /// it whole. The buffer is emptied and the read cache dropped either way.
    pub fn persist(&mut self) -> StoreResult<()> {
        let data = std::mem::take(&mut self.data);
        self.resolved = None;

        if data.is_empty() {
            tracing::debug!(key = %self.key, kind = %self.kind(), "clearing stored selection");
            return self.driver.forget(&self.key);
        }

        let payload = serde_json::to_string(&data).map_err(|e| StoreError::Write {
            key: self.key.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(key = %self.key, kind = %self.kind(), "persisting selection");
        self.driver.write(&self.key, payload)
    }
}
