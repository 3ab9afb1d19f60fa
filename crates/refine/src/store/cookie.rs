//! Cookie-backed durable store.
//!
//! The store is a cookie jar: the host seeds it from the request's cookies
//! and writes [`CookieStore::cookies`] back as `Set-Cookie` headers. Forgotten
//! entries stay in the jar as expired tombstones so the host can tell the
//! client to drop them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use url::form_urlencoded;

use super::{StoreDriver, StoreKind};
use crate::config::RefineConfig;
use crate::error::StoreResult;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// A single cookie with its expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie name (the store key).
    pub name: String,
    /// Decoded payload.
    pub value: String,
    /// Instant after which the cookie reads as absent.
    pub expires_at: DateTime<Utc>,
}

impl Cookie {
    /// Creates a cookie.
    pub fn new(name: impl Into<String>, value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            expires_at,
        }
    }

    /// Returns true if the cookie has expired at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Renders a `Set-Cookie` header value.
    pub fn to_header(&self) -> String {
        let value: String = form_urlencoded::byte_serialize(self.value.as_bytes()).collect();
        format!(
            "{}={}; Expires={}; Path=/; HttpOnly",
            self.name,
            value,
            self.expires_at.format(HTTP_DATE)
        )
    }
}

/// Durable driver storing payloads as cookies.
///
/// Clones share the same jar.
#[derive(Debug, Clone)]
pub struct CookieStore {
    jar: Arc<RwLock<HashMap<String, Cookie>>>,
    lifetime: Duration,
}

impl Default for CookieStore {
    fn default() -> Self {
        Self::from_config(&RefineConfig::default())
    }
}

impl CookieStore {
    /// Creates an empty jar whose writes live for `lifetime`.
    pub fn new(lifetime: Duration) -> Self {
        Self {
            jar: Arc::new(RwLock::new(HashMap::new())),
            lifetime,
        }
    }

    /// Creates an empty jar using the configured lifetime.
    pub fn from_config(config: &RefineConfig) -> Self {
        Self::new(config.cookie_lifetime())
    }

    /// Seeds the jar with the cookies sent by the client.
    ///
    /// Values are percent-decoded. Cookies sent by a client are live; their
    /// expiry is renewed to the configured lifetime.
    pub fn with_request_cookies<I, K, V>(self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let expires_at = Utc::now() + self.lifetime;
        {
            let mut jar = self.jar.write();
            for (name, value) in cookies {
                let name = name.into();
                let cookie = Cookie::new(name.clone(), decode(value.as_ref()), expires_at);
                jar.insert(name, cookie);
            }
        }
        self
    }

    /// Returns the configured lifetime.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Inserts a cookie as is.
    pub fn insert(&self, cookie: Cookie) {
        self.jar.write().insert(cookie.name.clone(), cookie);
    }

    /// Returns every cookie in the jar, tombstones included, sorted by name.
    pub fn cookies(&self) -> Vec<Cookie> {
        let mut cookies: Vec<Cookie> = self.jar.read().values().cloned().collect();
        cookies.sort_by(|a, b| a.name.cmp(&b.name));
        cookies
    }

    /// Drops expired cookies from the jar.
    pub fn purge_expired(&self) {
        let now = Utc::now();
        self.jar.write().retain(|_, cookie| !cookie.is_expired_at(now));
    }
}

fn decode(raw: &str) -> String {
    form_urlencoded::parse(raw.as_bytes())
        .next()
        .map(|(value, _)| value.into_owned())
        .unwrap_or_default()
}

impl StoreDriver for CookieStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Durable
    }

    fn read(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Utc::now();
        Ok(self
            .jar
            .read()
            .get(key)
            .filter(|cookie| !cookie.is_expired_at(now))
            .map(|cookie| cookie.value.clone()))
    }

    fn write(&self, key: &str, payload: String) -> StoreResult<()> {
        let cookie = Cookie::new(key, payload, Utc::now() + self.lifetime);
        self.insert(cookie);
        Ok(())
    }

    fn forget(&self, key: &str) -> StoreResult<()> {
        self.insert(Cookie::new(key, "", DateTime::<Utc>::UNIX_EPOCH));
        Ok(())
    }
}
