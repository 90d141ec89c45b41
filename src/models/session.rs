//! # Session Resources
//!
//! An origin-bound credential bundle: the cookie jar minted by a real browser
//! behind a specific egress IP. Sessions are minted elsewhere; this crate only
//! selects, uses and updates them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use super::network::{subnet_of, AddressError};

pub type SessionId = i64;

/// Lifecycle status of a stored session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Expired,
    Blocked,
    Exhausted,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Expired => write!(f, "expired"),
            Self::Blocked => write!(f, "blocked"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// A single cookie with the attributes worth carrying between requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Expiry as a unix timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Cookie name → cookie. Insertion order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieJar {
    cookies: HashMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge response-set cookies into the jar.
    ///
    /// Existing cookies take the new value and any attributes the response
    /// carries; unknown names are appended. Returns how many entries changed.
    pub fn merge(&mut self, incoming: &[Cookie]) -> usize {
        let mut changed = 0;
        for cookie in incoming {
            match self.cookies.get_mut(&cookie.name) {
                Some(existing) => {
                    let mut touched = false;
                    if existing.value != cookie.value {
                        existing.value.clone_from(&cookie.value);
                        touched = true;
                    }
                    if cookie.expires.is_some() && existing.expires != cookie.expires {
                        existing.expires = cookie.expires;
                        touched = true;
                    }
                    if cookie.domain.is_some() && existing.domain != cookie.domain {
                        existing.domain.clone_from(&cookie.domain);
                        touched = true;
                    }
                    if cookie.path.is_some() && existing.path != cookie.path {
                        existing.path.clone_from(&cookie.path);
                        touched = true;
                    }
                    if touched {
                        changed += 1;
                    }
                }
                None => {
                    self.cookies.insert(cookie.name.clone(), cookie.clone());
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn insert(&mut self, cookie: Cookie) {
        self.cookies.insert(cookie.name.clone(), cookie);
    }

    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cookie> {
        self.cookies.values()
    }

    /// All cookies as a vector, sorted by name for stable output
    pub fn to_vec(&self) -> Vec<Cookie> {
        let mut cookies: Vec<Cookie> = self.cookies.values().cloned().collect();
        cookies.sort_by(|a, b| a.name.cmp(&b.name));
        cookies
    }
}

impl FromIterator<Cookie> for CookieJar {
    fn from_iter<I: IntoIterator<Item = Cookie>>(iter: I) -> Self {
        let mut jar = CookieJar::new();
        for cookie in iter {
            jar.insert(cookie);
        }
        jar
    }
}

/// What the transport needs to present the session's browser identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFingerprint {
    pub session_id: SessionId,
    pub browser_build_id: String,
}

/// A reusable, origin-bound credential bundle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResource {
    pub id: SessionId,
    /// Egress IP at mint time
    pub origin_ip: String,
    origin_subnet: String,
    pub cookie_jar: CookieJar,
    pub browser_build_id: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub use_count: u32,
    pub success_count: u32,
    pub fail_count: u32,
    pub status: SessionStatus,
}

impl SessionResource {
    pub fn new(
        id: SessionId,
        origin_ip: impl Into<String>,
        browser_build_id: impl Into<String>,
        cookie_jar: CookieJar,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AddressError> {
        let origin_ip = origin_ip.into();
        let origin_subnet = subnet_of(&origin_ip)?;
        Ok(Self {
            id,
            origin_ip,
            origin_subnet,
            cookie_jar,
            browser_build_id: browser_build_id.into(),
            created_at,
            last_used_at: None,
            use_count: 0,
            success_count: 0,
            fail_count: 0,
            status: SessionStatus::Active,
        })
    }

    /// First three octets of the mint-time IP; fixed for the session's life
    pub fn origin_subnet(&self) -> &str {
        &self.origin_subnet
    }

    /// Age relative to `now`; zero when the clock reads earlier than creation
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.created_at).to_std().unwrap_or_default()
    }

    /// Time since last use, if the session was ever used
    pub fn idle_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.last_used_at
            .map(|used| (now - used).to_std().unwrap_or_default())
    }

    /// Record one completed use. Keeps `use_count == success_count + fail_count`.
    pub fn record_use(&mut self, success: bool, now: DateTime<Utc>) {
        if success {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        self.use_count = self.success_count + self.fail_count;
        self.last_used_at = Some(now);
    }

    pub fn fingerprint(&self) -> SessionFingerprint {
        SessionFingerprint {
            session_id: self.id,
            browser_build_id: self.browser_build_id.clone(),
        }
    }
}
