//! Cache generation token used as the HTTP validator.
//!
//! The token itself is 32 separator-free hex digits. On the wire it is sent
//! as a strong entity tag, so the `ETag` header value is the token in double
//! quotes; inbound validators are accepted quoted or bare.

use std::fmt;

use uuid::Uuid;

/// Opaque version marker of a cache's contents.
///
/// A fresh value is minted every time the cache is populated or evicted, so
/// equality with a client's validator means nothing has changed since.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(Uuid);

impl Generation {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Separator-free hex form, the canonical wire representation.
    pub fn token(&self) -> String {
        self.0.simple().to_string()
    }

    /// Strong entity tag value (quoted token).
    pub fn etag(&self) -> String {
        format!("\"{}\"", self.token())
    }

    /// Compare a client-supplied validator against this generation.
    ///
    /// Tolerates surrounding quotes, a weak `W/` prefix, hyphenated UUID
    /// formatting and a comma-separated list of candidates.
    pub fn matches(&self, validator: &str) -> bool {
        let token = self.token();
        validator.split(',').map(normalize).any(|candidate| candidate == token)
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

fn normalize(candidate: &str) -> String {
    let candidate = candidate.trim();
    let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
    candidate.trim_matches('"').replace('-', "").to_ascii_lowercase()
}
