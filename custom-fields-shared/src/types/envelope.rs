//! Response envelope handling.
//!
//! Some endpoints wrap their payload in `{ "data": ... }`, others return it
//! bare. [`Envelope`] accepts both so callers only ever see the payload.

use serde::Deserialize;

/// A payload that may or may not be wrapped in a `data` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Envelope<T> {
    Wrapped { data: T },
    Bare(T),
}

impl<T> Envelope<T> {
    /// Unwrap the payload regardless of shape.
    pub fn into_inner(self) -> T {
        match self {
            Self::Wrapped { data } => data,
            Self::Bare(inner) => inner,
        }
    }
}
