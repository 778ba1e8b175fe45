//! Cache key derivation

use ahash::AHasher;
use std::hash::{Hash, Hasher};

/// Key for an unnamed query, hashed from its identity string
///
/// A convenience default only: identities derived from code shapes change
/// under refactoring, so callers should pass an explicit key.
pub fn fallback_key(identity: &str) -> String {
    let mut hasher = AHasher::default();
    identity.hash(&mut hasher);
    format!("query_{}", hasher.finish())
}

/// Key under which a batch descriptor's result is cached
pub fn batch_key(name: &str) -> String {
    format!("batch_{}", name)
}
