//! Cache key namespaces

use std::fmt::{self, Display};

/// A cache key namespace: every key produced is `"<namespace>/<id>"`
///
/// Entity caches use the lowercase entity name (`user`, `item`, ...), rate
/// gates use their own namespace (`user_dump`) so the two never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Builds the key for a single identifier
    pub fn key(&self, id: impl Display) -> String {
        format!("{}/{}", self.namespace, id)
    }

    /// Returns true if `key` belongs to this namespace
    pub fn contains(&self, key: &str) -> bool {
        key.strip_prefix(self.namespace.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl Display for KeySpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.namespace)
    }
}
