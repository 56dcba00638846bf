use crate::error::{RegistryWatchError, Result};
use sha2::{Digest, Sha256};

/// Versioned prefix for encoded image keys.
/// Bumping the version invalidates existing snapshots: a key format change
/// must never make old entries alias new ones.
pub const KEY_PREFIX: &str = "regwatch:v2";

/// Identity of one observed (account, registry, repository, tag) tuple.
///
/// The digest is deliberately not part of the identity: two observations of
/// the same tag always map to the same key regardless of content, which is
/// what makes the key usable both as the cache lookup key and as the
/// de-duplication key within a single poll cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    pub account: String,
    pub registry: String,
    pub repository: String,
    pub tag: String,
}

impl ImageKey {
    pub fn new(
        account: impl Into<String>,
        registry: impl Into<String>,
        repository: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            registry: registry.into(),
            repository: repository.into(),
            tag: tag.into(),
        }
    }

    /// Encode the key as a single string: `regwatch:v2:<account>:<registry>:<repository>:<tag>`.
    ///
    /// Components are escaped so that `:` inside a component (registry
    /// host:port) can never collide with the delimiter. Equal components
    /// always produce equal encodings and vice versa.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            KEY_PREFIX,
            escape(&self.account),
            escape(&self.registry),
            escape(&self.repository),
            escape(&self.tag)
        )
    }

    /// Parse an encoded key back into its components.
    pub fn parse(encoded: &str) -> Result<Self> {
        let body = encoded.strip_prefix(KEY_PREFIX).ok_or_else(|| {
            RegistryWatchError::Cache(format!("Image key has unknown prefix: {}", encoded))
        })?;
        let body = body.strip_prefix(':').ok_or_else(|| {
            RegistryWatchError::Cache(format!("Malformed image key: {}", encoded))
        })?;

        let parts: Vec<&str> = body.split(':').collect();
        if parts.len() != 4 {
            return Err(RegistryWatchError::Cache(format!(
                "Image key has {} components, expected 4: {}",
                parts.len(),
                encoded
            )));
        }

        Ok(Self {
            account: unescape(parts[0]),
            registry: unescape(parts[1]),
            repository: unescape(parts[2]),
            tag: unescape(parts[3]),
        })
    }

    /// Filesystem-safe name for this key's snapshot entry (hex SHA-256 of the
    /// encoding, the same content-addressed naming the blob caches use).
    pub fn file_stem(&self) -> String {
        format!("{:x}", Sha256::digest(self.encode().as_bytes()))
    }
}

impl std::fmt::Display for ImageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Escape `%` and `:` so components can never contain the delimiter.
fn escape(component: &str) -> String {
    component.replace('%', "%25").replace(':', "%3A")
}

fn unescape(component: &str) -> String {
    component.replace("%3A", ":").replace("%25", "%")
}
