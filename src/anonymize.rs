//! Student pseudonyms
//!
//! Risk cards carry a pseudonym derived from the student id with a keyed
//! BLAKE3 hash. Without the key the mapping cannot be inverted or recomputed,
//! and the output reveals nothing about the length or shape of the id.

use uuid::Uuid;

/// Context string for deriving the pseudonym key from a configured secret
const KEY_DERIVATION_CONTEXT: &str = "neuralens-risk 2024 student pseudonym key";

/// Hex characters kept from the digest (64 bits)
const PSEUDONYM_HEX_LEN: usize = 16;

const PSEUDONYM_PREFIX: &str = "anon-";

/// Keyed one-way mapping from student ids to pseudonyms
#[derive(Clone)]
pub struct Anonymizer {
    key: [u8; 32],
}

impl std::fmt::Debug for Anonymizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anonymizer").finish_non_exhaustive()
    }
}

impl Anonymizer {
    /// Key derived from a configured secret; pseudonyms are stable across runs
    pub fn from_secret(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(KEY_DERIVATION_CONTEXT, secret.as_bytes()),
        }
    }

    /// Fresh random key; pseudonyms are stable only for this instance
    pub fn ephemeral() -> Self {
        let mut material = [0u8; 32];
        material[..16].copy_from_slice(Uuid::new_v4().as_bytes());
        material[16..].copy_from_slice(Uuid::new_v4().as_bytes());
        Self {
            key: blake3::derive_key(KEY_DERIVATION_CONTEXT, &material),
        }
    }

    /// Use the configured secret when present, otherwise an ephemeral key
    pub fn from_config(secret: Option<&str>) -> Self {
        match secret {
            Some(secret) => Self::from_secret(secret),
            None => Self::ephemeral(),
        }
    }

    /// Pseudonym for `student_id`, e.g. `anon-3f9a0c1d2e4b5a67`
    pub fn pseudonym(&self, student_id: &str) -> String {
        let digest = blake3::keyed_hash(&self.key, student_id.as_bytes());
        let hex = digest.to_hex();
        format!("{PSEUDONYM_PREFIX}{}", &hex.as_str()[..PSEUDONYM_HEX_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudonym_is_stable_for_same_key() {
        let anonymizer = Anonymizer::ephemeral();
        assert_eq!(
            anonymizer.pseudonym("student-0042"),
            anonymizer.pseudonym("student-0042")
        );
    }

    #[test]
    fn test_secret_keys_reproduce_across_instances() {
        let a = Anonymizer::from_secret("district-secret");
        let b = Anonymizer::from_secret("district-secret");
        let c = Anonymizer::from_secret("other-secret");

        assert_eq!(a.pseudonym("s1"), b.pseudonym("s1"));
        assert_ne!(a.pseudonym("s1"), c.pseudonym("s1"));
    }

    #[test]
    fn test_ephemeral_keys_differ() {
        let a = Anonymizer::ephemeral();
        let b = Anonymizer::ephemeral();
        assert_ne!(a.pseudonym("s1"), b.pseudonym("s1"));
    }

    #[test]
    fn test_pseudonym_hides_id_structure() {
        let anonymizer = Anonymizer::from_secret("k");
        let short = anonymizer.pseudonym("7");
        let long = anonymizer.pseudonym("student-with-a-very-long-identifier-0001");

        assert_eq!(short.len(), long.len());
        assert!(!long.contains("student"));
        assert!(short.starts_with("anon-"));
    }

    #[test]
    fn test_debug_does_not_print_key() {
        let rendered = format!("{:?}", Anonymizer::from_secret("k"));
        assert_eq!(rendered, "Anonymizer { .. }");
    }
}
