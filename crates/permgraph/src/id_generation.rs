//! Hash-based permission ID generation.
//!
//! Permission IDs have the form `{prefix}-{hash}` (e.g. `perm-k3x9`), where the
//! hash is a base36 rendering of the SHA-256 of the permission's machine name.
//! Generation is deterministic for a given name and set of taken IDs, which
//! keeps seeded permission sets reproducible across machines.
//!
//! ```
//! use permgraph::id_generation::IdGenerator;
//!
//! let mut generator = IdGenerator::new("perm");
//! let id = generator.generate("users.view").unwrap();
//! assert!(id.starts_with("perm-"));
//! ```

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

const BASE36_CHARS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const MAX_NONCE: u32 = 100;
const MIN_HASH_LENGTH: usize = 4;
const MAX_HASH_LENGTH: usize = 8;

/// Errors that can occur during ID generation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdGenerationError {
    /// Every nonce at every length collided with an existing ID
    #[error("Unable to generate unique ID for '{name}' after {attempts} attempts")]
    CollisionExhausted {
        /// Name the ID was generated for
        name: String,
        /// Number of hashes tried
        attempts: u32,
    },
}

/// Collision-aware generator for permission IDs
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    existing_ids: HashSet<String>,
}

impl IdGenerator {
    /// Create a generator for the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            existing_ids: HashSet::new(),
        }
    }

    /// The configured prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Register an existing ID so it is never handed out again
    pub fn register_id(&mut self, id: impl Into<String>) {
        self.existing_ids.insert(id.into());
    }

    /// Forget an ID (after its permission was deleted)
    pub fn release_id(&mut self, id: &str) {
        self.existing_ids.remove(id);
    }

    /// Generate a unique ID for a permission name.
    ///
    /// Starts at the length suited to the number of registered IDs and grows
    /// the hash when every nonce collides.
    ///
    /// # Errors
    ///
    /// Returns [`IdGenerationError::CollisionExhausted`] if no free ID exists up
    /// to the maximum hash length.
    pub fn generate(&mut self, name: &str) -> Result<String, IdGenerationError> {
        let mut attempts = 0;

        for length in self.adaptive_length()..=MAX_HASH_LENGTH {
            for nonce in 0..MAX_NONCE {
                attempts += 1;
                let id = format!("{}-{}", self.prefix, hash_name(name, nonce, length));
                if self.existing_ids.insert(id.clone()) {
                    if attempts > 1 {
                        debug!(name, attempts, length, "Resolved ID collision");
                    }
                    return Ok(id);
                }
            }
        }

        Err(IdGenerationError::CollisionExhausted {
            name: name.to_string(),
            attempts,
        })
    }

    /// Hash length for the current number of IDs.
    ///
    /// - up to 1,000 IDs: 4 chars
    /// - up to 5,000: 5 chars
    /// - beyond: 6 chars
    fn adaptive_length(&self) -> usize {
        match self.existing_ids.len() {
            0..=1_000 => MIN_HASH_LENGTH,
            1_001..=5_000 => MIN_HASH_LENGTH + 1,
            _ => MIN_HASH_LENGTH + 2,
        }
    }
}

fn hash_name(name: &str, nonce: u32, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    hasher.update(nonce.to_le_bytes());
    let digest = hasher.finalize();

    let mut num = digest[..8]
        .iter()
        .fold(0u64, |acc, &byte| acc.wrapping_shl(8).wrapping_add(u64::from(byte)));

    let mut encoded = Vec::with_capacity(length);
    while encoded.len() < length {
        encoded.push(BASE36_CHARS[(num % 36) as usize] as char);
        num /= 36;
    }
    encoded.iter().rev().collect()
}

/// Check whether an ID has the `{prefix}-{hash}` shape for the given prefix
pub fn validate_id(id: &str, prefix: &str) -> bool {
    let Some(hash) = id
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
    else {
        return false;
    };

    (MIN_HASH_LENGTH..=MAX_HASH_LENGTH).contains(&hash.len())
        && hash
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
}
