//! Work item identifiers.
//!
//! Ids are `wi-` followed by the first [`HASH_CHARS`] hex characters of a
//! BLAKE3 digest over the workspace, title, creation time and a nonce. The
//! nonce lets callers re-derive on the (unlikely) event of a collision.

/// Prefix shared by every generated id.
pub const ID_PREFIX: &str = "wi-";

/// Number of hex characters kept from the digest.
pub const HASH_CHARS: usize = 10;

/// Derive a work item id.
#[must_use]
pub fn derive_id(workspace_id: &str, title: &str, created_at_us: i64, nonce: u64) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(workspace_id.as_bytes());
    hasher.update(&[0]);
    hasher.update(title.as_bytes());
    hasher.update(&[0]);
    hasher.update(&created_at_us.to_le_bytes());
    hasher.update(&nonce.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    format!("{ID_PREFIX}{}", &hex[..HASH_CHARS])
}
