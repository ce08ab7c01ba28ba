//! Record keys for element IDs.

use sha2::{Digest, Sha256};

/// Longest ID used verbatim as a file stem.
const MAX_PLAIN_KEY_LEN: usize = 128;

/// Map an element ID to the file stem its record is stored under.
///
/// IDs made of ASCII alphanumerics, `-`, `_` and `.` (not leading) are used as-is.
/// Anything else is sanitized and suffixed with `~` and 16 hex chars of
/// SHA256(id). `~` never appears in a plain ID, so hashed keys and plain keys
/// cannot meet. The ID stored inside the record stays authoritative.
pub fn record_key(id: &str) -> String {
    if is_plain(id) {
        return id.to_string();
    }

    let stem: String = id
        .chars()
        .take(64)
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let hash = Sha256::digest(id.as_bytes());
    let suffix: String = hash[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}~{}", stem, suffix)
}

fn is_plain(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_PLAIN_KEY_LEN
        && !id.starts_with('.')
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
