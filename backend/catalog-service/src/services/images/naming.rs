//! Deterministic artifact names
//!
//! The name of a stored artifact depends only on its source URL, so
//! reprocessing a job overwrites the same objects instead of adding new ones.

use sha2::{Digest, Sha256};
use url::Url;

const ARTIFACT_EXTENSION: &str = "jpg";

/// Canonical form of a source URL
///
/// Scheme and host are lower-cased, the default port is dropped and the
/// fragment is removed. Unparseable input is only trimmed.
pub fn canonical_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw.trim().to_string(),
    }
}

/// Artifact name for a source URL: hex SHA-256 of the canonical URL plus `.jpg`
pub fn artifact_name(source_url: &str) -> String {
    let digest = Sha256::digest(canonical_url(source_url).as_bytes());
    format!("{}.{}", hex::encode(digest), ARTIFACT_EXTENSION)
}
