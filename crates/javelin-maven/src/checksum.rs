//! Artifact checksum verification against repository sidecar files.

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

use javelin_util::errors::JavelinError;

use crate::repository::Credentials;
use crate::retriever::{ArtifactRetriever, RetrieveError};

/// Verify downloaded data against the checksum sidecars the repository
/// serves, trying SHA-256 first, then SHA-1, then MD5.
///
/// A repository with no sidecar at all passes with a warning; a mismatch is
/// an error.
pub fn verify(
    retriever: &dyn ArtifactRetriever,
    credentials: Option<&Credentials>,
    file_url: &str,
    data: &[u8],
) -> miette::Result<()> {
    for (extension, algorithm) in [("sha256", "SHA-256"), ("sha1", "SHA-1"), ("md5", "MD5")] {
        let sidecar_url = format!("{file_url}.{extension}");
        match retriever.retrieve_text(&sidecar_url, credentials) {
            Ok(content) => {
                let expected = extract_hash(&content);
                let actual = match extension {
                    "sha256" => hex_digest::<Sha256>(data),
                    "sha1" => hex_digest::<Sha1>(data),
                    _ => hex_digest::<Md5>(data),
                };
                return check(&actual, &expected, algorithm, file_url);
            }
            Err(RetrieveError::NotFound) => continue,
            Err(RetrieveError::Unauthorized) => {
                return Err(JavelinError::ArtifactUnauthorized {
                    url: sidecar_url,
                }
                .into());
            }
            Err(RetrieveError::Network(message)) => {
                return Err(JavelinError::Network { message }.into());
            }
        }
    }

    tracing::warn!("No checksum sidecar found for {file_url}");
    Ok(())
}

fn check(actual: &str, expected: &str, algorithm: &str, url: &str) -> miette::Result<()> {
    if actual.eq_ignore_ascii_case(expected) {
        tracing::debug!("{algorithm} ok for {url}");
        Ok(())
    } else {
        Err(JavelinError::ChecksumMismatch {
            algorithm: algorithm.to_string(),
            url: url.to_string(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
        .into())
    }
}

/// Extract the hex hash from a checksum file.
///
/// Sidecars may contain just the hash, or `hash  filename`.
fn extract_hash(content: &str) -> String {
    content.split_whitespace().next().unwrap_or("").to_string()
}

fn hex_digest<D: Digest>(data: &[u8]) -> String {
    let mut hasher = D::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}
