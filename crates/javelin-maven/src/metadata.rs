//! `maven-metadata.xml` parsing for version discovery and SNAPSHOT resolution.

use javelin_core::version::{Version, SNAPSHOT_QUALIFIER};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Parsed repository metadata for one artifact.
///
/// The same document shape serves two levels: the artifact-level file lists
/// released versions, the version-level file describes one SNAPSHOT version
/// and its current timestamped build. Both parse through here; the
/// version-level `<version>` element lands as the single entry in
/// `versions`, which is what the snapshot computation keys off.
#[derive(Debug, Clone)]
pub struct MavenMetadata {
    pub latest: Version,
    pub release: Version,
    pub snapshot: Version,
    pub snapshot_timestamp: Option<String>,
    pub snapshot_build_number: Option<u32>,
    pub versions: Vec<Version>,
}

impl Default for MavenMetadata {
    fn default() -> Self {
        Self {
            latest: Version::Unknown,
            release: Version::Unknown,
            snapshot: Version::Unknown,
            snapshot_timestamp: None,
            snapshot_build_number: None,
            versions: Vec::new(),
        }
    }
}

/// Parse a `maven-metadata.xml` document.
pub fn parse_metadata(xml: &str) -> miette::Result<MavenMetadata> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut meta = MavenMetadata::default();
    let mut saw_snapshot = false;
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "snapshot" {
                    saw_snapshot = true;
                }
                path.push(tag);
                text_buf.clear();
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"snapshot" {
                    saw_snapshot = true;
                }
            }
            Ok(Event::Text(ref e)) => {
                text_buf = e.unescape().unwrap_or_default().to_string();
            }
            Ok(Event::End(_)) => {
                // The `<snapshotVersions>` subtree of version-level metadata
                // repeats `<version>` with per-classifier entries; those are
                // not release versions.
                let in_snapshot_versions = path.iter().any(|t| t == "snapshotVersions");

                match path.last().map(String::as_str) {
                    Some("latest") => meta.latest = Version::parse(&text_buf),
                    Some("release") => meta.release = Version::parse(&text_buf),
                    Some("version") if !in_snapshot_versions => {
                        let version = Version::parse(&text_buf);
                        if !version.is_unknown() && !meta.versions.contains(&version) {
                            meta.versions.push(version);
                        }
                    }
                    Some("timestamp") => meta.snapshot_timestamp = Some(text_buf.clone()),
                    Some("buildNumber") => {
                        meta.snapshot_build_number = text_buf.trim().parse().ok();
                    }
                    _ => {}
                }

                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(javelin_util::errors::JavelinError::MalformedMetadata {
                    message: format!("Failed to parse maven-metadata.xml: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    finish(&mut meta, saw_snapshot);
    Ok(meta)
}

/// End-of-document post-processing: snapshot qualifier computation and the
/// stable-latest filter.
fn finish(meta: &mut MavenMetadata, saw_snapshot: bool) {
    if saw_snapshot {
        if let Some(version) = meta.versions.first() {
            let qualifier = match (&meta.snapshot_timestamp, meta.snapshot_build_number) {
                (Some(ts), Some(bn)) => format!("{ts}-{bn}"),
                _ => SNAPSHOT_QUALIFIER.to_string(),
            };
            meta.snapshot = version.with_qualifier(&qualifier);
        }
    }

    // Determine the latest stable version by dropping pre-release
    // qualifiers; keep the declared latest when nothing stable remains.
    let stable_max = meta
        .versions
        .iter()
        .filter(|v| !is_prerelease_qualifier(v.qualifier()))
        .max();
    if let Some(stable) = stable_max {
        meta.latest = stable.clone();
    }
}

/// Qualifiers that mark a version as pre-release for the stable-latest
/// filter: `rc*`, `cr*`, anything containing `milestone`/`beta`/`alpha`,
/// and the short forms `m2`, `b1`, `a12`.
fn is_prerelease_qualifier(qualifier: Option<&str>) -> bool {
    let Some(q) = qualifier else {
        return false;
    };
    let q = q.to_ascii_lowercase();
    q.starts_with("rc")
        || q.starts_with("cr")
        || q.contains("milestone")
        || q.contains("beta")
        || q.contains("alpha")
        || is_letter_digits(&q, 'm')
        || is_letter_digits(&q, 'b')
        || is_letter_digits(&q, 'a')
}

/// Matches `<letter><digits?>` exactly, e.g. `m`, `m1`, `b12`.
fn is_letter_digits(q: &str, letter: char) -> bool {
    let mut chars = q.chars();
    chars.next() == Some(letter) && chars.as_str().bytes().all(|b| b.is_ascii_digit())
}
