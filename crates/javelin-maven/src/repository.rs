//! Maven repository abstraction: URL layout, base-url schemes, credentials.

use javelin_core::version::Version;

/// Maven Central base URL.
pub const MAVEN_CENTRAL_URL: &str = "https://repo.maven.apache.org/maven2";

/// A named artifact source with optional credentials.
///
/// The base may be an `http(s)://` URL, a `file://` URL, or a bare
/// filesystem path.
#[derive(Debug, Clone)]
pub struct Repository {
    pub name: String,
    pub url: String,
    pub credentials: Option<Credentials>,
}

/// Credentials for a repository. A password without a username is treated
/// as a bearer token.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Repository {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into().trim_end_matches('/').to_string(),
            credentials: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: Option<String>,
        password: Option<String>,
    ) -> Self {
        self.credentials = Some(Credentials { username, password });
        self
    }

    /// Construct the default Maven Central repository.
    pub fn maven_central() -> Self {
        Self::new("maven-central", MAVEN_CENTRAL_URL)
    }

    /// Whether the base points at the local filesystem.
    pub fn is_local(&self) -> bool {
        self.url.starts_with("file:") || !self.url.contains("://")
    }

    /// Standard Maven layout path for a coordinate's version directory.
    ///
    /// `org.example:lib:1.8.0` becomes `org/example/lib/1.8.0`.
    pub fn coordinate_path(group: &str, artifact: &str, version: &str) -> String {
        format!("{}/{}/{}", group.replace('.', "/"), artifact, version)
    }

    /// Full URL to a specific file within this repository.
    pub fn file_url(&self, group: &str, artifact: &str, version: &str, filename: &str) -> String {
        format!(
            "{}/{}/{}",
            self.url,
            Self::coordinate_path(group, artifact, version),
            filename
        )
    }

    /// Filename of an artifact within its version directory.
    ///
    /// `file_version` differs from the directory version for timestamped
    /// SNAPSHOT builds (`lib-1.0-20240615.143022-42.jar` inside
    /// `1.0-SNAPSHOT/`).
    pub fn artifact_filename(
        artifact: &str,
        file_version: &Version,
        classifier: Option<&str>,
        type_: &str,
    ) -> String {
        match classifier {
            Some(c) => format!("{artifact}-{file_version}-{c}.{type_}"),
            None => format!("{artifact}-{file_version}.{type_}"),
        }
    }

    /// URL to an artifact file for a coordinate.
    pub fn artifact_url(
        &self,
        group: &str,
        artifact: &str,
        version: &Version,
        file_version: &Version,
        classifier: Option<&str>,
        type_: &str,
    ) -> String {
        let filename = Self::artifact_filename(artifact, file_version, classifier, type_);
        self.file_url(group, artifact, &version.to_string(), &filename)
    }

    /// URL to the POM file for a coordinate.
    pub fn pom_url(&self, group: &str, artifact: &str, version: &Version) -> String {
        let filename = format!("{artifact}-{version}.pom");
        self.file_url(group, artifact, &version.to_string(), &filename)
    }

    /// URL to the artifact-level `maven-metadata.xml` (version listing).
    pub fn metadata_url(&self, group: &str, artifact: &str) -> String {
        format!(
            "{}/{}/{}/maven-metadata.xml",
            self.url,
            group.replace('.', "/"),
            artifact
        )
    }

    /// URL to the version-level `maven-metadata.xml` (SNAPSHOT resolution).
    pub fn snapshot_metadata_url(&self, group: &str, artifact: &str, version: &Version) -> String {
        format!(
            "{}/{}/maven-metadata.xml",
            self.url,
            Self::coordinate_path(group, artifact, &version.to_string())
        )
    }

    pub fn has_auth(&self) -> bool {
        self.credentials.is_some()
    }
}
