use miette::Diagnostic;
use thiserror::Error;

/// Unified error type for all Javelin operations.
#[derive(Debug, Error, Diagnostic)]
pub enum JavelinError {
    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No repository yielded the requested artifact or metadata.
    #[error("Artifact not found: {coordinate} (tried: {repositories})")]
    #[diagnostic(help("Check the coordinate spelling and your repository list"))]
    ArtifactNotFound {
        coordinate: String,
        repositories: String,
    },

    /// Repository credentials were rejected.
    #[error("Unauthorized while fetching {url}")]
    #[diagnostic(help("Check the repository's username and password"))]
    ArtifactUnauthorized { url: String },

    /// Transport-level failure after retries were exhausted.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Version string cannot be parsed as a number or generic version.
    #[error("Malformed version: {version}")]
    MalformedVersion { version: String },

    /// maven-metadata.xml is not well-formed or violates schema assumptions.
    #[error("Malformed metadata: {message}")]
    MalformedMetadata { message: String },

    /// POM document is not well-formed or is missing required coordinates.
    #[error("Malformed POM: {message}")]
    MalformedPom { message: String },

    /// A required field still contains `${...}` after fixed-point interpolation.
    #[error("Unresolved property in {field}: {value}")]
    UnresolvedProperty { field: String, value: String },

    /// A POM's parent chain revisits a coordinate.
    #[error("Cyclic parent chain at {coordinate}")]
    CyclicParent { coordinate: String },

    /// Downloaded artifact does not match its checksum sidecar.
    #[error("{algorithm} mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        algorithm: String,
        url: String,
        expected: String,
        actual: String,
    },

    /// Catch-all for miscellaneous errors.
    #[error("{message}")]
    Generic { message: String },
}

/// Convenience alias for `miette::Result<T>`.
pub type JavelinResult<T> = miette::Result<T>;
