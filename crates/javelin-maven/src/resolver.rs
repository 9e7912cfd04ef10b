//! Single-coordinate dependency resolution: version listing and selection,
//! POM retrieval, artifact download.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use javelin_core::dependency::Dependency;
use javelin_core::properties::HierarchicalProperties;
use javelin_core::version::{Version, VersionRange};
use javelin_util::errors::JavelinError;

use crate::checksum;
use crate::metadata::{self, MavenMetadata};
use crate::pom::{self, MavenPom, PomContext};
use crate::repository::Repository;
use crate::retriever::{ArtifactRetriever, RetrieveError};

/// Property prefix for version overrides, e.g.
/// `javelin.override.org.example:lib=2.1` or `javelin.override.org.example=2.1`.
pub const OVERRIDE_PREFIX: &str = "javelin.override.";

/// Version overrides sourced from hierarchical properties, consulted before
/// any metadata lookup. Exact `group:artifact` keys win over group-wide keys.
#[derive(Debug, Clone, Default)]
pub struct VersionResolution {
    overrides: Vec<(String, Version)>,
}

impl VersionResolution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_properties(properties: &HierarchicalProperties) -> Self {
        let mut overrides = Vec::new();
        for (key, value) in properties.flattened() {
            if let Some(target) = key.strip_prefix(OVERRIDE_PREFIX) {
                let version = Version::parse(&value);
                if !target.is_empty() && !version.is_unknown() {
                    overrides.push((target.to_string(), version));
                }
            }
        }
        Self { overrides }
    }

    /// The pinned version for a coordinate, if any.
    pub fn override_for(&self, group_id: &str, artifact_id: &str) -> Option<&Version> {
        let exact = format!("{group_id}:{artifact_id}");
        self.overrides
            .iter()
            .find(|(key, _)| *key == exact)
            .or_else(|| self.overrides.iter().find(|(key, _)| *key == group_id))
            .map(|(_, version)| version)
    }

    /// The version to resolve for a dependency: its override when pinned,
    /// otherwise its declared version.
    pub fn resolve(&self, dependency: &Dependency) -> Version {
        self.override_for(&dependency.group_id, &dependency.artifact_id)
            .cloned()
            .unwrap_or_else(|| dependency.version.clone())
    }
}

/// Resolves one coordinate against an ordered repository list.
pub struct DependencyResolver<'a> {
    resolution: &'a VersionResolution,
    retriever: &'a dyn ArtifactRetriever,
    repositories: &'a [Repository],
    dependency: Dependency,
    merged_metadata: OnceCell<Option<MavenMetadata>>,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(
        resolution: &'a VersionResolution,
        retriever: &'a dyn ArtifactRetriever,
        repositories: &'a [Repository],
        dependency: Dependency,
    ) -> Self {
        Self {
            resolution,
            retriever,
            repositories,
            dependency,
            merged_metadata: OnceCell::new(),
        }
    }

    pub fn dependency(&self) -> &Dependency {
        &self.dependency
    }

    /// Every version any repository publishes for this coordinate, in
    /// first-seen order with duplicates removed.
    pub fn list_versions(&self) -> miette::Result<Vec<Version>> {
        Ok(self
            .metadata()?
            .map(|m| m.versions)
            .unwrap_or_default())
    }

    /// The latest stable version across repositories.
    ///
    /// Prefers the metadata's `latest` (which the parser replaces with the
    /// highest non-pre-release version), then the highest listed version,
    /// then the declared `release`.
    pub fn latest_version(&self) -> miette::Result<Version> {
        let Some(meta) = self.metadata()? else {
            return Err(self.not_found());
        };
        if !meta.latest.is_unknown() {
            return Ok(meta.latest);
        }
        if let Some(max) = meta.versions.iter().max() {
            return Ok(max.clone());
        }
        if !meta.release.is_unknown() {
            return Ok(meta.release);
        }
        Err(self.not_found())
    }

    /// Resolve the dependency's version selector to a concrete version.
    ///
    /// Applies property overrides first; then ranges pick their best match
    /// from the listed versions, `LATEST`/`RELEASE` map to the metadata
    /// fields, an absent version means the latest, and anything else is
    /// already concrete.
    pub fn resolve_version(&self) -> miette::Result<Version> {
        let declared = self.resolution.resolve(&self.dependency);
        match &declared {
            Version::Unknown => self.latest_version(),
            Version::Generic(s) if s.starts_with('[') || s.starts_with('(') => {
                let range =
                    VersionRange::parse(s).ok_or_else(|| JavelinError::MalformedVersion {
                        version: s.clone(),
                    })?;
                let versions = self.list_versions()?;
                range.best_match(versions.iter()).ok_or_else(|| {
                    miette::Report::from(JavelinError::ArtifactNotFound {
                        coordinate: format!("{} (range {s})", self.coordinate()),
                        repositories: self.tried_repositories(),
                    })
                })
            }
            Version::Generic(s) if s == "LATEST" => {
                match self.metadata()? {
                    Some(meta) if !meta.latest.is_unknown() => Ok(meta.latest),
                    _ => self.latest_version(),
                }
            }
            Version::Generic(s) if s == "RELEASE" => match self.metadata()? {
                Some(meta) if !meta.release.is_unknown() => Ok(meta.release),
                _ => Err(self.not_found()),
            },
            _ => Ok(declared),
        }
    }

    /// Fetch and parse this coordinate's POM, walking repositories in order.
    pub fn get_maven_pom(&self) -> miette::Result<MavenPom> {
        let mut chain = Vec::new();
        self.maven_pom_with_chain(Some(self.dependency.clone()), &mut chain)
    }

    /// POM retrieval with an active parent/import chain for cycle detection.
    pub(crate) fn maven_pom_with_chain(
        &self,
        provenance: Option<Dependency>,
        chain: &mut Vec<String>,
    ) -> miette::Result<MavenPom> {
        let key = format!("{}:{}", self.dependency.group_id, self.dependency.artifact_id);
        if chain.contains(&key) {
            return Err(JavelinError::CyclicParent { coordinate: key }.into());
        }
        chain.push(key);

        let version = self.resolve_version()?;
        let mut found = None;
        for repo in self.repositories {
            let url = repo.pom_url(&self.dependency.group_id, &self.dependency.artifact_id, &version);
            match self.retriever.retrieve_text(&url, repo.credentials.as_ref()) {
                Ok(xml) => {
                    found = Some(xml);
                    break;
                }
                Err(RetrieveError::NotFound) => continue,
                Err(e) => {
                    chain.pop();
                    return Err(retrieve_error(e, &url));
                }
            }
        }

        let Some(xml) = found else {
            chain.pop();
            return Err(self.not_found());
        };

        let ctx = PomContext {
            resolution: self.resolution,
            retriever: self.retriever,
            repositories: self.repositories,
            provenance,
        };
        let result = pom::parse_pom(&xml, &ctx, chain);
        chain.pop();
        result
    }

    /// Download the artifact into `dir`, returning the written path.
    ///
    /// SNAPSHOT versions download under their timestamped build filename
    /// when the version-level metadata provides one.
    pub fn download_into_directory(&self, dir: &Path) -> miette::Result<PathBuf> {
        let version = self.resolve_version()?;
        std::fs::create_dir_all(dir).map_err(JavelinError::Io)?;

        for repo in self.repositories {
            let file_version = self.snapshot_file_version(repo, &version);
            let url = repo.artifact_url(
                &self.dependency.group_id,
                &self.dependency.artifact_id,
                &version,
                &file_version,
                self.dependency.classifier.as_deref(),
                self.dependency.effective_type(),
            );
            match self.retriever.retrieve(&url, repo.credentials.as_ref()) {
                Ok(bytes) => {
                    checksum::verify(self.retriever, repo.credentials.as_ref(), &url, &bytes)?;
                    let filename = Repository::artifact_filename(
                        &self.dependency.artifact_id,
                        &file_version,
                        self.dependency.classifier.as_deref(),
                        self.dependency.effective_type(),
                    );
                    let path = dir.join(filename);
                    std::fs::write(&path, &bytes).map_err(JavelinError::Io)?;
                    tracing::debug!("Downloaded {url} to {}", path.display());
                    return Ok(path);
                }
                Err(RetrieveError::NotFound) => continue,
                Err(e) => return Err(retrieve_error(e, &url)),
            }
        }

        Err(self.not_found())
    }

    /// The filename version for a SNAPSHOT artifact in one repository:
    /// the timestamped build when the version-level metadata names one,
    /// the plain version otherwise.
    fn snapshot_file_version(&self, repo: &Repository, version: &Version) -> Version {
        if !version.is_snapshot()
            || !version
                .qualifier()
                .is_some_and(|q| q.eq_ignore_ascii_case("SNAPSHOT"))
        {
            return version.clone();
        }

        let url = repo.snapshot_metadata_url(
            &self.dependency.group_id,
            &self.dependency.artifact_id,
            version,
        );
        match self.retriever.retrieve_text(&url, repo.credentials.as_ref()) {
            Ok(xml) => match metadata::parse_metadata(&xml) {
                Ok(meta) if !meta.snapshot.is_unknown() => meta.snapshot,
                _ => version.clone(),
            },
            Err(_) => version.clone(),
        }
    }

    /// Fetch metadata from every repository and merge: versions unioned in
    /// first-seen order, `latest`/`release` taking the maximum across
    /// repositories, snapshot fields from the first repository naming them.
    fn metadata(&self) -> miette::Result<Option<MavenMetadata>> {
        if let Some(cached) = self.merged_metadata.get() {
            return Ok(cached.clone());
        }

        let mut merged: Option<MavenMetadata> = None;
        for repo in self.repositories {
            let url = repo.metadata_url(&self.dependency.group_id, &self.dependency.artifact_id);
            let xml = match self
                .retriever
                .retrieve_metadata(&url, repo.credentials.as_ref())
            {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(RetrieveError::NotFound) => continue,
                Err(e) => return Err(retrieve_error(e, &url)),
            };
            let meta = metadata::parse_metadata(&xml)?;

            match merged {
                None => merged = Some(meta),
                Some(ref mut acc) => {
                    for version in meta.versions {
                        if !acc.versions.contains(&version) {
                            acc.versions.push(version);
                        }
                    }
                    if meta.latest > acc.latest {
                        acc.latest = meta.latest;
                    }
                    if meta.release > acc.release {
                        acc.release = meta.release;
                    }
                    if acc.snapshot.is_unknown() {
                        acc.snapshot = meta.snapshot;
                        acc.snapshot_timestamp = meta.snapshot_timestamp;
                        acc.snapshot_build_number = meta.snapshot_build_number;
                    }
                }
            }
        }

        let _ = self.merged_metadata.set(merged.clone());
        Ok(merged)
    }

    fn coordinate(&self) -> String {
        format!(
            "{}:{}",
            self.dependency.group_id, self.dependency.artifact_id
        )
    }

    fn tried_repositories(&self) -> String {
        self.repositories
            .iter()
            .map(|r| format!("{} ({})", r.name, r.url))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn not_found(&self) -> miette::Report {
        JavelinError::ArtifactNotFound {
            coordinate: self.dependency.to_string(),
            repositories: self.tried_repositories(),
        }
        .into()
    }
}

fn retrieve_error(error: RetrieveError, url: &str) -> miette::Report {
    match error {
        RetrieveError::Unauthorized => JavelinError::ArtifactUnauthorized {
            url: url.to_string(),
        }
        .into(),
        RetrieveError::Network(message) => JavelinError::Network { message }.into(),
        RetrieveError::NotFound => JavelinError::ArtifactNotFound {
            coordinate: url.to_string(),
            repositories: String::new(),
        }
        .into(),
    }
}
