//! Dependency coordinates, scopes, exclusions, and scoped dependency sets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// Artifact type used when a dependency declares none.
pub const TYPE_JAR: &str = "jar";

/// Maven-compatible dependency scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Compile,
    Runtime,
    Provided,
    Test,
    System,
    Import,
}

impl Default for Scope {
    fn default() -> Self {
        Self::Compile
    }
}

impl Scope {
    /// Parse a POM scope string.
    pub fn parse(s: &str) -> Option<Scope> {
        match s.trim() {
            "compile" => Some(Scope::Compile),
            "runtime" => Some(Scope::Runtime),
            "provided" => Some(Scope::Provided),
            "test" => Some(Scope::Test),
            "system" => Some(Scope::System),
            "import" => Some(Scope::Import),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Compile => "compile",
            Scope::Runtime => "runtime",
            Scope::Provided => "provided",
            Scope::Test => "test",
            Scope::System => "system",
            Scope::Import => "import",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transitive dependency to exclude. `*` matches any group or artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyExclusion {
    pub group_id: String,
    pub artifact_id: String,
}

impl DependencyExclusion {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    /// Whether this exclusion pattern matches the given coordinate.
    /// `*` matches any run of characters, so `org.*` covers `org.foo`.
    pub fn matches(&self, group_id: &str, artifact_id: &str) -> bool {
        glob_match(&self.group_id, group_id) && glob_match(&self.artifact_id, artifact_id)
    }
}

/// Match `pattern` against `text` where `*` matches any (possibly empty)
/// run of characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }
    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    let last = parts[parts.len() - 1];

    if text.len() < first.len() + last.len()
        || !text.starts_with(first)
        || !text.ends_with(last)
    {
        return false;
    }

    let mut remaining = &text[first.len()..text.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(at) => remaining = &remaining[at + part.len()..],
            None => return false,
        }
    }
    true
}

/// An insertion-ordered set of exclusion patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSet {
    patterns: Vec<DependencyExclusion>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, exclusion: DependencyExclusion) {
        if !self.patterns.contains(&exclusion) {
            self.patterns.push(exclusion);
        }
    }

    /// Merge another set's patterns after this set's own.
    pub fn merge(&mut self, other: &ExclusionSet) {
        for pattern in &other.patterns {
            self.add(pattern.clone());
        }
    }

    /// Whether any pattern matches the given coordinate.
    pub fn excludes(&self, group_id: &str, artifact_id: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches(group_id, artifact_id))
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DependencyExclusion> {
        self.patterns.iter()
    }
}

impl FromIterator<DependencyExclusion> for ExclusionSet {
    fn from_iter<T: IntoIterator<Item = DependencyExclusion>>(iter: T) -> Self {
        let mut set = ExclusionSet::new();
        for exclusion in iter {
            set.add(exclusion);
        }
        set
    }
}

/// A dependency coordinate: group, artifact, version, optional classifier
/// and type (absent type means `jar`), plus declared exclusions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub group_id: String,
    pub artifact_id: String,
    pub version: Version,
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default, rename = "type")]
    pub type_: Option<String>,
    #[serde(default)]
    pub exclusions: ExclusionSet,
}

impl Dependency {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: Version,
    ) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
            version,
            classifier: None,
            type_: None,
            exclusions: ExclusionSet::new(),
        }
    }

    /// Parse the shorthand `group:artifact[:version[:classifier]][@type]`.
    pub fn parse(spec: &str) -> Option<Dependency> {
        let (coordinate, type_) = match spec.rsplit_once('@') {
            Some((head, t)) if !t.is_empty() => (head, Some(t.to_string())),
            _ => (spec, None),
        };
        let mut parts = coordinate.split(':');
        let group_id = parts.next()?.to_string();
        let artifact_id = parts.next().filter(|s| !s.is_empty())?.to_string();
        let version = parts.next().map(Version::parse).unwrap_or(Version::Unknown);
        let classifier = parts.next().map(str::to_string);
        if parts.next().is_some() || group_id.is_empty() {
            return None;
        }
        Some(Dependency {
            group_id,
            artifact_id,
            version,
            classifier,
            type_,
            exclusions: ExclusionSet::new(),
        })
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }

    /// Replace the version, keeping everything else.
    pub fn with_version(&self, version: Version) -> Self {
        Dependency {
            version,
            ..self.clone()
        }
    }

    /// The effective artifact type (`jar` when absent).
    pub fn effective_type(&self) -> &str {
        self.type_.as_deref().unwrap_or(TYPE_JAR)
    }

    /// Identity used for management lookups and conflict resolution:
    /// ignores the version.
    pub fn management_key(&self) -> (&str, &str, &str, &str) {
        (
            &self.group_id,
            &self.artifact_id,
            self.effective_type(),
            self.classifier.as_deref().unwrap_or(""),
        )
    }

    /// Whether this coordinate names the same artifact, version aside.
    pub fn same_artifact(&self, other: &Dependency) -> bool {
        self.management_key() == other.management_key()
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.same_artifact(other) && self.version == other.version
    }
}

impl Eq for Dependency {}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)?;
        if !self.version.is_unknown() {
            write!(f, ":{}", self.version)?;
        }
        if let Some(ref c) = self.classifier {
            write!(f, ":{c}")?;
        }
        if let Some(ref t) = self.type_ {
            write!(f, "@{t}")?;
        }
        Ok(())
    }
}

/// Scoped dependency declarations, preserving insertion order per scope.
///
/// Including a dependency whose `(group, artifact, classifier, type)` is
/// already present in the scope replaces the earlier entry's version rather
/// than adding a duplicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyScopes {
    entries: Vec<(Scope, Vec<Dependency>)>,
}

impl DependencyScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency to a scope.
    pub fn include(&mut self, scope: Scope, dependency: Dependency) {
        let bucket = match self.entries.iter_mut().find(|(s, _)| *s == scope) {
            Some((_, bucket)) => bucket,
            None => {
                self.entries.push((scope, Vec::new()));
                &mut self.entries.last_mut().expect("just pushed").1
            }
        };
        match bucket.iter_mut().find(|d| d.same_artifact(&dependency)) {
            Some(existing) => *existing = dependency,
            None => bucket.push(dependency),
        }
    }

    /// Merge every scope of another set into this one.
    pub fn include_all(&mut self, other: &DependencyScopes) {
        for (scope, deps) in &other.entries {
            for dep in deps {
                self.include(*scope, dep.clone());
            }
        }
    }

    /// The dependencies declared in a scope, in declaration order.
    pub fn get(&self, scope: Scope) -> &[Dependency] {
        self.entries
            .iter()
            .find(|(s, _)| *s == scope)
            .map(|(_, deps)| deps.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate scopes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Scope, &[Dependency])> {
        self.entries.iter().map(|(s, deps)| (*s, deps.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.iter().all(|(_, deps)| deps.is_empty())
    }

    /// Total number of dependencies across all scopes.
    pub fn len(&self) -> usize {
        self.entries.iter().map(|(_, deps)| deps.len()).sum()
    }
}
