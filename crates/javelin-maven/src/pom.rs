//! POM parsing: dependency declarations, parent inheritance, property
//! interpolation, BOM imports, effective dependency sets.
//!
//! A POM is parsed in two passes over the buffered document. The first pass
//! collects only `<properties>`, so structural elements can interpolate
//! `${...}` references even when `<properties>` follows `<dependencies>` in
//! document order. The second pass builds the structure and resolves parent
//! POMs and BOM imports synchronously, reentering the resolver.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use javelin_core::dependency::{
    Dependency, DependencyExclusion, DependencyScopes, ExclusionSet, Scope, TYPE_JAR,
};
use javelin_core::version::Version;
use javelin_util::errors::JavelinError;

use crate::repository::Repository;
use crate::resolver::{DependencyResolver, VersionResolution};
use crate::retriever::ArtifactRetriever;

/// A dependency entry as it appears in a POM document: every field optional,
/// uninterpolated, with provenance.
#[derive(Debug, Clone, Default)]
pub struct PomDependency {
    pub group_id: Option<String>,
    pub artifact_id: Option<String>,
    pub version: Option<String>,
    pub classifier: Option<String>,
    pub type_: Option<String>,
    pub scope: Option<String>,
    pub optional: Option<String>,
    pub exclusions: Option<ExclusionSet>,
    /// The dependency whose POM declared this entry.
    pub parent: Option<Dependency>,
}

impl PomDependency {
    /// Identity for management lookups: group, artifact, type (`jar` when
    /// absent), classifier. The version never participates.
    pub fn management_key(&self) -> (&str, &str, &str, &str) {
        (
            self.group_id.as_deref().unwrap_or(""),
            self.artifact_id.as_deref().unwrap_or(""),
            self.type_.as_deref().unwrap_or(TYPE_JAR),
            self.classifier.as_deref().unwrap_or(""),
        )
    }

    /// Whether this management entry imports a BOM.
    pub fn is_pom_import(&self) -> bool {
        self.type_.as_deref() == Some("pom") && self.scope.as_deref() == Some("import")
    }
}

/// A parsed POM: properties, managed dependencies, direct dependencies.
///
/// Parent POMs and BOM imports are already merged by the time a value of
/// this type exists.
#[derive(Debug, Clone, Default)]
pub struct MavenPom {
    pub maven_properties: HashMap<String, String>,
    /// Insertion-ordered, unique per management key.
    pub dependency_management: Vec<PomDependency>,
    /// Insertion-ordered, unique per management key.
    pub dependencies: Vec<PomDependency>,
}

/// Everything the parser needs to resolve parent POMs and BOM imports.
pub(crate) struct PomContext<'a> {
    pub resolution: &'a VersionResolution,
    pub retriever: &'a dyn ArtifactRetriever,
    pub repositories: &'a [Repository],
    /// Provenance recorded on every entry of this POM.
    pub provenance: Option<Dependency>,
}

impl MavenPom {
    /// Resolve `${...}` references in a string against the POM's properties.
    ///
    /// Runs to a fixed point: substituted values may themselves contain
    /// references. Unresolvable references are left in place. The pass count
    /// is bounded by the number of reference tokens reachable from the
    /// input, which breaks self-referential property cycles.
    pub fn interpolate(&self, input: &str) -> String {
        let max_passes = 1
            + input.matches("${").count()
            + self
                .maven_properties
                .values()
                .map(|v| v.matches("${").count())
                .sum::<usize>();

        let mut data = input.to_string();
        for _ in 0..max_passes {
            let (next, replaced) = self.interpolate_pass(&data);
            data = next;
            if !replaced {
                break;
            }
        }
        data
    }

    fn interpolate_pass(&self, data: &str) -> (String, bool) {
        let mut out = String::with_capacity(data.len());
        let mut rest = data;
        let mut replaced = false;

        while let Some(start) = rest.find("${") {
            let Some(end) = rest[start + 2..].find('}') else {
                break;
            };
            let name = &rest[start + 2..start + 2 + end];
            let valid = !name.is_empty() && !name.contains(['<', '>', '{']);
            match self.maven_properties.get(name).filter(|_| valid) {
                Some(value) => {
                    out.push_str(&rest[..start]);
                    out.push_str(value);
                    replaced = true;
                }
                None => {
                    // Leave the token in place and keep scanning after it.
                    out.push_str(&rest[..start + 2 + end + 1]);
                }
            }
            rest = &rest[start + 2 + end + 1..];
        }
        out.push_str(rest);
        (out, replaced)
    }

    fn interpolate_opt(&self, input: &Option<String>) -> Option<String> {
        input.as_deref().map(|s| self.interpolate(s))
    }

    /// Interpolate the coordinate fields of a management entry, keeping
    /// scope and exclusions as declared.
    pub fn resolve_dependency(&self, dependency: &PomDependency) -> PomDependency {
        PomDependency {
            group_id: self.interpolate_opt(&dependency.group_id),
            artifact_id: self.interpolate_opt(&dependency.artifact_id),
            version: self.interpolate_opt(&dependency.version),
            classifier: self.interpolate_opt(&dependency.classifier),
            type_: self.interpolate_opt(&dependency.type_),
            scope: dependency.scope.clone(),
            optional: self.interpolate_opt(&dependency.optional),
            exclusions: dependency.exclusions.clone(),
            parent: dependency.parent.clone(),
        }
    }

    /// Look up the managed version for a coordinate, interpolated.
    pub fn managed_version(&self, group_id: &str, artifact_id: &str) -> Option<Version> {
        self.dependency_management
            .iter()
            .find(|d| {
                self.interpolate_opt(&d.group_id).as_deref() == Some(group_id)
                    && self.interpolate_opt(&d.artifact_id).as_deref() == Some(artifact_id)
            })
            .and_then(|d| self.interpolate_opt(&d.version))
            .map(|v| Version::parse(&v))
    }

    /// The effective dependency set for the requested scopes.
    ///
    /// Direct entries are overlaid with their management entry where a field
    /// is absent (`version`, `scope`, `optional`, `exclusions`), defaulted
    /// to scope `compile`, interpolated, and filtered: optional entries and
    /// non-`jar` types drop out, and only requested scopes remain. Order is
    /// declaration order.
    pub fn dependencies(&self, scopes: &[Scope]) -> miette::Result<DependencyScopes> {
        let mut result = DependencyScopes::new();
        if scopes.is_empty() {
            return Ok(result);
        }

        for dependency in &self.dependencies {
            let managed = self
                .dependency_management
                .iter()
                .find(|m| m.management_key() == dependency.management_key());

            let mut version = dependency.version.clone();
            let mut scope = dependency.scope.clone();
            let mut optional = dependency.optional.clone();
            let mut exclusions = dependency.exclusions.clone();
            if let Some(managed) = managed {
                version = version.or_else(|| managed.version.clone());
                scope = scope.or_else(|| managed.scope.clone());
                optional = optional.or_else(|| managed.optional.clone());
                exclusions = exclusions.or_else(|| managed.exclusions.clone());
            }

            let optional = self.interpolate_opt(&optional);
            if optional.as_deref() == Some("true") {
                continue;
            }

            let group_id = self.required_field(&dependency.group_id, "groupId")?;
            let artifact_id = self.required_field(&dependency.artifact_id, "artifactId")?;
            let version = match self.interpolate_opt(&version) {
                Some(v) if v.contains("${") => {
                    return Err(JavelinError::UnresolvedProperty {
                        field: format!("{group_id}:{artifact_id} version"),
                        value: v,
                    }
                    .into());
                }
                Some(v) => Version::parse(&v),
                None => Version::Unknown,
            };
            let classifier = self.interpolate_opt(&dependency.classifier);
            let type_ = self.interpolate_opt(&dependency.type_);

            if let Some(ref t) = type_ {
                if t != TYPE_JAR {
                    continue;
                }
            }

            let scope_name = self
                .interpolate_opt(&scope)
                .unwrap_or_else(|| "compile".to_string());
            let scope = Scope::parse(&scope_name).ok_or_else(|| JavelinError::MalformedPom {
                message: format!("unknown scope '{scope_name}' on {group_id}:{artifact_id}"),
            })?;
            if !scopes.contains(&scope) {
                continue;
            }

            let mut resolved = Dependency::new(group_id, artifact_id, version);
            resolved.classifier = classifier;
            resolved.type_ = type_;
            resolved.exclusions = exclusions.unwrap_or_default();
            result.include(scope, resolved);
        }

        Ok(result)
    }

    fn required_field(&self, value: &Option<String>, name: &str) -> miette::Result<String> {
        let resolved = self.interpolate_opt(value).ok_or_else(|| {
            JavelinError::MalformedPom {
                message: format!("dependency is missing <{name}>"),
            }
        })?;
        if resolved.contains("${") {
            return Err(JavelinError::UnresolvedProperty {
                field: name.to_string(),
                value: resolved,
            }
            .into());
        }
        Ok(resolved)
    }

    fn insert_managed(&mut self, dependency: PomDependency) {
        let key: (String, String, String, String) = owned_key(dependency.management_key());
        match self
            .dependency_management
            .iter_mut()
            .find(|d| owned_key(d.management_key()) == key)
        {
            // A later entry in the same document replaces the earlier one
            // in place; merged parent/BOM entries never reach here.
            Some(existing) => *existing = dependency,
            None => self.dependency_management.push(dependency),
        }
    }

    fn add_managed_if_absent(&mut self, dependency: PomDependency) {
        let absent = !self
            .dependency_management
            .iter()
            .any(|d| d.management_key() == dependency.management_key());
        if absent {
            self.dependency_management.push(dependency);
        }
    }

    fn add_dependency_if_absent(&mut self, dependency: PomDependency) {
        let absent = !self
            .dependencies
            .iter()
            .any(|d| d.management_key() == dependency.management_key());
        if absent {
            self.dependencies.push(dependency);
        }
    }
}

fn owned_key(key: (&str, &str, &str, &str)) -> (String, String, String, String) {
    (
        key.0.to_string(),
        key.1.to_string(),
        key.2.to_string(),
        key.3.to_string(),
    )
}

/// Parse a POM document, resolving parent POMs and BOM imports through the
/// context's resolver. `chain` carries the coordinates currently being
/// parsed for cycle detection.
pub(crate) fn parse_pom(
    xml: &str,
    ctx: &PomContext<'_>,
    chain: &mut Vec<String>,
) -> miette::Result<MavenPom> {
    let mut pom = MavenPom {
        maven_properties: parse_properties(xml)?,
        ..MavenPom::default()
    };
    // The parent element precedes the child's own dependencies in document
    // order, but inherited dependencies append after the child's and the
    // child wins duplicates, so the merge waits until the pass is done.
    let mut inherited = Vec::new();
    parse_structure(xml, ctx, chain, &mut pom, &mut inherited)?;
    for dependency in inherited {
        pom.add_dependency_if_absent(dependency);
    }
    Ok(pom)
}

/// Phase 1: collect `<project><properties>` only.
fn parse_properties(xml: &str) -> miette::Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut properties = HashMap::new();
    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                text_buf.clear();
            }
            Ok(Event::Text(ref e)) => {
                text_buf.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::End(_)) => {
                if path.len() == 3 && path[0] == "project" && path[1] == "properties" {
                    properties.insert(path[2].clone(), text_buf.trim().to_string());
                }
                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(JavelinError::MalformedPom {
                    message: format!("Failed to parse POM XML: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(properties)
}

/// Phase 2: structure, parent resolution, BOM imports.
fn parse_structure(
    xml: &str,
    ctx: &PomContext<'_>,
    chain: &mut Vec<String>,
    pom: &mut MavenPom,
    inherited: &mut Vec<PomDependency>,
) -> miette::Result<()> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut text_buf = String::new();

    let mut current_dep: Option<PomDependency> = None;
    let mut current_exclusions: Option<ExclusionSet> = None;
    let mut current_exclusion: Option<(Option<String>, Option<String>)> = None;
    let mut parent_coordinate: Option<(Option<String>, Option<String>, Option<String>)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                text_buf.clear();

                match context_of(&path) {
                    PomElement::Parent => {
                        parent_coordinate = Some((None, None, None));
                    }
                    PomElement::Dependency { .. } => {
                        current_dep = Some(PomDependency {
                            parent: ctx.provenance.clone(),
                            ..PomDependency::default()
                        });
                        current_exclusions = None;
                    }
                    PomElement::Exclusions => {
                        // Present-but-empty exclusions still shadow any
                        // managed exclusions.
                        current_exclusions = Some(ExclusionSet::new());
                    }
                    PomElement::Exclusion => {
                        current_exclusion = Some((None, None));
                        current_exclusions.get_or_insert_with(ExclusionSet::new);
                    }
                    PomElement::Other => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                text_buf.push_str(&e.unescape().unwrap_or_default());
            }
            Ok(Event::End(_)) => {
                let text = non_blank(&text_buf);

                match context_of(&path) {
                    PomElement::Parent => {
                        let coordinate = parent_coordinate.take().unwrap_or_default();
                        resolve_parent(pom, ctx, chain, coordinate, inherited)?;
                    }
                    PomElement::Dependency { management } => {
                        let mut dep = current_dep.take().unwrap_or_default();
                        dep.exclusions = current_exclusions.take();
                        if management {
                            if dep.is_pom_import() {
                                import_bom(pom, ctx, chain, &dep)?;
                            } else {
                                pom.insert_managed(dep);
                            }
                        } else {
                            pom.add_dependency_if_absent(dep);
                        }
                    }
                    PomElement::Exclusions => {}
                    PomElement::Exclusion => {
                        if let (Some((group, artifact)), Some(set)) =
                            (current_exclusion.take(), current_exclusions.as_mut())
                        {
                            set.add(DependencyExclusion::new(
                                group.unwrap_or_else(|| "*".to_string()),
                                artifact.unwrap_or_else(|| "*".to_string()),
                            ));
                        }
                    }
                    PomElement::Other => {
                        record_field(
                            pom,
                            &path,
                            text,
                            &mut current_dep,
                            &mut current_exclusion,
                            &mut parent_coordinate,
                        );
                    }
                }

                path.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(JavelinError::MalformedPom {
                    message: format!("Failed to parse POM XML: {e}"),
                }
                .into());
            }
            _ => {}
        }
    }

    Ok(())
}

/// Structural contexts the closing-tag handler cares about.
enum PomElement {
    Parent,
    Dependency { management: bool },
    Exclusions,
    Exclusion,
    Other,
}

fn context_of(path: &[String]) -> PomElement {
    let joined: Vec<&str> = path.iter().map(String::as_str).collect();
    match joined.as_slice() {
        ["project", "parent"] => PomElement::Parent,
        ["project", "dependencies", "dependency"] => {
            PomElement::Dependency { management: false }
        }
        ["project", "dependencyManagement", "dependencies", "dependency"] => {
            PomElement::Dependency { management: true }
        }
        [.., "dependency", "exclusions"] => PomElement::Exclusions,
        [.., "dependency", "exclusions", "exclusion"] => PomElement::Exclusion,
        _ => PomElement::Other,
    }
}

/// Record a leaf element's text on whatever structure it belongs to.
fn record_field(
    pom: &mut MavenPom,
    path: &[String],
    text: Option<String>,
    current_dep: &mut Option<PomDependency>,
    current_exclusion: &mut Option<(Option<String>, Option<String>)>,
    parent_coordinate: &mut Option<(Option<String>, Option<String>, Option<String>)>,
) {
    let joined: Vec<&str> = path.iter().map(String::as_str).collect();
    match joined.as_slice() {
        // Project coordinates and descriptive fields become properties.
        ["project", name @ ("groupId" | "artifactId" | "version" | "packaging" | "name"
        | "description" | "url" | "inceptionYear")] => {
            if let Some(text) = text {
                pom.maven_properties.insert(format!("project.{name}"), text);
            }
        }
        ["project", "parent", name @ ("groupId" | "artifactId" | "version")] => {
            if let Some((ref mut group, ref mut artifact, ref mut version)) = parent_coordinate {
                let slot = match *name {
                    "groupId" => group,
                    "artifactId" => artifact,
                    _ => version,
                };
                *slot = text.clone();
            }
            if let Some(text) = text {
                pom.maven_properties
                    .insert(format!("project.parent.{name}"), text);
            }
        }
        [.., "exclusion", name @ ("groupId" | "artifactId")] => {
            if let Some((ref mut group, ref mut artifact)) = current_exclusion {
                match *name {
                    "groupId" => *group = text,
                    _ => *artifact = text,
                }
            }
        }
        [.., "dependency", name] => {
            if let Some(ref mut dep) = current_dep {
                match *name {
                    "groupId" => dep.group_id = text,
                    "artifactId" => dep.artifact_id = text,
                    "version" => dep.version = text,
                    "classifier" => dep.classifier = text,
                    "type" => dep.type_ = text,
                    "scope" => dep.scope = text,
                    "optional" => dep.optional = text,
                    _ => {}
                }
            }
        }
        _ => {}
    }
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Resolve the parent POM and merge it under this one: properties and
/// dependency management child-wins immediately, direct dependencies
/// deferred so they append after the child's own declarations.
fn resolve_parent(
    pom: &mut MavenPom,
    ctx: &PomContext<'_>,
    chain: &mut Vec<String>,
    coordinate: (Option<String>, Option<String>, Option<String>),
    inherited: &mut Vec<PomDependency>,
) -> miette::Result<()> {
    let parent_dep = coordinate_dependency(pom, &coordinate)?;
    let parent_pom =
        DependencyResolver::new(ctx.resolution, ctx.retriever, ctx.repositories, parent_dep)
            .maven_pom_with_chain(ctx.provenance.clone(), chain)?;

    for (key, value) in parent_pom.maven_properties {
        pom.maven_properties.entry(key).or_insert(value);
    }
    for managed in parent_pom.dependency_management {
        pom.add_managed_if_absent(managed);
    }
    inherited.extend(parent_pom.dependencies);
    Ok(())
}

/// Resolve a BOM and merge its managed entries, property-resolved, where
/// this POM does not already manage the key.
fn import_bom(
    pom: &mut MavenPom,
    ctx: &PomContext<'_>,
    chain: &mut Vec<String>,
    entry: &PomDependency,
) -> miette::Result<()> {
    let coordinate = (
        entry.group_id.clone(),
        entry.artifact_id.clone(),
        entry.version.clone(),
    );
    let bom_dep = coordinate_dependency(pom, &coordinate)?;
    let bom_pom =
        DependencyResolver::new(ctx.resolution, ctx.retriever, ctx.repositories, bom_dep)
            .maven_pom_with_chain(ctx.provenance.clone(), chain)?;

    for managed in &bom_pom.dependency_management {
        pom.add_managed_if_absent(bom_pom.resolve_dependency(managed));
    }
    Ok(())
}

/// Build a resolvable coordinate from raw POM fields, interpolating
/// properties collected so far.
fn coordinate_dependency(
    pom: &MavenPom,
    (group, artifact, version): &(Option<String>, Option<String>, Option<String>),
) -> miette::Result<Dependency> {
    let group = pom.required_field(group, "groupId")?;
    let artifact = pom.required_field(artifact, "artifactId")?;
    let version = pom.required_field(version, "version")?;
    Ok(Dependency::new(group, artifact, Version::parse(&version)))
}
