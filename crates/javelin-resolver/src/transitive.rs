//! Breadth-first transitive closure with Maven's nearest-wins strategy.
//!
//! Direct dependencies seed the queue at depth 0; each dequeued coordinate
//! is recorded once per `(group, artifact, classifier)` with the shallowest
//! occurrence winning and first-declared order breaking depth ties. POM
//! expansion applies inherited exclusions and the root project's dependency
//! management before enqueueing children one level deeper.

use std::collections::HashMap;

use javelin_core::dependency::{Dependency, DependencyScopes, ExclusionSet, Scope};
use javelin_core::version::Version;
use javelin_maven::pom::MavenPom;
use javelin_maven::repository::Repository;
use javelin_maven::resolver::{DependencyResolver, VersionResolution};
use javelin_maven::retriever::ArtifactRetriever;

use crate::conflict::{ConflictReport, VersionConflict};

/// Child scopes that traverse at all; `provided`, `test` and `import`
/// edges are never followed.
const TRAVERSAL_SCOPES: [Scope; 3] = [Scope::Compile, Scope::Runtime, Scope::System];

/// The outcome of a transitive resolution run.
#[derive(Debug)]
pub struct ResolutionResult {
    /// The closure, bucketed by effective scope in first-declared order.
    pub dependencies: DependencyScopes,
    /// Version displacements from nearest-wins decisions.
    pub conflicts: ConflictReport,
}

/// Walks the dependency graph of a set of declared dependencies.
pub struct TransitiveResolver<'a> {
    resolution: &'a VersionResolution,
    retriever: &'a dyn ArtifactRetriever,
    repositories: &'a [Repository],
    /// The root project's managed versions, which override any version
    /// discovered transitively.
    dependency_management: Vec<Dependency>,
}

struct QueueEntry {
    scope: Scope,
    dependency: Dependency,
    depth: usize,
    /// Exclusions accumulated along the path into this dependency,
    /// including the introducing edge's own declarations.
    exclusions: ExclusionSet,
}

impl<'a> TransitiveResolver<'a> {
    pub fn new(
        resolution: &'a VersionResolution,
        retriever: &'a dyn ArtifactRetriever,
        repositories: &'a [Repository],
    ) -> Self {
        Self {
            resolution,
            retriever,
            repositories,
            dependency_management: Vec::new(),
        }
    }

    /// Pin versions from the root project's dependency management.
    pub fn with_dependency_management(mut self, managed: Vec<Dependency>) -> Self {
        self.dependency_management = managed;
        self
    }

    /// Compute the scoped transitive closure of `direct`.
    ///
    /// Only direct dependencies declared in one of `active_scopes` seed the
    /// walk; transitive edges then compose scopes per the traversal rules
    /// (a `runtime` child of a `compile` parent lands in `runtime`, every
    /// child of a `test` parent stays in `test`, and so on).
    pub fn resolve(
        &self,
        direct: &DependencyScopes,
        active_scopes: &[Scope],
    ) -> miette::Result<ResolutionResult> {
        let mut result = DependencyScopes::new();
        let mut conflicts = ConflictReport::new();
        // (group, artifact, classifier) -> (depth, resolved version)
        let mut resolved: HashMap<(String, String, String), (usize, Version)> = HashMap::new();
        let mut pom_cache: HashMap<String, MavenPom> = HashMap::new();

        let mut queue: std::collections::VecDeque<QueueEntry> = direct
            .iter()
            .filter(|(scope, _)| active_scopes.contains(scope))
            .flat_map(|(scope, deps)| {
                deps.iter().map(move |dep| QueueEntry {
                    scope,
                    dependency: dep.clone(),
                    depth: 0,
                    exclusions: dep.exclusions.clone(),
                })
            })
            .collect();

        while let Some(entry) = queue.pop_front() {
            let key = closure_key(&entry.dependency);

            if let Some((existing_depth, existing_version)) = resolved.get(&key) {
                if *existing_depth <= entry.depth {
                    let requested = self.resolution.resolve(&entry.dependency);
                    if !requested.is_unknown() && requested != *existing_version {
                        conflicts.add(VersionConflict {
                            group: entry.dependency.group_id.clone(),
                            artifact: entry.dependency.artifact_id.clone(),
                            requested: requested.to_string(),
                            resolved: existing_version.to_string(),
                            reason: format!(
                                "nearest wins (depth {existing_depth} vs {})",
                                entry.depth
                            ),
                        });
                    }
                    continue;
                }
            }

            let version = DependencyResolver::new(
                self.resolution,
                self.retriever,
                self.repositories,
                entry.dependency.clone(),
            )
            .resolve_version()?;
            resolved.insert(key, (entry.depth, version.clone()));
            let recorded = entry.dependency.with_version(version.clone());
            result.include(entry.scope, recorded.clone());

            let pom = self.pom_for(&recorded, &mut pom_cache)?;
            let children = pom.dependencies(&TRAVERSAL_SCOPES)?;
            for (declared_scope, deps) in children.iter() {
                let Some(effective) = compose_scope(entry.scope, declared_scope) else {
                    continue;
                };
                for child in deps {
                    if entry
                        .exclusions
                        .excludes(&child.group_id, &child.artifact_id)
                    {
                        continue;
                    }
                    let child = self.apply_management(child);
                    let mut exclusions = entry.exclusions.clone();
                    exclusions.merge(&child.exclusions);
                    queue.push_back(QueueEntry {
                        scope: effective,
                        dependency: child,
                        depth: entry.depth + 1,
                        exclusions,
                    });
                }
            }
        }

        Ok(ResolutionResult {
            dependencies: result,
            conflicts,
        })
    }

    /// Fetch a coordinate's POM through the per-run cache.
    fn pom_for(
        &self,
        dependency: &Dependency,
        cache: &mut HashMap<String, MavenPom>,
    ) -> miette::Result<MavenPom> {
        let key = dependency.to_string();
        if let Some(pom) = cache.get(&key) {
            return Ok(pom.clone());
        }
        let pom = DependencyResolver::new(
            self.resolution,
            self.retriever,
            self.repositories,
            dependency.clone(),
        )
        .get_maven_pom()?;
        cache.insert(key, pom.clone());
        Ok(pom)
    }

    /// Root dependency management overrides a transitively discovered
    /// version; it also supplies one where the POM declared none.
    fn apply_management(&self, child: &Dependency) -> Dependency {
        match self
            .dependency_management
            .iter()
            .find(|m| m.same_artifact(child))
        {
            Some(managed) if !managed.version.is_unknown() => {
                child.with_version(managed.version.clone())
            }
            _ => child.clone(),
        }
    }
}

/// Scope composition for traversal: parent scope × child declared scope.
///
/// A `compile` child keeps the parent's scope; a `runtime` child turns a
/// `compile` parent edge into `runtime` and otherwise keeps the parent's
/// scope; `system` stays `system`. `provided`, `test` and `import`
/// children never traverse.
fn compose_scope(parent: Scope, declared: Scope) -> Option<Scope> {
    match declared {
        Scope::Compile => Some(parent),
        Scope::Runtime => Some(match parent {
            Scope::Compile => Scope::Runtime,
            other => other,
        }),
        Scope::System => Some(Scope::System),
        Scope::Provided | Scope::Test | Scope::Import => None,
    }
}

fn closure_key(dependency: &Dependency) -> (String, String, String) {
    (
        dependency.group_id.clone(),
        dependency.artifact_id.clone(),
        dependency.classifier.clone().unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_composition_table() {
        use Scope::*;
        // child compile keeps the parent scope
        for parent in [Compile, Runtime, Provided, Test] {
            assert_eq!(compose_scope(parent, Compile), Some(parent));
        }
        // child runtime
        assert_eq!(compose_scope(Compile, Runtime), Some(Runtime));
        assert_eq!(compose_scope(Runtime, Runtime), Some(Runtime));
        assert_eq!(compose_scope(Provided, Runtime), Some(Provided));
        assert_eq!(compose_scope(Test, Runtime), Some(Test));
        // child system always stays system
        for parent in [Compile, Runtime, Provided, Test] {
            assert_eq!(compose_scope(parent, System), Some(System));
        }
        // provided and test children never traverse
        for parent in [Compile, Runtime, Provided, Test] {
            assert_eq!(compose_scope(parent, Provided), None);
            assert_eq!(compose_scope(parent, Test), None);
        }
        assert_eq!(compose_scope(Compile, Import), None);
    }
}
