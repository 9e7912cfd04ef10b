//! Operation: report available updates for declared dependencies.

use javelin_core::dependency::DependencyScopes;
use javelin_core::properties::HierarchicalProperties;
use javelin_maven::repository::Repository;
use javelin_maven::resolver::{DependencyResolver, VersionResolution};
use javelin_maven::retriever::ArtifactRetriever;

/// Checks every declared dependency for a strictly newer version.
///
/// Each `(scope, dependency)` pair is checked against the repositories'
/// latest version, ignoring the currently declared one; no transitive
/// analysis is performed.
pub struct UpdatesOperation<'a> {
    properties: HierarchicalProperties,
    retriever: &'a dyn ArtifactRetriever,
    repositories: Vec<Repository>,
    dependencies: DependencyScopes,
    updates: DependencyScopes,
    silent: bool,
}

impl<'a> UpdatesOperation<'a> {
    pub fn new(retriever: &'a dyn ArtifactRetriever) -> Self {
        Self {
            properties: HierarchicalProperties::new(),
            retriever,
            repositories: Vec::new(),
            dependencies: DependencyScopes::new(),
            updates: DependencyScopes::new(),
            silent: false,
        }
    }

    /// Provides the hierarchical properties to use.
    pub fn properties(mut self, properties: HierarchicalProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Provides repositories to resolve the dependencies against.
    pub fn repositories(mut self, repositories: impl IntoIterator<Item = Repository>) -> Self {
        self.repositories.extend(repositories);
        self
    }

    /// Provides scoped dependencies that will be checked for updates.
    pub fn dependencies(mut self, dependencies: &DependencyScopes) -> Self {
        self.dependencies.include_all(dependencies);
        self
    }

    /// Suppress the human-readable report.
    pub fn silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    /// Performs the updates operation.
    pub fn execute(&mut self) -> miette::Result<&DependencyScopes> {
        let resolution = VersionResolution::from_properties(&self.properties);
        let mut result = DependencyScopes::new();

        let sp = (!self.silent)
            .then(|| javelin_util::progress::spinner("Checking for dependency updates..."));

        for (scope, deps) in self.dependencies.iter() {
            for dependency in deps {
                let resolver = DependencyResolver::new(
                    &resolution,
                    self.retriever,
                    &self.repositories,
                    dependency.clone(),
                );
                let latest = resolver.latest_version()?;
                if latest > dependency.version {
                    result.include(scope, dependency.with_version(latest));
                }
            }
        }

        if let Some(sp) = sp {
            sp.finish_and_clear();
        }

        if !self.silent {
            if result.is_empty() {
                println!("No dependency updates found.");
            } else {
                println!("The following dependency updates were found.");
                for (scope, deps) in result.iter() {
                    println!("{scope}:");
                    for dependency in deps {
                        println!("    {dependency}");
                    }
                }
            }
        }

        self.updates = result;
        Ok(&self.updates)
    }

    /// The updates found by the last execution.
    pub fn updates(&self) -> &DependencyScopes {
        &self.updates
    }
}
