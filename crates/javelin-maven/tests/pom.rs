//! POM parsing through the resolver: inheritance, interpolation, BOM
//! imports, effective dependency sets.

use std::collections::HashMap;

use javelin_core::dependency::{Dependency, Scope};
use javelin_core::version::Version;
use javelin_maven::repository::Repository;
use javelin_maven::resolver::{DependencyResolver, VersionResolution};
use javelin_maven::retriever::{ArtifactRetriever, RetrieveError};

/// Serves canned documents by URL.
struct StubRetriever {
    files: HashMap<String, String>,
}

impl StubRetriever {
    fn new() -> Self {
        Self {
            files: HashMap::new(),
        }
    }

    fn serve_pom(&mut self, repo: &Repository, coordinate: &str, xml: &str) {
        let dep = Dependency::parse(coordinate).unwrap();
        let url = repo.pom_url(&dep.group_id, &dep.artifact_id, &dep.version);
        self.files.insert(url, xml.to_string());
    }
}

impl ArtifactRetriever for StubRetriever {
    fn retrieve(
        &self,
        url: &str,
        _credentials: Option<&javelin_maven::repository::Credentials>,
    ) -> Result<Vec<u8>, RetrieveError> {
        self.files
            .get(url)
            .map(|s| s.as_bytes().to_vec())
            .ok_or(RetrieveError::NotFound)
    }
}

fn test_repo() -> Repository {
    Repository::new("test", "https://repo.test/maven")
}

fn resolve_pom(
    retriever: &StubRetriever,
    repositories: &[Repository],
    coordinate: &str,
) -> miette::Result<javelin_maven::pom::MavenPom> {
    let resolution = VersionResolution::new();
    let dep = Dependency::parse(coordinate).unwrap();
    DependencyResolver::new(&resolution, retriever, repositories, dep).get_maven_pom()
}

#[test]
fn property_interpolation_chain() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:app:1.0",
        r#"<?xml version="1.0"?>
<project>
    <groupId>org.example</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
    <properties>
        <jdbc.version>4.2</jdbc.version>
        <db.version>${jdbc.version}</db.version>
    </properties>
    <dependencies>
        <dependency>
            <groupId>com.db</groupId>
            <artifactId>driver</artifactId>
            <version>${db.version}</version>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:app:1.0").unwrap();
    let deps = pom.dependencies(&[Scope::Compile]).unwrap();
    let compile = deps.get(Scope::Compile);
    assert_eq!(compile.len(), 1);
    assert_eq!(compile[0].version, Version::parse("4.2"));
}

#[test]
fn project_coordinates_available_as_properties() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:lib:3.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>lib</artifactId>
    <version>3.0</version>
    <dependencies>
        <dependency>
            <groupId>${project.groupId}</groupId>
            <artifactId>sibling</artifactId>
            <version>${project.version}</version>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:lib:3.0").unwrap();
    let deps = pom.dependencies(&[Scope::Compile]).unwrap();
    let compile = deps.get(Scope::Compile);
    assert_eq!(compile[0].group_id, "org.example");
    assert_eq!(compile[0].version, Version::parse("3.0"));
}

#[test]
fn parent_pom_merged_under_child() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:parent-pom:2.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>parent-pom</artifactId>
    <version>2.0</version>
    <properties>
        <shared.version>1.5</shared.version>
        <override.me>parent</override.me>
    </properties>
    <dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>com.managed</groupId>
                <artifactId>from-parent</artifactId>
                <version>7.0</version>
            </dependency>
        </dependencies>
    </dependencyManagement>
    <dependencies>
        <dependency>
            <groupId>com.base</groupId>
            <artifactId>common</artifactId>
            <version>${shared.version}</version>
        </dependency>
    </dependencies>
</project>"#,
    );
    retriever.serve_pom(
        &repo,
        "org.example:child:1.0",
        r#"<project>
    <parent>
        <groupId>org.example</groupId>
        <artifactId>parent-pom</artifactId>
        <version>2.0</version>
    </parent>
    <artifactId>child</artifactId>
    <properties>
        <override.me>child</override.me>
    </properties>
    <dependencies>
        <dependency>
            <groupId>com.managed</groupId>
            <artifactId>from-parent</artifactId>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:child:1.0").unwrap();

    // Child property wins, parent-only property visible.
    assert_eq!(pom.maven_properties.get("override.me").unwrap(), "child");
    assert_eq!(pom.maven_properties.get("shared.version").unwrap(), "1.5");

    let deps = pom.dependencies(&[Scope::Compile]).unwrap();
    let compile = deps.get(Scope::Compile);
    // Child's dependency first, parent's appended after.
    assert_eq!(compile.len(), 2);
    assert_eq!(compile[0].artifact_id, "from-parent");
    assert_eq!(compile[0].version, Version::parse("7.0"));
    assert_eq!(compile[1].artifact_id, "common");
    assert_eq!(compile[1].version, Version::parse("1.5"));
}

#[test]
fn bom_import_supplies_versions() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:platform-bom:1.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>platform-bom</artifactId>
    <version>1.0</version>
    <packaging>pom</packaging>
    <properties>
        <x.version>3.3</x.version>
    </properties>
    <dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>org.example</groupId>
                <artifactId>x</artifactId>
                <version>${x.version}</version>
            </dependency>
        </dependencies>
    </dependencyManagement>
</project>"#,
    );
    retriever.serve_pom(
        &repo,
        "org.example:app:1.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
    <dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>org.example</groupId>
                <artifactId>platform-bom</artifactId>
                <version>1.0</version>
                <type>pom</type>
                <scope>import</scope>
            </dependency>
        </dependencies>
    </dependencyManagement>
    <dependencies>
        <dependency>
            <groupId>org.example</groupId>
            <artifactId>x</artifactId>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:app:1.0").unwrap();
    let deps = pom.dependencies(&[Scope::Compile]).unwrap();
    let compile = deps.get(Scope::Compile);
    assert_eq!(compile.len(), 1);
    // The imported BOM's managed version applies, already interpolated.
    assert_eq!(compile[0].version, Version::parse("3.3"));
}

#[test]
fn managed_optional_suppresses_but_never_unsets() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:app:1.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
    <dependencyManagement>
        <dependencies>
            <dependency>
                <groupId>g</groupId>
                <artifactId>managed-optional</artifactId>
                <version>1.0</version>
                <optional>true</optional>
            </dependency>
            <dependency>
                <groupId>g</groupId>
                <artifactId>declared-optional</artifactId>
                <version>1.0</version>
                <optional>false</optional>
            </dependency>
        </dependencies>
    </dependencyManagement>
    <dependencies>
        <dependency>
            <groupId>g</groupId>
            <artifactId>managed-optional</artifactId>
        </dependency>
        <dependency>
            <groupId>g</groupId>
            <artifactId>declared-optional</artifactId>
            <optional>true</optional>
        </dependency>
        <dependency>
            <groupId>g</groupId>
            <artifactId>kept</artifactId>
            <version>1.0</version>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:app:1.0").unwrap();
    let deps = pom.dependencies(&[Scope::Compile]).unwrap();
    let compile = deps.get(Scope::Compile);
    // Inherited optional=true drops the first; a directly declared
    // optional=true stands even though management says false.
    assert_eq!(compile.len(), 1);
    assert_eq!(compile[0].artifact_id, "kept");
}

#[test]
fn non_jar_types_filtered_scopes_respected() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:app:1.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
    <dependencies>
        <dependency>
            <groupId>g</groupId>
            <artifactId>native-bits</artifactId>
            <version>1.0</version>
            <type>aar</type>
        </dependency>
        <dependency>
            <groupId>g</groupId>
            <artifactId>test-helper</artifactId>
            <version>1.0</version>
            <scope>test</scope>
        </dependency>
        <dependency>
            <groupId>g</groupId>
            <artifactId>runtime-lib</artifactId>
            <version>1.0</version>
            <scope>runtime</scope>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:app:1.0").unwrap();

    let compile_only = pom.dependencies(&[Scope::Compile]).unwrap();
    assert!(compile_only.is_empty());

    let with_runtime = pom.dependencies(&[Scope::Compile, Scope::Runtime]).unwrap();
    assert_eq!(with_runtime.get(Scope::Runtime).len(), 1);
    assert_eq!(with_runtime.get(Scope::Runtime)[0].artifact_id, "runtime-lib");

    let with_test = pom
        .dependencies(&[Scope::Compile, Scope::Runtime, Scope::Test])
        .unwrap();
    assert_eq!(with_test.get(Scope::Test).len(), 1);
}

#[test]
fn properties_after_dependencies_still_interpolate() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:late-props:1.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>late-props</artifactId>
    <version>1.0</version>
    <dependencies>
        <dependency>
            <groupId>g</groupId>
            <artifactId>lib</artifactId>
            <version>${lib.version}</version>
        </dependency>
    </dependencies>
    <properties>
        <lib.version>2.2</lib.version>
    </properties>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:late-props:1.0").unwrap();
    let deps = pom.dependencies(&[Scope::Compile]).unwrap();
    assert_eq!(deps.get(Scope::Compile)[0].version, Version::parse("2.2"));
}

#[test]
fn unresolved_property_in_version_is_reported() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:broken:1.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>broken</artifactId>
    <version>1.0</version>
    <dependencies>
        <dependency>
            <groupId>g</groupId>
            <artifactId>lib</artifactId>
            <version>${no.such.property}</version>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:broken:1.0").unwrap();
    let err = pom.dependencies(&[Scope::Compile]).unwrap_err();
    assert!(err.to_string().contains("Unresolved property"));
}

#[test]
fn cyclic_parent_chain_detected() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:a:1.0",
        r#"<project>
    <parent>
        <groupId>org.example</groupId>
        <artifactId>b</artifactId>
        <version>1.0</version>
    </parent>
    <artifactId>a</artifactId>
</project>"#,
    );
    retriever.serve_pom(
        &repo,
        "org.example:b:1.0",
        r#"<project>
    <parent>
        <groupId>org.example</groupId>
        <artifactId>a</artifactId>
        <version>1.0</version>
    </parent>
    <artifactId>b</artifactId>
</project>"#,
    );

    let repos = [repo];
    let err = resolve_pom(&retriever, &repos, "org.example:a:1.0").unwrap_err();
    assert!(err.to_string().contains("Cyclic parent"));
}

#[test]
fn exclusions_carried_onto_effective_dependencies() {
    let repo = test_repo();
    let mut retriever = StubRetriever::new();
    retriever.serve_pom(
        &repo,
        "org.example:app:1.0",
        r#"<project>
    <groupId>org.example</groupId>
    <artifactId>app</artifactId>
    <version>1.0</version>
    <dependencies>
        <dependency>
            <groupId>g</groupId>
            <artifactId>lib</artifactId>
            <version>1.0</version>
            <exclusions>
                <exclusion>
                    <groupId>commons-logging</groupId>
                    <artifactId>commons-logging</artifactId>
                </exclusion>
                <exclusion>
                    <groupId>org.slf4j</groupId>
                </exclusion>
            </exclusions>
        </dependency>
    </dependencies>
</project>"#,
    );

    let repos = [repo];
    let pom = resolve_pom(&retriever, &repos, "org.example:app:1.0").unwrap();
    let deps = pom.dependencies(&[Scope::Compile]).unwrap();
    let lib = &deps.get(Scope::Compile)[0];
    assert!(lib.exclusions.excludes("commons-logging", "commons-logging"));
    // An exclusion without <artifactId> covers the whole group.
    assert!(lib.exclusions.excludes("org.slf4j", "slf4j-api"));
    assert!(!lib.exclusions.excludes("org.other", "thing"));
}

#[test]
fn missing_pom_in_all_repositories_names_them() {
    let retriever = StubRetriever::new();
    let repos = [
        Repository::new("first", "https://first.test/maven"),
        Repository::new("second", "https://second.test/maven"),
    ];
    let err = resolve_pom(&retriever, &repos, "org.missing:lib:1.0").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("org.missing:lib"));
    assert!(message.contains("first"));
    assert!(message.contains("second"));
}
