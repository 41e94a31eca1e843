//! Dependency graph over the packages of a release.
//!
//! An edge `A -> B` means "B depends on A": A must be resolvable before B may
//! be published. The graph is validated once at construction and read-only
//! afterwards.
//!
//! Topological ordering is computed with Kahn's algorithm. Among packages
//! that are ready at the same time, the one declared first wins, so the
//! order is stable for a given input.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use crate::core::error::ConfigError;
use crate::core::traits::PackageSpec;

/// Validated, acyclic dependency graph of a release
#[derive(Debug, Clone)]
pub struct PackageGraph {
    /// Packages in declaration order
    packages: Vec<PackageSpec>,
    index: HashMap<String, usize>,
    /// `package -> [in-graph dependency, ...]`
    upstream: Vec<Vec<usize>>,
    /// `package -> [dependent, ...]`
    downstream: Vec<Vec<usize>>,
    external: BTreeSet<String>,
    order: Vec<usize>,
    levels: Vec<usize>,
}

impl PackageGraph {
    /// Build and validate the graph.
    ///
    /// Dependencies naming an in-graph package become edges, even when the
    /// same name is also declared external. Remaining dependencies must be
    /// declared external.
    pub fn build<I, S>(packages: Vec<PackageSpec>, external: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if packages.is_empty() {
            return Err(ConfigError::EmptyRelease);
        }

        let external: BTreeSet<String> = external.into_iter().map(Into::into).collect();

        let mut index = HashMap::with_capacity(packages.len());
        for (i, spec) in packages.iter().enumerate() {
            if index.insert(spec.name().to_string(), i).is_some() {
                return Err(ConfigError::DuplicatePackage {
                    name: spec.name().to_string(),
                });
            }
        }

        let mut upstream = vec![Vec::new(); packages.len()];
        let mut downstream = vec![Vec::new(); packages.len()];

        for (i, spec) in packages.iter().enumerate() {
            for dep in &spec.depends_on {
                match index.get(dep.as_str()) {
                    Some(&d) => {
                        if !upstream[i].contains(&d) {
                            upstream[i].push(d);
                            downstream[d].push(i);
                        }
                    }
                    None if external.contains(dep) => {}
                    None => {
                        return Err(ConfigError::UnknownDependency {
                            package: spec.name().to_string(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }

        let mut graph = Self {
            packages,
            index,
            upstream,
            downstream,
            external,
            order: Vec::new(),
            levels: Vec::new(),
        };

        graph.order = graph.kahn_order()?;
        graph.levels = graph.compute_levels();

        Ok(graph)
    }

    fn kahn_order(&self) -> Result<Vec<usize>, ConfigError> {
        let mut in_degree: Vec<usize> = self.upstream.iter().map(Vec::len).collect();

        // Min-heap on declaration index keeps ties in input order.
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg == 0)
            .map(|(i, _)| Reverse(i))
            .collect();

        let mut sorted = Vec::with_capacity(self.packages.len());

        while let Some(Reverse(node)) = ready.pop() {
            sorted.push(node);
            for &dependent in &self.downstream[node] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }

        if sorted.len() != self.packages.len() {
            let remaining: HashSet<usize> = (0..self.packages.len())
                .filter(|i| in_degree[*i] > 0)
                .collect();
            return Err(ConfigError::Cycle {
                cycle: self.find_cycle(&remaining),
            });
        }

        Ok(sorted)
    }

    /// Walk upstream edges inside the unsorted remainder until a node repeats.
    ///
    /// Every node left over by Kahn's algorithm has an upstream edge to
    /// another left-over node, so the walk always closes a cycle.
    fn find_cycle(&self, remaining: &HashSet<usize>) -> Vec<String> {
        let Some(&start) = remaining.iter().min() else {
            return Vec::new();
        };

        let mut path = vec![start];
        let mut position = HashMap::from([(start, 0usize)]);
        let mut current = start;

        loop {
            let next = self.upstream[current]
                .iter()
                .copied()
                .find(|n| remaining.contains(n));

            let Some(next) = next else {
                break;
            };

            if let Some(&at) = position.get(&next) {
                let mut cycle: Vec<String> = path[at..]
                    .iter()
                    .map(|&i| self.packages[i].name().to_string())
                    .collect();
                cycle.push(self.packages[next].name().to_string());
                return cycle;
            }

            position.insert(next, path.len());
            path.push(next);
            current = next;
        }

        path.iter()
            .map(|&i| self.packages[i].name().to_string())
            .collect()
    }

    fn compute_levels(&self) -> Vec<usize> {
        let mut levels = vec![0; self.packages.len()];
        for &node in &self.order {
            levels[node] = self.upstream[node]
                .iter()
                .map(|&d| levels[d] + 1)
                .max()
                .unwrap_or(0);
        }
        levels
    }

    /// Number of packages in the release
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Always false for a built graph
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Packages in declaration order
    pub fn packages(&self) -> &[PackageSpec] {
        &self.packages
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Package at a declaration index
    pub fn spec(&self, index: usize) -> &PackageSpec {
        &self.packages[index]
    }

    /// Every package after all of its in-graph dependencies
    pub fn topological_order(&self) -> Vec<&PackageSpec> {
        self.order.iter().map(|&i| &self.packages[i]).collect()
    }

    /// Declaration indices in topological order
    pub fn topological_indices(&self) -> &[usize] {
        &self.order
    }

    /// Longest dependency chain below a package (0 for roots)
    pub fn level_of(&self, index: usize) -> usize {
        self.levels[index]
    }

    /// In-graph dependencies by declaration index
    pub fn upstream_of(&self, index: usize) -> &[usize] {
        &self.upstream[index]
    }

    /// Direct dependents by declaration index
    pub fn downstream_of(&self, index: usize) -> &[usize] {
        &self.downstream[index]
    }

    /// Direct in-graph dependencies of `name`; externals are not included
    pub fn dependencies_of(&self, name: &str) -> Vec<&PackageSpec> {
        self.index_of(name)
            .map(|i| self.upstream[i].iter().map(|&d| &self.packages[d]).collect())
            .unwrap_or_default()
    }

    /// Packages that depend directly on `name`
    pub fn dependents_of(&self, name: &str) -> Vec<&PackageSpec> {
        self.index_of(name)
            .map(|i| {
                self.downstream[i]
                    .iter()
                    .map(|&d| &self.packages[d])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Everything downstream of `name`, in topological order
    pub fn transitive_dependents_of(&self, name: &str) -> Vec<&PackageSpec> {
        let Some(start) = self.index_of(name) else {
            return Vec::new();
        };

        let mut visited = HashSet::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for &dependent in &self.downstream[current] {
                if visited.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        self.order
            .iter()
            .filter(|i| visited.contains(i))
            .map(|&i| &self.packages[i])
            .collect()
    }

    /// Whether `name` is satisfied outside the release
    pub fn is_external(&self, name: &str) -> bool {
        !self.index.contains_key(name) && self.external.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::PackageId;

    fn pkg(name: &str, deps: &[&str]) -> PackageSpec {
        PackageSpec::new(PackageId::parse(name, "0.1.0").unwrap(), name)
            .with_dependencies(deps.iter().copied())
    }

    fn names(specs: Vec<&PackageSpec>) -> Vec<&str> {
        specs.into_iter().map(PackageSpec::name).collect()
    }

    #[test]
    fn test_topological_order_respects_deps() {
        let graph = PackageGraph::build(
            vec![pkg("axum", &["core"]), pkg("core", &[]), pkg("cli", &["axum"])],
            Vec::<String>::new(),
        )
        .unwrap();

        assert_eq!(names(graph.topological_order()), vec!["core", "axum", "cli"]);
    }

    #[test]
    fn test_ties_follow_declaration_order() {
        let graph = PackageGraph::build(
            vec![
                pkg("zeta", &[]),
                pkg("alpha", &[]),
                pkg("mid", &["zeta", "alpha"]),
                pkg("beta", &[]),
            ],
            Vec::<String>::new(),
        )
        .unwrap();

        assert_eq!(
            names(graph.topological_order()),
            vec!["zeta", "alpha", "mid", "beta"]
        );
    }

    #[test]
    fn test_cycle_detection_reports_path() {
        let result = PackageGraph::build(
            vec![pkg("a", &["b"]), pkg("b", &["c"]), pkg("c", &["a"]), pkg("d", &[])],
            Vec::<String>::new(),
        );

        match result {
            Err(ConfigError::Cycle { cycle }) => {
                assert_eq!(cycle.first(), cycle.last());
                assert_eq!(cycle.len(), 4);
                for name in ["a", "b", "c"] {
                    assert!(cycle.iter().any(|n| n == name), "{name} missing from {cycle:?}");
                }
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let result = PackageGraph::build(vec![pkg("core", &["core"])], Vec::<String>::new());

        assert_eq!(
            result.unwrap_err(),
            ConfigError::Cycle {
                cycle: vec!["core".to_string(), "core".to_string()]
            }
        );
    }

    #[test]
    fn test_unknown_dependency() {
        let result = PackageGraph::build(vec![pkg("axum", &["hyper"])], Vec::<String>::new());

        assert_eq!(
            result.unwrap_err(),
            ConfigError::UnknownDependency {
                package: "axum".to_string(),
                dependency: "hyper".to_string()
            }
        );
    }

    #[test]
    fn test_external_dependency_is_accepted() {
        let graph = PackageGraph::build(vec![pkg("axum", &["tokio"])], ["tokio"]).unwrap();

        assert!(graph.is_external("tokio"));
        assert!(graph.dependencies_of("axum").is_empty());
    }

    #[test]
    fn test_in_graph_package_wins_over_external() {
        let graph =
            PackageGraph::build(vec![pkg("core", &[]), pkg("axum", &["core"])], ["core"]).unwrap();

        assert!(!graph.is_external("core"));
        assert_eq!(names(graph.dependencies_of("axum")), vec!["core"]);
    }

    #[test]
    fn test_duplicate_and_empty() {
        assert_eq!(
            PackageGraph::build(vec![pkg("core", &[]), pkg("core", &[])], Vec::<String>::new())
                .unwrap_err(),
            ConfigError::DuplicatePackage {
                name: "core".to_string()
            }
        );
        assert_eq!(
            PackageGraph::build(Vec::new(), Vec::<String>::new()).unwrap_err(),
            ConfigError::EmptyRelease
        );
    }

    #[test]
    fn test_repeated_dependency_creates_one_edge() {
        let graph = PackageGraph::build(
            vec![pkg("core", &[]), pkg("axum", &["core", "core"])],
            Vec::<String>::new(),
        )
        .unwrap();

        assert_eq!(graph.upstream_of(1), &[0]);
        assert_eq!(graph.downstream_of(0), &[1]);
    }

    #[test]
    fn test_transitive_dependents_covers_full_chain() {
        let graph = PackageGraph::build(
            vec![
                pkg("a", &[]),
                pkg("b", &["a"]),
                pkg("c", &["b"]),
                pkg("d", &[]),
                pkg("e", &["a", "d"]),
            ],
            Vec::<String>::new(),
        )
        .unwrap();

        assert_eq!(names(graph.transitive_dependents_of("a")), vec!["b", "c", "e"]);
        assert_eq!(names(graph.dependents_of("d")), vec!["e"]);
        assert!(graph.transitive_dependents_of("c").is_empty());
        assert!(graph.transitive_dependents_of("missing").is_empty());
    }

    #[test]
    fn test_levels() {
        let graph = PackageGraph::build(
            vec![pkg("a", &[]), pkg("b", &["a"]), pkg("c", &["a", "b"]), pkg("d", &[])],
            Vec::<String>::new(),
        )
        .unwrap();

        let levels: Vec<_> = (0..graph.len()).map(|i| graph.level_of(i)).collect();
        assert_eq!(levels, vec![0, 1, 2, 0]);
    }
}
