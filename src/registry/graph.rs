//! Reference graph between named definitions.
//!
//! Used wherever one definition may refer to another of the same kind
//! (nested loot tables), so reference cycles are reported with their path
//! instead of recursing forever later on.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Directed graph: node -> nodes it refers to.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, BTreeSet<String>>,
    dependents: BTreeMap<String, BTreeSet<String>>,
    nodes: BTreeSet<String>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node even if it has no edges.
    pub fn register(&mut self, id: impl Into<String>) {
        self.nodes.insert(id.into());
    }

    /// Add an edge: `from` refers to `to`.
    pub fn add_dependency(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        self.nodes.insert(from.clone());
        self.nodes.insert(to.clone());
        self.dependencies
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        self.dependents.entry(to).or_default().insert(from);
    }

    pub fn dependencies_of(&self, id: &str) -> impl Iterator<Item = &String> {
        self.dependencies.get(id).into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Kahn's algorithm. Dependencies come before their dependents; ties
    /// are broken by name so the order is stable.
    pub fn topological_sort(&self) -> Result<Vec<String>, CycleError> {
        let mut in_degree: BTreeMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.dependencies.get(n).map_or(0, |d| d.len())))
            .collect();

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            result.push(node.to_string());
            for dependent in self.dependents.get(node).into_iter().flatten() {
                if let Some(count) = in_degree.get_mut(dependent.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(CycleError {
                cycle: self.find_cycle(),
            });
        }
        Ok(result)
    }

    fn find_cycle(&self) -> Vec<String> {
        let mut visited = BTreeSet::new();
        let mut on_stack = BTreeSet::new();
        let mut path = Vec::new();
        for start in &self.nodes {
            if !visited.contains(start.as_str()) {
                if let Some(cycle) = self.dfs(start, &mut visited, &mut on_stack, &mut path) {
                    return cycle;
                }
            }
        }
        Vec::new()
    }

    fn dfs<'a>(
        &'a self,
        node: &'a str,
        visited: &mut BTreeSet<&'a str>,
        on_stack: &mut BTreeSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);

        for dep in self.dependencies.get(node).into_iter().flatten() {
            let dep = dep.as_str();
            if !visited.contains(dep) {
                if let Some(cycle) = self.dfs(dep, visited, on_stack, path) {
                    return Some(cycle);
                }
            } else if on_stack.contains(dep) {
                let start = path.iter().position(|x| *x == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
        }

        path.pop();
        on_stack.remove(node);
        None
    }
}

/// A reference cycle, listed from its first node back to itself.
#[derive(Debug)]
pub struct CycleError {
    pub cycle: Vec<String>,
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reference cycle: {}", self.cycle.join(" -> "))
    }
}

impl std::error::Error for CycleError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(graph.topological_sort().unwrap().is_empty());
    }

    #[test]
    fn test_nested_tables_sort_leaves_first() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("chest", "chest/rare");
        graph.add_dependency("chest/rare", "gems");
        graph.add_dependency("chest", "gems");
        graph.register("barrel");

        let sorted = graph.topological_sort().unwrap();
        let pos = |n: &str| sorted.iter().position(|x| x == n).unwrap();
        assert_eq!(sorted.len(), 4);
        assert!(pos("gems") < pos("chest/rare"));
        assert!(pos("chest/rare") < pos("chest"));
        assert_eq!(graph.dependencies_of("chest").count(), 2);
    }

    #[test]
    fn test_cycle_reports_path() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "c");
        graph.add_dependency("c", "a");

        let err = graph.topological_sort().unwrap_err();
        assert_eq!(err.cycle, vec!["a", "b", "c", "a"]);
        assert_eq!(err.to_string(), "reference cycle: a -> b -> c -> a");
    }

    #[test]
    fn test_self_reference() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("loop", "loop");
        assert!(graph.topological_sort().is_err());
    }
}
