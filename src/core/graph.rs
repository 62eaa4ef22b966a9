//! Dependency-graph construction and analysis.
//!
//! Built once per invocation from the full systems/edges snapshot, then
//! purely functional: cycle detection, topological ordering, reachability,
//! and generation of the serialized graph artifact. Topological output is
//! dependency-before-dependent (leaf first).

use crate::core::db::Session;
use crate::core::error::DocPulseError;
use crate::core::registry::{self, DependencyEdge, SystemRecord};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

/// Traversal direction for reachability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Follow edges forward: what does this system need.
    Dependencies,
    /// Follow edges backward: what breaks if this system changes.
    Dependents,
}

#[derive(Debug)]
pub struct DependencyGraph {
    /// Forward adjacency: system -> systems it depends on (sorted).
    dependencies: FxHashMap<String, Vec<String>>,
    /// Reverse adjacency: system -> systems depending on it (sorted).
    dependents: FxHashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// O(V+E) adjacency construction. An edge naming an unregistered
    /// system is a structural integrity error, never silently dropped.
    pub fn build(
        systems: &[SystemRecord],
        edges: &[DependencyEdge],
    ) -> Result<Self, DocPulseError> {
        let mut dependencies: FxHashMap<String, Vec<String>> = FxHashMap::default();
        let mut dependents: FxHashMap<String, Vec<String>> = FxHashMap::default();

        for system in systems {
            dependencies.entry(system.path.clone()).or_default();
            dependents.entry(system.path.clone()).or_default();
        }

        for edge in edges {
            if !dependencies.contains_key(&edge.system_path) {
                return Err(DocPulseError::Structural(format!(
                    "dependency edge {} -> {} references unknown system '{}'",
                    edge.system_path, edge.depends_on, edge.system_path
                )));
            }
            if !dependencies.contains_key(&edge.depends_on) {
                return Err(DocPulseError::Structural(format!(
                    "dependency edge {} -> {} references unknown system '{}'",
                    edge.system_path, edge.depends_on, edge.depends_on
                )));
            }
            dependencies
                .get_mut(&edge.system_path)
                .unwrap()
                .push(edge.depends_on.clone());
            dependents
                .get_mut(&edge.depends_on)
                .unwrap()
                .push(edge.system_path.clone());
        }

        for list in dependencies.values_mut().chain(dependents.values_mut()) {
            list.sort();
            list.dedup();
        }

        Ok(Self {
            dependencies,
            dependents,
        })
    }

    /// Load directly from an open session.
    pub fn from_session(session: &Session) -> Result<Self, DocPulseError> {
        let systems = registry::list_systems(session)?;
        let edges = registry::list_dependencies(session)?;
        Self::build(&systems, &edges)
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    fn sorted_nodes(&self) -> Vec<&String> {
        let mut nodes: Vec<&String> = self.dependencies.keys().collect();
        nodes.sort();
        nodes
    }

    /// Find all cycles via iterative DFS with white/gray/black marking.
    ///
    /// A back-edge into a gray node yields a cycle, reconstructed by
    /// walking the active DFS path back to the back-edge target. The
    /// search restarts from every undiscovered node, so disjoint cycles
    /// are all reported.
    pub fn detect_cycles(&self) -> Vec<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: FxHashMap<&str, Color> = self
            .dependencies
            .keys()
            .map(|k| (k.as_str(), Color::White))
            .collect();
        let mut cycles: Vec<Vec<String>> = Vec::new();

        for root in self.sorted_nodes() {
            if color[root.as_str()] != Color::White {
                continue;
            }

            // (node, next neighbor index); `path` mirrors the gray stack.
            let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
            let mut path: Vec<&str> = vec![root.as_str()];
            color.insert(root.as_str(), Color::Gray);

            while let Some(&(node, idx)) = stack.last() {
                let neighbors = &self.dependencies[node];
                if idx < neighbors.len() {
                    stack.last_mut().unwrap().1 += 1;
                    let next = neighbors[idx].as_str();
                    match color[next] {
                        Color::White => {
                            color.insert(next, Color::Gray);
                            stack.push((next, 0));
                            path.push(next);
                        }
                        Color::Gray => {
                            let start = path.iter().position(|&n| n == next).unwrap_or(0);
                            cycles.push(path[start..].iter().map(|s| s.to_string()).collect());
                        }
                        Color::Black => {}
                    }
                } else {
                    color.insert(node, Color::Black);
                    stack.pop();
                    path.pop();
                }
            }
        }

        cycles
    }

    /// Kahn's algorithm; dependency-before-dependent order.
    ///
    /// On cyclic graphs this fails naming every node left with nonzero
    /// in-degree when the queue empties - never a truncated order.
    pub fn topological_sort(&self) -> Result<Vec<String>, DocPulseError> {
        // In-degree here counts unresolved dependencies, so nodes with no
        // dependencies drain first and the order comes out leaf-first.
        let mut in_degree: FxHashMap<&str, usize> = self
            .dependencies
            .iter()
            .map(|(node, deps)| (node.as_str(), deps.len()))
            .collect();

        let mut queue: Vec<&str> = in_degree
            .iter()
            .filter(|&(_, &d)| d == 0)
            .map(|(&n, _)| n)
            .collect();
        queue.sort();

        let mut order: Vec<String> = Vec::with_capacity(self.len());
        while !queue.is_empty() {
            let node = queue.remove(0);
            order.push(node.to_string());

            for dependent in &self.dependents[node] {
                let remaining = in_degree.get_mut(dependent.as_str()).unwrap();
                *remaining -= 1;
                if *remaining == 0 {
                    // Sorted insertion keeps the order deterministic.
                    let pos = queue
                        .binary_search(&dependent.as_str())
                        .unwrap_or_else(|p| p);
                    queue.insert(pos, dependent.as_str());
                }
            }
        }

        if order.len() != self.len() {
            let mut residual: Vec<&str> = in_degree
                .iter()
                .filter(|&(_, &d)| d > 0)
                .map(|(&n, _)| n)
                .collect();
            residual.sort();
            return Err(DocPulseError::CyclicDependency(format!(
                "cannot compute topological order; nodes stuck in cycles: [{}]",
                residual.join(", ")
            )));
        }

        Ok(order)
    }

    /// Breadth-first reachability from `start`, excluding `start` itself
    /// unless a cycle leads back to it. Visit order is deterministic.
    pub fn bfs(&self, start: &str, direction: Direction) -> Result<Vec<String>, DocPulseError> {
        let adjacency = match direction {
            Direction::Dependencies => &self.dependencies,
            Direction::Dependents => &self.dependents,
        };
        if !adjacency.contains_key(start) {
            return Err(DocPulseError::Structural(format!(
                "unknown system '{}' in reachability query",
                start
            )));
        }

        let mut visited: FxHashSet<&str> = FxHashSet::default();
        let mut order: Vec<String> = Vec::new();
        let mut queue: VecDeque<&str> = adjacency[start].iter().map(|s| s.as_str()).collect();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current.to_string());
            for next in &adjacency[current] {
                if !visited.contains(next.as_str()) {
                    queue.push_back(next);
                }
            }
        }

        Ok(order)
    }

    /// True when `b` is transitively reachable from `a` along dependencies.
    pub fn reachable(&self, a: &str, b: &str) -> Result<bool, DocPulseError> {
        Ok(self.bfs(a, Direction::Dependencies)?.iter().any(|n| n == b))
    }

    /// Systems with no dependencies.
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self
            .dependencies
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(n, _)| n.clone())
            .collect();
        roots.sort();
        roots
    }

    /// Systems nothing depends on.
    pub fn leaves(&self) -> Vec<String> {
        let mut leaves: Vec<String> = self
            .dependents
            .iter()
            .filter(|(_, deps)| deps.is_empty())
            .map(|(n, _)| n.clone())
            .collect();
        leaves.sort();
        leaves
    }
}

// --- Generated artifact ---

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArtifactNode {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ArtifactEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GraphArtifact {
    pub systems: Vec<ArtifactNode>,
    pub edges: Vec<ArtifactEdge>,
    /// Registry update watermark at generation time - not wall clock, so
    /// identical store state serializes byte-identically.
    pub generated_at: String,
}

/// Generate the artifact from current registry state.
pub fn generate_artifact(session: &Session) -> Result<GraphArtifact, DocPulseError> {
    let systems = registry::list_systems(session)?;
    let edges = registry::list_dependencies(session)?;
    // Surfaces dangling edges before they reach the artifact.
    DependencyGraph::build(&systems, &edges)?;

    let watermark = registry::update_watermark(session)?.unwrap_or_else(|| "0".to_string());

    Ok(GraphArtifact {
        systems: systems
            .into_iter()
            .map(|s| ArtifactNode {
                path: s.path,
                name: s.name,
            })
            .collect(),
        edges: edges
            .into_iter()
            .map(|e| ArtifactEdge {
                from: e.system_path,
                to: e.depends_on,
            })
            .collect(),
        generated_at: watermark,
    })
}

pub fn save_artifact(artifact: &GraphArtifact, path: &Path) -> Result<(), DocPulseError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(DocPulseError::IoError)?;
    }
    let mut json = serde_json::to_string_pretty(artifact)
        .map_err(|e| DocPulseError::Infrastructure(format!("cannot serialize graph: {}", e)))?;
    json.push('\n');
    fs::write(path, json).map_err(DocPulseError::IoError)?;
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<GraphArtifact, DocPulseError> {
    let content = fs::read_to_string(path).map_err(DocPulseError::IoError)?;
    serde_json::from_str(&content)
        .map_err(|e| DocPulseError::Infrastructure(format!("corrupt graph artifact: {}", e)))
}
