//! The extension graph and build plan.
//!
//! An `ExtensionGraph` owns every declared `BuildTarget` and the edges
//! between them. Edges are validated when the graph is built, so an unknown
//! link name or a duplicate target is reported before anything runs. Cycles
//! are reported by `resolve_order`, which every build calls before starting
//! its first external process.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use petgraph::algo::{is_cyclic_directed, tarjan_scc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use crate::core::errors::BuildError;
use crate::core::target::{BuildTarget, LinkDep};

/// The full set of build targets and their link edges.
///
/// An edge `a -> b` means "`a` links against `b`", so `b` must be built first.
#[derive(Debug, Clone)]
pub struct ExtensionGraph {
    graph: DiGraph<BuildTarget, ()>,
    by_name: HashMap<String, NodeIndex>,
}

impl ExtensionGraph {
    /// Build a graph from targets in declaration order.
    ///
    /// `natives` is the set of native toolkit libraries a target may name in
    /// its link list besides other targets.
    pub fn new(
        targets: Vec<BuildTarget>,
        natives: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, BuildError> {
        let natives: BTreeSet<String> = natives.into_iter().map(Into::into).collect();
        let mut graph = DiGraph::with_capacity(targets.len(), 0);
        let mut by_name = HashMap::with_capacity(targets.len());

        for target in targets {
            if by_name.contains_key(&target.name) {
                return Err(BuildError::DuplicateTarget { name: target.name });
            }
            let name = target.name.clone();
            let node = graph.add_node(target);
            by_name.insert(name, node);
        }

        let nodes: Vec<NodeIndex> = graph.node_indices().collect();
        for node in nodes {
            let mut edges = Vec::new();

            for dep in &graph[node].link {
                match dep {
                    LinkDep::Target(name) => match by_name.get(name) {
                        Some(&dep_node) => edges.push(dep_node),
                        None => {
                            return Err(BuildError::UnknownDependency {
                                target: graph[node].name.clone(),
                                dependency: name.clone(),
                            })
                        }
                    },
                    LinkDep::Native(name) => {
                        if !natives.contains(name) {
                            return Err(BuildError::UnknownDependency {
                                target: graph[node].name.clone(),
                                dependency: name.clone(),
                            });
                        }
                    }
                }
            }

            for dep_node in edges {
                graph.update_edge(node, dep_node, ());
            }
        }

        Ok(ExtensionGraph {
            graph,
            by_name,
        })
    }

    /// Look up a target by name.
    pub fn target(&self, name: &str) -> Option<&BuildTarget> {
        self.by_name.get(name).map(|&n| &self.graph[n])
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Order every target so that each one comes after the targets it links
    /// against. Among targets with no constraint between them, declaration
    /// order is kept.
    pub fn resolve_order(&self) -> Result<BuildPlan, BuildError> {
        self.order_nodes(|_| true)
    }

    /// Like `resolve_order`, restricted to the named targets and everything
    /// they transitively link against.
    ///
    /// The whole graph is still checked for cycles, including parts the
    /// subset never reaches.
    pub fn resolve_subset<S: AsRef<str>>(&self, names: &[S]) -> Result<BuildPlan, BuildError> {
        self.check_acyclic()?;

        let mut keep = HashSet::new();
        let mut stack = Vec::new();

        for name in names {
            let name = name.as_ref();
            let node = self
                .by_name
                .get(name)
                .copied()
                .ok_or_else(|| BuildError::UnknownTarget {
                    name: name.to_string(),
                })?;
            stack.push(node);
        }

        while let Some(node) = stack.pop() {
            if keep.insert(node) {
                stack.extend(self.graph.neighbors_directed(node, Direction::Outgoing));
            }
        }

        self.order_nodes(|n| keep.contains(&n))
    }

    fn check_acyclic(&self) -> Result<(), BuildError> {
        if is_cyclic_directed(&self.graph) {
            return Err(BuildError::CyclicDependency {
                cycle: self.find_cycle(),
            });
        }
        Ok(())
    }

    /// Kahn's algorithm with a min-heap on node index. Node indices follow
    /// declaration order, so the heap yields the earliest declared ready
    /// target first.
    fn order_nodes(&self, include: impl Fn(NodeIndex) -> bool) -> Result<BuildPlan, BuildError> {
        let mut pending: HashMap<NodeIndex, usize> = HashMap::new();

        for node in self.graph.node_indices().filter(|&n| include(n)) {
            let unbuilt_deps = self
                .graph
                .neighbors_directed(node, Direction::Outgoing)
                .filter(|&dep| include(dep))
                .count();
            pending.insert(node, unbuilt_deps);
        }

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&node, _)| Reverse(node))
            .collect();

        let mut order = Vec::with_capacity(pending.len());

        while let Some(Reverse(node)) = ready.pop() {
            order.push(node);

            for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push(Reverse(dependent));
                    }
                }
            }
        }

        if order.len() < pending.len() {
            return Err(BuildError::CyclicDependency {
                cycle: self.find_cycle(),
            });
        }

        let steps = order.into_iter().map(|n| self.graph[n].clone()).collect();
        Ok(BuildPlan { steps })
    }

    /// Name the targets on one cycle, first one repeated at the end.
    fn find_cycle(&self) -> Vec<String> {
        let mut components: Vec<Vec<NodeIndex>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || self.graph.find_edge(scc[0], scc[0]).is_some()
            })
            .collect();

        for scc in &mut components {
            scc.sort();
        }
        components.sort();

        let Some(scc) = components.first() else {
            return Vec::new();
        };
        let members: HashSet<NodeIndex> = scc.iter().copied().collect();

        // Every member of a strongly connected component has an edge to
        // another member, so this walk revisits a node eventually.
        let mut path = vec![scc[0]];
        loop {
            let current = path[path.len() - 1];
            let next = self
                .graph
                .neighbors_directed(current, Direction::Outgoing)
                .filter(|n| members.contains(n))
                .min();

            let Some(next) = next else {
                break;
            };

            if let Some(start) = path.iter().position(|&n| n == next) {
                path.drain(..start);
                path.push(next);
                break;
            }
            path.push(next);
        }

        path.into_iter()
            .map(|n| self.graph[n].name.clone())
            .collect()
    }
}

/// An ordered sequence of targets, each after all targets it links against.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
    steps: Vec<BuildTarget>,
}

impl BuildPlan {
    pub fn iter(&self) -> impl Iterator<Item = &BuildTarget> {
        self.steps.iter()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Target names in build order.
    pub fn names(&self) -> Vec<&str> {
        self.steps.iter().map(|t| t.name.as_str()).collect()
    }

    /// Position of a target in the plan.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|t| t.name == name)
    }
}

impl<'a> IntoIterator for &'a BuildPlan {
    type Item = &'a BuildTarget;
    type IntoIter = std::slice::Iter<'a, BuildTarget>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}
