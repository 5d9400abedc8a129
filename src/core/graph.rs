//! The target graph.
//!
//! Nodes are targets, an edge `a -> b` means "a depends on b". Each node may
//! carry a recipe. Edges remember whether they were declared by
//! configuration or discovered from a dependency listing.

use std::collections::HashMap;
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::error::ConfigError;
use crate::core::recipe::{same_recipe, Recipe};
use crate::core::target::TargetId;

/// How an edge entered the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Written by configuration.
    Declared,
    /// Injected from a dependency listing.
    Discovered,
}

/// A node in the target graph.
#[derive(Debug, Clone)]
pub struct TargetNode {
    pub id: TargetId,
    recipe: Option<Arc<dyn Recipe>>,
    /// True while the node is only known through discovered edges.
    discovered: bool,
}

impl TargetNode {
    pub fn recipe(&self) -> Option<&Arc<dyn Recipe>> {
        self.recipe.as_ref()
    }

    pub fn is_discovered(&self) -> bool {
        self.discovered
    }
}

/// A directed graph of targets.
#[derive(Debug, Clone, Default)]
pub struct TargetGraph {
    graph: DiGraph<TargetNode, EdgeKind>,
    index: HashMap<TargetId, NodeIndex>,
}

impl TargetGraph {
    pub fn new() -> Self {
        TargetGraph::default()
    }

    fn ensure(&mut self, id: TargetId, discovered: bool) -> NodeIndex {
        if let Some(&node) = self.index.get(&id) {
            if !discovered {
                self.graph[node].discovered = false;
            }
            return node;
        }

        let node = self.graph.add_node(TargetNode {
            id: id.clone(),
            recipe: None,
            discovered,
        });
        self.index.insert(id, node);
        node
    }

    /// Register a target, optionally attaching its recipe.
    ///
    /// Declaring an existing target again is allowed as long as it does not
    /// try to attach a second, different recipe.
    pub fn declare(
        &mut self,
        id: TargetId,
        recipe: Option<Arc<dyn Recipe>>,
    ) -> Result<(), ConfigError> {
        let node = self.ensure(id, false);
        let Some(recipe) = recipe else {
            return Ok(());
        };

        match &self.graph[node].recipe {
            Some(existing) if same_recipe(existing, &recipe) => Ok(()),
            Some(_) => Err(ConfigError::DuplicateRecipe {
                target: self.graph[node].id.to_string(),
            }),
            None => {
                self.graph[node].recipe = Some(recipe);
                Ok(())
            }
        }
    }

    fn connect(&mut self, from: NodeIndex, to: NodeIndex, kind: EdgeKind) -> bool {
        match self.graph.find_edge(from, to) {
            Some(edge) => {
                // A declared edge wins over a discovered one.
                if kind == EdgeKind::Declared {
                    self.graph[edge] = EdgeKind::Declared;
                }
                false
            }
            None => {
                self.graph.add_edge(from, to, kind);
                true
            }
        }
    }

    /// Add a declared edge. Adding the same edge twice is a no-op.
    pub fn add_dependency(&mut self, target: TargetId, prerequisite: TargetId) -> bool {
        let from = self.ensure(target, false);
        let to = self.ensure(prerequisite, false);
        self.connect(from, to, EdgeKind::Declared)
    }

    /// Add an edge learned from a dependency listing.
    pub fn add_discovered(&mut self, target: TargetId, prerequisite: TargetId) -> bool {
        let from = self.ensure(target, false);
        let to = self.ensure(prerequisite, true);
        self.connect(from, to, EdgeKind::Discovered)
    }

    /// Make each target depend on the one after it.
    pub fn add_chain<I>(&mut self, targets: I)
    where
        I: IntoIterator<Item = TargetId>,
    {
        let mut iter = targets.into_iter();
        let Some(mut previous) = iter.next() else {
            return;
        };
        self.ensure(previous.clone(), false);
        for next in iter {
            self.add_dependency(previous, next.clone());
            previous = next;
        }
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn recipe(&self, id: &TargetId) -> Option<&Arc<dyn Recipe>> {
        self.index
            .get(id)
            .and_then(|&node| self.graph[node].recipe.as_ref())
    }

    /// Iterate over all targets in insertion order.
    pub fn targets(&self) -> impl Iterator<Item = &TargetNode> {
        self.graph.node_weights()
    }

    /// Direct prerequisites of a target, in the order they were added.
    pub fn prerequisites(&self, id: &TargetId) -> Vec<(&TargetId, EdgeKind)> {
        match self.index.get(id) {
            Some(&node) => self
                .children(node)
                .into_iter()
                .map(|(child, kind)| (&self.graph[child].id, kind))
                .collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn node_index(&self, id: &TargetId) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    pub(crate) fn node(&self, node: NodeIndex) -> &TargetNode {
        &self.graph[node]
    }

    pub(crate) fn children(&self, node: NodeIndex) -> Vec<(NodeIndex, EdgeKind)> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| (e.id().index(), e.target(), *e.weight()))
            .collect();
        edges.sort_by_key(|(order, _, _)| *order);
        edges.into_iter().map(|(_, n, kind)| (n, kind)).collect()
    }

    pub(crate) fn parents(&self, node: NodeIndex) -> impl Iterator<Item = (NodeIndex, EdgeKind)> + '_ {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| (e.source(), *e.weight()))
    }

    /// The target plus all of its transitive prerequisites.
    ///
    /// Prerequisites come before their dependents and every node appears
    /// exactly once. Fails on the first cycle reachable from `target`.
    pub fn resolve_closure(&self, target: &TargetId) -> Result<Vec<TargetId>, ConfigError> {
        let start = self.node_index(target).ok_or_else(|| ConfigError::UnknownTarget {
            namespace: target.namespace().unwrap_or_default().to_string(),
            reference: target.to_string(),
        })?;
        Ok(self
            .closure_of(start)?
            .into_iter()
            .map(|node| self.graph[node].id.clone())
            .collect())
    }

    pub(crate) fn closure_of(&self, start: NodeIndex) -> Result<Vec<NodeIndex>, ConfigError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        let pending = |node| -> Vec<NodeIndex> {
            let mut children: Vec<_> = self.children(node).into_iter().map(|(n, _)| n).collect();
            children.reverse();
            children
        };

        let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();
        let mut order = Vec::new();
        let mut stack = vec![(start, pending(start))];
        marks.insert(start, Mark::Visiting);

        loop {
            let Some(frame) = stack.last_mut() else {
                break;
            };
            let node = frame.0;

            match frame.1.pop() {
                Some(child) => match marks.get(&child) {
                    Some(Mark::Done) => {}
                    Some(Mark::Visiting) => {
                        let begin = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[begin..]
                            .iter()
                            .map(|(n, _)| self.graph[*n].id.to_string())
                            .collect();
                        cycle.push(self.graph[child].id.to_string());
                        return Err(ConfigError::CyclicDependency { cycle });
                    }
                    None => {
                        marks.insert(child, Mark::Visiting);
                        stack.push((child, pending(child)));
                    }
                },
                None => {
                    marks.insert(node, Mark::Done);
                    order.push(node);
                    stack.pop();
                }
            }
        }

        Ok(order)
    }

    /// Union another graph into this one.
    pub fn merge(&mut self, other: &TargetGraph) -> Result<(), ConfigError> {
        for node in other.targets() {
            let id = node.id.clone();
            if node.discovered {
                self.ensure(id, true);
            } else {
                self.declare(id, node.recipe.clone())?;
            }
        }
        for edge in other.graph.raw_edges() {
            let from = other.graph[edge.source()].id.clone();
            let to = other.graph[edge.target()].id.clone();
            match edge.weight {
                EdgeKind::Declared => self.add_dependency(from, to),
                EdgeKind::Discovered => self.add_discovered(from, to),
            };
        }
        Ok(())
    }
}
