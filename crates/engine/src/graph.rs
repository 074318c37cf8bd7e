//! Graph indexing and publish-time validation.
//!
//! [`FlowIndex`] is the lookup structure the interpreter walks: nodes by ID
//! and outgoing edges per source, both borrowed from the [`FlowGraph`] and
//! kept in declaration order.
//!
//! [`validate_flow`] enforces the rules a flow must satisfy before publishing:
//! 1. Node IDs must be unique within the flow.
//! 2. Every edge must reference valid node IDs (both ends).
//! 3. At least one node must be a trigger.
//! 4. A node may not have two edges for the same handle, nor two default edges.
//!
//! Cycles are allowed; the step budget bounds them at run time.

use std::collections::{HashMap, HashSet};

use crate::models::{Edge, FlowGraph, Node};
use crate::EngineError;

/// Read-only view of a flow indexed by node ID.
#[derive(Debug)]
pub struct FlowIndex<'a> {
    nodes: HashMap<&'a str, &'a Node>,
    outgoing: HashMap<&'a str, Vec<&'a Edge>>,
}

impl<'a> FlowIndex<'a> {
    pub fn new(graph: &'a FlowGraph) -> Self {
        let mut nodes: HashMap<&str, &Node> = HashMap::with_capacity(graph.nodes.len());
        for node in &graph.nodes {
            // First declaration wins for duplicated IDs.
            nodes.entry(node.id.as_str()).or_insert(node);
        }

        let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
        for edge in &graph.edges {
            outgoing
                .entry(edge.source_node_id.as_str())
                .or_default()
                .push(edge);
        }

        Self { nodes, outgoing }
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.nodes.get(id).copied()
    }

    /// Outgoing edges of `id`, in declaration order.
    pub fn edges_from(&self, id: &str) -> &[&'a Edge] {
        self.outgoing.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The edge to follow after `id` produced `output`.
    ///
    /// An edge whose handle equals `output` wins over any default edge, even
    /// one declared earlier; otherwise the first edge without a handle is
    /// taken. `None` when neither exists.
    pub fn next_edge(&self, id: &str, output: Option<&str>) -> Option<&'a Edge> {
        let edges = self.edges_from(id);
        output
            .and_then(|label| edges.iter().find(|e| e.handle() == Some(label)))
            .or_else(|| edges.iter().find(|e| e.handle().is_none()))
            .copied()
    }
}

/// Check the flow against the publish rules.
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] if two nodes share an ID.
/// - [`EngineError::UnknownNodeReference`] if an edge references a missing node.
/// - [`EngineError::NoTriggerFound`] if no node is a trigger.
/// - [`EngineError::AmbiguousRouting`] if a node's outgoing edges overlap.
pub fn validate_flow(graph: &FlowGraph) -> Result<(), EngineError> {
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &graph.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }

    for edge in &graph.edges {
        let ends = [
            (&edge.source_node_id, "source"),
            (&edge.target_node_id, "target"),
        ];
        for (node_id, side) in ends {
            if !seen_ids.contains(node_id.as_str()) {
                return Err(EngineError::UnknownNodeReference {
                    edge_id: edge.id.clone(),
                    node_id: node_id.clone(),
                    side,
                });
            }
        }
    }

    if graph.trigger().is_none() {
        return Err(EngineError::NoTriggerFound);
    }

    let mut routes: HashSet<(&str, Option<&str>)> = HashSet::new();
    for edge in &graph.edges {
        if !routes.insert((edge.source_node_id.as_str(), edge.handle())) {
            return Err(EngineError::AmbiguousRouting {
                node_id: edge.source_node_id.clone(),
                handle: edge.handle().map(str::to_owned),
            });
        }
    }

    Ok(())
}
