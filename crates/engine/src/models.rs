//! Flow graph model.
//!
//! These types are the source of truth for what a flow looks like in
//! memory. They deserialize from the JSON the flow builder persists, in
//! either the flat shape or the canvas shape (`data.block.*`), and always
//! serialize flat.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// BlockCategory
// ---------------------------------------------------------------------------

/// Family a block belongs to. Only triggers can start a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BlockCategory {
    #[serde(alias = "trigger")]
    Trigger,
    #[serde(alias = "condition")]
    Condition,
    #[serde(alias = "action")]
    Action,
    #[serde(alias = "ai", alias = "Ai")]
    Ai,
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A single block placed in the flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "NodeRepr")]
pub struct Node {
    /// Unique identifier within this flow (referenced by edges).
    pub id: String,
    /// Maps to a registered `BlockHandler`.
    pub block_id: String,
    pub block_name: String,
    pub block_category: BlockCategory,
    /// Passed verbatim to the handler on every visit.
    pub config: Value,
}

impl Node {
    pub fn new(
        id: impl Into<String>,
        block_id: impl Into<String>,
        category: BlockCategory,
    ) -> Self {
        let block_id = block_id.into();
        Self {
            id: id.into(),
            block_name: block_id.clone(),
            block_id,
            block_category: category,
            config: Value::Object(Default::default()),
        }
    }

    pub fn trigger(id: impl Into<String>, block_id: impl Into<String>) -> Self {
        Self::new(id, block_id, BlockCategory::Trigger)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.block_name = name.into();
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.block_category == BlockCategory::Trigger
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NodeRepr {
    #[serde(rename_all = "camelCase")]
    Flat {
        id: String,
        block_id: String,
        #[serde(default)]
        block_name: Option<String>,
        block_category: BlockCategory,
        #[serde(default)]
        config: Value,
    },
    Canvas {
        id: String,
        data: CanvasData,
    },
}

#[derive(Deserialize)]
struct CanvasData {
    block: CanvasBlock,
    #[serde(default)]
    config: Value,
}

#[derive(Deserialize)]
struct CanvasBlock {
    id: String,
    #[serde(default)]
    name: Option<String>,
    category: BlockCategory,
}

impl From<NodeRepr> for Node {
    fn from(repr: NodeRepr) -> Self {
        match repr {
            NodeRepr::Flat {
                id,
                block_id,
                block_name,
                block_category,
                config,
            } => Node {
                id,
                block_name: block_name.unwrap_or_else(|| block_id.clone()),
                block_id,
                block_category,
                config,
            },
            NodeRepr::Canvas { id, data } => Node {
                id,
                block_name: data.block.name.unwrap_or_else(|| data.block.id.clone()),
                block_id: data.block.id,
                block_category: data.block.category,
                config: data.config,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed transition between two nodes.
///
/// An edge with a `source_handle` is only followed when the source handler
/// returns that exact output label; an edge without one is the default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    #[serde(alias = "source")]
    pub source_node_id: String,
    #[serde(alias = "target")]
    pub target_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
}

impl Edge {
    /// Unconditional edge.
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        let from = from.into();
        let to = to.into();
        Self {
            id: format!("{from}->{to}"),
            source_node_id: from,
            target_node_id: to,
            source_handle: None,
        }
    }

    /// Edge taken only when the source handler outputs `handle`.
    pub fn on(from: impl Into<String>, handle: impl Into<String>, to: impl Into<String>) -> Self {
        let handle = handle.into();
        let mut edge = Self::new(from, to);
        edge.id = format!("{}:{handle}", edge.id);
        edge.source_handle = Some(handle);
        edge
    }

    /// The routing handle. The canvas stores an empty string for "none".
    pub fn handle(&self) -> Option<&str> {
        self.source_handle.as_deref().filter(|h| !h.is_empty())
    }
}

// ---------------------------------------------------------------------------
// FlowGraph
// ---------------------------------------------------------------------------

/// A complete flow definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl FlowGraph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// First declared trigger node, the entry point of every run.
    pub fn trigger(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_trigger())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_and_canvas_nodes_deserialize_alike() {
        let flat: Node = serde_json::from_value(json!({
            "id": "n1",
            "blockId": "message_received",
            "blockName": "Message reçu",
            "blockCategory": "TRIGGER",
            "config": {}
        }))
        .unwrap();

        let canvas: Node = serde_json::from_value(json!({
            "id": "n1",
            "type": "block",
            "position": { "x": 10, "y": 20 },
            "data": {
                "block": {
                    "id": "message_received",
                    "name": "Message reçu",
                    "category": "TRIGGER"
                },
                "config": {}
            }
        }))
        .unwrap();

        assert_eq!(flat, canvas);
        assert!(flat.is_trigger());
    }

    #[test]
    fn node_serializes_flat() {
        let node = Node::new("a", "condition_if", BlockCategory::Condition)
            .with_config(json!({ "operator": "equals" }));
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            json!({
                "id": "a",
                "blockId": "condition_if",
                "blockName": "condition_if",
                "blockCategory": "CONDITION",
                "config": { "operator": "equals" }
            })
        );
    }

    #[test]
    fn canvas_edge_aliases_and_empty_handles() {
        let edge: Edge = serde_json::from_value(json!({
            "id": "e1", "source": "a", "target": "b", "sourceHandle": ""
        }))
        .unwrap();
        assert_eq!(edge.source_node_id, "a");
        assert_eq!(edge.target_node_id, "b");
        assert_eq!(edge.handle(), None);

        assert_eq!(Edge::on("a", "true", "b").handle(), Some("true"));
    }

    #[test]
    fn trigger_is_first_declared_trigger() {
        let graph = FlowGraph::new(
            vec![
                Node::new("act", "action_send_message", BlockCategory::Action),
                Node::trigger("t1", "message_received"),
                Node::trigger("t2", "new_conversation"),
            ],
            vec![],
        );
        assert_eq!(graph.trigger().map(|n| n.id.as_str()), Some("t1"));
    }
}
