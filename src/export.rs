//! Graph export — a diagnostic dump of nodes and edges to JSON for offline
//! inspection. The core does not render graphs; this is a text dump, not a
//! viewer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{EdgeFilter, GraphError, GraphStore, Node, NodeFilter, NodeKind};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("serialization failed: {0}")]
    Serialization(String),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Which nodes/edges to include in an export.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub kind: Option<NodeKind>,
    pub language: Option<String>,
    pub namespace: Option<String>,
    pub edge_type: Option<String>,
    /// Include only nodes that participate in at least one edge.
    pub connected_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportNode {
    pub identifier: String,
    pub kind: String,
    pub name: String,
    pub source_file: String,
    pub language: Option<String>,
    pub semantic_tags: Vec<String>,
    pub metadata: HashMap<String, String>,
    pub start_line: Option<u32>,
    pub start_column: Option<u32>,
}

impl From<Node> for ExportNode {
    fn from(node: Node) -> Self {
        Self {
            identifier: node.identifier,
            kind: node.kind.as_str().to_string(),
            name: node.name,
            source_file: node.source_file,
            language: node.language,
            semantic_tags: node.semantic_tags.into_iter().collect(),
            metadata: node.metadata,
            start_line: node.start_line,
            start_column: node.start_column,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportEdge {
    pub from_node: String,
    pub to_node: String,
    pub edge_type: String,
    pub weight: f64,
    pub derived: bool,
    pub source_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportMetadata {
    pub node_count: usize,
    pub edge_count: usize,
    pub store_version: u64,
    pub filtered_kind: Option<String>,
    pub filtered_language: Option<String>,
    pub filtered_namespace: Option<String>,
    pub filtered_edge_type: Option<String>,
    pub connected_only: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedGraph {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
    pub metadata: ExportMetadata,
}

/// Build an [`ExportedGraph`] from a store, applying `options`.
pub async fn export_graph(store: &dyn GraphStore, options: &ExportOptions) -> ExportResult<ExportedGraph> {
    let node_filter = NodeFilter {
        kind: options.kind,
        language: options.language.clone(),
        identifier_contains: None,
        namespace: options.namespace.clone(),
        has_semantic_tag: None,
    };
    let mut nodes = store.find_nodes(&node_filter).await?;

    let edge_filter = EdgeFilter {
        edge_type: options.edge_type.clone(),
        subtype_aware: false,
        from_node: None,
        to_node: None,
    };
    let mut edges = store.find_edges(&edge_filter).await?;

    if options.namespace.is_some() || options.kind.is_some() || options.language.is_some() {
        let in_scope: std::collections::HashSet<&str> = nodes.iter().map(|n| n.identifier.as_str()).collect();
        edges.retain(|e| in_scope.contains(e.from_node.as_str()) || in_scope.contains(e.to_node.as_str()));
    }

    if options.connected_only {
        let connected: std::collections::HashSet<&str> = edges
            .iter()
            .flat_map(|e| [e.from_node.as_str(), e.to_node.as_str()])
            .collect();
        nodes.retain(|n| connected.contains(n.identifier.as_str()));
    }

    let store_version = store.store_version().await?;

    edges.sort_by(|a, b| (&a.from_node, &a.to_node, &a.edge_type).cmp(&(&b.from_node, &b.to_node, &b.edge_type)));
    nodes.sort_by(|a, b| a.identifier.cmp(&b.identifier));

    let metadata = ExportMetadata {
        node_count: nodes.len(),
        edge_count: edges.len(),
        store_version,
        filtered_kind: options.kind.map(|k| k.as_str().to_string()),
        filtered_language: options.language.clone(),
        filtered_namespace: options.namespace.clone(),
        filtered_edge_type: options.edge_type.clone(),
        connected_only: options.connected_only,
    };

    Ok(ExportedGraph {
        nodes: nodes.into_iter().map(ExportNode::from).collect(),
        edges: edges
            .into_iter()
            .map(|e| ExportEdge {
                from_node: e.from_node,
                to_node: e.to_node,
                edge_type: e.edge_type,
                weight: e.weight,
                derived: e.derived,
                source_file: e.source_file,
            })
            .collect(),
        metadata,
    })
}

/// Serialize an exported graph to pretty-printed JSON.
pub fn to_json(graph: &ExportedGraph) -> ExportResult<String> {
    serde_json::to_string_pretty(graph).map_err(|e| ExportError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Edge, SqliteGraphStore};

    #[tokio::test]
    async fn export_round_trips_through_json() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store
            .upsert_node(Node::new("p/a.ts#file", NodeKind::File, "a.ts", "a.ts"))
            .await
            .unwrap();
        store
            .upsert_node(Node::new("p/b.ts#file", NodeKind::File, "b.ts", "b.ts"))
            .await
            .unwrap();
        store.upsert_edge(Edge::new("p/a.ts#file", "p/b.ts#file", "depends_on")).await.unwrap();

        let graph = export_graph(&store, &ExportOptions::default()).await.unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.edges.len(), 1);

        let json = to_json(&graph).unwrap();
        let parsed: ExportedGraph = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.nodes.len(), 2);
    }

    #[tokio::test]
    async fn connected_only_drops_isolated_nodes() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store
            .upsert_node(Node::new("p/a.ts#file", NodeKind::File, "a.ts", "a.ts"))
            .await
            .unwrap();
        store
            .upsert_node(Node::new("p/b.ts#file", NodeKind::File, "b.ts", "b.ts"))
            .await
            .unwrap();
        store
            .upsert_node(Node::new("p/isolated.ts#file", NodeKind::File, "isolated.ts", "isolated.ts"))
            .await
            .unwrap();
        store.upsert_edge(Edge::new("p/a.ts#file", "p/b.ts#file", "depends_on")).await.unwrap();

        let options = ExportOptions {
            connected_only: true,
            ..Default::default()
        };
        let graph = export_graph(&store, &options).await.unwrap();
        assert_eq!(graph.nodes.len(), 2);
    }
}
