//! GraphStore — embedded persistence for nodes, typed edges, and the
//! edge-type registry's backing rows. The schema is a data-driven edge-type
//! table plus a small closed `NodeKind` enum

mod sqlite_store;

pub use sqlite_store::{open_default, SqliteGraphStore};

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("database corruption: {0}")]
    Corruption(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store operation failed: {0}")]
    OperationFailed(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema migration failed: {0}")]
    Migration(String),

    #[error("underlying store error: {0}")]
    Backend(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Node kind,— a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Class,
    Interface,
    Function,
    Method,
    Variable,
    Type,
    Enum,
    Module,
    Library,
    Package,
    Unknown,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Variable => "variable",
            NodeKind::Type => "type",
            NodeKind::Enum => "enum",
            NodeKind::Module => "module",
            NodeKind::Library => "library",
            NodeKind::Package => "package",
            NodeKind::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "file" => NodeKind::File,
            "class" => NodeKind::Class,
            "interface" => NodeKind::Interface,
            "function" => NodeKind::Function,
            "method" => NodeKind::Method,
            "variable" => NodeKind::Variable,
            "type" => NodeKind::Type,
            "enum" => NodeKind::Enum,
            "module" => NodeKind::Module,
            "library" => NodeKind::Library,
            "package" => NodeKind::Package,
            "unknown" => NodeKind::Unknown,
            _ => return None,
        })
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A vertex in the dependency graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub identifier: String,
    pub kind: NodeKind,
    pub name: String,
    pub source_file: String,
    pub language: Option<String>,
    pub semantic_tags: BTreeSet<String>,
    pub metadata: HashMap<String, String>,
    pub start_line: Option<u32>,
    pub start_column: Option<u32>,
}

impl Node {
    pub fn new(identifier: impl Into<String>, kind: NodeKind, name: impl Into<String>, source_file: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            kind,
            name: name.into(),
            source_file: source_file.into(),
            language: None,
            semantic_tags: BTreeSet::new(),
            metadata: HashMap::new(),
            start_line: None,
            start_column: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_position(mut self, line: u32, column: u32) -> Self {
        self.start_line = Some(line);
        self.start_column = Some(column);
        self
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.semantic_tags.extend(tags);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge `other` into `self` per the upsert invariant: set
    /// union of tags, last-writer-wins on scalar metadata entries.
    pub fn merge_from(&mut self, other: &Node) {
        self.semantic_tags.extend(other.semantic_tags.iter().cloned());
        for (k, v) in &other.metadata {
            self.metadata.insert(k.clone(), v.clone());
        }
        if self.language.is_none() {
            self.language = other.language.clone();
        }
        if self.start_line.is_none() {
            self.start_line = other.start_line;
            self.start_column = other.start_column;
        }
    }
}

/// A directed relationship between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from_node: String,
    pub to_node: String,
    pub edge_type: String,
    pub properties: HashMap<String, String>,
    pub weight: f64,
    pub source_file: Option<String>,
    pub derived: bool,
}

impl Edge {
    pub fn new(from_node: impl Into<String>, to_node: impl Into<String>, edge_type: impl Into<String>) -> Self {
        Self {
            from_node: from_node.into(),
            to_node: to_node.into(),
            edge_type: edge_type.into(),
            properties: HashMap::new(),
            weight: 1.0,
            source_file: None,
            derived: false,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn derived(mut self, via: impl Into<String>) -> Self {
        self.derived = true;
        self.properties.insert("via".to_string(), via.into());
        self
    }

    /// Digest used for the `(from, to, type, properties-digest)` uniqueness
    /// key. Sorted so key order never matters.
    pub fn properties_digest(&self) -> String {
        let mut entries: Vec<(&String, &String)> = self.properties.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        let mut hasher = blake3::Hasher::new();
        for (k, v) in entries {
            hasher.update(k.as_bytes());
            hasher.update(b"\0");
            hasher.update(v.as_bytes());
            hasher.update(b"\0");
        }
        hasher.finalize().to_hex().to_string()
    }
}

/// A declared relationship kind in the edge-type registry;
/// the store's backing row — the in-memory catalogue lives in
/// `crate::edge_types`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTypeRecord {
    pub name: String,
    pub parent: Option<String>,
    pub is_directed: bool,
    pub is_transitive: bool,
    pub is_inheritable: bool,
    pub description: String,
}

impl EdgeTypeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            is_directed: true,
            is_transitive: false,
            is_inheritable: false,
            description: String::new(),
        }
    }
}

/// Filter predicate for [`GraphStore::find_nodes`].
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub kind: Option<NodeKind>,
    pub language: Option<String>,
    /// Substring match against the identifier. Globbing is the
    /// orchestrator's job, not the store's.
    pub identifier_contains: Option<String>,
    pub namespace: Option<String>,
    pub has_semantic_tag: Option<String>,
}

/// Filter predicate for [`GraphStore::find_edges`].
#[derive(Debug, Clone, Default)]
pub struct EdgeFilter {
    pub edge_type: Option<String>,
    /// When true, `edge_type` also matches any registered descendant type
    /// (subtype-aware lookup).
    pub subtype_aware: bool,
    pub from_node: Option<String>,
    pub to_node: Option<String>,
}

/// One write applied inside [`GraphStore::with_transaction`].
#[derive(Debug, Clone)]
pub enum WriteOp {
    UpsertNode(Node),
    UpsertEdge(Edge),
    BindNamespace {
        namespace: String,
        identifier: String,
        included_by: Option<String>,
    },
}

/// Persistent, embedded graph store. Implementations serialize
/// writers while permitting
/// concurrent readers.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert-or-merge a node by identifier. Returns the (monotonic) store
    /// version observed immediately after the write.
    async fn upsert_node(&self, node: Node) -> GraphResult<u64>;

    /// Insert-or-merge an edge by `(from, to, type, properties-digest)`;
    /// weight becomes `max(existing, new)`.
    async fn upsert_edge(&self, edge: Edge) -> GraphResult<u64>;

    /// Apply every `WriteOp` atomically: either all commit, or (on the
    /// first failure) none do and the store is left exactly as it was
    /// before the call. Returns the store version observed after commit.
    async fn with_transaction(&self, ops: Vec<WriteOp>) -> GraphResult<u64>;

    async fn get_node(&self, identifier: &str) -> GraphResult<Option<Node>>;

    async fn find_nodes(&self, filter: &NodeFilter) -> GraphResult<Vec<Node>>;

    async fn find_edges(&self, filter: &EdgeFilter) -> GraphResult<Vec<Edge>>;

    /// Bind a node to a namespace (side table, not a node property).
    async fn bind_namespace(&self, namespace: &str, identifier: &str, included_by: Option<&str>) -> GraphResult<()>;

    /// Remove namespace-membership rows for `namespace`; nodes and edges
    /// remain.
    async fn clear_namespace_bindings(&self, namespace: &str) -> GraphResult<()>;

    async fn namespaces_of(&self, identifier: &str) -> GraphResult<Vec<String>>;

    /// Register or update an edge-type row. Registration at the store layer
    /// never validates forest invariants — that is `EdgeTypeRegistry`'s job;
    /// the store just persists what it is told.
    async fn put_edge_type(&self, record: EdgeTypeRecord) -> GraphResult<()>;

    async fn get_edge_type(&self, name: &str) -> GraphResult<Option<EdgeTypeRecord>>;

    async fn all_edge_types(&self) -> GraphResult<Vec<EdgeTypeRecord>>;

    /// Current monotonically increasing store version.
    async fn store_version(&self) -> GraphResult<u64>;

    async fn node_count(&self) -> GraphResult<u64>;

    async fn edge_count(&self) -> GraphResult<u64>;

    async fn all_nodes(&self) -> GraphResult<Vec<Node>>;

    async fn all_edges(&self) -> GraphResult<Vec<Edge>>;
}
