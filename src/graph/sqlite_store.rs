//! Turso-backed [`GraphStore`] implementation.
//!
//! Uses a single `tokio::sync::Mutex<Connection>` as a writer guard and a
//! separate read-only connection, rather than a global writer/reader gate
//! registry — one writer at a time is the only ordering guarantee required
//! here, not cross-process gating.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};
use turso::{Builder, Connection, Database, Value};

use super::{Edge, EdgeFilter, EdgeTypeRecord, GraphError, GraphResult, GraphStore, Node, NodeFilter, NodeKind, WriteOp};

/// A single embedded database file per project.
pub struct SqliteGraphStore {
    #[allow(dead_code)]
    database: Database,
    writer: Mutex<Connection>,
    reader: Connection,
    version: AtomicU64,
}

impl SqliteGraphStore {
    pub async fn open(path: impl AsRef<Path>) -> GraphResult<Self> {
        Self::open_inner(path.as_ref().to_string_lossy().into_owned()).await
    }

    pub async fn open_in_memory() -> GraphResult<Self> {
        Self::open_inner(":memory:".to_string()).await
    }

    async fn open_inner(path: String) -> GraphResult<Self> {
        if path != ":memory:" {
            if let Some(parent) = Path::new(&path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let database = Builder::new_local(&path)
            .build()
            .await
            .map_err(|e| GraphError::Backend(format!("failed to open store at '{path}': {e}")))?;

        let writer = database
            .connect()
            .map_err(|e| GraphError::Backend(format!("failed to open writer connection: {e}")))?;
        let reader = database
            .connect()
            .map_err(|e| GraphError::Backend(format!("failed to open reader connection: {e}")))?;

        init_schema(&writer).await?;
        seed_edge_types(&writer).await?;

        Ok(Self {
            database,
            writer: Mutex::new(writer),
            reader,
            version: AtomicU64::new(0),
        })
    }

    fn bump_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }
}

async fn init_schema(conn: &Connection) -> GraphResult<()> {
    let statements = [
        r#"CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS nodes (
            identifier TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            source_file TEXT NOT NULL,
            language TEXT,
            semantic_tags TEXT NOT NULL,
            metadata TEXT NOT NULL,
            start_line INTEGER,
            start_column INTEGER
        )"#,
        r#"CREATE TABLE IF NOT EXISTS edges (
            from_node TEXT NOT NULL,
            to_node TEXT NOT NULL,
            edge_type TEXT NOT NULL,
            properties_digest TEXT NOT NULL,
            properties TEXT NOT NULL,
            weight REAL NOT NULL,
            source_file TEXT,
            derived INTEGER NOT NULL,
            PRIMARY KEY (from_node, to_node, edge_type, properties_digest)
        )"#,
        r#"CREATE TABLE IF NOT EXISTS edge_types (
            name TEXT PRIMARY KEY,
            parent TEXT,
            is_directed INTEGER NOT NULL,
            is_transitive INTEGER NOT NULL,
            is_inheritable INTEGER NOT NULL,
            description TEXT NOT NULL
        )"#,
        r#"CREATE TABLE IF NOT EXISTS namespace_membership (
            namespace TEXT NOT NULL,
            identifier TEXT NOT NULL,
            included_by TEXT,
            PRIMARY KEY (namespace, identifier)
        )"#,
        "CREATE INDEX IF NOT EXISTS idx_nodes_kind_language ON nodes(kind, language)",
        "CREATE INDEX IF NOT EXISTS idx_edges_type_from ON edges(edge_type, from_node)",
        "CREATE INDEX IF NOT EXISTS idx_edges_type_to ON edges(edge_type, to_node)",
        "CREATE INDEX IF NOT EXISTS idx_namespace_node ON namespace_membership(namespace, identifier)",
    ];

    for sql in statements {
        conn.execute(sql, ())
            .await
            .map_err(|e| GraphError::Migration(format!("{sql}: {e}")))?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO migrations (version, applied_at) VALUES (1, 'initial')",
        (),
    )
    .await
    .map_err(|e| GraphError::Migration(e.to_string()))?;

    Ok(())
}

/// Seed `edge_types` from the built-in catalogue on store open. `INSERT OR
/// IGNORE` so reopening a store that already has registry rows (including
/// ones a prior run registered beyond the built-ins) never overwrites them.
async fn seed_edge_types(conn: &Connection) -> GraphResult<()> {
    for record in crate::edge_types::builtin_catalogue() {
        conn.execute(
            r#"INSERT OR IGNORE INTO edge_types (name, parent, is_directed, is_transitive, is_inheritable, description)
               VALUES (?, ?, ?, ?, ?, ?)"#,
            (vec![
                Value::Text(record.name.clone()),
                record.parent.clone().map(Value::Text).unwrap_or(Value::Null),
                Value::Integer(if record.is_directed { 1 } else { 0 }),
                Value::Integer(if record.is_transitive { 1 } else { 0 }),
                Value::Integer(if record.is_inheritable { 1 } else { 0 }),
                Value::Text(record.description.clone()),
            ]),
        )
        .await
        .map_err(|e| GraphError::Migration(format!("seed_edge_types '{}': {e}", record.name)))?;
    }
    Ok(())
}

fn tags_to_text(tags: &BTreeSet<String>) -> String {
    serde_json::to_string(tags).unwrap_or_default()
}

fn tags_from_text(text: &str) -> BTreeSet<String> {
    serde_json::from_str(text).unwrap_or_default()
}

fn map_to_text(map: &HashMap<String, String>) -> String {
    serde_json::to_string(map).unwrap_or_default()
}

fn map_from_text(text: &str) -> HashMap<String, String> {
    serde_json::from_str(text).unwrap_or_default()
}

fn text_value(row_value: Result<Value, turso::Error>) -> GraphResult<String> {
    match row_value {
        Ok(Value::Text(s)) => Ok(s),
        Ok(Value::Null) => Ok(String::new()),
        Ok(other) => Err(GraphError::Corruption(format!("expected TEXT column, got {other:?}"))),
        Err(e) => Err(GraphError::Backend(e.to_string())),
    }
}

fn opt_text_value(row_value: Result<Value, turso::Error>) -> GraphResult<Option<String>> {
    match row_value {
        Ok(Value::Text(s)) => Ok(Some(s)),
        Ok(Value::Null) => Ok(None),
        Ok(other) => Err(GraphError::Corruption(format!("expected TEXT column, got {other:?}"))),
        Err(e) => Err(GraphError::Backend(e.to_string())),
    }
}

fn opt_int_value(row_value: Result<Value, turso::Error>) -> GraphResult<Option<i64>> {
    match row_value {
        Ok(Value::Integer(i)) => Ok(Some(i)),
        Ok(Value::Null) => Ok(None),
        Ok(other) => Err(GraphError::Corruption(format!("expected INTEGER column, got {other:?}"))),
        Err(e) => Err(GraphError::Backend(e.to_string())),
    }
}

fn int_value(row_value: Result<Value, turso::Error>) -> GraphResult<i64> {
    match row_value {
        Ok(Value::Integer(i)) => Ok(i),
        Ok(other) => Err(GraphError::Corruption(format!("expected INTEGER column, got {other:?}"))),
        Err(e) => Err(GraphError::Backend(e.to_string())),
    }
}

fn real_value(row_value: Result<Value, turso::Error>) -> GraphResult<f64> {
    match row_value {
        Ok(Value::Real(f)) => Ok(f),
        Ok(Value::Integer(i)) => Ok(i as f64),
        Ok(other) => Err(GraphError::Corruption(format!("expected REAL column, got {other:?}"))),
        Err(e) => Err(GraphError::Backend(e.to_string())),
    }
}

fn row_to_node(row: &turso::Row) -> GraphResult<Node> {
    let identifier = text_value(row.get_value(0))?;
    let kind_str = text_value(row.get_value(1))?;
    let kind = NodeKind::from_str(&kind_str)
        .ok_or_else(|| GraphError::Corruption(format!("unknown node kind '{kind_str}' in store")))?;
    let name = text_value(row.get_value(2))?;
    let source_file = text_value(row.get_value(3))?;
    let language = opt_text_value(row.get_value(4))?;
    let semantic_tags = tags_from_text(&text_value(row.get_value(5))?);
    let metadata = map_from_text(&text_value(row.get_value(6))?);
    let start_line = opt_int_value(row.get_value(7))?.map(|v| v as u32);
    let start_column = opt_int_value(row.get_value(8))?.map(|v| v as u32);

    Ok(Node {
        identifier,
        kind,
        name,
        source_file,
        language,
        semantic_tags,
        metadata,
        start_line,
        start_column,
    })
}

fn row_to_edge(row: &turso::Row) -> GraphResult<Edge> {
    let from_node = text_value(row.get_value(0))?;
    let to_node = text_value(row.get_value(1))?;
    let edge_type = text_value(row.get_value(2))?;
    let properties = map_from_text(&text_value(row.get_value(3))?);
    let weight = real_value(row.get_value(4))?;
    let source_file = opt_text_value(row.get_value(5))?;
    let derived = int_value(row.get_value(6))? != 0;

    Ok(Edge {
        from_node,
        to_node,
        edge_type,
        properties,
        weight,
        source_file,
        derived,
    })
}

/// Insert-or-merge a node using `conn` directly, without locking or bumping
/// the store version — shared by the single-write and transactional paths.
async fn upsert_node_on(conn: &Connection, node: Node) -> GraphResult<()> {
    let mut rows = conn
        .query(
            "SELECT semantic_tags, metadata, language, start_line, start_column FROM nodes WHERE identifier = ?",
            [Value::Text(node.identifier.clone())],
        )
        .await
        .map_err(|e| GraphError::Backend(e.to_string()))?;

    let existing = rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))?;
    let mut merged = node.clone();
    if let Some(row) = existing {
        let mut existing_node = node.clone();
        existing_node.semantic_tags = tags_from_text(&text_value(row.get_value(0))?);
        existing_node.metadata = map_from_text(&text_value(row.get_value(1))?);
        existing_node.language = opt_text_value(row.get_value(2))?;
        existing_node.start_line = opt_int_value(row.get_value(3))?.map(|v| v as u32);
        existing_node.start_column = opt_int_value(row.get_value(4))?.map(|v| v as u32);
        merged = existing_node;
        merged.merge_from(&node);
    }
    drop(rows);

    conn.execute(
        r#"INSERT INTO nodes (identifier, kind, name, source_file, language, semantic_tags, metadata, start_line, start_column)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(identifier) DO UPDATE SET
               kind = excluded.kind,
               name = excluded.name,
               source_file = excluded.source_file,
               language = excluded.language,
               semantic_tags = excluded.semantic_tags,
               metadata = excluded.metadata,
               start_line = excluded.start_line,
               start_column = excluded.start_column"#,
        (vec![
            Value::Text(merged.identifier.clone()),
            Value::Text(merged.kind.as_str().to_string()),
            Value::Text(merged.name.clone()),
            Value::Text(merged.source_file.clone()),
            merged.language.clone().map(Value::Text).unwrap_or(Value::Null),
            Value::Text(tags_to_text(&merged.semantic_tags)),
            Value::Text(map_to_text(&merged.metadata)),
            merged.start_line.map(|v| Value::Integer(v as i64)).unwrap_or(Value::Null),
            merged.start_column.map(|v| Value::Integer(v as i64)).unwrap_or(Value::Null),
        ]),
    )
    .await
    .map_err(|e| GraphError::Backend(format!("upsert_node: {e}")))?;

    Ok(())
}

/// Insert-or-merge an edge using `conn` directly, without locking or bumping
/// the store version — shared by the single-write and transactional paths.
async fn upsert_edge_on(conn: &Connection, edge: Edge) -> GraphResult<()> {
    let digest = edge.properties_digest();

    let mut rows = conn
        .query(
            "SELECT weight FROM edges WHERE from_node = ? AND to_node = ? AND edge_type = ? AND properties_digest = ?",
            (vec![
                Value::Text(edge.from_node.clone()),
                Value::Text(edge.to_node.clone()),
                Value::Text(edge.edge_type.clone()),
                Value::Text(digest.clone()),
            ]),
        )
        .await
        .map_err(|e| GraphError::Backend(e.to_string()))?;
    let existing_weight = match rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))? {
        Some(row) => Some(real_value(row.get_value(0))?),
        None => None,
    };
    drop(rows);

    let weight = existing_weight.map(|w| w.max(edge.weight)).unwrap_or(edge.weight);

    conn.execute(
        r#"INSERT INTO edges (from_node, to_node, edge_type, properties_digest, properties, weight, source_file, derived)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(from_node, to_node, edge_type, properties_digest) DO UPDATE SET
               weight = excluded.weight,
               source_file = excluded.source_file,
               derived = excluded.derived"#,
        (vec![
            Value::Text(edge.from_node.clone()),
            Value::Text(edge.to_node.clone()),
            Value::Text(edge.edge_type.clone()),
            Value::Text(digest),
            Value::Text(map_to_text(&edge.properties)),
            Value::Real(weight),
            edge.source_file.clone().map(Value::Text).unwrap_or(Value::Null),
            Value::Integer(if edge.derived { 1 } else { 0 }),
        ]),
    )
    .await
    .map_err(|e| GraphError::Backend(format!("upsert_edge: {e}")))?;

    Ok(())
}

/// Insert-or-update a namespace-membership row using `conn` directly,
/// without locking or bumping the store version.
async fn bind_namespace_on(conn: &Connection, namespace: &str, identifier: &str, included_by: Option<&str>) -> GraphResult<()> {
    conn.execute(
        r#"INSERT INTO namespace_membership (namespace, identifier, included_by)
           VALUES (?, ?, ?)
           ON CONFLICT(namespace, identifier) DO UPDATE SET included_by = excluded.included_by"#,
        (vec![
            Value::Text(namespace.to_string()),
            Value::Text(identifier.to_string()),
            included_by.map(|s| Value::Text(s.to_string())).unwrap_or(Value::Null),
        ]),
    )
    .await
    .map_err(|e| GraphError::Backend(format!("bind_namespace: {e}")))?;
    Ok(())
}

/// Roll back the currently open transaction, logging but ignoring failures
/// (the connection is about to be released to the next writer regardless).
async fn rollback(conn: &Connection, context: &str) {
    if let Err(e) = conn.execute("ROLLBACK", ()).await {
        warn!(context, error = %e, "transaction rollback failed");
    }
}

#[async_trait::async_trait]
impl GraphStore for SqliteGraphStore {
    async fn upsert_node(&self, node: Node) -> GraphResult<u64> {
        let guard = self.writer.lock().await;
        upsert_node_on(&guard, node).await?;
        Ok(self.bump_version())
    }

    async fn upsert_edge(&self, edge: Edge) -> GraphResult<u64> {
        let guard = self.writer.lock().await;
        upsert_edge_on(&guard, edge).await?;
        Ok(self.bump_version())
    }

    async fn with_transaction(&self, ops: Vec<WriteOp>) -> GraphResult<u64> {
        let guard = self.writer.lock().await;
        guard
            .execute("BEGIN IMMEDIATE", ())
            .await
            .map_err(|e| GraphError::Backend(format!("BEGIN: {e}")))?;

        for op in ops {
            let result = match op {
                WriteOp::UpsertNode(node) => upsert_node_on(&guard, node).await,
                WriteOp::UpsertEdge(edge) => upsert_edge_on(&guard, edge).await,
                WriteOp::BindNamespace {
                    namespace,
                    identifier,
                    included_by,
                } => bind_namespace_on(&guard, &namespace, &identifier, included_by.as_deref()).await,
            };
            if let Err(e) = result {
                rollback(&guard, "with_transaction").await;
                return Err(e);
            }
        }

        guard
            .execute("COMMIT", ())
            .await
            .map_err(|e| GraphError::Backend(format!("COMMIT: {e}")))?;

        Ok(self.bump_version())
    }

    async fn get_node(&self, identifier: &str) -> GraphResult<Option<Node>> {
        let mut rows = self
            .reader
            .query(
                "SELECT identifier, kind, name, source_file, language, semantic_tags, metadata, start_line, start_column FROM nodes WHERE identifier = ?",
                [Value::Text(identifier.to_string())],
            )
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;

        match rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))? {
            Some(row) => Ok(Some(row_to_node(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_nodes(&self, filter: &NodeFilter) -> GraphResult<Vec<Node>> {
        let mut sql = String::from(
            "SELECT identifier, kind, name, source_file, language, semantic_tags, metadata, start_line, start_column FROM nodes n WHERE 1=1",
        );
        let mut params: Vec<Value> = Vec::new();

        if let Some(kind) = filter.kind {
            sql.push_str(" AND n.kind = ?");
            params.push(Value::Text(kind.as_str().to_string()));
        }
        if let Some(language) = &filter.language {
            sql.push_str(" AND n.language = ?");
            params.push(Value::Text(language.clone()));
        }
        if let Some(pattern) = &filter.identifier_contains {
            sql.push_str(" AND n.identifier LIKE ?");
            params.push(Value::Text(format!("%{pattern}%")));
        }
        if let Some(tag) = &filter.has_semantic_tag {
            sql.push_str(" AND n.semantic_tags LIKE ?");
            params.push(Value::Text(format!("%\"{tag}\"%")));
        }
        if let Some(namespace) = &filter.namespace {
            sql.push_str(" AND n.identifier IN (SELECT identifier FROM namespace_membership WHERE namespace = ?)");
            params.push(Value::Text(namespace.clone()));
        }

        let mut rows = self
            .reader
            .query(&sql, params)
            .await
            .map_err(|e| GraphError::Backend(format!("find_nodes: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))? {
            out.push(row_to_node(&row)?);
        }
        Ok(out)
    }

    async fn find_edges(&self, filter: &EdgeFilter) -> GraphResult<Vec<Edge>> {
        let mut sql = String::from(
            "SELECT from_node, to_node, edge_type, properties, weight, source_file, derived FROM edges WHERE 1=1",
        );
        let mut params: Vec<Value> = Vec::new();

        if let Some(edge_type) = &filter.edge_type {
            if filter.subtype_aware {
                sql.push_str(" AND edge_type IN (WITH RECURSIVE descendants(name) AS (SELECT ? UNION ALL SELECT edge_types.name FROM edge_types JOIN descendants ON edge_types.parent = descendants.name) SELECT name FROM descendants)");
                params.push(Value::Text(edge_type.clone()));
            } else {
                sql.push_str(" AND edge_type = ?");
                params.push(Value::Text(edge_type.clone()));
            }
        }
        if let Some(from_node) = &filter.from_node {
            sql.push_str(" AND from_node = ?");
            params.push(Value::Text(from_node.clone()));
        }
        if let Some(to_node) = &filter.to_node {
            sql.push_str(" AND to_node = ?");
            params.push(Value::Text(to_node.clone()));
        }

        let mut rows = self
            .reader
            .query(&sql, params)
            .await
            .map_err(|e| GraphError::Backend(format!("find_edges: {e}")))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))? {
            out.push(row_to_edge(&row)?);
        }
        Ok(out)
    }

    async fn bind_namespace(&self, namespace: &str, identifier: &str, included_by: Option<&str>) -> GraphResult<()> {
        let guard = self.writer.lock().await;
        bind_namespace_on(&guard, namespace, identifier, included_by).await?;
        self.bump_version();
        Ok(())
    }

    async fn clear_namespace_bindings(&self, namespace: &str) -> GraphResult<()> {
        let guard = self.writer.lock().await;
        guard
            .execute(
                "DELETE FROM namespace_membership WHERE namespace = ?",
                [Value::Text(namespace.to_string())],
            )
            .await
            .map_err(|e| GraphError::Backend(format!("clear_namespace_bindings: {e}")))?;
        self.bump_version();
        Ok(())
    }

    async fn namespaces_of(&self, identifier: &str) -> GraphResult<Vec<String>> {
        let mut rows = self
            .reader
            .query(
                "SELECT namespace FROM namespace_membership WHERE identifier = ?",
                [Value::Text(identifier.to_string())],
            )
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))? {
            out.push(text_value(row.get_value(0))?);
        }
        Ok(out)
    }

    async fn put_edge_type(&self, record: EdgeTypeRecord) -> GraphResult<()> {
        let guard = self.writer.lock().await;
        guard
            .execute(
                r#"INSERT INTO edge_types (name, parent, is_directed, is_transitive, is_inheritable, description)
                   VALUES (?, ?, ?, ?, ?, ?)
                   ON CONFLICT(name) DO UPDATE SET
                       parent = excluded.parent,
                       is_directed = excluded.is_directed,
                       is_transitive = excluded.is_transitive,
                       is_inheritable = excluded.is_inheritable,
                       description = excluded.description"#,
                (vec![
                    Value::Text(record.name.clone()),
                    record.parent.clone().map(Value::Text).unwrap_or(Value::Null),
                    Value::Integer(if record.is_directed { 1 } else { 0 }),
                    Value::Integer(if record.is_transitive { 1 } else { 0 }),
                    Value::Integer(if record.is_inheritable { 1 } else { 0 }),
                    Value::Text(record.description.clone()),
                ]),
            )
            .await
            .map_err(|e| GraphError::Backend(format!("put_edge_type: {e}")))?;
        self.bump_version();
        Ok(())
    }

    async fn get_edge_type(&self, name: &str) -> GraphResult<Option<EdgeTypeRecord>> {
        let mut rows = self
            .reader
            .query(
                "SELECT name, parent, is_directed, is_transitive, is_inheritable, description FROM edge_types WHERE name = ?",
                [Value::Text(name.to_string())],
            )
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        match rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))? {
            Some(row) => Ok(Some(row_to_edge_type(&row)?)),
            None => Ok(None),
        }
    }

    async fn all_edge_types(&self) -> GraphResult<Vec<EdgeTypeRecord>> {
        let mut rows = self
            .reader
            .query(
                "SELECT name, parent, is_directed, is_transitive, is_inheritable, description FROM edge_types",
                (),
            )
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| GraphError::Backend(e.to_string()))? {
            out.push(row_to_edge_type(&row)?);
        }
        Ok(out)
    }

    async fn store_version(&self) -> GraphResult<u64> {
        Ok(self.version.load(Ordering::SeqCst))
    }

    async fn node_count(&self) -> GraphResult<u64> {
        let mut rows = self
            .reader
            .query("SELECT COUNT(*) FROM nodes", ())
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?
            .ok_or_else(|| GraphError::Corruption("COUNT(*) returned no rows".to_string()))?;
        Ok(int_value(row.get_value(0))? as u64)
    }

    async fn edge_count(&self) -> GraphResult<u64> {
        let mut rows = self
            .reader
            .query("SELECT COUNT(*) FROM edges", ())
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?;
        let row = rows
            .next()
            .await
            .map_err(|e| GraphError::Backend(e.to_string()))?
            .ok_or_else(|| GraphError::Corruption("COUNT(*) returned no rows".to_string()))?;
        Ok(int_value(row.get_value(0))? as u64)
    }

    async fn all_nodes(&self) -> GraphResult<Vec<Node>> {
        self.find_nodes(&NodeFilter::default()).await
    }

    async fn all_edges(&self) -> GraphResult<Vec<Edge>> {
        self.find_edges(&EdgeFilter::default()).await
    }
}

fn row_to_edge_type(row: &turso::Row) -> GraphResult<EdgeTypeRecord> {
    Ok(EdgeTypeRecord {
        name: text_value(row.get_value(0))?,
        parent: opt_text_value(row.get_value(1))?,
        is_directed: int_value(row.get_value(2))? != 0,
        is_transitive: int_value(row.get_value(3))? != 0,
        is_inheritable: int_value(row.get_value(4))? != 0,
        description: text_value(row.get_value(5))?,
    })
}

/// Convenience constructor resolving the default store location under
/// `.dependency-linker/` beneath a project root.
pub async fn open_default(project_root: impl AsRef<Path>) -> GraphResult<Arc<SqliteGraphStore>> {
    let dir = project_root.as_ref().join(".dependency-linker");
    let path = dir.join("graph.db");
    debug!(path = %path.display(), "opening graph store");
    Ok(Arc::new(SqliteGraphStore::open(path).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upsert_node_merges_tags() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        let n1 = Node::new("p/a.rs#file", NodeKind::File, "a.rs", "a.rs")
            .with_tags(["a".to_string(), "b".to_string()]);
        let n2 = Node::new("p/a.rs#file", NodeKind::File, "a.rs", "a.rs")
            .with_tags(["b".to_string(), "c".to_string()]);

        store.upsert_node(n1).await.unwrap();
        store.upsert_node(n2).await.unwrap();

        let stored = store.get_node("p/a.rs#file").await.unwrap().unwrap();
        assert_eq!(
            stored.semantic_tags,
            BTreeSet::from(["a".to_string(), "b".to_string(), "c".to_string()])
        );
    }

    #[tokio::test]
    async fn upsert_edge_merges_weight_as_max() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store
            .upsert_edge(Edge::new("a", "b", "depends_on").with_weight(1.0))
            .await
            .unwrap();
        store
            .upsert_edge(Edge::new("a", "b", "depends_on").with_weight(3.0))
            .await
            .unwrap();

        let edges = store
            .find_edges(&EdgeFilter {
                edge_type: Some("depends_on".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].weight, 3.0);
    }

    proptest::proptest! {
        #[test]
        fn upserting_two_weights_always_keeps_the_max(a in 0.0f64..1000.0, b in 0.0f64..1000.0) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let store = SqliteGraphStore::open_in_memory().await.unwrap();
                store.upsert_edge(Edge::new("a", "b", "depends_on").with_weight(a)).await.unwrap();
                store.upsert_edge(Edge::new("a", "b", "depends_on").with_weight(b)).await.unwrap();

                let edges = store
                    .find_edges(&EdgeFilter {
                        edge_type: Some("depends_on".to_string()),
                        ..Default::default()
                    })
                    .await
                    .unwrap();
                prop_assert_eq!(edges.len(), 1);
                prop_assert_eq!(edges[0].weight, a.max(b));
                Ok(())
            })?;
        }
    }

    #[tokio::test]
    async fn store_version_is_monotonic() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        let v0 = store.store_version().await.unwrap();
        store
            .upsert_node(Node::new("p/a.rs#file", NodeKind::File, "a.rs", "a.rs"))
            .await
            .unwrap();
        let v1 = store.store_version().await.unwrap();
        assert!(v1 > v0);
    }

    #[tokio::test]
    async fn namespace_bindings_clear_without_touching_nodes() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        store
            .upsert_node(Node::new("p/a.rs#file", NodeKind::File, "a.rs", "a.rs"))
            .await
            .unwrap();
        store.bind_namespace("src", "p/a.rs#file", None).await.unwrap();
        assert_eq!(store.namespaces_of("p/a.rs#file").await.unwrap(), vec!["src".to_string()]);

        store.clear_namespace_bindings("src").await.unwrap();
        assert!(store.namespaces_of("p/a.rs#file").await.unwrap().is_empty());
        assert!(store.get_node("p/a.rs#file").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn edge_types_table_is_seeded_from_builtin_catalogue_at_open() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        let all = store.all_edge_types().await.unwrap();
        assert_eq!(all.len(), crate::edge_types::builtin_catalogue().len());
        let imports_file = store.get_edge_type("imports_file").await.unwrap().unwrap();
        assert_eq!(imports_file.parent.as_deref(), Some("imports"));
    }

    #[tokio::test]
    async fn with_transaction_applies_every_op_atomically() {
        let store = SqliteGraphStore::open_in_memory().await.unwrap();
        let ops = vec![
            WriteOp::UpsertNode(Node::new("p/a.rs#file", NodeKind::File, "a.rs", "a.rs")),
            WriteOp::UpsertNode(Node::new("p/b.rs#file", NodeKind::File, "b.rs", "b.rs")),
            WriteOp::UpsertEdge(Edge::new("p/a.rs#file", "p/b.rs#file", "depends_on")),
            WriteOp::BindNamespace {
                namespace: "src".to_string(),
                identifier: "p/a.rs#file".to_string(),
                included_by: None,
            },
        ];

        store.with_transaction(ops).await.unwrap();

        assert!(store.get_node("p/a.rs#file").await.unwrap().is_some());
        assert!(store.get_node("p/b.rs#file").await.unwrap().is_some());
        assert_eq!(store.edge_count().await.unwrap(), 1);
        assert_eq!(store.namespaces_of("p/a.rs#file").await.unwrap(), vec!["src".to_string()]);
    }

    #[tokio::test]
    async fn unknown_node_kind_in_filter_is_rejected_before_query() {
        // NodeKind::from_str is total over the closed enum; this asserts the
        // round-trip holds for every variant instead of probing storage corruption.
        for kind in [
            NodeKind::File,
            NodeKind::Class,
            NodeKind::Interface,
            NodeKind::Function,
            NodeKind::Method,
            NodeKind::Variable,
            NodeKind::Type,
            NodeKind::Enum,
            NodeKind::Module,
            NodeKind::Library,
            NodeKind::Package,
            NodeKind::Unknown,
        ] {
            assert_eq!(NodeKind::from_str(kind.as_str()), Some(kind));
        }
    }
}
