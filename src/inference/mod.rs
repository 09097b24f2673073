//! InferenceEngine — hierarchical type lookup, transitive closure, and
//! inheritable propagation over a `GraphStore`'s base edges.
//!
//! Each algorithm is a read-only computation; materialising the result as
//! derived edges is a separate, explicit step so callers can inspect before
//! writing. Results are cached in an LRU keyed by
//! `(operation, inputs, registry-version, store-version)` — a bump to either
//! version invalidates every entry computed against the older one, since the
//! key itself changes.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::edge_types::{EdgeTypeError, EdgeTypeRegistry};
use crate::graph::{Edge, EdgeFilter, GraphError, GraphStore};

fn is_cancelled(cancel: Option<&CancellationToken>) -> bool {
    cancel.map(|t| t.is_cancelled()).unwrap_or(false)
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("edge type '{0}' is not transitive")]
    NonTransitiveType(String),

    #[error("edge type '{0}' is not inheritable")]
    NonInheritableType(String),

    #[error(transparent)]
    EdgeType(#[from] EdgeTypeError),

    #[error(transparent)]
    Store(#[from] GraphError),
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// Parameters for [`InferenceEngine::query_transitive`].
#[derive(Debug, Clone)]
pub struct TransitiveOptions {
    pub max_path_length: usize,
    pub detect_cycles: bool,
    pub include_intermediate: bool,
    pub include_self: bool,
    /// Follow any hierarchical descendant of the requested type too, not
    /// just exact matches.
    pub include_type_descendants: bool,
}

impl Default for TransitiveOptions {
    fn default() -> Self {
        Self {
            max_path_length: 10,
            detect_cycles: true,
            include_intermediate: true,
            include_self: false,
            include_type_descendants: false,
        }
    }
}

/// One node reached during a transitive-closure walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReachedNode {
    pub identifier: String,
    pub depth: u32,
    /// The edge labels traversed to reach this node, in order.
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitiveClosureResult {
    pub reached: Vec<ReachedNode>,
    /// Each entry is a cycle's participating node sequence, e.g. `[A, B, A]`.
    pub cycles: Vec<Vec<String>>,
    /// Set when a cancellation signal stopped the walk early. `reached` and
    /// `cycles` hold whatever was accumulated before the stop.
    #[serde(default)]
    pub cancelled: bool,
}

/// Result of an edge lookup that may stop early on cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeQueryResult {
    pub edges: Vec<Edge>,
    /// Set when a cancellation signal stopped the lookup before every
    /// matching type was queried. `edges` holds whatever was found so far.
    #[serde(default)]
    pub cancelled: bool,
}

fn edge_label(edge: &Edge) -> String {
    format!("{}-{}->{}", edge.from_node, edge.edge_type, edge.to_node)
}

struct CacheEntry {
    value: serde_json::Value,
    inserted_at: Instant,
}

/// Cache sizing for computed inference results.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub capacity: usize,
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl: None,
        }
    }
}

pub struct InferenceEngine {
    store: Arc<dyn GraphStore>,
    registry: Arc<EdgeTypeRegistry>,
    cache: Mutex<LruCache<String, CacheEntry>>,
    ttl: Option<Duration>,
}

impl InferenceEngine {
    pub fn new(store: Arc<dyn GraphStore>, registry: Arc<EdgeTypeRegistry>) -> Self {
        Self::with_cache_config(store, registry, CacheConfig::default())
    }

    pub fn with_cache_config(store: Arc<dyn GraphStore>, registry: Arc<EdgeTypeRegistry>, config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).expect("capacity.max(1) is never zero");
        Self {
            store,
            registry,
            cache: Mutex::new(LruCache::new(capacity)),
            ttl: config.ttl,
        }
    }

    async fn cache_key(&self, operation: &str, inputs: &str) -> InferenceResult<String> {
        let store_version = self.store.store_version().await?;
        Ok(format!("{operation}|{inputs}|reg{}|store{store_version}", self.registry.version()))
    }

    fn cache_get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let mut cache = self.cache.lock().unwrap();
        let entry = cache.get(key)?;
        if let Some(ttl) = self.ttl {
            if entry.inserted_at.elapsed() > ttl {
                cache.pop(key);
                return None;
            }
        }
        serde_json::from_value(entry.value.clone()).ok()
    }

    fn cache_put<T: Serialize>(&self, key: String, value: &T) {
        if let Ok(json) = serde_json::to_value(value) {
            self.cache.lock().unwrap().put(
                key,
                CacheEntry {
                    value: json,
                    inserted_at: Instant::now(),
                },
            );
        }
    }

    /// The descendant type set for `edge_type`, limited to `max_depth` hops
    /// down the parent forest (`None` means unbounded, matching
    /// [`EdgeTypeRegistry::descendants_of`]).
    fn descendant_types_within_depth(&self, edge_type: &str, max_depth: Option<usize>) -> InferenceResult<Vec<String>> {
        self.registry.lookup(edge_type)?;
        let all = self.registry.all();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for record in &all {
            if let Some(parent) = &record.parent {
                children.entry(parent.clone()).or_default().push(record.name.clone());
            }
        }

        let mut out = vec![edge_type.to_string()];
        let mut frontier = vec![(edge_type.to_string(), 0usize)];
        while let Some((name, depth)) = frontier.pop() {
            if let Some(limit) = max_depth {
                if depth >= limit {
                    continue;
                }
            }
            if let Some(kids) = children.get(&name) {
                for kid in kids {
                    out.push(kid.clone());
                    frontier.push((kid.clone(), depth + 1));
                }
            }
        }
        Ok(out)
    }

    /// Returns all edges whose type is `edge_type` or any descendant of it
    /// in the registry. Pure lookup; no closure.
    pub async fn hierarchical_query(&self, edge_type: &str, max_depth: Option<usize>) -> InferenceResult<EdgeQueryResult> {
        self.hierarchical_query_cancellable(edge_type, max_depth, None).await
    }

    /// Same as [`Self::hierarchical_query`], but checked against `cancel`
    /// before each store round-trip. A signalled stop returns whatever edges
    /// were found for the types already queried, flagged `cancelled`, and
    /// the partial result is not cached.
    pub async fn hierarchical_query_cancellable(
        &self,
        edge_type: &str,
        max_depth: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> InferenceResult<EdgeQueryResult> {
        let key = self
            .cache_key("hierarchical", &format!("{edge_type}|{max_depth:?}"))
            .await?;
        if let Some(cached) = self.cache_get::<EdgeQueryResult>(&key) {
            return Ok(cached);
        }

        let types = self.descendant_types_within_depth(edge_type, max_depth)?;
        let mut edges = Vec::new();
        let mut cancelled = false;
        for ty in &types {
            if is_cancelled(cancel) {
                cancelled = true;
                break;
            }
            edges.extend(
                self.store
                    .find_edges(&EdgeFilter {
                        edge_type: Some(ty.clone()),
                        ..Default::default()
                    })
                    .await?,
            );
        }

        let result = EdgeQueryResult { edges, cancelled };
        if !cancelled {
            self.cache_put(key, &result);
        }
        Ok(result)
    }

    /// Computes the set of nodes reachable from `start` by following edges
    /// of `edge_type` (a transitive type), up to `options.max_path_length`
    /// hops.
    pub async fn query_transitive(&self, start: &str, edge_type: &str, options: TransitiveOptions) -> InferenceResult<TransitiveClosureResult> {
        self.query_transitive_cancellable(start, edge_type, options, None).await
    }

    /// Same as [`Self::query_transitive`], but checked against `cancel`
    /// before each adjacency-building store round-trip. A signalled stop
    /// returns whatever was reached so far, flagged `cancelled`, and the
    /// partial result is not cached.
    pub async fn query_transitive_cancellable(
        &self,
        start: &str,
        edge_type: &str,
        options: TransitiveOptions,
        cancel: Option<&CancellationToken>,
    ) -> InferenceResult<TransitiveClosureResult> {
        let record = self.registry.lookup(edge_type)?;
        if !record.is_transitive {
            return Err(InferenceError::NonTransitiveType(edge_type.to_string()));
        }
        if self.store.get_node(start).await?.is_none() {
            return Err(InferenceError::UnknownNode(start.to_string()));
        }

        if options.max_path_length == 0 {
            let reached = if options.include_self {
                vec![ReachedNode {
                    identifier: start.to_string(),
                    depth: 0,
                    path: Vec::new(),
                }]
            } else {
                Vec::new()
            };
            return Ok(TransitiveClosureResult {
                reached,
                cycles: Vec::new(),
                cancelled: false,
            });
        }

        let key = self
            .cache_key(
                "transitive",
                &format!(
                    "{start}|{edge_type}|{}|{}|{}|{}",
                    options.max_path_length, options.detect_cycles, options.include_intermediate, options.include_type_descendants
                ),
            )
            .await?;
        if let Some(cached) = self.cache_get::<TransitiveClosureResult>(&key) {
            return Ok(cached);
        }

        let types = if options.include_type_descendants {
            self.descendant_types_within_depth(edge_type, None)?
        } else {
            vec![edge_type.to_string()]
        };

        let mut adjacency: HashMap<String, Vec<Edge>> = HashMap::new();
        let mut cancelled = false;
        for ty in &types {
            if is_cancelled(cancel) {
                cancelled = true;
                break;
            }
            let edges = self
                .store
                .find_edges(&EdgeFilter {
                    edge_type: Some(ty.clone()),
                    ..Default::default()
                })
                .await?;
            for edge in edges {
                adjacency.entry(edge.from_node.clone()).or_default().push(edge);
            }
        }

        let mut best: HashMap<String, (u32, Vec<String>)> = HashMap::new();
        let mut cycles: Vec<Vec<String>> = Vec::new();
        let mut queue: std::collections::VecDeque<(String, u32, Vec<String>, Vec<String>)> = std::collections::VecDeque::new();
        queue.push_back((start.to_string(), 0, vec![start.to_string()], Vec::new()));

        while let Some((node, depth, visited_path, edge_path)) = queue.pop_front() {
            if !cancelled && is_cancelled(cancel) {
                cancelled = true;
            }
            if cancelled {
                break;
            }
            if depth as usize >= options.max_path_length {
                continue;
            }
            let Some(outgoing) = adjacency.get(&node) else { continue };
            for edge in outgoing {
                let next = edge.to_node.clone();
                let mut next_edge_path = edge_path.clone();
                next_edge_path.push(edge_label(edge));
                let next_depth = depth + 1;

                if visited_path.contains(&next) {
                    if options.detect_cycles {
                        let start_index = visited_path.iter().position(|n| n == &next).unwrap();
                        let mut cycle: Vec<String> = visited_path[start_index..].to_vec();
                        cycle.push(next.clone());
                        cycles.push(cycle);
                    }
                    continue;
                }

                let replace = match best.get(&next) {
                    None => true,
                    Some((existing_depth, existing_path)) => {
                        next_depth < *existing_depth || (next_depth == *existing_depth && next_edge_path < *existing_path)
                    }
                };
                if replace {
                    best.insert(next.clone(), (next_depth, next_edge_path.clone()));
                }

                let mut next_visited = visited_path.clone();
                next_visited.push(next.clone());
                queue.push_back((next, next_depth, next_visited, next_edge_path));
            }
        }

        let mut reached: Vec<ReachedNode> = best
            .into_iter()
            .map(|(identifier, (depth, path))| ReachedNode { identifier, depth, path })
            .collect();

        if !options.include_intermediate {
            reached.retain(|r| !adjacency.contains_key(&r.identifier));
        }
        if options.include_self {
            reached.insert(
                0,
                ReachedNode {
                    identifier: start.to_string(),
                    depth: 0,
                    path: Vec::new(),
                },
            );
        }
        reached.sort_by(|a, b| a.depth.cmp(&b.depth).then_with(|| a.identifier.cmp(&b.identifier)));

        let result = TransitiveClosureResult { reached, cycles, cancelled };
        if !cancelled {
            self.cache_put(key, &result);
        }
        Ok(result)
    }

    /// Infers derived `relation_type` edges by propagating through a
    /// `containment_type` chain: if `A —C→ B` (within `max_depth` hops) and
    /// `B —R→ X`, then `A —R→ X` is derived, provided `R` is declared
    /// inheritable.
    pub async fn infer_inheritable(&self, containment_type: &str, relation_type: &str, max_depth: Option<usize>) -> InferenceResult<EdgeQueryResult> {
        self.infer_inheritable_cancellable(containment_type, relation_type, max_depth, None).await
    }

    /// Same as [`Self::infer_inheritable`], but checked against `cancel`
    /// before each of its two store round-trips. A signalled stop returns an
    /// empty, `cancelled` result rather than computing against a partial
    /// edge set, and the result is not cached.
    pub async fn infer_inheritable_cancellable(
        &self,
        containment_type: &str,
        relation_type: &str,
        max_depth: Option<usize>,
        cancel: Option<&CancellationToken>,
    ) -> InferenceResult<EdgeQueryResult> {
        self.registry.lookup(containment_type)?;
        let relation_record = self.registry.lookup(relation_type)?;
        if !relation_record.is_inheritable {
            return Err(InferenceError::NonInheritableType(relation_type.to_string()));
        }

        let depth_limit = max_depth.unwrap_or(10);
        let key = self
            .cache_key("inheritable", &format!("{containment_type}|{relation_type}|{depth_limit}"))
            .await?;
        if let Some(cached) = self.cache_get::<EdgeQueryResult>(&key) {
            return Ok(cached);
        }

        if is_cancelled(cancel) {
            return Ok(EdgeQueryResult { edges: Vec::new(), cancelled: true });
        }
        let containment_edges = self
            .store
            .find_edges(&EdgeFilter {
                edge_type: Some(containment_type.to_string()),
                ..Default::default()
            })
            .await?;

        if is_cancelled(cancel) {
            return Ok(EdgeQueryResult { edges: Vec::new(), cancelled: true });
        }
        let relation_edges = self
            .store
            .find_edges(&EdgeFilter {
                edge_type: Some(relation_type.to_string()),
                ..Default::default()
            })
            .await?;

        let mut reverse_adjacency: HashMap<String, Vec<String>> = HashMap::new();
        for edge in &containment_edges {
            reverse_adjacency.entry(edge.to_node.clone()).or_default().push(edge.from_node.clone());
        }

        let mut derived = Vec::new();
        for relation_edge in &relation_edges {
            let ancestors = ancestors_within_depth(&reverse_adjacency, &relation_edge.to_node, depth_limit, &relation_edge.from_node);
            for ancestor in ancestors {
                derived.push(
                    Edge::new(ancestor, relation_edge.to_node.clone(), relation_type)
                        .with_weight(relation_edge.weight)
                        .derived(format!("inheritable:{containment_type}")),
                );
            }
        }

        let result = EdgeQueryResult { edges: derived, cancelled: false };
        self.cache_put(key, &result);
        Ok(result)
    }
}

/// Nodes reachable by walking `reverse_adjacency` backward from `start`
/// (excluding `start` and `exclude_self`), up to `max_depth` hops.
fn ancestors_within_depth(reverse_adjacency: &HashMap<String, Vec<String>>, start: &str, max_depth: usize, exclude_self: &str) -> Vec<String> {
    let mut visited = std::collections::HashSet::new();
    visited.insert(start.to_string());
    let mut frontier = vec![start.to_string()];
    let mut ancestors = Vec::new();
    let mut depth = 0;
    while depth < max_depth && !frontier.is_empty() {
        let mut next_frontier = Vec::new();
        for node in &frontier {
            if let Some(parents) = reverse_adjacency.get(node) {
                for parent in parents {
                    if visited.insert(parent.clone()) {
                        if parent != exclude_self {
                            ancestors.push(parent.clone());
                        }
                        next_frontier.push(parent.clone());
                    }
                }
            }
        }
        frontier = next_frontier;
        depth += 1;
    }
    ancestors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Node, NodeKind, SqliteGraphStore};

    async fn seeded_store() -> (Arc<dyn GraphStore>, Arc<EdgeTypeRegistry>) {
        let store = Arc::new(SqliteGraphStore::open_in_memory().await.unwrap());
        for name in ["a", "b", "c", "d"] {
            store
                .upsert_node(Node::new(name, NodeKind::File, name, format!("{name}.ts")))
                .await
                .unwrap();
        }
        (store, Arc::new(EdgeTypeRegistry::new()))
    }

    #[tokio::test]
    async fn transitive_closure_walks_a_chain() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "depends_on")).await.unwrap();
        store.upsert_edge(Edge::new("b", "c", "depends_on")).await.unwrap();
        store.upsert_edge(Edge::new("c", "d", "depends_on")).await.unwrap();

        let engine = InferenceEngine::new(store, registry);
        let result = engine
            .query_transitive("a", "depends_on", TransitiveOptions::default())
            .await
            .unwrap();

        let mut by_id: HashMap<String, u32> = result.reached.iter().map(|r| (r.identifier.clone(), r.depth)).collect();
        assert_eq!(by_id.remove("b"), Some(1));
        assert_eq!(by_id.remove("c"), Some(2));
        assert_eq!(by_id.remove("d"), Some(3));
        assert!(by_id.is_empty());
        assert!(result.cycles.is_empty());
    }

    #[tokio::test]
    async fn cycle_is_reported_and_does_not_loop_forever() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "depends_on")).await.unwrap();
        store.upsert_edge(Edge::new("b", "a", "depends_on")).await.unwrap();

        let engine = InferenceEngine::new(store, registry);
        let result = engine
            .query_transitive("a", "depends_on", TransitiveOptions::default())
            .await
            .unwrap();

        assert_eq!(result.reached.len(), 1);
        assert_eq!(result.reached[0].identifier, "b");
        assert_eq!(result.cycles, vec![vec!["a".to_string(), "b".to_string(), "a".to_string()]]);
    }

    #[tokio::test]
    async fn non_transitive_type_is_rejected() {
        let (store, registry) = seeded_store().await;
        let engine = InferenceEngine::new(store, registry);
        let err = engine
            .query_transitive("a", "calls", TransitiveOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::NonTransitiveType(_)));
    }

    #[tokio::test]
    async fn max_path_length_zero_returns_only_seed_when_include_self() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "depends_on")).await.unwrap();
        let engine = InferenceEngine::new(store, registry);
        let options = TransitiveOptions {
            max_path_length: 0,
            include_self: true,
            ..Default::default()
        };
        let result = engine.query_transitive("a", "depends_on", options).await.unwrap();
        assert_eq!(result.reached.len(), 1);
        assert_eq!(result.reached[0].identifier, "a");
    }

    #[tokio::test]
    async fn inheritable_propagation_derives_edge_through_containment() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "contains")).await.unwrap();
        store.upsert_edge(Edge::new("b", "c", "declares")).await.unwrap();

        let engine = InferenceEngine::new(store, registry);
        let derived = engine.infer_inheritable("contains", "declares", None).await.unwrap();

        assert_eq!(derived.edges.len(), 1);
        assert_eq!(derived.edges[0].from_node, "a");
        assert_eq!(derived.edges[0].to_node, "c");
        assert!(derived.edges[0].derived);
        assert!(!derived.cancelled);
    }

    #[tokio::test]
    async fn non_inheritable_relation_type_is_rejected() {
        let (store, registry) = seeded_store().await;
        let engine = InferenceEngine::new(store, registry);
        let err = engine.infer_inheritable("contains", "calls", None).await.unwrap_err();
        assert!(matches!(err, InferenceError::NonInheritableType(_)));
    }

    #[tokio::test]
    async fn hierarchical_query_includes_registered_subtypes() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "imports_file")).await.unwrap();
        store.upsert_edge(Edge::new("a", "c", "imports_library")).await.unwrap();

        let engine = InferenceEngine::new(store, registry);
        let result = engine.hierarchical_query("imports", None).await.unwrap();
        assert_eq!(result.edges.len(), 2);
        assert!(!result.cancelled);
    }

    #[tokio::test]
    async fn repeated_hierarchical_query_hits_cache() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "imports_file")).await.unwrap();
        let engine = InferenceEngine::new(store, registry);

        engine.hierarchical_query("imports", None).await.unwrap();
        assert_eq!(engine.cache.lock().unwrap().len(), 1);
        engine.hierarchical_query("imports", None).await.unwrap();
        assert_eq!(engine.cache.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_any_type_is_queried_returns_flagged_empty_result() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "imports_file")).await.unwrap();
        let engine = InferenceEngine::new(store, registry);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine
            .hierarchical_query_cancellable("imports", None, Some(&cancel))
            .await
            .unwrap();
        assert!(result.cancelled);
        assert!(result.edges.is_empty());
        // A cancelled result must not poison the cache for a later, uncancelled call.
        assert_eq!(engine.cache.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn transitive_closure_cancellation_flags_partial_result() {
        let (store, registry) = seeded_store().await;
        store.upsert_edge(Edge::new("a", "b", "depends_on")).await.unwrap();

        let engine = InferenceEngine::new(store, registry);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = engine
            .query_transitive_cancellable("a", "depends_on", TransitiveOptions::default(), Some(&cancel))
            .await
            .unwrap();
        assert!(result.cancelled);
        assert_eq!(engine.cache.lock().unwrap().len(), 0);
    }
}
