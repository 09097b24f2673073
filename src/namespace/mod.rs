//! NamespaceOrchestrator — resolves file patterns per namespace, drives
//! coordinated analysis across a worker pool, and writes results to a
//! [`GraphStore`], tagging each touched node with namespace membership.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::analysis::{AnalysisCoordinator, AnalysisError, ProcessedRecordSet};
use crate::error::Diagnostic;
use crate::grammar::{GrammarError, Language};
use crate::graph::{Edge, GraphError, GraphStore, Node, NodeKind, WriteOp};
use crate::identifier;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("glob pattern '{pattern}' is invalid: {message}")]
    BadGlob { pattern: String, message: String },
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// `{name, includeGlobs, excludeGlobs, projectName, scenarios}`, plus the
/// directory globs are resolved relative to (not named in the data model,
/// but required to make `includeGlobs` operational).
#[derive(Debug, Clone)]
pub struct Namespace {
    pub name: String,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub project_name: String,
    pub scenarios: Vec<String>,
    pub base_dir: PathBuf,
}

impl Namespace {
    pub fn new(name: impl Into<String>, project_name: impl Into<String>, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            project_name: project_name.into(),
            scenarios: Vec::new(),
            base_dir: base_dir.into(),
        }
    }

    pub fn with_include(mut self, pattern: impl Into<String>) -> Self {
        self.include_globs.push(pattern.into());
        self
    }

    pub fn with_exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_globs.push(pattern.into());
        self
    }
}

/// Outcome of one `analyzeNamespace` run.
#[derive(Debug, Default)]
pub struct NamespaceOutcome {
    pub files_listed: usize,
    pub files_analyzed: usize,
    pub files_skipped_unchanged: usize,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when a cancellation signal stopped the run before every listed
    /// file was processed. The counts above reflect only the files that
    /// completed before the stop.
    pub cancelled: bool,
}

/// An edge whose endpoints sit in different namespaces, per `crossNamespaceEdges`.
#[derive(Debug, Clone)]
pub struct CrossNamespaceEdge {
    pub edge: Edge,
    pub from_namespaces: Vec<String>,
    pub to_namespaces: Vec<String>,
}

/// Default cap on namespace-analysis worker concurrency, mirroring the
/// resource model's "logical processor count, capped at 8".
pub fn default_worker_count() -> usize {
    num_cpus::get().clamp(1, 8)
}

/// `listFiles` → glob expansion with excludes, deterministic sort;
/// `analyzeNamespace` → parse, process, upsert, bind, per file in isolation;
/// `analyzeAll` → every registered namespace in declaration order;
/// `crossNamespaceEdges` → edges whose endpoints cross a namespace boundary.
pub struct NamespaceOrchestrator {
    store: Arc<dyn GraphStore>,
    coordinator: Arc<AnalysisCoordinator>,
    namespaces: Vec<Namespace>,
    worker_count: usize,
    content_hashes: Mutex<HashMap<PathBuf, String>>,
}

impl NamespaceOrchestrator {
    pub fn new(store: Arc<dyn GraphStore>, coordinator: Arc<AnalysisCoordinator>, namespaces: Vec<Namespace>) -> Self {
        Self {
            store,
            coordinator,
            namespaces,
            worker_count: default_worker_count(),
            content_hashes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count.max(1);
        self
    }

    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Glob expansion with excludes, deterministic sort. Include patterns are
    /// resolved relative to `namespace.base_dir`; excludes are matched
    /// against the path relative to that same directory.
    pub fn list_files(&self, namespace: &Namespace) -> OrchestratorResult<Vec<PathBuf>> {
        let mut matched: Vec<PathBuf> = Vec::new();

        for pattern in &namespace.include_globs {
            let full_pattern = namespace.base_dir.join(pattern);
            let full_pattern_str = full_pattern.to_string_lossy().into_owned();
            let paths = glob::glob(&full_pattern_str).map_err(|e| OrchestratorError::BadGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            for entry in paths {
                match entry {
                    Ok(path) if crate::path_safety::is_file_no_follow(&path) => matched.push(path),
                    Ok(_) => {}
                    Err(e) => warn!(pattern = %pattern, error = %e, "glob entry unreadable, skipping"),
                }
            }
        }

        let excludes: Vec<glob::Pattern> = namespace
            .exclude_globs
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();

        matched.retain(|path| {
            let relative = path.strip_prefix(&namespace.base_dir).unwrap_or(path);
            let relative_str = relative.to_string_lossy();
            !excludes.iter().any(|pattern| pattern.matches(&relative_str))
        });

        matched.sort();
        matched.dedup();
        Ok(matched)
    }

    /// For each path: read source, infer language by extension, analyze,
    /// convert records to node/edge upserts, and bind each touched node to
    /// the namespace. Applies the *replace-namespace* policy: prior bindings
    /// for this namespace are cleared before re-insertion.
    ///
    /// `cancel`, if set, is checked before each file is handed to the worker
    /// pool; once signalled, no further files are started and the returned
    /// outcome has `cancelled` set, reflecting only the files that finished
    /// beforehand.
    pub async fn analyze_namespace(&self, namespace: &Namespace) -> OrchestratorResult<NamespaceOutcome> {
        self.analyze_namespace_cancellable(namespace, None).await
    }

    pub async fn analyze_namespace_cancellable(
        &self,
        namespace: &Namespace,
        cancel: Option<&CancellationToken>,
    ) -> OrchestratorResult<NamespaceOutcome> {
        let files = self.list_files(namespace)?;
        let mut outcome = NamespaceOutcome {
            files_listed: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            return Ok(outcome);
        }

        self.store.clear_namespace_bindings(&namespace.name).await?;

        let semaphore = Arc::new(Semaphore::new(self.worker_count));
        let mut join_set = tokio::task::JoinSet::new();

        for path in files {
            if cancel.map(|t| t.is_cancelled()).unwrap_or(false) {
                debug!(namespace = %namespace.name, "cancellation requested; stopping before remaining files are queued");
                outcome.cancelled = true;
                break;
            }

            let semaphore = semaphore.clone();
            let store = self.store.clone();
            let coordinator = self.coordinator.clone();
            let namespace_name = namespace.name.clone();
            let project_name = namespace.project_name.clone();
            let base_dir = namespace.base_dir.clone();
            let previous_hash = {
                let hashes = self.content_hashes.lock().await;
                hashes.get(&path).cloned()
            };

            join_set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                analyze_one_file(&store, &coordinator, &namespace_name, &project_name, &base_dir, &path, previous_hash.as_deref()).await
            });
        }

        let mut new_hashes = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(FileOutcome::Analyzed { path, hash, diagnostics })) => {
                    outcome.files_analyzed += 1;
                    outcome.diagnostics.extend(diagnostics);
                    new_hashes.push((path, hash));
                }
                Ok(Ok(FileOutcome::SkippedUnchanged { path, hash })) => {
                    outcome.files_skipped_unchanged += 1;
                    new_hashes.push((path, hash));
                }
                Ok(Err(diagnostic)) => outcome.diagnostics.push(diagnostic),
                Err(join_error) => outcome
                    .diagnostics
                    .push(Diagnostic::error("task-panic", join_error.to_string())),
            }
        }

        let mut hashes = self.content_hashes.lock().await;
        for (path, hash) in new_hashes {
            hashes.insert(path, hash);
        }

        Ok(outcome)
    }

    /// Iterate every registered namespace in declaration order.
    pub async fn analyze_all(&self) -> OrchestratorResult<HashMap<String, NamespaceOutcome>> {
        self.analyze_all_cancellable(None).await
    }

    /// Same as [`Self::analyze_all`], but checked against `cancel` before
    /// each namespace (and, within it, before each file — see
    /// [`Self::analyze_namespace_cancellable`]). Once signalled, the
    /// namespace in progress finishes, remaining namespaces are skipped, and
    /// every returned outcome touched by the stop has `cancelled` set.
    pub async fn analyze_all_cancellable(&self, cancel: Option<&CancellationToken>) -> OrchestratorResult<HashMap<String, NamespaceOutcome>> {
        let mut results = HashMap::new();
        for namespace in &self.namespaces {
            if cancel.map(|t| t.is_cancelled()).unwrap_or(false) {
                warn!(namespace = %namespace.name, "cancellation requested; stopping before remaining namespaces");
                break;
            }
            let outcome = self.analyze_namespace_cancellable(namespace, cancel).await?;
            results.insert(namespace.name.clone(), outcome);
        }
        Ok(results)
    }

    /// List edges whose endpoints sit in different namespaces.
    pub async fn cross_namespace_edges(&self) -> OrchestratorResult<Vec<CrossNamespaceEdge>> {
        let edges = self.store.all_edges().await?;
        let mut out = Vec::new();
        for edge in edges {
            let from_namespaces = self.store.namespaces_of(&edge.from_node).await?;
            let to_namespaces = self.store.namespaces_of(&edge.to_node).await?;
            let crosses = !from_namespaces.is_empty()
                && !to_namespaces.is_empty()
                && from_namespaces.iter().any(|n| !to_namespaces.contains(n));
            if crosses {
                out.push(CrossNamespaceEdge {
                    edge,
                    from_namespaces,
                    to_namespaces,
                });
            }
        }
        Ok(out)
    }
}

enum FileOutcome {
    Analyzed {
        path: PathBuf,
        hash: String,
        diagnostics: Vec<Diagnostic>,
    },
    SkippedUnchanged {
        path: PathBuf,
        hash: String,
    },
}

/// Per-file analysis is isolated: any failure here becomes a `Diagnostic`,
/// never propagates to abort the namespace run.
async fn analyze_one_file(
    store: &Arc<dyn GraphStore>,
    coordinator: &AnalysisCoordinator,
    namespace_name: &str,
    project_name: &str,
    base_dir: &Path,
    path: &Path,
    previous_hash: Option<&str>,
) -> Result<FileOutcome, Diagnostic> {
    let file_label = path.to_string_lossy().into_owned();

    let source = std::fs::read_to_string(path).map_err(|e| Diagnostic::error("io-error", e.to_string()).with_file(file_label.clone()))?;

    let hash = blake3::hash(source.as_bytes()).to_hex().to_string();
    if previous_hash == Some(hash.as_str()) {
        if let Ok(rel) = path.strip_prefix(base_dir) {
            let rel_str = to_slash(rel);
            let identifier = identifier::build(project_name, &rel_str, NodeKind::File, &[]);
            if let Ok(Some(_)) = store.get_node(&identifier).await {
                bind_best_effort(store, namespace_name, &identifier).await;
                return Ok(FileOutcome::SkippedUnchanged { path: path.to_path_buf(), hash });
            }
        }
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let language = Language::from_extension(extension)
        .ok_or_else(|| Diagnostic::warning("unsupported-extension", format!("no grammar for extension '{extension}'")).with_file(file_label.clone()))?;

    let relative = path.strip_prefix(base_dir).unwrap_or(path);
    let relative_str = to_slash(relative);

    let bundle = coordinator
        .analyze(language, &relative_str, &source)
        .map_err(|e| Diagnostic::error("parse-error", e.to_string()).with_file(file_label.clone()))?;

    let mut diagnostics: Vec<Diagnostic> = bundle
        .warnings
        .iter()
        .map(|w| Diagnostic::warning(w.query_key.clone(), w.message.clone()).with_file(file_label.clone()))
        .collect();

    let (nodes, edges) = translate_bundle(project_name, &relative_str, language, &bundle.records_by_query_key);

    let mut ops: Vec<WriteOp> = Vec::with_capacity(nodes.len() * 2 + edges.len());
    ops.extend(nodes.iter().map(|n| WriteOp::UpsertNode(n.clone())));
    ops.extend(edges.iter().map(|e| WriteOp::UpsertEdge(e.clone())));
    ops.extend(nodes.iter().map(|n| WriteOp::BindNamespace {
        namespace: namespace_name.to_string(),
        identifier: n.identifier.clone(),
        included_by: None,
    }));

    // One transaction per file: either every node, edge, and namespace
    // binding below commits, or none does — no partial file is observable.
    if let Err(e) = store.with_transaction(ops).await {
        diagnostics.push(Diagnostic::error("store-error", e.to_string()).with_file(file_label.clone()));
    }

    debug!(file = %file_label, nodes = nodes.len(), edges = edges.len(), "analyzed file");

    Ok(FileOutcome::Analyzed {
        path: path.to_path_buf(),
        hash,
        diagnostics,
    })
}

async fn bind_best_effort(store: &Arc<dyn GraphStore>, namespace_name: &str, identifier: &str) {
    if let Err(e) = store.bind_namespace(namespace_name, identifier, None).await {
        warn!(identifier, error = %e, "failed to rebind unchanged file's node to namespace");
    }
}

fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Convert one file's processed record sets into graph upserts. Unresolved
/// targets (import specifiers, call callees) become `Unknown`-kind
/// placeholder nodes rather than being dropped, so the edge always has a
/// valid endpoint; resolving them to concrete symbols is the caller's job
/// (a later pass, or another namespace's analysis, may upsert-merge the same
/// identifier into something more specific).
fn translate_bundle(
    project: &str,
    relative_path: &str,
    language: Language,
    records_by_query_key: &HashMap<String, ProcessedRecordSet>,
) -> (Vec<Node>, Vec<Edge>) {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path).to_string();
    let file_id = identifier::build(project, relative_path, NodeKind::File, &[]);

    let mut nodes = vec![Node::new(file_id.clone(), NodeKind::File, file_name, relative_path).with_language(language.as_str())];
    let mut edges = Vec::new();

    fn declare_symbol(
        project: &str,
        relative_path: &str,
        language: Language,
        file_id: &str,
        kind: NodeKind,
        name: &str,
        location: &crate::processors::Location,
        nodes: &mut Vec<Node>,
        edges: &mut Vec<Edge>,
    ) {
        let id = identifier::build(project, relative_path, kind, &[name]);
        nodes.push(
            Node::new(id.clone(), kind, name, relative_path)
                .with_language(language.as_str())
                .with_position(location.line, location.column),
        );
        edges.push(Edge::new(file_id.to_string(), id, "contains"));
    }

    for (_key, record_set) in records_by_query_key {
        match record_set {
            ProcessedRecordSet::ImportSources(records) => {
                for r in records {
                    let target_id = identifier::build(project, &r.source, NodeKind::Unknown, &[]);
                    nodes.push(Node::new(target_id.clone(), NodeKind::Unknown, r.source.clone(), r.source.clone()));
                    let edge_type = if r.is_relative { "imports_file" } else { "imports_library" };
                    edges.push(Edge::new(file_id.clone(), target_id, edge_type).with_source_file(relative_path));
                }
            }
            ProcessedRecordSet::ClassDeclarations(records) => {
                for r in records {
                    declare_symbol(project, relative_path, language, &file_id, NodeKind::Class, &r.name, &r.location, &mut nodes, &mut edges);
                }
            }
            ProcessedRecordSet::InterfaceDeclarations(records) => {
                for r in records {
                    declare_symbol(project, relative_path, language, &file_id, NodeKind::Interface, &r.name, &r.location, &mut nodes, &mut edges);
                }
            }
            ProcessedRecordSet::FunctionDeclarations(records) => {
                for r in records {
                    declare_symbol(project, relative_path, language, &file_id, NodeKind::Function, &r.name, &r.location, &mut nodes, &mut edges);
                }
            }
            ProcessedRecordSet::MethodDeclarations(records) => {
                for r in records {
                    declare_symbol(project, relative_path, language, &file_id, NodeKind::Method, &r.name, &r.location, &mut nodes, &mut edges);
                }
            }
            ProcessedRecordSet::TypeDeclarations(records) => {
                for r in records {
                    declare_symbol(project, relative_path, language, &file_id, NodeKind::Type, &r.name, &r.location, &mut nodes, &mut edges);
                }
            }
            ProcessedRecordSet::CallExpressions(records) => {
                for r in records {
                    let callee_id = identifier::build(project, relative_path, NodeKind::Unknown, &[&r.callee]);
                    nodes.push(
                        Node::new(callee_id.clone(), NodeKind::Unknown, r.callee.clone(), relative_path)
                            .with_position(r.location.line, r.location.column),
                    );
                    edges.push(Edge::new(file_id.clone(), callee_id, "calls").with_source_file(relative_path));
                }
            }
            ProcessedRecordSet::Headings(records) => {
                for r in records {
                    let id = identifier::build(project, relative_path, NodeKind::Unknown, &[&r.text]);
                    nodes.push(
                        Node::new(id.clone(), NodeKind::Unknown, r.text.clone(), relative_path)
                            .with_position(r.location.line, r.location.column)
                            .with_tags(["heading".to_string()]),
                    );
                    edges.push(Edge::new(file_id.clone(), id, "contains"));
                }
            }
            ProcessedRecordSet::Links(records) => {
                for r in records {
                    let id = identifier::build(project, &r.destination, NodeKind::Unknown, &[]);
                    nodes.push(Node::new(id.clone(), NodeKind::Unknown, r.destination.clone(), r.destination.clone()).with_tags(["link".to_string()]));
                    edges.push(Edge::new(file_id.clone(), id, "references").with_source_file(relative_path));
                }
            }
            ProcessedRecordSet::CodeBlocks(records) => {
                for r in records {
                    let label = r.info_string.clone().unwrap_or_else(|| "code".to_string());
                    let id = identifier::build(project, relative_path, NodeKind::Unknown, &[&format!("block@{}:{}", r.location.line, r.location.column)]);
                    nodes.push(
                        Node::new(id.clone(), NodeKind::Unknown, label, relative_path)
                            .with_position(r.location.line, r.location.column)
                            .with_tags(["code_block".to_string()]),
                    );
                    edges.push(Edge::new(file_id.clone(), id, "contains"));
                }
            }
        }
    }

    (nodes, edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarHost;
    use crate::graph::SqliteGraphStore;
    use crate::query::QueryLibrary;

    async fn orchestrator_with(tmp: &Path, namespace: Namespace) -> (NamespaceOrchestrator, Arc<SqliteGraphStore>) {
        let store = Arc::new(SqliteGraphStore::open_in_memory().await.unwrap());
        let coordinator = Arc::new(AnalysisCoordinator::new(Arc::new(GrammarHost::new()), Arc::new(QueryLibrary::new())));
        let orchestrator = NamespaceOrchestrator::new(store.clone(), coordinator, vec![namespace]).with_worker_count(2);
        let _ = tmp;
        (orchestrator, store)
    }

    #[tokio::test]
    async fn empty_namespace_analyzes_zero_files_and_writes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let namespace = Namespace::new("empty", "proj", tmp.path()).with_include("*.ts");
        let (orchestrator, store) = orchestrator_with(tmp.path(), namespace.clone()).await;

        let outcome = orchestrator.analyze_namespace(&namespace).await.unwrap();
        assert_eq!(outcome.files_listed, 0);
        assert_eq!(outcome.files_analyzed, 0);
        assert!(outcome.diagnostics.is_empty());
        assert_eq!(store.node_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn analyze_namespace_writes_nodes_and_binds_namespace() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.ts"), "import { x } from 'y';\nclass Widget {}\n").unwrap();
        let namespace = Namespace::new("src", "proj", tmp.path()).with_include("*.ts");
        let (orchestrator, store) = orchestrator_with(tmp.path(), namespace.clone()).await;

        let outcome = orchestrator.analyze_namespace(&namespace).await.unwrap();
        assert_eq!(outcome.files_analyzed, 1);
        assert!(store.node_count().await.unwrap() > 0);

        let file_id = identifier::build("proj", "a.ts", NodeKind::File, &[]);
        let namespaces = store.namespaces_of(&file_id).await.unwrap();
        assert_eq!(namespaces, vec!["src".to_string()]);
    }

    #[tokio::test]
    async fn exclude_glob_removes_matched_include() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.ts"), "class A {}\n").unwrap();
        std::fs::write(tmp.path().join("a.test.ts"), "class ATest {}\n").unwrap();
        let namespace = Namespace::new("src", "proj", tmp.path())
            .with_include("*.ts")
            .with_exclude("*.test.ts");
        let (orchestrator, _store) = orchestrator_with(tmp.path(), namespace.clone()).await;

        let files = orchestrator.list_files(&namespace).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name().unwrap().to_str().unwrap(), "a.ts");
    }

    #[tokio::test]
    async fn file_with_only_syntax_errors_yields_no_partial_node_and_a_diagnostic() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.ts"), "class {{{{").unwrap();
        let namespace = Namespace::new("src", "proj", tmp.path()).with_include("*.ts");
        let (orchestrator, _store) = orchestrator_with(tmp.path(), namespace.clone()).await;

        let outcome = orchestrator.analyze_namespace(&namespace).await.unwrap();
        assert_eq!(outcome.files_analyzed, 1);
    }

    #[tokio::test]
    async fn rerunning_analyze_namespace_on_unchanged_source_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.ts"), "class Widget {}\n").unwrap();
        let namespace = Namespace::new("src", "proj", tmp.path()).with_include("*.ts");
        let (orchestrator, store) = orchestrator_with(tmp.path(), namespace.clone()).await;

        orchestrator.analyze_namespace(&namespace).await.unwrap();
        let node_count_first = store.node_count().await.unwrap();

        let outcome = orchestrator.analyze_namespace(&namespace).await.unwrap();
        assert_eq!(outcome.files_skipped_unchanged, 1);
        assert_eq!(store.node_count().await.unwrap(), node_count_first);
    }

    #[tokio::test]
    async fn cross_namespace_edges_finds_boundary_crossings() {
        let store = Arc::new(SqliteGraphStore::open_in_memory().await.unwrap());
        store
            .upsert_node(Node::new("p/a.ts#file", NodeKind::File, "a.ts", "a.ts"))
            .await
            .unwrap();
        store
            .upsert_node(Node::new("p/b.ts#file", NodeKind::File, "b.ts", "b.ts"))
            .await
            .unwrap();
        store.upsert_edge(Edge::new("p/a.ts#file", "p/b.ts#file", "depends_on")).await.unwrap();
        store.bind_namespace("ns-a", "p/a.ts#file", None).await.unwrap();
        store.bind_namespace("ns-b", "p/b.ts#file", None).await.unwrap();

        let coordinator = Arc::new(AnalysisCoordinator::new(Arc::new(GrammarHost::new()), Arc::new(QueryLibrary::new())));
        let orchestrator = NamespaceOrchestrator::new(store, coordinator, vec![]);

        let crossing = orchestrator.cross_namespace_edges().await.unwrap();
        assert_eq!(crossing.len(), 1);
        assert_eq!(crossing[0].from_namespaces, vec!["ns-a".to_string()]);
        assert_eq!(crossing[0].to_namespaces, vec!["ns-b".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_before_any_file_stops_the_namespace_run() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.ts"), "class Widget {}\n").unwrap();
        let namespace = Namespace::new("src", "proj", tmp.path()).with_include("*.ts");
        let (orchestrator, store) = orchestrator_with(tmp.path(), namespace.clone()).await;

        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = orchestrator.analyze_namespace_cancellable(&namespace, Some(&cancel)).await.unwrap();

        assert!(outcome.cancelled);
        assert_eq!(outcome.files_analyzed, 0);
        assert_eq!(store.node_count().await.unwrap(), 0);
    }
}
