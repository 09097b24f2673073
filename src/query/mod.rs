//! QueryLibrary, QueryExecutor, and KeyMapper — the query-result pipeline's
//! front half.
//!
//! Compiled queries are cached keyed by `(language, queryKey)` for the life
//! of the process, and matches are drained with `tree_sitter::StreamingIterator`
//! (the `cursor.matches(..)` API tree-sitter 0.24+ requires).

mod key_mapper;
mod library;

pub use key_mapper::KeyMapper;
pub use library::QueryLibrary;

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use tree_sitter::{Query, QueryCursor, StreamingIterator, Tree};

use crate::grammar::Language;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("unknown query key '{0}' for language '{1}'")]
    UnknownKey(String, String),

    #[error("failed to compile query '{key}' for language '{language}': {source}")]
    Compilation {
        key: String,
        language: String,
        source: String,
    },

    #[error("query key '{0}' is not registered for language '{1}'")]
    IncompatibleLanguage(String, String),

    #[error("user-visible key '{0}' does not map to any registered query key")]
    UnmappedUserKey(String),
}

pub type QueryResult<T> = Result<T, QueryError>;

/// A point in source text, in (row, column) tree-sitter convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Point {
    pub row: usize,
    pub column: usize,
}

impl From<tree_sitter::Point> for Point {
    fn from(p: tree_sitter::Point) -> Self {
        Point {
            row: p.row,
            column: p.column,
        }
    }
}

/// The text and position span of one captured node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRegion {
    pub start_point: Point,
    pub end_point: Point,
    pub text: String,
}

/// One query match: the captures bound by a single run of the pattern
/// against the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub query_key: String,
    pub captures: HashMap<String, NodeRegion>,
}

/// Runs library queries against parsed trees, caching compiled queries
/// keyed by `(language, queryKey)` with unbounded process lifetime. Guarded
/// by an `RwLock` so readers (the common case, once queries are warm) don't
/// contend.
pub struct QueryExecutor {
    library: std::sync::Arc<QueryLibrary>,
    compiled: RwLock<HashMap<(Language, String), Query>>,
}

impl QueryExecutor {
    pub fn new(library: std::sync::Arc<QueryLibrary>) -> Self {
        Self {
            library,
            compiled: RwLock::new(HashMap::new()),
        }
    }

    /// Run `query_key` against `tree`, yielding matches in document order,
    /// ties broken by capture-node start offset.
    pub fn execute(&self, language: Language, query_key: &str, tree: &Tree, source_text: &str) -> QueryResult<Vec<Match>> {
        let source_str = self
            .library
            .get(language, query_key)
            .ok_or_else(|| QueryError::UnknownKey(query_key.to_string(), language.to_string()))?;

        {
            let cache = self.compiled.read().unwrap();
            if !cache.contains_key(&(language, query_key.to_string())) {
                drop(cache);
                let compiled = Query::new(&language_grammar(language), source_str).map_err(|e| QueryError::Compilation {
                    key: query_key.to_string(),
                    language: language.to_string(),
                    source: e.to_string(),
                })?;
                self.compiled.write().unwrap().insert((language, query_key.to_string()), compiled);
            }
        }

        let cache = self.compiled.read().unwrap();
        let query = cache.get(&(language, query_key.to_string())).expect("just inserted");

        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, tree.root_node(), source_text.as_bytes());

        let mut records: Vec<(Point, Match)> = Vec::new();
        while let Some(m) = matches.next() {
            let mut captures: HashMap<String, NodeRegion> = HashMap::new();
            let mut earliest: Option<Point> = None;
            for capture in m.captures {
                let name = query.capture_names()[capture.index as usize].to_string();
                let node = capture.node;
                let text = node.utf8_text(source_text.as_bytes()).unwrap_or("").to_string();
                let start: Point = node.start_position().into();
                if earliest.is_none_or(|e| start < e) {
                    earliest = Some(start);
                }
                captures.insert(
                    name,
                    NodeRegion {
                        start_point: start,
                        end_point: node.end_position().into(),
                        text,
                    },
                );
            }
            records.push((
                earliest.unwrap_or(Point { row: 0, column: 0 }),
                Match {
                    query_key: query_key.to_string(),
                    captures,
                },
            ));
        }

        records.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(records.into_iter().map(|(_, m)| m).collect())
    }
}

fn language_grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::Markdown => tree_sitter_md::LANGUAGE.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarHost;

    #[test]
    fn ts_import_sources_yields_one_match_in_document_order() {
        let host = GrammarHost::new();
        let library = std::sync::Arc::new(QueryLibrary::new());
        let executor = QueryExecutor::new(library.clone());

        let source = "import { useState } from 'react';\nimport local from './local';";
        let tree = host.parse(Language::TypeScript, source).unwrap();

        let matches = executor
            .execute(Language::TypeScript, "ts-import-sources", &tree, source)
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].captures["source"].text, "'react'");
        assert_eq!(matches[1].captures["source"].text, "'./local'");
    }

    #[test]
    fn unknown_query_key_is_rejected() {
        let library = std::sync::Arc::new(QueryLibrary::new());
        let executor = QueryExecutor::new(library.clone());
        let host = GrammarHost::new();
        let tree = host.parse(Language::TypeScript, "").unwrap();
        let err = executor.execute(Language::TypeScript, "bogus-key", &tree, "").unwrap_err();
        assert!(matches!(err, QueryError::UnknownKey(_, _)));
    }

    #[test]
    fn repeated_execute_reuses_compiled_query_cache() {
        let library = std::sync::Arc::new(QueryLibrary::new());
        let executor = QueryExecutor::new(library.clone());
        let host = GrammarHost::new();
        let source = "import { x } from 'y';";
        let tree = host.parse(Language::TypeScript, source).unwrap();

        executor.execute(Language::TypeScript, "ts-import-sources", &tree, source).unwrap();
        assert_eq!(executor.compiled.read().unwrap().len(), 1);
        executor.execute(Language::TypeScript, "ts-import-sources", &tree, source).unwrap();
        assert_eq!(executor.compiled.read().unwrap().len(), 1);
    }
}
