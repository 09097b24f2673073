//! AnalysisCoordinator — for one file, run parse → query → process and
//! return a results bundle. Never writes to a store; that is the
//! orchestrator's job.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::grammar::{GrammarError, GrammarHost, Language};
use crate::processors::{
    self, CallExpression, ClassDeclaration, CodeBlock, FunctionDeclaration, Heading, ImportSource, InterfaceDeclaration, Link, MethodDeclaration,
    ProcessingContext, ProcessorWarning, TypeDeclaration,
};
use crate::query::{QueryError, QueryExecutor, QueryLibrary};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// One query key's typed output. A file's bundle holds one of these per
/// query key that produced at least an attempt (even zero records is a
/// variant here, not an absence).
#[derive(Debug, Clone)]
pub enum ProcessedRecordSet {
    ImportSources(Vec<ImportSource>),
    ClassDeclarations(Vec<ClassDeclaration>),
    InterfaceDeclarations(Vec<InterfaceDeclaration>),
    FunctionDeclarations(Vec<FunctionDeclaration>),
    MethodDeclarations(Vec<MethodDeclaration>),
    TypeDeclarations(Vec<TypeDeclaration>),
    CallExpressions(Vec<CallExpression>),
    Headings(Vec<Heading>),
    Links(Vec<Link>),
    CodeBlocks(Vec<CodeBlock>),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseMetrics {
    pub node_count: usize,
    pub parse_duration: Duration,
    pub error_node_count: usize,
}

#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    pub matches_processed: usize,
    pub records_produced: usize,
    pub warnings_produced: usize,
}

#[derive(Debug)]
pub struct AnalysisBundle {
    pub records_by_query_key: HashMap<String, ProcessedRecordSet>,
    pub warnings: Vec<ProcessorWarning>,
    pub processor_metrics: ProcessorMetrics,
    pub parse_metrics: ParseMetrics,
}

/// Dispatches a query key's raw matches to the one processor registered for
/// it, by matching on the key's suffix (every key in the library ends in a
/// shape shared across languages: `*-import-sources`, `*-class-declarations`,
/// and so on).
fn process_matches(
    query_key: &str,
    matches: &[crate::query::Match],
    context: &ProcessingContext,
) -> Option<(ProcessedRecordSet, Vec<ProcessorWarning>)> {
    if query_key.ends_with("import-sources") {
        let (records, warnings) = processors::process_import_sources(matches, context);
        return Some((ProcessedRecordSet::ImportSources(records), warnings));
    }
    if query_key.ends_with("class-declarations") {
        let (records, warnings) = processors::process_class_declarations(matches, context);
        return Some((ProcessedRecordSet::ClassDeclarations(records), warnings));
    }
    if query_key.ends_with("interface-declarations") {
        let (records, warnings) = processors::process_interface_declarations(matches, context);
        return Some((ProcessedRecordSet::InterfaceDeclarations(records), warnings));
    }
    if query_key.ends_with("method-declarations") {
        let (records, warnings) = processors::process_method_declarations(matches, context);
        return Some((ProcessedRecordSet::MethodDeclarations(records), warnings));
    }
    if query_key.ends_with("function-declarations") {
        let (records, warnings) = processors::process_function_declarations(matches, context);
        return Some((ProcessedRecordSet::FunctionDeclarations(records), warnings));
    }
    if query_key.ends_with("type-declarations") {
        let (records, warnings) = processors::process_type_declarations(matches, context);
        return Some((ProcessedRecordSet::TypeDeclarations(records), warnings));
    }
    if query_key.ends_with("call-expressions") {
        let (records, warnings) = processors::process_call_expressions(matches, context);
        return Some((ProcessedRecordSet::CallExpressions(records), warnings));
    }
    if query_key.ends_with("headings") {
        let (records, warnings) = processors::process_headings(matches, context);
        return Some((ProcessedRecordSet::Headings(records), warnings));
    }
    if query_key.ends_with("links") {
        let (records, warnings) = processors::process_links(matches, context);
        return Some((ProcessedRecordSet::Links(records), warnings));
    }
    if query_key.ends_with("code-blocks") {
        let (records, warnings) = processors::process_code_blocks(matches, context);
        return Some((ProcessedRecordSet::CodeBlocks(records), warnings));
    }
    None
}

/// For a file: parse, run every library query registered for its language
/// (or a caller-selected subset), process matches into typed records, and
/// attach parse metadata. Does not touch a `GraphStore`.
pub struct AnalysisCoordinator {
    grammar: Arc<GrammarHost>,
    library: Arc<QueryLibrary>,
    executor: QueryExecutor,
}

impl AnalysisCoordinator {
    pub fn new(grammar: Arc<GrammarHost>, library: Arc<QueryLibrary>) -> Self {
        let executor = QueryExecutor::new(library.clone());
        Self { grammar, library, executor }
    }

    /// Analyze `source` as `language`, running every query key the
    /// library has registered for it.
    pub fn analyze(&self, language: Language, source_file: &str, source: &str) -> AnalysisResult<AnalysisBundle> {
        self.analyze_with_keys(language, source_file, source, None)
    }

    /// Analyze, restricting execution to `query_keys` when given.
    pub fn analyze_with_keys(
        &self,
        language: Language,
        source_file: &str,
        source: &str,
        query_keys: Option<&[&str]>,
    ) -> AnalysisResult<AnalysisBundle> {
        let parse_started = Instant::now();
        let tree = self.grammar.parse(language, source)?;
        let parse_duration = parse_started.elapsed();
        let error_node_count = GrammarHost::count_error_nodes(&tree);
        let node_count = tree.root_node().descendant_count();

        let keys: Vec<&'static str> = match query_keys {
            Some(keys) => keys
                .iter()
                .filter_map(|k| self.library.keys_for(language).into_iter().find(|registered| registered == k))
                .collect(),
            None => self.library.keys_for(language),
        };

        let context = ProcessingContext {
            source_file: source_file.to_string(),
            language: language.as_str().to_string(),
        };

        let mut records_by_query_key = HashMap::new();
        let mut warnings = Vec::new();
        let mut matches_processed = 0;
        let mut records_produced = 0;

        for key in keys {
            let matches = self.executor.execute(language, key, &tree, source)?;
            matches_processed += matches.len();
            if let Some((record_set, key_warnings)) = process_matches(key, &matches, &context) {
                records_produced += record_set_len(&record_set);
                warnings.extend(key_warnings);
                records_by_query_key.insert(key.to_string(), record_set);
            }
        }

        let warnings_produced = warnings.len();

        Ok(AnalysisBundle {
            records_by_query_key,
            warnings,
            processor_metrics: ProcessorMetrics {
                matches_processed,
                records_produced,
                warnings_produced,
            },
            parse_metrics: ParseMetrics {
                node_count,
                parse_duration,
                error_node_count,
            },
        })
    }
}

fn record_set_len(set: &ProcessedRecordSet) -> usize {
    match set {
        ProcessedRecordSet::ImportSources(v) => v.len(),
        ProcessedRecordSet::ClassDeclarations(v) => v.len(),
        ProcessedRecordSet::InterfaceDeclarations(v) => v.len(),
        ProcessedRecordSet::FunctionDeclarations(v) => v.len(),
        ProcessedRecordSet::MethodDeclarations(v) => v.len(),
        ProcessedRecordSet::TypeDeclarations(v) => v.len(),
        ProcessedRecordSet::CallExpressions(v) => v.len(),
        ProcessedRecordSet::Headings(v) => v.len(),
        ProcessedRecordSet::Links(v) => v.len(),
        ProcessedRecordSet::CodeBlocks(v) => v.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_typescript_file_yields_import_and_class_records() {
        let coordinator = AnalysisCoordinator::new(Arc::new(GrammarHost::new()), Arc::new(QueryLibrary::new()));
        let source = "import { useState } from 'react';\n\nclass Widget {}\n";
        let bundle = coordinator.analyze(Language::TypeScript, "src/App.tsx", source).unwrap();

        assert!(bundle.warnings.is_empty());
        assert_eq!(bundle.parse_metrics.error_node_count, 0);
        assert!(bundle.parse_metrics.node_count > 0);

        match bundle.records_by_query_key.get("ts-import-sources") {
            Some(ProcessedRecordSet::ImportSources(records)) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].source, "react");
            }
            other => panic!("expected import sources, got {other:?}"),
        }
        match bundle.records_by_query_key.get("ts-class-declarations") {
            Some(ProcessedRecordSet::ClassDeclarations(records)) => {
                assert_eq!(records[0].name, "Widget");
            }
            other => panic!("expected class declarations, got {other:?}"),
        }
    }

    #[test]
    fn analyze_with_keys_restricts_to_requested_subset() {
        let coordinator = AnalysisCoordinator::new(Arc::new(GrammarHost::new()), Arc::new(QueryLibrary::new()));
        let source = "import { x } from 'y';\nclass Z {}\n";
        let bundle = coordinator
            .analyze_with_keys(Language::TypeScript, "f.ts", source, Some(&["ts-import-sources"]))
            .unwrap();

        assert!(bundle.records_by_query_key.contains_key("ts-import-sources"));
        assert!(!bundle.records_by_query_key.contains_key("ts-class-declarations"));
    }

    #[test]
    fn file_with_only_syntax_errors_still_parses_without_coordinator_error() {
        let coordinator = AnalysisCoordinator::new(Arc::new(GrammarHost::new()), Arc::new(QueryLibrary::new()));
        let bundle = coordinator.analyze(Language::TypeScript, "broken.ts", "import { from").unwrap();
        assert!(bundle.parse_metrics.error_node_count > 0);
    }
}
