//! GrammarHost — owns parser instances and grammar handles per language:
//! the JS/TS family including JSX/TSX, Java, Python, Go, and Markdown.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;
use tree_sitter::{Language as TsLanguage, Parser, Tree};

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("unsupported language '{0}'")]
    UnsupportedLanguage(String),

    #[error("failed to set grammar for language '{0}': {1}")]
    GrammarLoad(String, String),
}

pub type GrammarResult<T> = Result<T, GrammarError>;

/// Languages recognised by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    TypeScript,
    Tsx,
    Java,
    Python,
    Go,
    Markdown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::TypeScript => "typescript",
            Language::Tsx => "tsx",
            Language::Java => "java",
            Language::Python => "python",
            Language::Go => "go",
            Language::Markdown => "markdown",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "javascript" | "js" | "jsx" => Some(Language::JavaScript),
            "typescript" | "ts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "java" => Some(Language::Java),
            "python" | "py" => Some(Language::Python),
            "go" | "golang" => Some(Language::Go),
            "markdown" | "md" => Some(Language::Markdown),
            _ => None,
        }
    }

    /// Infer a language from a file extension, per the orchestrator's "infer
    /// language by extension" step.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(Language::JavaScript),
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "java" => Some(Language::Java),
            "py" | "pyi" => Some(Language::Python),
            "go" => Some(Language::Go),
            "md" | "markdown" => Some(Language::Markdown),
            _ => None,
        }
    }

    fn grammar(&self) -> TsLanguage {
        match self {
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Language::Java => tree_sitter_java::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Markdown => tree_sitter_md::LANGUAGE.into(),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-language pool of parser instances; re-entrant per call. Parsers are not `Send`-shared across
/// calls, only checked out for the duration of one `parse`.
struct ParserPool {
    idle: HashMap<Language, Vec<Parser>>,
    max_idle_per_language: usize,
}

impl ParserPool {
    fn new() -> Self {
        Self {
            idle: HashMap::new(),
            max_idle_per_language: 4,
        }
    }

    fn checkout(&mut self, language: Language) -> GrammarResult<Parser> {
        if let Some(parser) = self.idle.entry(language).or_default().pop() {
            return Ok(parser);
        }
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|e| GrammarError::GrammarLoad(language.to_string(), e.to_string()))?;
        Ok(parser)
    }

    fn checkin(&mut self, language: Language, parser: Parser) {
        let slot = self.idle.entry(language).or_default();
        if slot.len() < self.max_idle_per_language {
            slot.push(parser);
        }
    }
}

/// Owns parser instances and grammar handles for every supported language
///. `parse` is re-entrant: concurrent callers each check out
/// their own parser from the pool and never share one mid-parse.
pub struct GrammarHost {
    pool: Mutex<ParserPool>,
}

impl Default for GrammarHost {
    fn default() -> Self {
        Self::new()
    }
}

impl GrammarHost {
    pub fn new() -> Self {
        Self {
            pool: Mutex::new(ParserPool::new()),
        }
    }

    /// Parse `source` as `language`. Syntactic errors never produce an `Err`
    /// here — the host returns a partial tree containing error nodes, and
    /// callers treat those as recoverable.
    pub fn parse(&self, language: Language, source: &str) -> GrammarResult<Tree> {
        let mut parser = {
            let mut pool = self.pool.lock().unwrap();
            pool.checkout(language)?
        };

        let tree = parser.parse(source, None).ok_or_else(|| {
            GrammarError::GrammarLoad(language.to_string(), "parser returned no tree".to_string())
        })?;

        let mut pool = self.pool.lock().unwrap();
        pool.checkin(language, parser);

        Ok(tree)
    }

    /// Number of nodes in `tree` whose grammar marked them as syntax errors,
    /// used by `AnalysisCoordinator` for the parse-error-node-count metric
    ///.
    pub fn count_error_nodes(tree: &Tree) -> usize {
        let mut cursor = tree.walk();
        let mut count = 0;
        let mut reached_root = false;
        loop {
            let node = cursor.node();
            if node.is_error() || node.is_missing() {
                count += 1;
            }
            if cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    break;
                }
                if !cursor.goto_parent() {
                    reached_root = true;
                    break;
                }
            }
            if reached_root {
                break;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typescript_deterministically() {
        let host = GrammarHost::new();
        let source = "import { useState } from 'react';";
        let tree1 = host.parse(Language::TypeScript, source).unwrap();
        let tree2 = host.parse(Language::TypeScript, source).unwrap();
        assert_eq!(tree1.root_node().to_sexp(), tree2.root_node().to_sexp());
    }

    #[test]
    fn syntax_errors_yield_partial_tree_not_an_error() {
        let host = GrammarHost::new();
        let tree = host.parse(Language::TypeScript, "import { from 'react'").unwrap();
        assert!(GrammarHost::count_error_nodes(&tree) > 0);
    }

    #[test]
    fn language_from_extension_covers_js_ts_family() {
        assert_eq!(Language::from_extension("tsx"), Some(Language::Tsx));
        assert_eq!(Language::from_extension("jsx"), Some(Language::JavaScript));
        assert_eq!(Language::from_extension("py"), Some(Language::Python));
        assert_eq!(Language::from_extension("rs"), None);
    }
}
