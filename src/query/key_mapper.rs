//! KeyMapper — binds user-visible names to internal query keys.

use std::collections::HashMap;

use tree_sitter::Tree;

use crate::grammar::Language;

use super::{Match, QueryError, QueryExecutor, QueryResult};

/// Maps user-visible names (e.g. `"all_imports"`) onto internal query keys
/// (e.g. `"ts-import-sources"`), per language.
pub struct KeyMapper {
    bindings: HashMap<(Language, String), &'static str>,
}

impl Default for KeyMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyMapper {
    pub fn new() -> Self {
        let mut bindings = HashMap::new();
        for language in [Language::JavaScript, Language::TypeScript, Language::Tsx] {
            bindings.insert((language, "all_imports".to_string()), import_key_for(language));
            bindings.insert((language, "all_classes".to_string()), class_key_for(language));
        }
        bindings.insert((Language::Python, "all_imports".to_string()), "py-import-sources");
        bindings.insert((Language::Python, "all_classes".to_string()), "py-class-declarations");
        bindings.insert((Language::Go, "all_imports".to_string()), "go-import-sources");
        bindings.insert((Language::Java, "all_imports".to_string()), "java-import-sources");
        bindings.insert((Language::Java, "all_classes".to_string()), "java-class-declarations");

        Self { bindings }
    }

    pub fn bind(&mut self, language: Language, user_key: impl Into<String>, query_key: &'static str) {
        self.bindings.insert((language, user_key.into()), query_key);
    }

    fn resolve(&self, language: Language, user_key: &str) -> QueryResult<&'static str> {
        self.bindings
            .get(&(language, user_key.to_string()))
            .copied()
            .ok_or_else(|| QueryError::UnmappedUserKey(user_key.to_string()))
    }

    /// Run only the user keys listed, returning matches keyed by the
    /// user-visible name.
    pub fn execute(
        &self,
        executor: &QueryExecutor,
        language: Language,
        user_keys: &[&str],
        tree: &Tree,
        source_text: &str,
    ) -> QueryResult<HashMap<String, Vec<Match>>> {
        let mut out = HashMap::new();
        for user_key in user_keys {
            let query_key = self.resolve(language, user_key)?;
            let matches = executor.execute(language, query_key, tree, source_text)?;
            out.insert(user_key.to_string(), matches);
        }
        Ok(out)
    }

    /// Like `execute`, but skips keys whose flag in `enabled_flags` is
    /// `false`.
    pub fn execute_conditional(
        &self,
        executor: &QueryExecutor,
        language: Language,
        user_keys: &[&str],
        enabled_flags: &HashMap<&str, bool>,
        tree: &Tree,
        source_text: &str,
    ) -> QueryResult<HashMap<String, Vec<Match>>> {
        let filtered: Vec<&str> = user_keys
            .iter()
            .copied()
            .filter(|key| *enabled_flags.get(key).unwrap_or(&true))
            .collect();
        self.execute(executor, language, &filtered, tree, source_text)
    }
}

fn import_key_for(language: Language) -> &'static str {
    match language {
        Language::JavaScript => "js-import-sources",
        Language::TypeScript | Language::Tsx => "ts-import-sources",
        _ => "ts-import-sources",
    }
}

fn class_key_for(language: Language) -> &'static str {
    match language {
        Language::JavaScript => "js-class-declarations",
        Language::TypeScript | Language::Tsx => "ts-class-declarations",
        _ => "ts-class-declarations",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarHost;
    use crate::query::QueryLibrary;

    #[test]
    fn unknown_user_key_is_rejected() {
        let mapper = KeyMapper::new();
        let library = std::sync::Arc::new(QueryLibrary::new());
        let executor = QueryExecutor::new(library.clone());
        let host = GrammarHost::new();
        let tree = host.parse(Language::TypeScript, "").unwrap();

        let err = mapper
            .execute(&executor, Language::TypeScript, &["no_such_key"], &tree, "")
            .unwrap_err();
        assert!(matches!(err, QueryError::UnmappedUserKey(_)));
    }

    #[test]
    fn all_imports_resolves_to_language_specific_query() {
        let mapper = KeyMapper::new();
        let library = std::sync::Arc::new(QueryLibrary::new());
        let executor = QueryExecutor::new(library.clone());
        let host = GrammarHost::new();
        let source = "import { useState } from 'react';";
        let tree = host.parse(Language::TypeScript, source).unwrap();

        let result = mapper
            .execute(&executor, Language::TypeScript, &["all_imports"], &tree, source)
            .unwrap();
        assert_eq!(result["all_imports"].len(), 1);
    }

    #[test]
    fn execute_conditional_skips_disabled_keys() {
        let mapper = KeyMapper::new();
        let library = std::sync::Arc::new(QueryLibrary::new());
        let executor = QueryExecutor::new(library.clone());
        let host = GrammarHost::new();
        let source = "import { x } from 'y';";
        let tree = host.parse(Language::TypeScript, source).unwrap();

        let mut flags = HashMap::new();
        flags.insert("all_classes", false);

        let result = mapper
            .execute_conditional(
                &executor,
                Language::TypeScript,
                &["all_imports", "all_classes"],
                &flags,
                &tree,
                source,
            )
            .unwrap();
        assert!(result.contains_key("all_imports"));
        assert!(!result.contains_key("all_classes"));
    }
}
