//! QueryLibrary — the static, language-scoped catalogue of S-expression
//! queries. Append-only: entries registered here must not be
//! removed in a minor release (enforced by convention, not by code — the
//! registry itself has no removal operation).

use std::collections::HashMap;

use crate::grammar::Language;

/// `{query-key -> S-expression source}`, scoped per language.
pub struct QueryLibrary {
    entries: HashMap<(Language, &'static str), &'static str>,
}

impl Default for QueryLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryLibrary {
    pub fn new() -> Self {
        let mut entries = HashMap::new();

        // JavaScript
        entries.insert((Language::JavaScript, "js-import-sources"), "(import_statement source: (string) @source)");
        entries.insert(
            (Language::JavaScript, "js-class-declarations"),
            "(class_declaration name: (identifier) @name) @class",
        );
        entries.insert(
            (Language::JavaScript, "js-function-declarations"),
            "(function_declaration name: (identifier) @name) @function",
        );
        entries.insert(
            (Language::JavaScript, "js-method-declarations"),
            "(method_definition name: (property_identifier) @name) @method",
        );
        entries.insert(
            (Language::JavaScript, "js-call-expressions"),
            "(call_expression function: (identifier) @callee) @call",
        );

        // TypeScript (shares JS declaration shapes for functions/methods/calls;
        // class/interface names use `type_identifier`)
        entries.insert((Language::TypeScript, "ts-import-sources"), "(import_statement source: (string) @source)");
        entries.insert(
            (Language::TypeScript, "ts-class-declarations"),
            "(class_declaration name: (type_identifier) @name) @class",
        );
        entries.insert(
            (Language::TypeScript, "ts-interface-declarations"),
            "(interface_declaration name: (type_identifier) @name) @interface",
        );
        entries.insert(
            (Language::TypeScript, "ts-function-declarations"),
            "(function_declaration name: (identifier) @name) @function",
        );
        entries.insert(
            (Language::TypeScript, "ts-method-declarations"),
            "(method_definition name: (property_identifier) @name) @method",
        );
        entries.insert(
            (Language::TypeScript, "ts-call-expressions"),
            "(call_expression function: (identifier) @callee) @call",
        );

        // TSX: the grammar is a superset of TypeScript's, so the same query
        // sources apply under a separate language-scoped key.
        entries.insert((Language::Tsx, "ts-import-sources"), "(import_statement source: (string) @source)");
        entries.insert(
            (Language::Tsx, "ts-class-declarations"),
            "(class_declaration name: (type_identifier) @name) @class",
        );
        entries.insert(
            (Language::Tsx, "ts-interface-declarations"),
            "(interface_declaration name: (type_identifier) @name) @interface",
        );
        entries.insert(
            (Language::Tsx, "ts-function-declarations"),
            "(function_declaration name: (identifier) @name) @function",
        );
        entries.insert(
            (Language::Tsx, "ts-method-declarations"),
            "(method_definition name: (property_identifier) @name) @method",
        );
        entries.insert(
            (Language::Tsx, "ts-call-expressions"),
            "(call_expression function: (identifier) @callee) @call",
        );

        // Python
        entries.insert(
            (Language::Python, "py-import-sources"),
            "[(import_statement name: (dotted_name) @source) (import_from_statement module_name: (dotted_name) @source)]",
        );
        entries.insert(
            (Language::Python, "py-class-declarations"),
            "(class_definition name: (identifier) @name) @class",
        );
        entries.insert(
            (Language::Python, "py-function-declarations"),
            "(function_definition name: (identifier) @name) @function",
        );
        entries.insert((Language::Python, "py-call-expressions"), "(call function: (identifier) @callee) @call");

        // Go
        entries.insert((Language::Go, "go-import-sources"), "(import_spec path: (interpreted_string_literal) @source)");
        entries.insert(
            (Language::Go, "go-function-declarations"),
            "(function_declaration name: (identifier) @name) @function",
        );
        entries.insert(
            (Language::Go, "go-method-declarations"),
            "(method_declaration name: (field_identifier) @name) @method",
        );
        entries.insert((Language::Go, "go-type-declarations"), "(type_spec name: (type_identifier) @name) @type");
        entries.insert(
            (Language::Go, "go-call-expressions"),
            "(call_expression function: (identifier) @callee) @call",
        );

        // Java
        entries.insert((Language::Java, "java-import-sources"), "(import_declaration (scoped_identifier) @source)");
        entries.insert(
            (Language::Java, "java-class-declarations"),
            "(class_declaration name: (identifier) @name) @class",
        );
        entries.insert(
            (Language::Java, "java-interface-declarations"),
            "(interface_declaration name: (identifier) @name) @interface",
        );
        entries.insert(
            (Language::Java, "java-method-declarations"),
            "(method_declaration name: (identifier) @name) @method",
        );
        entries.insert(
            (Language::Java, "java-call-expressions"),
            "(method_invocation name: (identifier) @callee) @call",
        );

        // Markdown
        entries.insert((Language::Markdown, "md-headings"), "(atx_heading (inline) @text) @heading");
        entries.insert((Language::Markdown, "md-links"), "(inline_link (link_destination) @dest) @link");
        entries.insert(
            (Language::Markdown, "md-code-blocks"),
            "(fenced_code_block (info_string)? @lang) @code",
        );

        Self { entries }
    }

    pub fn get(&self, language: Language, query_key: &str) -> Option<&'static str> {
        self.entries.get(&(language, query_key)).copied()
    }

    /// All query keys registered for `language`, used by `AnalysisCoordinator`
    /// to look up "all library keys registered for that language".
    pub fn keys_for(&self, language: Language) -> Vec<&'static str> {
        let mut keys: Vec<&'static str> = self
            .entries
            .keys()
            .filter(|(lang, _)| *lang == language)
            .map(|(_, key)| *key)
            .collect();
        keys.sort_unstable();
        keys
    }
}
