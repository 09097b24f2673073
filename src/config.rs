//! Namespace configuration — a mapping from namespace name to
//! `{filePatterns, excludePatterns, projectName, description, semanticTags,
//! scenarios}`, loaded from and saved back to TOML. Built on `toml_edit`
//! rather than a plain `serde::Deserialize` struct so unknown keys survive a
//! load/modify/save round trip instead of being dropped.

use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{Array, DocumentMut, Item, Table, Value};

use crate::namespace::Namespace;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading '{path}': {source}")]
    Io { path: String, source: std::io::Error },

    #[error("failed to parse namespace config: {0}")]
    Parse(#[from] toml_edit::TomlError),

    #[error("namespace '{0}' is not declared in the config")]
    UnknownNamespace(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// One namespace's declared record, independent of the document it came
/// from.
#[derive(Debug, Clone, Default)]
pub struct NamespaceEntry {
    pub file_patterns: Vec<String>,
    pub exclude_patterns: Vec<String>,
    pub project_name: Option<String>,
    pub description: Option<String>,
    pub semantic_tags: Vec<String>,
    pub scenarios: Vec<String>,
}

/// A loaded namespace config file, held as an editable TOML document so
/// re-saving preserves comments, formatting, and keys this crate doesn't
/// know about.
pub struct NamespaceConfig {
    path: PathBuf,
    document: DocumentMut,
}

impl NamespaceConfig {
    /// An empty config with no namespaces and no default, not yet
    /// associated with a file on disk.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            document: DocumentMut::new(),
        }
    }

    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let document = text.parse::<DocumentMut>()?;
        Ok(Self { path, document })
    }

    pub fn save(&self) -> ConfigResult<()> {
        std::fs::write(&self.path, self.document.to_string()).map_err(|e| ConfigError::Io {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        std::fs::write(path.as_ref(), self.document.to_string()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })
    }

    /// The top-level `default` key naming the namespace used when none is
    /// requested.
    pub fn default_namespace(&self) -> Option<String> {
        self.document.get("default").and_then(|i| i.as_str()).map(str::to_string)
    }

    pub fn set_default_namespace(&mut self, name: &str) {
        self.document["default"] = toml_edit::value(name);
    }

    /// Namespace names in declaration order (`toml_edit` preserves table
    /// order, unlike a `HashMap`-backed `serde::Deserialize`).
    pub fn namespace_names(&self) -> Vec<String> {
        self.document
            .iter()
            .filter(|(key, item)| *key != "default" && item.is_table())
            .map(|(key, _)| key.to_string())
            .collect()
    }

    pub fn namespace_entry(&self, name: &str) -> ConfigResult<NamespaceEntry> {
        let table = self
            .document
            .get(name)
            .and_then(|i| i.as_table())
            .ok_or_else(|| ConfigError::UnknownNamespace(name.to_string()))?;

        Ok(NamespaceEntry {
            file_patterns: string_array(table, "filePatterns"),
            exclude_patterns: string_array(table, "excludePatterns"),
            project_name: table.get("projectName").and_then(|i| i.as_str()).map(str::to_string),
            description: table.get("description").and_then(|i| i.as_str()).map(str::to_string),
            semantic_tags: string_array(table, "semanticTags"),
            scenarios: string_array(table, "scenarios"),
        })
    }

    /// Insert or replace a namespace's declaration, preserving every other
    /// key already in the document (including ones this crate doesn't
    /// model).
    pub fn set_namespace_entry(&mut self, name: &str, entry: &NamespaceEntry) {
        let mut table = Table::new();
        table["filePatterns"] = string_array_item(&entry.file_patterns);
        table["excludePatterns"] = string_array_item(&entry.exclude_patterns);
        if let Some(project_name) = &entry.project_name {
            table["projectName"] = toml_edit::value(project_name.as_str());
        }
        if let Some(description) = &entry.description {
            table["description"] = toml_edit::value(description.as_str());
        }
        table["semanticTags"] = string_array_item(&entry.semantic_tags);
        table["scenarios"] = string_array_item(&entry.scenarios);

        self.document[name] = Item::Table(table);
    }

    /// Resolve every declared namespace into an operational
    /// [`Namespace`], in declaration order. Glob patterns are resolved
    /// relative to `base_dir` (the config file's directory, by convention).
    pub fn to_namespaces(&self, base_dir: impl Into<PathBuf>) -> ConfigResult<Vec<Namespace>> {
        let base_dir = base_dir.into();
        let mut namespaces = Vec::new();
        for name in self.namespace_names() {
            let entry = self.namespace_entry(&name)?;
            let project_name = entry.project_name.clone().unwrap_or_else(|| name.clone());
            let mut namespace = Namespace::new(name, project_name, base_dir.clone());
            namespace.include_globs = entry.file_patterns;
            namespace.exclude_globs = entry.exclude_patterns;
            namespace.scenarios = entry.scenarios;
            namespaces.push(namespace);
        }
        Ok(namespaces)
    }

    /// The directory this config's glob patterns are resolved relative to.
    pub fn base_dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn string_array(table: &Table, key: &str) -> Vec<String> {
    table
        .get(key)
        .and_then(|i| i.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn string_array_item(values: &[String]) -> Item {
    let mut array = Array::new();
    for v in values {
        array.push(Value::from(v.as_str()));
    }
    Item::Value(Value::Array(array))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
default = "src"

[src]
filePatterns = ["**/*.ts", "**/*.tsx"]
excludePatterns = ["**/*.test.ts"]
projectName = "myproj"
scenarios = ["imports", "classes"]

[docs]
filePatterns = ["**/*.md"]
customUnknownKey = "preserved"
"#;

    #[test]
    fn parses_default_and_namespace_names_in_order() {
        let config = SAMPLE.parse::<DocumentMut>().unwrap();
        let config = NamespaceConfig {
            path: PathBuf::from("deps.toml"),
            document: config,
        };
        assert_eq!(config.default_namespace(), Some("src".to_string()));
        assert_eq!(config.namespace_names(), vec!["src".to_string(), "docs".to_string()]);
    }

    #[test]
    fn namespace_entry_reads_declared_fields() {
        let document = SAMPLE.parse::<DocumentMut>().unwrap();
        let config = NamespaceConfig {
            path: PathBuf::from("deps.toml"),
            document,
        };
        let entry = config.namespace_entry("src").unwrap();
        assert_eq!(entry.file_patterns, vec!["**/*.ts".to_string(), "**/*.tsx".to_string()]);
        assert_eq!(entry.project_name, Some("myproj".to_string()));
        assert_eq!(entry.scenarios, vec!["imports".to_string(), "classes".to_string()]);
    }

    #[test]
    fn unknown_namespace_is_rejected() {
        let document = SAMPLE.parse::<DocumentMut>().unwrap();
        let config = NamespaceConfig {
            path: PathBuf::from("deps.toml"),
            document,
        };
        assert!(matches!(config.namespace_entry("bogus"), Err(ConfigError::UnknownNamespace(_))));
    }

    #[test]
    fn unknown_keys_survive_a_save_modify_save_round_trip() {
        let document = SAMPLE.parse::<DocumentMut>().unwrap();
        let mut config = NamespaceConfig {
            path: PathBuf::from("deps.toml"),
            document,
        };
        let mut entry = config.namespace_entry("src").unwrap();
        entry.description = Some("updated".to_string());
        config.set_namespace_entry("src", &entry);

        let rendered = config.document.to_string();
        assert!(rendered.contains("customUnknownKey"));
        assert!(rendered.contains("preserved"));
        assert!(rendered.contains("updated"));
    }

    #[test]
    fn to_namespaces_resolves_project_name_and_globs() {
        let document = SAMPLE.parse::<DocumentMut>().unwrap();
        let config = NamespaceConfig {
            path: PathBuf::from("/work/deps.toml"),
            document,
        };
        let namespaces = config.to_namespaces(PathBuf::from("/work")).unwrap();
        assert_eq!(namespaces.len(), 2);
        assert_eq!(namespaces[0].name, "src");
        assert_eq!(namespaces[0].project_name, "myproj");
        assert_eq!(namespaces[1].name, "docs");
        assert_eq!(namespaces[1].project_name, "docs");
    }
}
