//! EdgeTypeRegistry — the declarative catalogue of relationship kinds, held
//! as a data-driven, in-memory registry with a parent pointer per entry
//! rather than a closed Rust enum, so new edge types can be registered at
//! runtime without a recompile.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use thiserror::Error;

use crate::graph::EdgeTypeRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EdgeTypeError {
    #[error("edge type '{0}' is already registered with different attributes")]
    Conflict(String),

    #[error("unknown edge type '{0}'")]
    Unknown(String),

    #[error("edge type '{name}' declares parent '{parent}' which is not registered")]
    DanglingParent { name: String, parent: String },

    #[error("registering edge type '{0}' would introduce a cycle in the parent forest")]
    Cycle(String),

    #[error("cannot remove edge type '{0}': it has registered children")]
    HasChildren(String),
}

pub type EdgeTypeResult<T> = Result<T, EdgeTypeError>;

/// In-memory catalogue of edge types, built from the built-in catalogue plus
/// whatever the analysis run registers. Guarded by an `RwLock`: mutable
/// state confined to one process-wide object, reached only through these
/// entry points.
pub struct EdgeTypeRegistry {
    records: RwLock<HashMap<String, EdgeTypeRecord>>,
    version: AtomicU64,
}

impl Default for EdgeTypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EdgeTypeRegistry {
    /// An empty registry, with no built-ins registered. Tests that want
    /// isolation from the built-in catalogue should start here.
    pub fn empty() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
        }
    }

    /// Monotonically increasing counter bumped by every successful
    /// `register`/`remove`, used as part of the inference engine's cache key.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// A registry pre-populated with the built-in catalogue.
    pub fn new() -> Self {
        let registry = Self::empty();
        for record in builtin_catalogue() {
            registry
                .register(record)
                .expect("built-in edge-type catalogue must be internally consistent");
        }
        registry
    }

    /// Register a new edge type, or no-op if called twice with identical
    /// input.
    pub fn register(&self, record: EdgeTypeRecord) -> EdgeTypeResult<()> {
        if let Some(parent) = &record.parent {
            let records = self.records.read().unwrap();
            if !records.contains_key(parent) {
                return Err(EdgeTypeError::DanglingParent {
                    name: record.name.clone(),
                    parent: parent.clone(),
                });
            }
            if would_cycle(&records, &record.name, parent) {
                return Err(EdgeTypeError::Cycle(record.name.clone()));
            }
        }

        let mut records = self.records.write().unwrap();
        match records.get(&record.name) {
            Some(existing) if *existing == record => Ok(()),
            Some(_) => Err(EdgeTypeError::Conflict(record.name.clone())),
            None => {
                records.insert(record.name.clone(), record);
                self.version.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }

    pub fn lookup(&self, name: &str) -> EdgeTypeResult<EdgeTypeRecord> {
        self.records
            .read()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| EdgeTypeError::Unknown(name.to_string()))
    }

    pub fn is_transitive(&self, name: &str) -> EdgeTypeResult<bool> {
        Ok(self.lookup(name)?.is_transitive)
    }

    pub fn is_inheritable(&self, name: &str) -> EdgeTypeResult<bool> {
        Ok(self.lookup(name)?.is_inheritable)
    }

    /// The transitive set of child edge types, inclusive of `name` itself.
    pub fn descendants_of(&self, name: &str) -> EdgeTypeResult<Vec<String>> {
        let records = self.records.read().unwrap();
        if !records.contains_key(name) {
            return Err(EdgeTypeError::Unknown(name.to_string()));
        }

        let mut out = vec![name.to_string()];
        let mut frontier = vec![name.to_string()];
        while let Some(current) = frontier.pop() {
            for record in records.values() {
                if record.parent.as_deref() == Some(current.as_str()) {
                    out.push(record.name.clone());
                    frontier.push(record.name.clone());
                }
            }
        }
        Ok(out)
    }

    /// Validate the full parent forest: no cycles, no dangling parents.
    /// `register` already rejects individual additions that would violate
    /// this, so a clean registry always passes; this is for catalogues
    /// assembled outside `register` (e.g. restored from a store dump).
    pub fn validate(&self) -> EdgeTypeResult<()> {
        let records = self.records.read().unwrap();
        for record in records.values() {
            if let Some(parent) = &record.parent {
                if !records.contains_key(parent) {
                    return Err(EdgeTypeError::DanglingParent {
                        name: record.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
        }
        for name in records.keys() {
            let mut seen = std::collections::HashSet::new();
            let mut current = name.clone();
            seen.insert(current.clone());
            while let Some(parent) = records.get(&current).and_then(|r| r.parent.clone()) {
                if !seen.insert(parent.clone()) {
                    return Err(EdgeTypeError::Cycle(name.clone()));
                }
                current = parent;
            }
        }
        Ok(())
    }

    pub fn all(&self) -> Vec<EdgeTypeRecord> {
        self.records.read().unwrap().values().cloned().collect()
    }

    /// Remove a type, forbidden while it has children.
    pub fn remove(&self, name: &str) -> EdgeTypeResult<()> {
        let records = self.records.read().unwrap();
        let has_children = records.values().any(|r| r.parent.as_deref() == Some(name));
        if has_children {
            return Err(EdgeTypeError::HasChildren(name.to_string()));
        }
        drop(records);
        self.records.write().unwrap().remove(name);
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn would_cycle(records: &HashMap<String, EdgeTypeRecord>, new_name: &str, declared_parent: &str) -> bool {
    let mut current = declared_parent.to_string();
    let mut hops = 0;
    loop {
        if current == new_name {
            return true;
        }
        hops += 1;
        if hops > records.len() + 1 {
            return true;
        }
        match records.get(&current).and_then(|r| r.parent.clone()) {
            Some(parent) => current = parent,
            None => return false,
        }
    }
}

/// Built-in catalogue
/// The built-in edge-type catalogue, shared with [`SqliteGraphStore`]'s
/// schema seeding so the store's `edge_types` table starts non-empty.
///
/// [`SqliteGraphStore`]: crate::graph::SqliteGraphStore
pub(crate) fn builtin_catalogue() -> Vec<EdgeTypeRecord> {
    let mut r = |name: &str, parent: Option<&str>, transitive: bool, inheritable: bool, description: &str| EdgeTypeRecord {
        name: name.to_string(),
        parent: parent.map(str::to_string),
        is_directed: true,
        is_transitive: transitive,
        is_inheritable: inheritable,
        description: description.to_string(),
    };

    vec![
        // Structural
        r("contains", None, true, true, "containment: a file, class, or module contains a member"),
        r("declares", None, false, true, "a scope declares a symbol within it"),
        r("belongs_to", None, false, false, "inverse membership: a member belongs to its owner"),
        // Dependency
        r("depends_on", None, true, false, "general dependency between units"),
        r("imports", None, false, false, "a file imports a symbol, package, or library"),
        r("imports_file", Some("imports"), false, false, "import resolved to a local file"),
        r("imports_package", Some("imports"), false, false, "import resolved to a workspace package"),
        r("imports_library", Some("imports"), false, false, "import resolved to an external library"),
        r("exports_to", None, false, false, "a module exports a symbol for external use"),
        // Code
        r("calls", None, false, false, "a call site invokes a callable"),
        r("references", None, false, false, "a read/use reference to a symbol"),
        r("extends", None, false, true, "class or interface extension"),
        r("implements", None, false, true, "interface implementation"),
        r("uses", None, false, false, "generic usage relationship"),
        r("instantiates", None, false, false, "construction of an instance of a type"),
        // Typing
        r("has_type", None, false, false, "a symbol's declared or inferred type"),
        r("returns", None, false, false, "a callable's return type"),
        r("throws", None, false, false, "a callable's declared exception type"),
        // Access
        r("assigns_to", None, false, false, "a write to a variable or field"),
        r("accesses", None, false, false, "a read of a variable or field"),
        // Pattern support
        r("aliasOf", None, false, false, "links an unresolved import alias node to its canonical target"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalogue_validates() {
        let registry = EdgeTypeRegistry::new();
        registry.validate().unwrap();
    }

    #[test]
    fn descendants_of_imports_includes_children() {
        let registry = EdgeTypeRegistry::new();
        let mut descendants = registry.descendants_of("imports").unwrap();
        descendants.sort();
        assert_eq!(
            descendants,
            vec![
                "imports".to_string(),
                "imports_file".to_string(),
                "imports_library".to_string(),
                "imports_package".to_string(),
            ]
        );
    }

    #[test]
    fn register_twice_with_identical_input_is_noop() {
        let registry = EdgeTypeRegistry::empty();
        let record = EdgeTypeRecord::new("depends_on");
        registry.register(record.clone()).unwrap();
        registry.register(record).unwrap();
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn register_conflicting_attributes_is_rejected() {
        let registry = EdgeTypeRegistry::empty();
        registry.register(EdgeTypeRecord::new("x")).unwrap();
        let mut conflicting = EdgeTypeRecord::new("x");
        conflicting.is_transitive = true;
        assert!(matches!(
            registry.register(conflicting),
            Err(EdgeTypeError::Conflict(_))
        ));
    }

    #[test]
    fn register_with_dangling_parent_is_rejected() {
        let registry = EdgeTypeRegistry::empty();
        let mut record = EdgeTypeRecord::new("child");
        record.parent = Some("ghost".to_string());
        assert!(matches!(
            registry.register(record),
            Err(EdgeTypeError::DanglingParent { .. })
        ));
    }

    #[test]
    fn register_introducing_a_cycle_is_rejected() {
        let registry = EdgeTypeRegistry::empty();
        registry.register(EdgeTypeRecord::new("a")).unwrap();
        let mut b = EdgeTypeRecord::new("b");
        b.parent = Some("a".to_string());
        registry.register(b).unwrap();

        // Re-registering "a" with parent "b" would close a cycle a -> b -> a.
        let mut a_with_parent = EdgeTypeRecord::new("a");
        a_with_parent.parent = Some("b".to_string());
        assert!(matches!(
            registry.register(a_with_parent),
            Err(EdgeTypeError::Cycle(_))
        ));
    }

    #[test]
    fn remove_with_children_is_rejected() {
        let registry = EdgeTypeRegistry::new();
        assert!(matches!(
            registry.remove("imports"),
            Err(EdgeTypeError::HasChildren(_))
        ));
    }

    #[test]
    fn unknown_lookup_is_rejected() {
        let registry = EdgeTypeRegistry::empty();
        assert!(matches!(registry.lookup("bogus"), Err(EdgeTypeError::Unknown(_))));
    }
}
