//! # dep-linker-core
//!
//! A multi-language source-code dependency analyzer: tree-sitter parsing
//! across a curated language set (the JS/TS family including JSX/TSX, Java,
//! Python, Go, and Markdown), a typed query layer, an embedded graph store,
//! and an edge-type registry with transitive/hierarchical/inheritable
//! inference over the graph it builds.
//!
//! The crate is organized as five cooperating subsystems:
//!
//! - [`grammar`] + [`query`] + [`processors`]: parse source into a tree,
//!   run named S-expression queries against it, and convert raw captures
//!   into typed records.
//! - [`analysis`]: coordinates parse → query → process for one file.
//! - [`graph`]: the embedded node/edge store (backed by `turso`) and the
//!   stable [`identifier`] scheme used to address nodes.
//! - [`edge_types`] + [`inference`]: the edge-type catalogue and the
//!   algorithms (transitive closure, hierarchical rollup, inheritable
//!   propagation) that derive new edges from it.
//! - [`namespace`]: orchestrates analysis across a declared set of files,
//!   binds results into the graph, and detects cross-namespace edges.
//!
//! [`config`], [`logging`], [`cli`], and [`export`] are the ambient surface
//! around that core: namespace config loading, structured logging, the
//! command-line binary's argument parsing, and a JSON dump of the graph.

pub mod analysis;
pub mod cli;
pub mod config;
pub mod edge_types;
pub mod error;
pub mod export;
pub mod grammar;
pub mod graph;
pub mod identifier;
pub mod inference;
pub mod logging;
pub mod namespace;
pub mod path_safety;
pub mod processors;
pub mod query;

pub use error::{DepLinkerError, DepLinkerResult, Diagnostic, Severity};
