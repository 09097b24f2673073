//! Command-line argument definitions. The binary (`src/main.rs`) owns
//! dispatch; this module only owns parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "dep-linker", author, version, about = "Multi-language source-code dependency analyzer", long_about = None)]
pub struct Args {
    /// Project root containing the namespace config and the graph store.
    #[arg(short = 'C', long = "root", default_value = ".")]
    pub root: PathBuf,

    /// Namespace config file, relative to `root` unless absolute.
    #[arg(long = "config", default_value = "deps.toml")]
    pub config: PathBuf,

    /// Log level used when `RUST_LOG` is unset.
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a single declared namespace and update the graph store.
    Analyze {
        /// Namespace name as declared in the config file.
        namespace: String,
    },
    /// Analyze every declared namespace, in declaration order.
    AnalyzeAll,
    /// Run an inference query over the graph store.
    Query {
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// Export the graph store (or a filtered slice of it) as JSON.
    Export {
        /// Restrict to nodes of this kind (e.g. `class`, `function`, `file`).
        #[arg(long)]
        kind: Option<String>,

        /// Restrict to nodes parsed from this language.
        #[arg(long)]
        language: Option<String>,

        /// Restrict to nodes bound to this namespace.
        #[arg(long)]
        namespace: Option<String>,

        /// Restrict edges to this edge type.
        #[arg(long = "edge-type")]
        edge_type: Option<String>,

        /// Drop nodes that participate in no edge.
        #[arg(long = "connected-only")]
        connected_only: bool,

        /// Write to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Scaffold a namespace config file with a single `default` namespace.
    Init {
        /// File patterns for the scaffolded namespace (repeatable).
        #[arg(long = "pattern", default_values_t = vec!["**/*".to_string()])]
        patterns: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum QueryCommand {
    /// Nodes reachable from `start` by following a transitive edge type.
    Transitive {
        start: String,
        edge_type: String,
        #[arg(long = "max-path-length", default_value_t = 10)]
        max_path_length: usize,
        #[arg(long = "include-self")]
        include_self: bool,
    },
    /// Edges of `edge_type` or any of its registered descendant types.
    Hierarchical {
        edge_type: String,
        #[arg(long = "max-depth")]
        max_depth: Option<usize>,
    },
    /// Derived edges propagated through a containment chain.
    Inheritable {
        containment_type: String,
        relation_type: String,
        #[arg(long = "max-depth")]
        max_depth: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}
