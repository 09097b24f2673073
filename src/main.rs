use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser as ClapParser;

use dep_linker_core::cli::{Args, Command, QueryCommand};
use dep_linker_core::config::{NamespaceConfig, NamespaceEntry};
use dep_linker_core::edge_types::EdgeTypeRegistry;
use dep_linker_core::export::{export_graph, to_json, ExportOptions};
use dep_linker_core::grammar::GrammarHost;
use dep_linker_core::graph::{open_default, GraphStore, NodeKind};
use dep_linker_core::inference::{InferenceEngine, TransitiveOptions};
use dep_linker_core::logging::init_logging;
use dep_linker_core::namespace::NamespaceOrchestrator;
use dep_linker_core::query::QueryLibrary;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_buffer = init_logging(&args.log_level);

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_on_signal.cancel();
        }
    });

    let config_path = if args.config.is_absolute() {
        args.config.clone()
    } else {
        args.root.join(&args.config)
    };

    let store: Arc<dyn GraphStore> = open_default(&args.root).await.context("opening graph store")?;
    let analysis_coordinator = Arc::new(dep_linker_core::analysis::AnalysisCoordinator::new(
        Arc::new(GrammarHost::new()),
        Arc::new(QueryLibrary::new()),
    ));

    match args.command {
        Command::Analyze { namespace } => {
            let config = NamespaceConfig::load(&config_path).context("loading namespace config")?;
            let namespaces = config.to_namespaces(config.base_dir())?;
            let Some(target) = namespaces.into_iter().find(|n| n.name == namespace) else {
                bail!("namespace '{namespace}' is not declared in {}", config_path.display());
            };

            let orchestrator = NamespaceOrchestrator::new(store.clone(), analysis_coordinator, vec![target.clone()]);
            let outcome = orchestrator.analyze_namespace_cancellable(&target, Some(&cancel)).await?;
            print_outcome(&namespace, &outcome);
        }
        Command::AnalyzeAll => {
            let config = NamespaceConfig::load(&config_path).context("loading namespace config")?;
            let namespaces = config.to_namespaces(config.base_dir())?;
            if namespaces.is_empty() {
                bail!("{} declares no namespaces", config_path.display());
            }

            let orchestrator = NamespaceOrchestrator::new(store.clone(), analysis_coordinator, namespaces);
            let outcomes = orchestrator.analyze_all_cancellable(Some(&cancel)).await?;
            let mut names: Vec<&String> = outcomes.keys().collect();
            names.sort();
            for name in names {
                print_outcome(name, &outcomes[name]);
            }
        }
        Command::Query { query } => {
            let registry = Arc::new(EdgeTypeRegistry::new());
            let engine = InferenceEngine::new(store.clone(), registry);
            match query {
                QueryCommand::Transitive {
                    start,
                    edge_type,
                    max_path_length,
                    include_self,
                } => {
                    let options = TransitiveOptions {
                        max_path_length,
                        include_self,
                        ..Default::default()
                    };
                    let result = engine.query_transitive_cancellable(&start, &edge_type, options, Some(&cancel)).await?;
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                QueryCommand::Hierarchical { edge_type, max_depth } => {
                    let result = engine.hierarchical_query_cancellable(&edge_type, max_depth, Some(&cancel)).await?;
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                QueryCommand::Inheritable {
                    containment_type,
                    relation_type,
                    max_depth,
                } => {
                    let result = engine
                        .infer_inheritable_cancellable(&containment_type, &relation_type, max_depth, Some(&cancel))
                        .await?;
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
            }
        }
        Command::Export {
            kind,
            language,
            namespace,
            edge_type,
            connected_only,
            output,
        } => {
            let options = ExportOptions {
                kind: kind.as_deref().and_then(NodeKind::from_str),
                language,
                namespace,
                edge_type,
                connected_only,
            };
            let graph = export_graph(store.as_ref(), &options).await?;
            let json = to_json(&graph)?;
            match output {
                Some(path) => std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?,
                None => println!("{json}"),
            }
        }
        Command::Init { patterns } => {
            let mut config = NamespaceConfig::empty(&config_path);
            config.set_default_namespace("default");
            config.set_namespace_entry(
                "default",
                &NamespaceEntry {
                    file_patterns: patterns,
                    exclude_patterns: Vec::new(),
                    project_name: None,
                    description: Some("scaffolded namespace".to_string()),
                    semantic_tags: Vec::new(),
                    scenarios: Vec::new(),
                },
            );
            config.save().with_context(|| format!("writing {}", config_path.display()))?;
            println!("wrote {}", config_path.display());
        }
    }

    Ok(())
}

fn print_outcome(namespace: &str, outcome: &dep_linker_core::namespace::NamespaceOutcome) {
    println!(
        "{namespace}: {} listed, {} analyzed, {} skipped (unchanged), {} diagnostic(s)",
        outcome.files_listed,
        outcome.files_analyzed,
        outcome.files_skipped_unchanged,
        outcome.diagnostics.len()
    );
    for diagnostic in &outcome.diagnostics {
        eprintln!("  [{:?}] {}: {}", diagnostic.severity, diagnostic.code, diagnostic.message);
    }
}
