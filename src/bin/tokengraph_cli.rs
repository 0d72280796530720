//! TokenGraph CLI - Bridge interface for the design tool host
//!
//! Commands: collections, check-alias, validate, layout, export
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use tokengraph_core::{
    CollectionSet, TokenPipeline,
    layout::LayoutConfig,
};

#[derive(Parser)]
#[command(name = "tokengraph-cli")]
#[command(about = "TokenGraph CLI - Design Token Graph Engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Snapshot file (array of collections or versioned envelope)
    #[arg(short, long, conflicts_with = "collections_dir")]
    snapshot: Option<PathBuf>,

    /// Directory with one collection per JSON file
    #[arg(short, long, default_value = "collections")]
    collections_dir: PathBuf,

    /// Layout geometry overrides (JSON)
    #[arg(short, long)]
    layout_config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List collections in the snapshot
    Collections,

    /// Check whether one collection may alias another
    CheckAlias {
        /// Source collection ID
        #[arg(long)]
        source: String,

        /// Target collection ID
        #[arg(long)]
        target: String,
    },

    /// Validate one collection, or all of them
    Validate {
        /// Collection ID
        #[arg(short, long)]
        collection: Option<String>,
    },

    /// Compute the dependency-graph layout
    Layout,

    /// Export variables in the interchange format
    Export {
        /// Collection ID (exports without cross-collection context)
        #[arg(short, long)]
        collection: Option<String>,

        /// Wrap documents in a manifest with hash and provenance
        #[arg(short, long)]
        manifest: bool,
    },
}

fn emit<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => fail(format!("Serialization error: {}", e)),
    }
}

fn fail(message: impl std::fmt::Display) -> ExitCode {
    let output = serde_json::json!({ "error": message.to_string() });
    println!("{}", output);
    ExitCode::FAILURE
}

fn load_layout_config(path: &PathBuf) -> Result<LayoutConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read layout config: {}", e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid layout config: {}", e))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Load snapshot
    let loaded = match &cli.snapshot {
        Some(path) => CollectionSet::load_from_file(path),
        None => CollectionSet::load_from_dir(&cli.collections_dir),
    };
    let collections = match loaded {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    let mut pipeline = TokenPipeline::new(collections);
    if let Some(path) = &cli.layout_config {
        match load_layout_config(path) {
            Ok(config) => pipeline = pipeline.with_layout_config(config),
            Err(e) => return fail(e),
        }
    }

    if let Err(e) = pipeline.check_engine_version() {
        return fail(e);
    }

    match cli.command {
        Commands::Collections => {
            let collections: Vec<_> = pipeline.list_collections()
                .iter()
                .map(|c| serde_json::json!({
                    "id": c.id,
                    "name": c.name,
                    "layer": c.layer,
                    "modes": c.modes.len(),
                    "variables": c.variables.len(),
                }))
                .collect();
            emit(&collections)
        }

        Commands::CheckAlias { source, target } => {
            match pipeline.check_alias(&source, &target) {
                Ok(result) => {
                    let code = emit(&result);
                    if result.is_valid { code } else { ExitCode::from(2) }
                }
                Err(e) => fail(e),
            }
        }

        Commands::Validate { collection } => {
            let reports = match collection {
                Some(id) => match pipeline.validate_collection(&id) {
                    Ok(report) => vec![report],
                    Err(e) => return fail(e),
                },
                None => pipeline.validate_all(),
            };
            let valid = reports.iter().all(|r| r.is_valid());
            let code = emit(&serde_json::json!({ "valid": valid, "reports": reports }));
            if valid { code } else { ExitCode::from(2) }
        }

        Commands::Layout => emit(&pipeline.layout()),

        Commands::Export { collection, manifest } => {
            let report = match collection {
                Some(id) => match pipeline.export_collection(&id) {
                    Ok(report) => report,
                    Err(e) => return fail(e),
                },
                None => pipeline.export_all(),
            };

            if manifest {
                match pipeline.build_manifest(report) {
                    Ok(m) => emit(&m),
                    Err(e) => fail(e),
                }
            } else {
                emit(&report)
            }
        }
    }
}
