//! pathflow CLI tool
//!
//! Command-line interface for evaluating and inspecting workspace files with pathflow-core.
//!
//! ## Commands
//!
//! - `eval <file>`: Recompute every holder and print the resulting attributes
//! - `order <file> <holder>`: Print the evaluation order of one holder's formulas
//! - `check <file>`: Load the workspace and report whether every formula is accepted
//! - `paths <file> <holder> [prefix]`: List path completions from a holder's point of view
//!
//! Holders are given as `Container#Holder`, or as a bare holder name or label inside the first
//! container of the file.

use clap::{Parser, Subcommand};
use pathflow_core::{
    completion::Completer,
    config::{TomlWorkspaceProvider, WorkspaceFile, WorkspaceProvider},
    expr::ExprParser,
    model::{AttributeHost, HolderRef},
    paths::unescape,
    workspace::Workspace,
    PathflowError,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pathflow")]
#[command(author, version, about = "Evaluate path-addressed formulas in a workspace file", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recompute the workspace and print every attribute
    Eval {
        /// Path to the workspace TOML file
        file: PathBuf,

        /// Write the recomputed workspace back to the file
        #[arg(short, long)]
        write: bool,
    },

    /// Print the evaluation order of a holder's formulas
    Order {
        /// Path to the workspace TOML file
        file: PathBuf,

        /// Holder, as `Container#Holder` or a name or label in the first container
        holder: String,
    },

    /// Load the workspace and validate every formula
    Check {
        /// Path to the workspace TOML file
        file: PathBuf,
    },

    /// List path completions available to a holder's formulas
    Paths {
        /// Path to the workspace TOML file
        file: PathBuf,

        /// Holder, as `Container#Holder` or a name or label in the first container
        holder: String,

        /// Only list suggestions starting with this text
        #[arg(default_value = "")]
        prefix: String,
    },
}

fn load(file: &PathBuf) -> Result<(TomlWorkspaceProvider, WorkspaceFile, Workspace), PathflowError> {
    let provider = TomlWorkspaceProvider::new(file);
    let description = provider.load()?;
    let workspace = description.build(&ExprParser)?;
    Ok((provider, description, workspace))
}

fn find_holder(workspace: &Workspace, text: &str) -> Result<HolderRef, PathflowError> {
    let (container, holder) = match text.split_once('#') {
        Some((container, holder)) => (unquote(container), unquote(holder)),
        None => {
            let container = workspace
                .containers()
                .into_iter()
                .next()
                .ok_or_else(|| PathflowError::NotFound("workspace has no containers".into()))?;
            (container, unquote(text))
        }
    };
    workspace
        .resolve_holder(&container, &holder)
        .unique()
        .map(|name| HolderRef::new(container.clone(), name))
        .ok_or_else(|| PathflowError::NotFound(format!("holder {text}")))
}

fn unquote(text: &str) -> String {
    text.strip_prefix("<<")
        .and_then(|inner| inner.strip_suffix(">>"))
        .and_then(|inner| unescape(inner).ok())
        .unwrap_or_else(|| text.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Eval { file, write } => {
            let (provider, _, workspace) = load(&file)?;
            let applied = workspace.recompute()?;
            for container in workspace.containers() {
                for entry in workspace.holders(&container) {
                    let holder = HolderRef::new(container.clone(), entry.name);
                    for (attribute, value) in workspace.attributes(&holder) {
                        println!("{}.{} = {}", holder, attribute, serde_json::to_string(&value)?);
                    }
                }
            }
            println!("\n{applied} formula(s) applied");
            if write {
                provider.save(&WorkspaceFile::capture(&workspace))?;
                println!("Wrote {:?}", provider.path());
            }
        }

        Commands::Order { file, holder } => {
            let (_, _, workspace) = load(&file)?;
            let holder = find_holder(&workspace, &holder)?;
            let engine = workspace.engine(&holder)?;
            for (step, path) in engine.evaluation_order(&workspace)?.iter().enumerate() {
                println!("{:>3}. {}", step + 1, path);
            }
        }

        Commands::Check { file } => match load(&file) {
            Ok((_, description, workspace)) => {
                let formulas: usize = workspace.engines().iter().map(|e| e.len()).sum();
                println!(
                    "✓ {} container(s), {} formula(s) accepted",
                    description.containers.len(),
                    formulas
                );
            }
            Err(e) => {
                eprintln!("✗ {e}");
                std::process::exit(1);
            }
        },

        Commands::Paths {
            file,
            holder,
            prefix,
        } => {
            let (_, _, workspace) = load(&file)?;
            let holder = find_holder(&workspace, &holder)?;
            for suggestion in Completer::new(&workspace, &holder).complete(&prefix) {
                println!("{:?}\t{}", suggestion.kind, suggestion.text);
            }
        }
    }

    Ok(())
}
