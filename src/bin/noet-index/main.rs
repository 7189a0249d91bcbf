//! noet-index CLI tool
//!
//! Command-line interface for keeping the metadata of a directory corpus in sync.
//!
//! ## Commands
//!
//! - `init [root]`: write a default `noet-index.toml` if missing and create empty records
//! - `rebuild [root]`: recompute every record from scratch
//! - `save <doc>`: computed save of one document, with optional field edits
//! - `move <from> <to>`: move a document and rewrite everything that links to it
//! - `remove <doc>`: delete a document and detach it from the graph
//! - `collect [root]`: rebuild the aggregate cache
//! - `check [root]`: list graph invariant violations (non-zero exit if any)
//! - `show <doc>`: print a stored record
//!
//! Records and cache entries live under the directories named in the configuration
//! (`.noet/meta` and `.noet/cache` by default).

use clap::{Parser, Subcommand};
use noet_index::{
    config::TomlConfigProvider,
    properties::EditedFields,
    BuildonomyError, IndexContext, SyncDiagnostic,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "noet-index")]
#[command(author, version, about = "Keeps a knowledge base's relationship metadata in sync", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration and create a record for every unindexed document
    Init {
        /// Corpus root (default: current directory)
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Recompute every record in two passes
    Rebuild {
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Print every diagnostic
        #[arg(short, long)]
        verbose: bool,
    },

    /// Computed save of one document
    Save {
        /// Document path relative to the corpus root
        doc: String,

        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Replace the tag list (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Replace the declared parents (repeatable)
        #[arg(long = "parent")]
        parents: Vec<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long)]
        file_type: Option<String>,

        /// Also update the orphaned-media cache entry
        #[arg(long)]
        index: bool,
    },

    /// Move a document, rewriting references to it
    Move {
        from: String,
        to: String,

        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Delete a document and detach it from the graph
    Remove {
        doc: String,

        #[arg(long, default_value = ".")]
        root: PathBuf,
    },

    /// Rebuild the aggregate cache
    Collect {
        #[arg(default_value = ".")]
        root: PathBuf,

        /// Print every aggregate
        #[arg(short, long)]
        verbose: bool,
    },

    /// Audit the stored graph
    Check {
        #[arg(default_value = ".")]
        root: PathBuf,
    },

    /// Print the stored record of a document
    Show {
        doc: String,

        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn print_diagnostics(diagnostics: &[SyncDiagnostic]) {
    for diagnostic in diagnostics {
        println!("  - {diagnostic}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { root } => {
            let provider = TomlConfigProvider::for_root(&root);
            if !provider.path().exists() {
                provider.store(&provider.load()?)?;
                println!("✓ Configuration written: {}", provider.path().display());
            }
            let ctx = IndexContext::for_root(&root)?;
            let created = ctx.initialize_all()?;
            println!("✓ Created {created} records");
        }

        Commands::Rebuild { root, verbose } => {
            let ctx = IndexContext::for_root(&root)?;
            let report = ctx.rebuild_all()?;
            println!("\n=== Rebuild Results ===");
            println!("Documents: {}", report.documents);
            println!("Records written: {}", report.records_written);
            println!("Records removed: {}", report.removed);
            println!("Diagnostics: {}", report.diagnostics.len());
            if verbose {
                print_diagnostics(&report.diagnostics);
            }
        }

        Commands::Save {
            doc,
            root,
            tags,
            parents,
            status,
            priority,
            file_type,
            index,
        } => {
            let ctx = IndexContext::for_root(&root)?;
            let edits = EditedFields {
                tags: (!tags.is_empty()).then_some(tags),
                parents: (!parents.is_empty()).then_some(parents),
                status,
                priority,
                file_type,
                ..Default::default()
            };
            let outcome = if index {
                ctx.save_and_index(&doc, &edits)?
            } else {
                ctx.save(&doc, &edits)?
            };
            println!("{}", outcome.record);
            println!(
                "links: +{:?} -{:?}  parents: +{:?} -{:?}",
                outcome.links_added,
                outcome.links_removed,
                outcome.parents_added,
                outcome.parents_removed
            );
            print_diagnostics(&outcome.diagnostics);
        }

        Commands::Move { from, to, root } => {
            let ctx = IndexContext::for_root(&root)?;
            let report = ctx.move_document(&from, &to)?;
            println!("✓ Moved {} -> {}", report.from, report.to);
            for rewritten in report.rewritten.iter() {
                println!("  rewrote {rewritten}");
            }
            print_diagnostics(&report.diagnostics);
        }

        Commands::Remove { doc, root } => {
            let ctx = IndexContext::for_root(&root)?;
            let diagnostics = ctx.remove_document(&doc)?;
            println!("✓ Removed {doc}");
            print_diagnostics(&diagnostics);
        }

        Commands::Collect { root, verbose } => {
            let ctx = IndexContext::for_root(&root)?;
            let index = ctx.collect_all()?;
            println!("\n=== Aggregate Cache ===");
            println!("Files: {}", index.file_paths.len());
            println!("Tags: {}", index.tags.len());
            println!("Collections: {}", index.collections.len());
            println!("Folders: {}", index.folder_paths.len());
            println!("Orphaned media: {}", index.orphaned_media.len());
            if verbose {
                for (key, values) in index.entries() {
                    println!("{key}: {values:?}");
                }
                print_diagnostics(&index.diagnostics);
            }
        }

        Commands::Check { root } => {
            let ctx = IndexContext::for_root(&root)?;
            let violations = ctx.built_in_test()?;
            let stale = ctx.stale_ancestors()?;
            if !stale.is_empty() {
                println!("{} records with stale ancestors (refreshed on save or rebuild):", stale.len());
                for entry in stale.iter() {
                    println!("  - {entry}");
                }
            }
            if violations.is_empty() {
                println!("✓ Graph is consistent");
            } else {
                for violation in violations.iter() {
                    println!("  - {violation}");
                }
                eprintln!(
                    "Error: {} violations (run `noet-index rebuild` to repair)",
                    violations.len()
                );
                std::process::exit(1);
            }
        }

        Commands::Show { doc, root } => {
            let ctx = IndexContext::for_root(&root)?;
            let key = ctx.normalize(&doc);
            let record = ctx
                .records()
                .get(&key)?
                .ok_or_else(|| BuildonomyError::NotFound(format!("no record for '{key}'")))?;
            println!("{record}");
        }
    }

    Ok(())
}
