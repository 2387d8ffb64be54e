//! lootrule - loot filter editor CLI
//!
//! Thin command-line front end over the [`lootrule::Filter`] facade. Every
//! edit is recorded in the filter's history, which is saved with the
//! document, so `undo`/`redo` work across invocations.
//!
//! # Usage
//!
//! ```bash
//! lootrule import ~/Downloads/strict.filter --name strict   # Import filter text
//! lootrule show strict                                      # Print the rule tree
//! lootrule toggle strict "Belts" --off                      # Disable a rule
//! lootrule undo strict                                      # Re-enable it
//! lootrule export strict --output strict.filter             # Render filter text
//! lootrule write strict                                     # Write into the game directory
//! ```

use clap::{Parser, Subcommand};
use lootrule::command::SetEntryActive;
use lootrule::config::{self, AppConfig};
use lootrule::core::catalog::ItemCatalog;
use lootrule::core::error::StorageError;
use lootrule::core::storage::FilterStore;
use lootrule::core::tree::NodeId;
use lootrule::{Filter, utils};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

shadow_rs::shadow!(build);

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "lootrule")]
#[command(about = "Loot filter rule editor", long_about = None)]
#[command(version, long_version = build::CLAP_LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List saved filters
    List,
    /// Create an empty filter
    New {
        name: String,
    },
    /// Import filter text from a file
    Import {
        /// Filter text file to read
        file: PathBuf,
        /// Name to save under (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Print a filter as filter text
    Export {
        /// Filter name (defaults to the active filter)
        name: Option<String>,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write `<name>.filter` into the configured game directory
    Write {
        name: Option<String>,
    },
    /// Print the rule tree
    Show {
        name: Option<String>,
    },
    /// Enable or disable a category, rule or base
    Toggle {
        name: String,
        /// Node name or id
        entry: String,
        /// Disable instead of enable
        #[arg(long)]
        off: bool,
    },
    /// Undo the last edit
    Undo {
        name: Option<String>,
    },
    /// Redo the last undone edit
    Redo {
        name: Option<String>,
    },
    /// Make the given filter the default for commands that omit a name
    Use {
        name: String,
    },
    /// Copy a filter under a new name
    Copy {
        name: String,
        new_name: String,
    },
    /// Rename a filter
    Rename {
        name: String,
        new_name: String,
    },
    /// Delete a filter
    Delete {
        name: String,
    },
}

fn main() -> ExitCode {
    let _ = utils::ensure_dirs();
    init_logging();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli.command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Logs to `<state_dir>/lootrule.log`, or stderr if that is unavailable.
/// `RUST_LOG` overrides the default `info` level.
fn init_logging() {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(mut log_path) = utils::get_state_dir() {
        log_path.push("lootrule.log");
        if let Ok(file) = std::fs::File::create(log_path) {
            tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(std::io::stderr)
        .init();
}

fn filter_name(name: Option<String>, config: &AppConfig) -> CliResult<String> {
    name.or_else(|| config.active_filter.clone())
        .ok_or_else(|| "No filter given and no active filter set (see `lootrule use`)".into())
}

async fn load(store: &FilterStore, name: &str, config: &AppConfig) -> CliResult<Filter> {
    let mut filter = store.load(name).await?;
    filter.set_history_limit(config.history_limit);
    Ok(filter)
}

/// Resolves a node by id, falling back to the first node with that name
fn resolve_entry(filter: &Filter, entry: &str) -> CliResult<NodeId> {
    if let Ok(id) = entry.parse::<NodeId>()
        && filter.rules().contains(id)
    {
        return Ok(id);
    }
    filter
        .rules()
        .find_by_name(entry)
        .ok_or_else(|| format!("No entry named '{entry}'").into())
}

fn print_tree(filter: &Filter) {
    println!("{} (v{}, updated {})", filter.name, filter.version, filter.last_updated);
    for (depth, node) in filter.rules().walk() {
        let mark = if node.enabled() { 'x' } else { ' ' };
        println!(
            "{}[{mark}] {} ({}) {}",
            "  ".repeat(depth + 1),
            node.name(),
            node.kind(),
            node.id()
        );
    }
    println!(
        "History: {} undo, {} redo",
        filter.undo_count(),
        filter.redo_count()
    );
}

async fn set_active(config: &mut AppConfig, name: Option<String>) -> CliResult<()> {
    config.active_filter = name;
    config::save_config(config).await?;
    Ok(())
}

async fn handle_cli(command: Commands) -> CliResult<()> {
    let store = FilterStore::default_location()?;
    let mut config = config::load_config().await;

    match command {
        Commands::List => {
            println!("Saved filters (* = active):");
            for name in store.list().await? {
                if Some(&name) == config.active_filter.as_ref() {
                    println!("  * {name}");
                } else {
                    println!("    {name}");
                }
            }
        }
        Commands::New { name } => {
            if store.exists(&name).await? {
                return Err(StorageError::AlreadyExists(name).into());
            }
            let mut filter = Filter::new(&name);
            filter.save(&store).await?;
            if config.active_filter.is_none() {
                set_active(&mut config, Some(name.clone())).await?;
            }
            println!("Created filter '{name}'");
        }
        Commands::Import { file, name } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(str::to_string)
                    .ok_or("Cannot derive a filter name from the file; use --name")?,
            };
            if store.exists(&name).await? {
                return Err(StorageError::AlreadyExists(name).into());
            }

            let text = tokio::fs::read_to_string(&file).await?;
            let (mut filter, diagnostics) =
                Filter::from_import(&name, &text, ItemCatalog::builtin());
            for diagnostic in &diagnostics {
                eprintln!("warning: {diagnostic}");
            }
            filter.save(&store).await?;
            println!(
                "Imported {} rule(s) into '{name}' ({} warning(s))",
                filter.rules().rules().len(),
                diagnostics.len()
            );
        }
        Commands::Export { name, output } => {
            let name = filter_name(name, &config)?;
            let filter = load(&store, &name, &config).await?;
            match output {
                Some(path) => {
                    tokio::fs::write(&path, filter.serialize()).await?;
                    println!("Exported '{name}' to {}", path.display());
                }
                None => print!("{}", filter.serialize()),
            }
        }
        Commands::Write { name } => {
            let name = filter_name(name, &config)?;
            let dir = config
                .game_directory
                .clone()
                .ok_or(StorageError::GameDirUnset)?;
            let mut filter = load(&store, &name, &config).await?;
            match filter.write_file(&dir, config.write_debounce()).await? {
                Some(path) => {
                    // records the write time without touching last_updated
                    store.save(&filter).await?;
                    println!("Wrote {}", path.display());
                }
                None => println!("Skipped: '{name}' was written moments ago"),
            }
        }
        Commands::Show { name } => {
            let name = filter_name(name, &config)?;
            print_tree(&load(&store, &name, &config).await?);
        }
        Commands::Toggle { name, entry, off } => {
            let mut filter = load(&store, &name, &config).await?;
            let id = resolve_entry(&filter, &entry)?;
            if filter.execute(&SetEntryActive::new(id, !off))? {
                filter.save(&store).await?;
                println!("{} '{entry}'", if off { "Disabled" } else { "Enabled" });
            } else {
                println!("'{entry}' unchanged");
            }
        }
        Commands::Undo { name } => {
            let name = filter_name(name, &config)?;
            let mut filter = load(&store, &name, &config).await?;
            match filter.undo()? {
                Some(description) => {
                    filter.save(&store).await?;
                    println!("Undid: {description}");
                }
                None => println!("Nothing to undo"),
            }
        }
        Commands::Redo { name } => {
            let name = filter_name(name, &config)?;
            let mut filter = load(&store, &name, &config).await?;
            match filter.redo()? {
                Some(description) => {
                    filter.save(&store).await?;
                    println!("Redid: {description}");
                }
                None => println!("Nothing to redo"),
            }
        }
        Commands::Use { name } => {
            if !store.exists(&name).await? {
                return Err(StorageError::NotFound(name).into());
            }
            set_active(&mut config, Some(name.clone())).await?;
            println!("Active filter: {name}");
        }
        Commands::Copy { name, new_name } => {
            if store.exists(&new_name).await? {
                return Err(StorageError::AlreadyExists(new_name).into());
            }
            let filter = load(&store, &name, &config).await?;
            let mut copy = filter.copy(&new_name);
            copy.save(&store).await?;
            println!("Copied '{name}' to '{new_name}'");
        }
        Commands::Rename { name, new_name } => {
            store.rename(&name, &new_name).await?;
            if config.active_filter.as_deref() == Some(name.as_str()) {
                set_active(&mut config, Some(new_name.clone())).await?;
            }
            println!("Renamed '{name}' to '{new_name}'");
        }
        Commands::Delete { name } => {
            if !store.exists(&name).await? {
                return Err(StorageError::NotFound(name).into());
            }
            store.delete(&name).await?;
            if config.active_filter.as_deref() == Some(name.as_str()) {
                set_active(&mut config, None).await?;
            }
            println!("Deleted '{name}'");
        }
    }
    Ok(())
}
