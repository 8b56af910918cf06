//! omrs CLI: metadata repository with a conformance workbench.
//!
//! Usage:
//!   omrs conformance [--db path | --in-memory] [--catalog file] [--config file]
//!   omrs types <subcommand> [--db path]

use clap::{Parser, Subcommand};
use omrs::conformance::{TestCaseResult, WorkbenchResults};
use omrs::{
    ConformanceConfig, ConformanceWorkbench, MetadataCollection, OpenRepository,
    RepositoryOptions, SqliteRepository, TypeCatalog, TypeDefCategory,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "omrs",
    version,
    about = "Open metadata repository with a conformance workbench"
)]
struct Cli {
    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the conformance workbench against a repository
    Conformance {
        /// Path to SQLite database file
        #[arg(long, conflicts_with = "in_memory")]
        db: Option<PathBuf>,
        /// Use a throwaway in-memory repository
        #[arg(long)]
        in_memory: bool,
        /// Type catalog to load before the run (defaults to the built-in one)
        #[arg(long)]
        catalog: Option<PathBuf>,
        /// YAML configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// User id for repository calls
        #[arg(long)]
        user: Option<String>,
        /// Namespace prefix for generated values
        #[arg(long)]
        run_prefix: Option<String>,
        /// Turn off soft delete and restore in the repository
        #[arg(long)]
        no_soft_delete: bool,
        /// Turn off undo in the repository
        #[arg(long)]
        no_undo: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect the types a repository supports
    Types {
        #[command(subcommand)]
        action: TypesAction,
        /// Path to SQLite database file
        #[arg(long, global = true)]
        db: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum TypesAction {
    /// List type definitions
    List {
        /// Only list one category (EntityDef, RelationshipDef, ClassificationDef)
        #[arg(long)]
        category: Option<TypeDefCategory>,
    },
    /// Show one type definition as YAML
    Show {
        /// Name of the type
        name: String,
    },
}

/// Get the default database path (~/.local/share/omrs/omrs.db)
fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("omrs").join("omrs.db")
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn open_repository(
    db: Option<PathBuf>,
    in_memory: bool,
    options: RepositoryOptions,
) -> Result<SqliteRepository, String> {
    let repository = if in_memory {
        SqliteRepository::open_in_memory(options)
    } else {
        SqliteRepository::open(db.unwrap_or_else(default_db_path), options)
    };
    repository.map_err(|e| format!("Failed to open repository: {}", e))
}

fn load_catalog(repository: &SqliteRepository, catalog: Option<&Path>) -> Result<(), String> {
    let catalog = match catalog {
        Some(path) => TypeCatalog::from_path(path),
        None => TypeCatalog::builtin(),
    }
    .map_err(|e| format!("Failed to read type catalog: {}", e))?;
    catalog
        .load_into(repository)
        .map_err(|e| format!("Failed to load type catalog: {}", e))?;
    Ok(())
}

fn print_case(marker: &str, result: &TestCaseResult) {
    println!("{} {}", marker, result.test_case_id);
    if let Some(reason) = result.failure_reason() {
        println!("    {}", reason);
    }
}

fn print_results(results: &WorkbenchResults) {
    for result in &results.passed {
        print_case("PASS", result);
    }
    for result in &results.failed {
        print_case("FAIL", result);
    }
    for summary in &results.skipped {
        println!("SKIP {} ({})", summary.test_case_id, summary.reason);
    }

    let discovered = results.discovered_properties();
    if !discovered.is_empty() {
        println!();
        println!("Discovered properties:");
        for (name, value) in &discovered {
            match value.as_str() {
                Some(text) => println!("  {}: {}", name, text),
                None => println!("  {}: {}", name, value),
            }
        }
    }

    println!();
    println!(
        "{} passed, {} failed, {} skipped",
        results.passed.len(),
        results.failed.len(),
        results.skipped.len()
    );
}

#[allow(clippy::too_many_arguments)]
fn cmd_conformance(
    db: Option<PathBuf>,
    in_memory: bool,
    catalog: Option<PathBuf>,
    config: Option<PathBuf>,
    user: Option<String>,
    run_prefix: Option<String>,
    no_soft_delete: bool,
    no_undo: bool,
    json: bool,
) -> i32 {
    let mut config = match config {
        Some(path) => match ConformanceConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        },
        None => ConformanceConfig::default(),
    };
    if no_soft_delete {
        config.repository.soft_delete = false;
    }
    if no_undo {
        config.repository.undo = false;
    }
    if let Some(user) = user {
        config.workbench.user_id = user;
    }
    if run_prefix.is_some() {
        config.workbench.run_prefix = run_prefix;
    }

    let repository = match open_repository(db, in_memory, config.repository.clone()) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    if let Err(e) = load_catalog(&repository, catalog.as_deref()) {
        eprintln!("Error: {}", e);
        return 1;
    }

    let results = ConformanceWorkbench::new(config.workbench)
        .with_repository(Arc::new(repository))
        .run();

    if json {
        match serde_json::to_string_pretty(&results) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                return 1;
            }
        }
    } else {
        print_results(&results);
    }

    if results.is_success() {
        0
    } else {
        1
    }
}

fn cmd_types_list(repository: &SqliteRepository, category: Option<TypeDefCategory>) -> i32 {
    let types = match category {
        Some(category) => repository.find_types_by_category(category),
        None => repository.get_all_types().map(|g| g.type_defs),
    };
    match types {
        Ok(types) if types.is_empty() => {
            println!("No types found.");
            0
        }
        Ok(types) => {
            for def in types {
                println!("{}\t{}\tv{}\t{}", def.name, def.category(), def.version, def.guid);
            }
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn cmd_types_show(repository: &SqliteRepository, name: &str) -> i32 {
    match repository.get_typedef_by_name(name) {
        Ok(Some(def)) => match serde_yaml::to_string(&def) {
            Ok(text) => {
                print!("{}", text);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Ok(None) => {
            eprintln!("Error: type '{}' not found", name);
            1
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Conformance {
            db,
            in_memory,
            catalog,
            config,
            user,
            run_prefix,
            no_soft_delete,
            no_undo,
            json,
        } => {
            let code = cmd_conformance(
                db,
                in_memory,
                catalog,
                config,
                user,
                run_prefix,
                no_soft_delete,
                no_undo,
                json,
            );
            std::process::exit(code);
        }
        Commands::Types { action, db } => {
            let repository = match open_repository(db, false, RepositoryOptions::default()) {
                Ok(r) => r,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    std::process::exit(1);
                }
            };
            if let Err(e) = load_catalog(&repository, None) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            let code = match action {
                TypesAction::List { category } => cmd_types_list(&repository, category),
                TypesAction::Show { name } => cmd_types_show(&repository, &name),
            };
            std::process::exit(code);
        }
    }
}
