//! AsyncAPI Import CLI
//!
//! Imports an AsyncAPI document into a local event catalog.

use std::path::PathBuf;

use anyhow::{bail, Context};
use asyncapi_importer::catalog::memory::MemoryCatalog;
use asyncapi_importer::model::VersionState;
use asyncapi_importer::{ImportOptions, ImportPipeline, ImporterConfig, VersionStrategy};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "asyncapi-import")]
#[command(about = "Import AsyncAPI documents into an event catalog")]
struct Cli {
    /// Configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Catalog store (overrides catalog.path)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a document into an application domain
    Import {
        /// AsyncAPI document (JSON or YAML)
        #[arg(short, long)]
        spec: PathBuf,

        /// Target application domain (overrides import.domain)
        #[arg(short, long)]
        domain: Option<String>,

        #[arg(long, value_enum)]
        version_strategy: Option<VersionStrategy>,

        /// Also import an application named after info.title
        #[arg(long)]
        import_application: bool,

        /// Also import an event API named after info.title
        #[arg(long)]
        import_event_api: bool,

        /// Re-version existing dependents of superseded versions
        #[arg(long)]
        cascade_update: bool,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Register an application domain
    Domain {
        name: String,
    },

    /// Move a version out of draft
    Release {
        version_id: String,

        #[arg(long, value_enum, default_value = "released")]
        state: VersionState,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = ImporterConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    if let Some(path) = cli.catalog {
        config.catalog.path = path;
    }
    let catalog_path = config.catalog_path();
    let catalog = MemoryCatalog::open(&catalog_path)
        .with_context(|| format!("opening catalog {}", catalog_path.display()))?;

    match cli.command {
        Commands::Import {
            spec,
            domain,
            version_strategy,
            import_application,
            import_event_api,
            cascade_update,
            format,
        } => {
            if let Some(strategy) = version_strategy {
                config.import.version_strategy = strategy;
            }
            config.import.import_application |= import_application;
            config.import.import_event_api |= import_event_api;
            config.import.cascade_update |= cascade_update;

            let options = ImportOptions::from_config(&config, domain.as_deref())?;
            if let OutputFormat::Text = format {
                println!("📥 Importing {} into domain '{}'", spec.display(), options.domain);
            }

            let summary = ImportPipeline::new(&catalog, options).run_file(&spec)?;
            catalog.save()?;

            match format {
                OutputFormat::Text => {
                    print!("{}", summary);
                    let skipped = summary.skipped().count();
                    if skipped == 0 {
                        println!("✅ Import complete");
                    } else {
                        println!("⚠️  Import complete, {} object(s) skipped", skipped);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            }
            Ok(())
        }

        Commands::Domain { name } => {
            let domain = catalog.add_domain(&name)?;
            catalog.save()?;
            println!("✅ Domain '{}' registered as {}", domain.name, domain.id);
            Ok(())
        }

        Commands::Release { version_id, state } => {
            if state.is_draft() {
                bail!("cannot move a version back to draft");
            }
            let version = catalog.set_state(&version_id, state)?;
            catalog.save()?;
            println!(
                "✅ {} {} is now {}",
                version.id,
                version.version.as_deref().unwrap_or("-"),
                version.state
            );
            Ok(())
        }
    }
}
