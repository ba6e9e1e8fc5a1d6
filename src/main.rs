//! modularizer: plan and validate lazy module loads
//!
//! Usage:
//!   modularizer plan app.toml Y          → fetch and instantiation order for Y
//!   modularizer plan app.toml Y --json   → same, as JSON
//!   modularizer check app.toml           → validate declarations
//!   modularizer config                   → print the default loader config
//!   modularizer version                  → show version

use clap::{Parser, Subcommand};
use modularizer::{check, plan, Manifest};
use modularizer_engine::LoaderConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "modularizer",
    about = "Lazy module loader: plan fetch order and validate resource manifests",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a loader config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the order in which files are fetched and modules instantiated
    Plan {
        /// Manifest describing resources and the modules they define
        manifest: PathBuf,
        /// Modules to load
        #[arg(required = true)]
        modules: Vec<String>,
        /// Emit JSON instead of text
        #[arg(long, default_value_t = false)]
        json: bool,
        /// Wait on undeclared modules instead of failing
        #[arg(long, default_value_t = false)]
        lenient: bool,
        /// Prefix for every fetched path
        #[arg(long)]
        base: Option<String>,
    },
    /// Validate a manifest's declarations
    Check {
        manifest: PathBuf,
    },
    /// Print the default loader config as TOML
    Config,
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = match &cli.config {
        Some(path) => LoaderConfig::load(path),
        None => LoaderConfig::default(),
    };

    match cli.command {
        Commands::Plan {
            manifest,
            modules,
            json,
            lenient,
            base,
        } => {
            let mut config = config;
            if lenient {
                config.strict = false;
            }
            if let Some(base) = base {
                config.base = base;
            }
            let manifest = Manifest::load(&manifest)?;
            let plan = plan(&manifest, &modules, config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                println!("fetch:");
                for (i, path) in plan.fetched.iter().enumerate() {
                    println!("  {}. {}", i + 1, path);
                }
                println!("instantiate:");
                for (i, name) in plan.instantiated.iter().enumerate() {
                    println!("  {}. {}", i + 1, name);
                }
            }
        }

        Commands::Check { manifest: path } => {
            let manifest = Manifest::load(&path)?;
            let resources = check(&manifest, config)?;
            println!(
                "{}: {} resources, {} modules OK",
                path.display(),
                resources,
                manifest.module_count()
            );
        }

        Commands::Config => {
            print!("{}", config.to_toml());
        }

        Commands::Version => {
            println!("modularizer v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "modularizer=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
