mod bootstrap;
mod commands;
mod config;
mod constants;
mod container;
mod health;
mod payload;
mod profile;
mod provision;
mod record;
mod runner;
mod shell;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::constants::{DEFAULT_CONFIG_FILE, TARGET_ENV_VAR};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new configuration file
    Init,
    /// List deployment targets and their launch profiles
    Targets,
    /// Resolve a target and report unsafe security settings
    Check {
        /// Deployment target (defaults to the canonical target)
        #[arg(short, long, env = TARGET_ENV_VAR)]
        target: Option<String>,
        /// Exit non-zero when the profile has unsafe settings
        #[arg(long)]
        strict: bool,
        /// Print the resolved profile as JSON
        #[arg(long)]
        json: bool,
    },
    /// Render the container definition for a target
    Render {
        #[arg(short, long, env = TARGET_ENV_VAR)]
        target: Option<String>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Install OS and runtime dependencies into the runtime root
    Provision {
        /// Runtime root (defaults to image.root from the config)
        #[arg(long)]
        root: Option<PathBuf>,
        /// Reinstall even if the dependency set is unchanged
        #[arg(long)]
        force: bool,
    },
    /// Copy the application payload into the runtime root
    Materialize {
        /// Build context holding the payload
        #[arg(long, default_value = ".")]
        context: PathBuf,
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Stage manifests, provision dependencies, then materialize the payload
    Build {
        #[arg(long, default_value = ".")]
        context: PathBuf,
        #[arg(long)]
        root: Option<PathBuf>,
        /// Target to record for launch
        #[arg(short, long, env = TARGET_ENV_VAR)]
        target: Option<String>,
        #[arg(long)]
        force: bool,
    },
    /// Replace this process with the dashboard application
    Launch {
        #[arg(short, long, env = TARGET_ENV_VAR)]
        target: Option<String>,
        /// Directory holding the materialized payload
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
    /// Probe the application's liveness; exits non-zero when not healthy
    Probe {
        #[arg(short, long, env = TARGET_ENV_VAR)]
        target: Option<String>,
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

fn image_root(config: &Config, root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| PathBuf::from(&config.image.root))
}

fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load(path)?;
    log::debug!("Loaded configuration for app: {}", config.app);
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init => commands::init(&cli.config),
        Commands::Targets => {
            // Built-in targets are listed even without a config file.
            let custom = if cli.config.exists() {
                load_config(&cli.config)?.targets
            } else {
                Default::default()
            };
            commands::targets(&custom)
        }
        Commands::Check {
            target,
            strict,
            json,
        } => {
            let config = load_config(&cli.config)?;
            commands::check(&config, target.as_deref(), strict, json)
        }
        Commands::Render { target, output } => {
            let config = load_config(&cli.config)?;
            commands::render(&config, target.as_deref(), output.as_deref())
        }
        Commands::Provision { root, force } => {
            let config = load_config(&cli.config)?;
            let root = image_root(&config, root);
            commands::provision(&config, &root, force)
        }
        Commands::Materialize { context, root } => {
            let config = load_config(&cli.config)?;
            let root = image_root(&config, root);
            commands::materialize(&config, &context, &root)
        }
        Commands::Build {
            context,
            root,
            target,
            force,
        } => {
            let config = load_config(&cli.config)?;
            let root = image_root(&config, root);
            commands::build(&config, &context, &root, target.as_deref(), force)
        }
        Commands::Launch { target, root } => {
            let config = load_config(&cli.config)?;
            commands::launch(&config, target.as_deref(), &root)
        }
        Commands::Probe { target, host, root } => {
            let config = load_config(&cli.config)?;
            commands::probe(&config, target.as_deref(), &host, &root)
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
