use anyhow::Context;
use clap::{Parser, Subcommand};
use plugix::{
    commands::{
        config::{self, ConfigAction},
        describe,
        get::{self, GetCommand},
        list, rebuild,
        validate::{self, ValidateCommand},
    },
    logger, GlobalOpts,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "plugix")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Plugin registry and resolver",
    long_about = "plugix resolves installed plugins through a registry index, validates declarative plugins against their schemas and checks code plugins against their interface contracts."
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered plugins
    List {
        /// Optional interface to filter by (e.g., readers)
        interface: Option<String>,
    },
    /// Resolve one plugin and print what it provides
    Get {
        /// Interface the plugin belongs to (e.g., products)
        interface: String,
        /// Plugin name
        name: String,
        /// Source name, required for interfaces keyed by (source, name)
        #[arg(short, long)]
        source: Option<String>,
        /// Fail on a miss instead of rebuilding the index
        #[arg(long)]
        no_rebuild: bool,
    },
    /// Validate installed plugins
    Validate {
        /// Optional interface to validate (default: all)
        interface: Option<String>,
        /// Optional plugin name within the interface
        #[arg(requires = "interface")]
        name: Option<String>,
        /// Source name for interfaces keyed by (source, name)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Run the indexer and reload the registry index
    Rebuild,
    /// Configure plugix
    #[command(subcommand_required = false, arg_required_else_help = false)]
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
    /// Show extended help for a command
    Describe {
        /// Command to describe; lists all commands when omitted
        command: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("PLUGIX_LOG")
        .unwrap_or_else(|_| EnvFilter::new(logger::verbosity_to_filter()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level()) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing();

    if let Err(e) = run(cli.command, &cli.global) {
        logger::error(&format!("{:#}", e));
        if let Some(path) = logger::log_path().filter(|_| cli.global.verbosity_level() > 0) {
            eprintln!("Log file: {}", path.display());
        }
        std::process::exit(1);
    }
}

fn run(command: Commands, global: &GlobalOpts) -> anyhow::Result<()> {
    match command {
        Commands::List { interface } => list::list_plugins(interface, global)?,
        Commands::Get {
            interface,
            name,
            source,
            no_rebuild,
        } => get::handle_get(
            GetCommand {
                interface,
                name,
                source,
                no_rebuild,
            },
            global,
        )?,
        Commands::Validate {
            interface,
            name,
            source,
        } => validate::handle_validate(
            ValidateCommand {
                interface,
                name,
                source,
            },
            global,
        )?,
        Commands::Rebuild => rebuild::handle_rebuild(global).context("Rebuild failed")?,
        Commands::Config { action } => config::handle_config(action, global)?,
        Commands::Describe { command } => describe::handle_describe(command)?,
    }
    Ok(())
}
