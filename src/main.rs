use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mscolab::cli::{
    Context, OpCommands, PermCommands, UserCommands, load_settings, open_manager, run_op,
    run_perm, run_user,
};
use mscolab::config::Settings;
use mscolab::manager::FileManager;

#[derive(Parser)]
#[command(name = "mscolab")]
#[command(about = "Shared flight-track operations with versioned history", long_about = None)]
struct Cli {
    /// Data directory for the database and operation repositories
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Email of the user to act as
    #[arg(long = "as", global = true, value_name = "EMAIL")]
    acting_as: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database in the data directory
    Init,

    /// Manage user accounts
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Work with operations and their history
    Op {
        #[command(subcommand)]
        command: OpCommands,
    },

    /// Manage operation members
    Perm {
        #[command(subcommand)]
        command: PermCommands,
    },
}

fn run_init(settings: Settings) -> anyhow::Result<()> {
    let db_path = settings.db_path();
    if db_path.exists() {
        bail!("Already initialized. Database exists at: {}", db_path.display());
    }

    FileManager::open(settings)?;
    info!("Initialized database at {}", db_path.display());
    println!("Initialized mscolab data directory ({})", db_path.display());
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive("mscolab=info".parse()?))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.data_dir, cli.config.as_deref())?;

    let json = cli.json;
    let acting_as = cli.acting_as;
    let context = move |settings: Settings| -> anyhow::Result<Context> {
        Ok(Context::new(open_manager(settings)?, json, acting_as))
    };

    match cli.command {
        Commands::Init => run_init(settings),
        Commands::User { command } => run_user(&context(settings)?, command),
        Commands::Op { command } => run_op(&context(settings)?, command),
        Commands::Perm { command } => run_perm(&context(settings)?, command),
    }
}
