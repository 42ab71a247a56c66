use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use devsite::config::{DeployConfig, default_config_path};
use devsite::logging;
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "devsite")]
#[command(version, about = "Build and deploy platform projects on a local workstation")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to devsite.toml (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch, build and deploy a project locally
    Deploy(DeployArgs),
    /// Import the remote database backup into a local project
    DbSync {
        /// Project root directory
        directory: PathBuf,

        /// Project id
        #[arg(short, long)]
        project: String,

        /// Remote environment to copy from (defaults to the default branch)
        #[arg(short, long)]
        environment: Option<String>,

        /// Application name (read from .platform.app.yaml when omitted)
        #[arg(long)]
        app: Option<String>,

        /// Skip database sanitization after import
        #[arg(short = 'S', long)]
        no_sanitize: bool,
    },
    /// Sanitize the local database of a project
    DbSanitize {
        /// Project root directory
        directory: PathBuf,

        /// Project id
        #[arg(short, long)]
        project: String,

        #[arg(long)]
        app: Option<String>,
    },
    /// Delete old builds of a project
    Clean {
        /// Project root directory
        directory: PathBuf,

        /// Number of builds to keep
        #[arg(long, default_value = "1")]
        keep: usize,
    },
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct DeployArgs {
    /// Project id
    #[arg(short, long)]
    pub project: String,

    /// Import the remote database after building
    #[arg(short, long)]
    pub db_sync: bool,

    /// Build the core profile from this branch instead of the local checkout
    #[arg(short, long)]
    pub core_branch: Option<String>,

    /// Remote environment used for the database import
    #[arg(short, long)]
    pub environment: Option<String>,

    /// Do not archive the build
    #[arg(short = 'A', long)]
    pub no_archive: bool,

    /// Do not run the deploy hooks
    #[arg(short = 'D', long)]
    pub no_deploy_hooks: bool,

    /// Do not pull the site and profile repositories
    #[arg(short = 'G', long)]
    pub no_git_pull: bool,

    /// Do not reindex search after creating indices
    #[arg(short = 'I', long)]
    pub no_reindex: bool,

    /// Do not sanitize an imported database
    #[arg(short = 'S', long)]
    pub no_sanitize: bool,

    /// Do not report unclean features
    #[arg(short = 'U', long)]
    pub no_unclean_features: bool,

    /// Copy files into the build instead of symlinking
    #[arg(long)]
    pub copy: bool,

    /// Use absolute symlinks in the build
    #[arg(long)]
    pub abslinks: bool,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Initialize a default devsite.toml file
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(default_config_path);

    if let Commands::Config { command } = &cli.command {
        let _guard = logging::init(cli.verbose, None)?;
        return cmd::cmd_config(&config_path, command.clone());
    }

    let config = DeployConfig::load(Some(&config_path), cli.verbose)?;
    let _guard = logging::init(cli.verbose, config.toml.logging.dir.as_deref())?;

    match &cli.command {
        Commands::Deploy(args) => cmd::cmd_deploy(config, args).await?,
        Commands::DbSync {
            directory,
            project,
            environment,
            app,
            no_sanitize,
        } => {
            cmd::cmd_db_sync(
                config,
                cmd::database::DbSyncOptions {
                    directory,
                    project,
                    environment: environment.as_deref(),
                    app: app.as_deref(),
                    no_sanitize: *no_sanitize,
                },
            )
            .await?
        }
        Commands::DbSanitize {
            directory,
            project,
            app,
        } => cmd::cmd_db_sanitize(config, directory, project, app.as_deref()).await?,
        Commands::Clean { directory, keep } => cmd::cmd_clean(directory, *keep, cli.verbose)?,
        Commands::Config { .. } => unreachable!("handled before configuration is loaded"),
    }

    Ok(())
}
