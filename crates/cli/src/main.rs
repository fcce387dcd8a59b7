//! Granary CLI - granary command

use anyhow::Result;
use broker::{AuthScheme, DuplicatesStrategy};
use clap::{Parser, Subcommand, ValueEnum};
use cli_lib::{config, util, Config};
use grain::Scope;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracking::ops::{AnchorRef, DiffMode, TrackOptions};
use tracking::{ResultCode, VcsFlavor};
use uuid::Uuid;

mod cmd;

/// Granary - keep a broker subtree in a local snapshot directory
#[derive(Parser)]
#[command(name = "granary")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Snapshot directory (default: current directory)
    #[arg(short = 'd', long, global = true)]
    directory: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking a broker subtree in a new snapshot
    Track {
        /// Broker URL
        url: String,
        /// Anchor grain id or absolute path
        anchor: AnchorRef,
        /// Authentication scheme (auto, basic, oidc)
        #[arg(long, default_value = "auto")]
        auth: AuthScheme,
        /// Keep credentials in the local state file
        #[arg(long)]
        store_credentials: bool,
        /// Tracked part of the anchor's subtree
        #[arg(short = 's', long, default_value = "Recursive")]
        scope: Scope,
        /// Version control the directory lives in (git, none)
        #[arg(long, default_value = "git")]
        vcs: VcsFlavor,
        /// Grain ids to leave out, with their subtrees
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        ignore_grains: Vec<Uuid>,
        /// Type definition ids to leave out
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        ignore_types: Vec<Uuid>,
        /// Type names to leave out
        #[arg(long, value_delimiter = ',', num_args = 1..)]
        ignore_type_names: Vec<String>,
    },
    /// Connect an existing snapshot to a broker
    Connect {
        /// Broker URL
        url: String,
        /// Authentication scheme (auto, basic, oidc)
        #[arg(long, default_value = "auto")]
        auth: AuthScheme,
        /// Keep credentials in the local state file
        #[arg(long)]
        store_credentials: bool,
        /// Checkpoint to work from: 0 keeps, -1 takes the shared one, N takes ordinal N
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        adopt_checkpoint: i64,
    },
    /// Forget stored broker credentials
    Logout,
    /// Send local changes to the broker
    Push {
        /// Resend everything after this checkpoint
        #[arg(short = 'c', long)]
        starting_checkpoint: Option<u32>,
        /// How the broker treats grains it already has
        #[arg(short = 's', long, value_enum, default_value_t = Strategy::OverwriteSkipNewer)]
        strategy: Strategy,
    },
    /// Bring broker changes into the snapshot
    Pull {
        /// Overwrite local modifications without asking
        #[arg(short = 'o', long)]
        overwrite: bool,
        /// Record the changes under a new checkpoint
        #[arg(long)]
        force_checkpoint: bool,
    },
    /// Push, then pull
    Sync {
        #[arg(short = 'c', long)]
        starting_checkpoint: Option<u32>,
        #[arg(short = 's', long, value_enum, default_value_t = Strategy::OverwriteSkipNewer)]
        strategy: Strategy,
        #[arg(short = 'o', long)]
        overwrite: bool,
        #[arg(long)]
        force_checkpoint: bool,
    },
    /// Compare the snapshot with the broker
    Status {
        /// List unchanged grains too
        #[arg(long)]
        show_all: bool,
        /// Treat everything newer than the built-in content as locally changed
        #[arg(long)]
        assume_reset: bool,
    },
    /// Show snapshot and connection details
    Info {
        /// Check that the broker is reachable and compatible
        #[arg(short = 'c', long)]
        validate_connection: bool,
    },
    /// Show differences between grain versions
    Diff {
        /// Grain id
        first: Uuid,
        /// Second grain id (compares two cached grains by default)
        second: Option<Uuid>,
        /// auto, snapshot, broker, snapshot2broker or broker2snapshot
        #[arg(short = 'm', long, default_value = "auto")]
        mode: DiffMode,
        /// Number of context lines
        #[arg(short = 'U', long, default_value = "3")]
        context: usize,
    },
}

/// Duplicate handling on push
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    OverwriteSkipNewer,
    Merge,
    OverwriteAll,
    Skip,
}

impl From<Strategy> for DuplicatesStrategy {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::OverwriteSkipNewer => DuplicatesStrategy::OverwriteSkipNewer,
            Strategy::Merge => DuplicatesStrategy::Merge,
            Strategy::OverwriteAll => DuplicatesStrategy::OverwriteAll,
            Strategy::Skip => DuplicatesStrategy::Skip,
        }
    }
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("GRANARY_LOG")
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli, config: &Config, cancel: &CancellationToken) -> Result<ResultCode> {
    let directory = util::resolve_directory(cli.directory)?;

    match cli.command {
        Commands::Track {
            url,
            anchor,
            auth,
            store_credentials,
            scope,
            vcs,
            ignore_grains,
            ignore_types,
            ignore_type_names,
        } => {
            let options = TrackOptions {
                anchor,
                scope,
                vcs,
                ignores: cmd::track::ignore_filter(ignore_grains, ignore_types, ignore_type_names),
            };
            cmd::track::run(&directory, &url, auth, store_credentials, options, config, cancel).await
        }
        Commands::Connect {
            url,
            auth,
            store_credentials,
            adopt_checkpoint,
        } => {
            cmd::connect::run(
                &directory,
                &url,
                auth,
                store_credentials,
                adopt_checkpoint,
                config,
                cancel,
            )
            .await
        }
        Commands::Logout => cmd::logout::run(&directory, config),
        Commands::Push {
            starting_checkpoint,
            strategy,
        } => cmd::push::run(&directory, starting_checkpoint, strategy.into(), config, cancel).await,
        Commands::Pull {
            overwrite,
            force_checkpoint,
        } => cmd::pull::run(&directory, overwrite, force_checkpoint, config, cancel).await,
        Commands::Sync {
            starting_checkpoint,
            strategy,
            overwrite,
            force_checkpoint,
        } => {
            cmd::sync::run(
                &directory,
                starting_checkpoint,
                strategy.into(),
                overwrite,
                force_checkpoint,
                config,
                cancel,
            )
            .await
        }
        Commands::Status {
            show_all,
            assume_reset,
        } => cmd::status::run(&directory, show_all, assume_reset, config, cancel).await,
        Commands::Info {
            validate_connection,
        } => cmd::info::run(&directory, validate_connection, config, cancel).await,
        Commands::Diff {
            first,
            second,
            mode,
            context,
        } => cmd::diff::run(&directory, first, second, mode, context, config, cancel).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ResultCode::ParameterError.as_i32()
            } else {
                ResultCode::Success.as_i32()
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let config = match config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {:#}", "warning:".yellow().bold(), e);
            Config::default()
        }
    };
    init_logging(&config);

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });

    let code = match run(cli, &config, &cancel).await {
        Ok(code) => code.as_i32(),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            util::exit_code(&e)
        }
    };
    std::process::exit(code);
}
