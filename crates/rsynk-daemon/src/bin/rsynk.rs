//! rsynk CLI - Serve files to rsync clients
//!
//! Usage:
//!   rsynk exec -- rsync --server --sender -vlogDtpre.iLsfxC . <file>...
//!   rsynk config                      Print a sample configuration
//!
//! `exec` is what a remote shell runs for the client; the file data is
//! written to stdout and all logging goes to stderr.

use std::io::{self, BufWriter};
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use tokio::signal;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use rsynk_core::{Config, ExitCode};
use rsynk_daemon::{AllCommandsResolver, CommandError, CommandsResolver};

#[derive(Parser)]
#[command(name = "rsynk")]
#[command(about = "Send files to rsync clients", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: the user config directory)
    #[arg(short, long, global = true, env = "RSYNK_CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a remote command line
    Exec {
        /// The command line, starting with the program name
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },

    /// Print a sample configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries file data
    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", e);
    }

    let code = match cli.command {
        Commands::Exec { args } => run_exec(cli.config, args).await,
        Commands::Config => {
            if let Some(path) = Config::default_path() {
                info!("Default config location: {:?}", path);
            }
            print!("{}", Config::sample());
            ExitCode::Ok
        }
    };

    std::process::exit(code.code());
}

async fn run_exec(config_path: Option<PathBuf>, args: Vec<String>) -> ExitCode {
    let config = match config_path {
        Some(path) => match Config::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                error!("Cannot load {:?}: {}", path, e);
                return ExitCode::Syntax;
            }
        },
        None => Config::load(),
    };

    let resolver = AllCommandsResolver::new(&config);
    let task = tokio::task::spawn_blocking(move || -> Result<ExitCode, CommandError> {
        let command = resolver.resolve(&args)?;
        info!("Executing {}", command.name());

        let stdout = io::stdout();
        let mut output = BufWriter::new(stdout.lock());
        command.execute(&args, &mut output)
    });

    tokio::select! {
        result = task => match result {
            Ok(Ok(code)) => code,
            Ok(Err(e)) => {
                error!("{}", e);
                ExitCode::from(&e)
            }
            Err(e) => {
                error!("Command task failed: {}", e);
                ExitCode::StreamIo
            }
        },
        _ = signal::ctrl_c() => {
            warn!("Interrupted, aborting transfer");
            ExitCode::Signal
        }
    }
}
