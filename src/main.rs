//! timelock - Time-locked file encryption
//!
//! Usage:
//!   timelock lock <file> <seconds>  - Encrypt a file until the duration passes
//!   timelock unlock <file>          - Decrypt a file whose lock has expired
//!   timelock status                 - List active locks
//!   timelock prompt                 - Interactive lock/unlock

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use timelock::{
    config::{Config, SlotMode},
    lock::LockController,
    time::HttpTimeOracle,
    Error, Result,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "timelock")]
#[command(author = "timelock Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Encrypt a file so it cannot be opened until a trusted time has passed")]
struct Cli {
    /// Configuration file path (defaults are used if it does not exist)
    #[arg(short, long, default_value = "~/.config/timelock/config.json")]
    config: PathBuf,

    /// Directory holding the key and lock metadata (overrides config)
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Keep one key and lock record per file instead of a single global slot
    #[arg(long)]
    per_file: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file and lock it for a duration
    Lock {
        /// File to lock
        file: PathBuf,

        /// Lock duration in seconds
        duration: u64,
    },

    /// Decrypt a file whose lock has expired
    Unlock {
        /// File to unlock
        file: PathBuf,
    },

    /// Show active locks and remaining time
    Status,

    /// Ask for the command, file and duration interactively
    Prompt,
}

fn main() {
    let cli = Cli::parse();

    let config_path = expand_tilde(&cli.config);
    let config = match load_config(&cli, &config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    init_logging(&config, cli.verbose);
    debug!("Using state directory {:?}", config.state_dir);

    let code = match run_command(cli.command, &config) {
        Ok(()) => 0,
        Err(e) => report(&e),
    };
    std::process::exit(code);
}

fn load_config(cli: &Cli, config_path: &Path) -> Result<Config> {
    let mut config = Config::load_or_default(config_path)?;

    if let Some(dir) = &cli.state_dir {
        config.state_dir = expand_tilde(dir);
    }
    if cli.per_file {
        config.slot_mode = SlotMode::PerFile;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(&config.logging.level)
        }
    });

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set up logging: {}", e);
    }
}

/// Print an error for the user and return the exit code
fn report(e: &Error) -> i32 {
    if e.is_expected() {
        eprintln!("{}", e);
    } else {
        eprintln!("Error: {}", e);
    }

    match e {
        Error::AuthenticationFailure => {
            eprintln!(
                "Warning: the file may have been tampered with or corrupted. \
                 The key and lock metadata were kept so the unlock can be retried."
            );
        }
        Error::PathMismatch { locked, .. } => {
            eprintln!("Only '{}' can be unlocked with the current lock state.", locked);
        }
        _ => {}
    }

    e.exit_code()
}

fn run_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Lock { file, duration } => cmd_lock(config, &file, duration),
        Commands::Unlock { file } => cmd_unlock(config, &file),
        Commands::Status => cmd_status(config),
        Commands::Prompt => cmd_prompt(config),
    }
}

fn controller(config: &Config) -> Result<LockController<HttpTimeOracle>> {
    let oracle = HttpTimeOracle::new(&config.time)?;
    Ok(LockController::new(config, oracle))
}

fn cmd_lock(config: &Config, file: &Path, duration: u64) -> Result<()> {
    let receipt = controller(config)?.lock(file, duration)?;

    if let Some(previous) = &receipt.orphaned {
        eprintln!(
            "Warning: '{}' was locked and can no longer be unlocked (single-slot mode).",
            previous
        );
    }
    println!("{}", receipt);
    Ok(())
}

fn cmd_unlock(config: &Config, file: &Path) -> Result<()> {
    let receipt = controller(config)?.unlock(file)?;
    println!("{}", receipt);
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    let statuses = controller(config)?.status()?;

    if statuses.is_empty() {
        println!("No active locks.");
        return Ok(());
    }

    for status in statuses {
        println!("{}", status);
    }
    Ok(())
}

fn cmd_prompt(config: &Config) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();

    let command = ask(&mut input, "Enter command (lock/unlock): ")?.to_lowercase();
    let file = PathBuf::from(ask(&mut input, "Enter file path: ")?);

    match command.as_str() {
        "lock" => {
            let raw = ask(&mut input, "Enter lock duration in seconds: ")?;
            let duration = raw
                .parse::<u64>()
                .map_err(|_| Error::InvalidDuration(format!("'{}' is not a number of seconds", raw)))?;
            cmd_lock(config, &file, duration)
        }
        "unlock" => cmd_unlock(config, &file),
        other => Err(Error::InvalidCommand(other.to_string())),
    }
}

fn ask<R: BufRead>(input: &mut R, prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
