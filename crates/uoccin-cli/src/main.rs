#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use cmd::Globals;
use output::{CliError, OutputMode, render_error};
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "uoccin: sync a media watchlist and collection across devices",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Shared folder root (overrides UOCCIN_ROOT and the user config).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Device id (overrides UOCCIN_DEVICE and the user config).
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Derive the output mode from flags.
    const fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }

    fn globals(&self) -> Globals {
        Globals {
            root: self.root.clone(),
            device: self.device.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Setup",
        about = "Create this device's inbox",
        long_about = "Create this device's inbox in the shared folder so other devices deliver to it.",
        after_help = "EXAMPLES:\n    # Register the laptop in a synced folder\n    uoccin --root ~/Dropbox/uoccin --device laptop init"
    )]
    Init(cmd::init::InitArgs),

    #[command(
        next_help_heading = "Write",
        about = "Record raw commands",
        long_about = "Record one command, or a batch from stdin, in a single run that is finished immediately.",
        after_help = "EXAMPLES:\n    # Rate a movie\n    uoccin record movie tt0111161 rating 9\n\n    # Record a batch\n    printf 'series|81189.5.16|watched|true\\n' | uoccin record --stdin"
    )]
    Record(cmd::record::RecordArgs),

    #[command(
        next_help_heading = "Write",
        about = "Set a flag",
        long_about = "Set watchlist, collected or watched, optionally with tags or subtitles.",
        after_help = "EXAMPLES:\n    # Add to the watchlist with tags\n    uoccin mark watchlist movie tt0111161 --tags drama,classic\n\n    # Collect an episode with subtitles\n    uoccin mark collected series 81189.5.16 --subtitles eng,ita"
    )]
    Mark(cmd::mark::MarkArgs),

    #[command(
        next_help_heading = "Write",
        about = "Clear a flag",
        after_help = "EXAMPLES:\n    # Remove a movie from the watchlist\n    uoccin unmark watchlist movie tt0111161"
    )]
    Unmark(cmd::mark::UnmarkArgs),

    #[command(
        next_help_heading = "Sync",
        about = "Retry pending deliveries and apply the inbox",
        after_help = "EXAMPLES:\n    # Sync this device\n    uoccin sync\n\n    # Emit machine-readable output\n    uoccin sync --json"
    )]
    Sync(cmd::sync::SyncArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one movie, series or episode",
        after_help = "EXAMPLES:\n    # Show a movie\n    uoccin show movie tt0111161\n\n    # Show an episode\n    uoccin show series 81189 --season 5 --episode 16"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "List the watchlist",
        after_help = "EXAMPLES:\n    # Movies tagged drama or classic\n    uoccin watchlist movie --tag drama --tag classic\n\n    # Series without the 'dropped' tag\n    uoccin watchlist series --tag dropped --check none"
    )]
    Watchlist(cmd::watchlist::WatchlistArgs),
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("UOCCIN_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "uoccin=debug,info"
        } else {
            "uoccin=info,warn"
        })
    });

    let format = env::var("UOCCIN_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let globals = cli.globals();
    let output = cli.output_mode();
    match &cli.command {
        Commands::Init(args) => cmd::init::run_init(args, &globals, output),
        Commands::Record(args) => cmd::record::run_record(args, &globals, output),
        Commands::Mark(args) => cmd::mark::run_mark(args, &globals, output),
        Commands::Unmark(args) => cmd::mark::run_unmark(args, &globals, output),
        Commands::Sync(args) => cmd::sync::run_sync(args, &globals, output),
        Commands::Show(args) => cmd::show::run_show(args, &globals, output),
        Commands::Watchlist(args) => cmd::watchlist::run_watchlist(args, &globals, output),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    debug!(command = ?cli.command, "starting");

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let cli_error = CliError::from(&err);
            if render_error(cli.output_mode(), &cli_error).is_err() {
                eprintln!("error: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}
