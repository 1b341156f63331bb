//! `pyboard`: command-line access to MicroPython boards over the raw REPL.

mod commands;
mod console;
mod device;
mod error;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::FsCommand;
use error::CliResult;
use settings::{Settings, Target};

#[derive(Debug, Parser)]
#[command(name = "pyboard", version, about = "MicroPython CLI tool", long_about = None)]
struct Cli {
    /// Serial device of the MicroPython board, or tcp://host:port
    #[arg(short, long, env = "PYBOARD_DEVICE", global = true)]
    device: Option<String>,

    /// Baudrate of the serial device [default: 115200]
    #[arg(short, long, env = "PYBOARD_BAUDRATE", global = true)]
    baudrate: Option<u32>,

    /// Exec timeout in milliseconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// YAML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(flatten)]
    Fs(FsCommand),

    /// Open the MicroPython REPL
    Repl,

    /// Print version
    Version,
}

impl Cli {
    fn target(&self) -> CliResult<Target> {
        let settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };
        Target::resolve(self.device.clone(), self.baudrate, self.timeout, settings)
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> CliResult<()> {
    let target = cli.target();
    match cli.command {
        Command::Fs(command) => commands::run_fs(target?, command),
        Command::Repl => commands::repl(target?),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            ExitCode::FAILURE
        }
    }
}
