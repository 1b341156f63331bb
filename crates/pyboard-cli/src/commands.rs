//! Command implementations.
//!
//! Every filesystem command opens the device, enters raw mode for exactly one
//! [`Board`] operation, and leaves raw mode again when the guard drops.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Subcommand;
use pyboard_fs::Board;
use pyboard_repl::{passthrough, ByteLink, Session};

use crate::console::{EscapeReader, RawTerminal};
use crate::device;
use crate::error::{CliError, CliResult};
use crate::settings::Target;

/// Commands that run against the board's filesystem in raw mode.
#[derive(Debug, Subcommand)]
pub enum FsCommand {
    /// Print a file
    Cat { file: String },

    /// Change directory
    Cd { path: String },

    /// Copy a directory tree from the device
    Download {
        /// Local destination directory
        #[arg(default_value = ".")]
        local: PathBuf,
        /// Remote source directory [default: working directory]
        remote: Option<String>,
    },

    /// Copy a file from the device
    Get {
        /// Local destination
        dst: PathBuf,
        /// Remote source [default: same as dst]
        src: Option<String>,
    },

    /// List files
    Ls {
        /// Remote directory [default: working directory]
        path: Option<String>,
    },

    /// Make directory
    Mkdir { dir: String },

    /// Copy a file to the device
    Put {
        /// Remote destination
        dst: String,
        /// Local source [default: same as dst]
        src: Option<PathBuf>,
    },

    /// Print working directory
    Pwd,

    /// Perform a soft reboot
    Reboot,

    /// Delete file
    Rm { file: String },

    /// Remove directory
    Rmdir { dir: String },

    /// Copy a local directory tree to the device
    Upload {
        /// Local source directory
        #[arg(default_value = ".")]
        local: PathBuf,
        /// Remote destination directory [default: working directory]
        remote: Option<String>,
    },
}

impl FsCommand {
    /// Run against a board that is already in raw mode.
    pub fn run<L: ByteLink>(self, board: &mut Board<'_, L>) -> CliResult<()> {
        match self {
            FsCommand::Cat { file } => {
                let stdout = io::stdout();
                let mut out = stdout.lock();
                board.cat(&file, &mut out)?;
                out.flush().map_err(CliError::Console)?;
            }
            FsCommand::Cd { path } => board.cd(&path)?,
            FsCommand::Download { local, remote } => board.download(remote.as_deref(), &local)?,
            FsCommand::Get { dst, src } => {
                let src = src.unwrap_or_else(|| dst.to_string_lossy().into_owned());
                board.get(&dst, &src)?;
            }
            FsCommand::Ls { path } => {
                let names = board.ls(path.as_deref())?;
                println!("{}", format_listing(&names));
            }
            FsCommand::Mkdir { dir } => board.mkdir(&dir)?,
            FsCommand::Put { dst, src } => {
                let src = src.unwrap_or_else(|| PathBuf::from(&dst));
                board.put(&dst, &src)?;
            }
            FsCommand::Pwd => println!("{}", board.cwd()?),
            FsCommand::Reboot => board.soft_reboot()?,
            FsCommand::Rm { file } => board.rm(&file)?,
            FsCommand::Rmdir { dir } => board.rmdir(&dir)?,
            FsCommand::Upload { local, remote } => board.upload(&local, remote.as_deref())?,
        }
        Ok(())
    }
}

/// Names separated by two spaces, as `ls` prints them.
pub fn format_listing(names: &[String]) -> String {
    names.join("  ")
}

pub fn run_fs(target: Target, command: FsCommand) -> CliResult<()> {
    let link = device::open(&target.device, target.baudrate)?;
    let mut session = Session::with_config(link, target.config);
    let mut raw = session.raw()?;
    let mut board = Board::new(&mut raw);
    command.run(&mut board)
}

/// Attach the terminal to the board's interactive console until Ctrl-].
pub fn repl(target: Target) -> CliResult<()> {
    let link = device::open(&target.device, target.baudrate)?;
    eprint!("Connected to {}. Press Ctrl-] to exit.\r\n", target.device);

    let end = {
        let _terminal = RawTerminal::enable().map_err(CliError::Console)?;
        passthrough(link, EscapeReader::new(io::stdin()), io::stdout()).map_err(CliError::Console)?
    };
    tracing::debug!(?end, "passthrough finished");
    eprintln!();
    Ok(())
}
