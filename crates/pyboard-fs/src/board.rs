//! Filesystem primitives on a board in raw mode.

use pyboard_repl::{ByteLink, ExecResult, Session};

use crate::commands::{RemoteCommand, CHUNK_SIZE};
use crate::error::{FsError, FsErrorKind, FsResult};
use crate::responses::{classify, parse_chunk, parse_cwd, parse_listing, parse_stat, DirEntry};

/// Filesystem view of a board.
///
/// Borrows a session that is already in raw mode (typically through a
/// [`RawGuard`](pyboard_repl::RawGuard)). Every method completes all of its
/// round-trips before returning. The board is the only source of truth for the
/// working directory; nothing is cached here.
pub struct Board<'s, L: ByteLink> {
    session: &'s mut Session<L>,
}

impl<'s, L: ByteLink> Board<'s, L> {
    /// Wrap a raw-mode session.
    pub fn new(session: &'s mut Session<L>) -> Self {
        Board { session }
    }

    /// The underlying session.
    pub fn session(&mut self) -> &mut Session<L> {
        &mut *self.session
    }

    /// Run a command and return the raw result, traceback included.
    pub fn run_unchecked(&mut self, command: &RemoteCommand<'_>) -> FsResult<ExecResult> {
        log::trace!("running {} on {:?}", command.name(), command.path());
        let result = self.session.exec(command.script().as_bytes())?;
        Ok(result)
    }

    /// Run a command; a traceback becomes a classified error.
    pub fn run(&mut self, command: &RemoteCommand<'_>) -> FsResult<Vec<u8>> {
        let result = self.run_unchecked(command)?;
        match result.remote_error {
            Some(traceback) => {
                let err = classify(command, &traceback);
                log::debug!("{} failed: {}", command.name(), err);
                Err(err)
            }
            None => Ok(result.output),
        }
    }

    // ========================================================================
    // Listing
    // ========================================================================

    /// Entries of a directory, sorted by name.
    pub fn list_dir(&mut self, path: &str) -> FsResult<Vec<DirEntry>> {
        let output = self.run(&RemoteCommand::ListDir { path })?;
        parse_listing(&output)
    }

    /// Names in a directory (the working directory if `path` is `None`).
    pub fn ls(&mut self, path: Option<&str>) -> FsResult<Vec<String>> {
        let entries = self.list_dir(path.unwrap_or("."))?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Type and size of a path.
    pub fn stat(&mut self, path: &str) -> FsResult<DirEntry> {
        let output = self.run(&RemoteCommand::Stat { path })?;
        parse_stat(&output, path)
    }

    /// Like [`Board::stat`], but a missing path is `None` rather than an error.
    pub fn try_stat(&mut self, path: &str) -> FsResult<Option<DirEntry>> {
        match self.stat(path) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// True if something exists at `path`.
    pub fn exists(&mut self, path: &str) -> FsResult<bool> {
        Ok(self.try_stat(path)?.is_some())
    }

    /// True if `path` exists and is a directory.
    pub fn is_dir(&mut self, path: &str) -> FsResult<bool> {
        Ok(self.try_stat(path)?.map(|e| e.is_dir).unwrap_or(false))
    }

    // ========================================================================
    // Directories and Files
    // ========================================================================

    /// Current working directory on the board.
    pub fn cwd(&mut self) -> FsResult<String> {
        let output = self.run(&RemoteCommand::GetCwd)?;
        parse_cwd(&output)
    }

    /// Change the board's working directory.
    pub fn cd(&mut self, path: &str) -> FsResult<()> {
        self.run(&RemoteCommand::ChDir { path }).map(|_| ())
    }

    /// Create a directory.
    pub fn mkdir(&mut self, path: &str) -> FsResult<()> {
        self.run(&RemoteCommand::MkDir { path }).map(|_| ())
    }

    /// Remove an empty directory.
    pub fn rmdir(&mut self, path: &str) -> FsResult<()> {
        self.run(&RemoteCommand::RmDir { path }).map(|_| ())
    }

    /// Remove a file.
    pub fn rm(&mut self, path: &str) -> FsResult<()> {
        self.run(&RemoteCommand::Remove { path }).map(|_| ())
    }

    /// Create `path` as a directory unless a directory is already there.
    pub(crate) fn ensure_dir(&mut self, path: &str) -> FsResult<()> {
        match self.mkdir(path) {
            Err(e) if e.kind() == Some(FsErrorKind::AlreadyExists) => {
                if self.is_dir(path)? {
                    Ok(())
                } else {
                    Err(FsError::FileSystem {
                        kind: FsErrorKind::NotADirectory,
                        path: path.to_string(),
                        message: "a file occupies the directory name".to_string(),
                    })
                }
            }
            other => other,
        }
    }

    // ========================================================================
    // Chunks
    // ========================================================================

    /// Read up to `length` bytes at `offset`.
    pub fn read_chunk(&mut self, path: &str, offset: u64, length: usize) -> FsResult<Vec<u8>> {
        let output = self.run(&RemoteCommand::ReadChunk {
            path,
            offset,
            length,
        })?;
        let chunk = parse_chunk(&output)?;
        if chunk.len() > length {
            return Err(FsError::Decode {
                detail: format!("asked for {} bytes, board sent {}", length, chunk.len()),
            });
        }
        log::trace!("read {} bytes of {} at {}", chunk.len(), path, offset);
        Ok(chunk)
    }

    /// Write `data` at `offset`. Offset 0 creates or truncates the file.
    pub fn write_chunk(&mut self, path: &str, offset: u64, data: &[u8]) -> FsResult<()> {
        debug_assert!(data.len() <= CHUNK_SIZE);
        self.run(&RemoteCommand::WriteChunk { path, offset, data })?;
        log::trace!("wrote {} bytes of {} at {}", data.len(), path, offset);
        Ok(())
    }

    /// Soft-reset the board. The session must re-enter raw mode afterwards.
    pub fn soft_reboot(&mut self) -> FsResult<()> {
        self.session.soft_reboot()?;
        Ok(())
    }
}
