//! Parsing of script output and classification of board tracebacks.

use crate::commands::RemoteCommand;
use crate::error::{FsError, FsErrorKind, FsResult};

/// One directory entry as reported by the board.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name, without directory components.
    pub name: String,
    /// True for directories.
    pub is_dir: bool,
    /// Size in bytes, when the board reports it.
    pub size: Option<u64>,
}

/// Parse the output of [`RemoteCommand::ListDir`], sorted by name.
pub fn parse_listing(output: &[u8]) -> FsResult<Vec<DirEntry>> {
    let text = decode_text(output)?;
    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, ' ');
        let (Some(kind), Some(size), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(FsError::Decode {
                detail: format!("malformed listing line {:?}", line),
            });
        };
        entries.push(DirEntry {
            name: name.to_string(),
            is_dir: parse_kind(kind)?,
            size: parse_size(size)?,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Parse the output of [`RemoteCommand::Stat`] for `path`.
pub fn parse_stat(output: &[u8], path: &str) -> FsResult<DirEntry> {
    let text = decode_text(output)?;
    let line = text.trim();
    let Some((kind, size)) = line.split_once(' ') else {
        return Err(FsError::Decode {
            detail: format!("malformed stat output {:?}", line),
        });
    };
    Ok(DirEntry {
        name: base_name(path).to_string(),
        is_dir: parse_kind(kind)?,
        size: parse_size(size)?,
    })
}

/// Parse the output of [`RemoteCommand::GetCwd`].
pub fn parse_cwd(output: &[u8]) -> FsResult<String> {
    let cwd = decode_text(output)?.trim().to_string();
    if cwd.is_empty() {
        // Some ports report the root as an empty string.
        return Ok("/".to_string());
    }
    Ok(cwd)
}

/// Parse the hex output of [`RemoteCommand::ReadChunk`].
pub fn parse_chunk(output: &[u8]) -> FsResult<Vec<u8>> {
    let text = decode_text(output)?;
    hex::decode(text.trim()).map_err(|e| FsError::Decode {
        detail: format!("bad hex chunk: {}", e),
    })
}

/// Turn a traceback into a typed error.
///
/// `OSError`s become [`FsError::FileSystem`] with the board's error line kept
/// as the message; anything else is a [`FsError::Remote`] carrying the full
/// traceback.
pub fn classify(command: &RemoteCommand<'_>, traceback: &str) -> FsError {
    let last = traceback
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("");

    let Some(detail) = last.strip_prefix("OSError:") else {
        return FsError::Remote {
            traceback: traceback.to_string(),
        };
    };

    let mut kind = errno_kind(detail.trim());
    if kind == FsErrorKind::Other
        && matches!(command, RemoteCommand::RmDir { .. })
        && is_errno(detail.trim(), 13, "EACCES")
    {
        // FAT-backed ports refuse to remove a populated directory with EACCES.
        kind = FsErrorKind::NotEmpty;
    }

    FsError::FileSystem {
        kind,
        path: command.path().unwrap_or("").to_string(),
        message: last.to_string(),
    }
}

/// Map the text after `OSError:` to a kind.
///
/// Boards print `[Errno 2] ENOENT`, a bare `2`, or just the symbolic name.
fn errno_kind(detail: &str) -> FsErrorKind {
    const TABLE: &[(u32, &str, FsErrorKind)] = &[
        (2, "ENOENT", FsErrorKind::NotFound),
        (17, "EEXIST", FsErrorKind::AlreadyExists),
        (20, "ENOTDIR", FsErrorKind::NotADirectory),
        (39, "ENOTEMPTY", FsErrorKind::NotEmpty),
    ];
    TABLE
        .iter()
        .find(|(code, name, _)| is_errno(detail, *code, name))
        .map(|(_, _, kind)| *kind)
        .unwrap_or(FsErrorKind::Other)
}

fn is_errno(detail: &str, code: u32, name: &str) -> bool {
    if detail.split(|c: char| !c.is_ascii_alphanumeric()).any(|tok| tok == name) {
        return true;
    }
    errno_number(detail) == Some(code)
}

fn errno_number(detail: &str) -> Option<u32> {
    if let Some(rest) = detail.strip_prefix("[Errno ") {
        return rest.split(']').next()?.trim().parse().ok();
    }
    detail.parse().ok()
}

fn decode_text(output: &[u8]) -> FsResult<&str> {
    std::str::from_utf8(output).map_err(|_| FsError::Decode {
        detail: "output is not valid UTF-8".to_string(),
    })
}

fn parse_kind(kind: &str) -> FsResult<bool> {
    match kind {
        "d" => Ok(true),
        "f" => Ok(false),
        other => Err(FsError::Decode {
            detail: format!("unknown entry type {:?}", other),
        }),
    }
}

fn parse_size(size: &str) -> FsResult<Option<u64>> {
    let size: i64 = size.parse().map_err(|_| FsError::Decode {
        detail: format!("bad entry size {:?}", size),
    })?;
    Ok(u64::try_from(size).ok())
}

/// Last component of a POSIX path.
pub fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/";
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Join a relative POSIX path onto a remote directory.
pub fn join_remote(root: &str, relative: &str) -> String {
    if relative.is_empty() {
        root.to_string()
    } else if root.is_empty() {
        relative.to_string()
    } else if root.ends_with('/') {
        format!("{}{}", root, relative)
    } else {
        format!("{}/{}", root, relative)
    }
}
