//! Remote code generation.
//!
//! Each filesystem primitive becomes a few lines of MicroPython. Arguments are
//! bound to short names at the top of the script (`p`, `o`, `n`, `m`, `d`) as
//! Python literals, followed by a fixed body. Binary data only ever travels as
//! lowercase hex, so no generated script contains a raw REPL control byte.

use std::fmt::Write as _;

/// Bytes moved per read or write round-trip.
///
/// A 512 byte chunk is 1 KiB of hex on the wire, which fits the line buffers
/// and heap of small boards while keeping the per-chunk overhead low.
pub const CHUNK_SIZE: usize = 512;

/// `st_mode` bit marking a directory in `os.stat` / `os.ilistdir` results.
const S_IFDIR: &str = "0x4000";

/// A filesystem primitive expressed as remote code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand<'a> {
    /// Enumerate a directory: one `<d|f> <size> <name>` line per entry.
    ListDir { path: &'a str },
    /// Type and size of a single path: `<d|f> <size>`.
    Stat { path: &'a str },
    /// Print the current working directory.
    GetCwd,
    /// Change the current working directory.
    ChDir { path: &'a str },
    /// Create a directory.
    MkDir { path: &'a str },
    /// Remove an empty directory.
    RmDir { path: &'a str },
    /// Remove a file.
    Remove { path: &'a str },
    /// Print up to `length` bytes starting at `offset`, hex encoded.
    ReadChunk {
        path: &'a str,
        offset: u64,
        length: usize,
    },
    /// Write `data` at `offset`; offset 0 creates or truncates the file.
    WriteChunk {
        path: &'a str,
        offset: u64,
        data: &'a [u8],
    },
}

impl RemoteCommand<'_> {
    /// Short name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::ListDir { .. } => "listdir",
            RemoteCommand::Stat { .. } => "stat",
            RemoteCommand::GetCwd => "getcwd",
            RemoteCommand::ChDir { .. } => "chdir",
            RemoteCommand::MkDir { .. } => "mkdir",
            RemoteCommand::RmDir { .. } => "rmdir",
            RemoteCommand::Remove { .. } => "remove",
            RemoteCommand::ReadChunk { .. } => "read",
            RemoteCommand::WriteChunk { .. } => "write",
        }
    }

    /// The path this command operates on, if any.
    pub fn path(&self) -> Option<&str> {
        match *self {
            RemoteCommand::GetCwd => None,
            RemoteCommand::ListDir { path }
            | RemoteCommand::Stat { path }
            | RemoteCommand::ChDir { path }
            | RemoteCommand::MkDir { path }
            | RemoteCommand::RmDir { path }
            | RemoteCommand::Remove { path }
            | RemoteCommand::ReadChunk { path, .. }
            | RemoteCommand::WriteChunk { path, .. } => Some(path),
        }
    }

    /// Generate the script to execute on the board.
    pub fn script(&self) -> String {
        let mut s = String::new();
        match *self {
            RemoteCommand::ListDir { path } => {
                s.push_str("import os\n");
                bind(&mut s, "p", &py_str(path));
                s.push_str("for e in os.ilistdir(p):\n");
                let _ = writeln!(
                    s,
                    " print('d' if e[1]&{} else 'f',e[3] if len(e)>3 else -1,e[0])",
                    S_IFDIR
                );
            }
            RemoteCommand::Stat { path } => {
                s.push_str("import os\n");
                bind(&mut s, "p", &py_str(path));
                s.push_str("s=os.stat(p)\n");
                let _ = writeln!(s, "print('d' if s[0]&{} else 'f',s[6])", S_IFDIR);
            }
            RemoteCommand::GetCwd => {
                s.push_str("import os\n");
                s.push_str("print(os.getcwd())\n");
            }
            RemoteCommand::ChDir { path } => simple_call(&mut s, "os.chdir", path),
            RemoteCommand::MkDir { path } => simple_call(&mut s, "os.mkdir", path),
            RemoteCommand::RmDir { path } => simple_call(&mut s, "os.rmdir", path),
            RemoteCommand::Remove { path } => simple_call(&mut s, "os.remove", path),
            RemoteCommand::ReadChunk {
                path,
                offset,
                length,
            } => {
                s.push_str("import ubinascii\n");
                bind(&mut s, "p", &py_str(path));
                bind(&mut s, "o", &offset.to_string());
                bind(&mut s, "n", &length.to_string());
                s.push_str("with open(p,'rb') as f:\n");
                s.push_str(" f.seek(o)\n");
                s.push_str(" print(ubinascii.hexlify(f.read(n)).decode())\n");
            }
            RemoteCommand::WriteChunk { path, offset, data } => {
                let mode = if offset == 0 { "wb" } else { "r+b" };
                s.push_str("import ubinascii\n");
                bind(&mut s, "p", &py_str(path));
                bind(&mut s, "o", &offset.to_string());
                bind(&mut s, "m", &py_str(mode));
                bind(&mut s, "d", &py_str(&hex::encode(data)));
                s.push_str("with open(p,m) as f:\n");
                s.push_str(" f.seek(o)\n");
                s.push_str(" f.write(ubinascii.unhexlify(d))\n");
            }
        }
        s
    }
}

fn bind(script: &mut String, name: &str, literal: &str) {
    let _ = writeln!(script, "{}={}", name, literal);
}

fn simple_call(script: &mut String, function: &str, path: &str) {
    script.push_str("import os\n");
    bind(script, "p", &py_str(path));
    let _ = writeln!(script, "{}(p)", function);
}

/// Quote `value` as a single-quoted Python string literal.
///
/// Backslashes, quotes and every control character are escaped, so the
/// literal never contains a byte below 0x20.
pub fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
