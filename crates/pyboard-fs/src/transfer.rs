//! Transfer engine: chunked file copies and tree mirroring.
//!
//! Files move [`CHUNK_SIZE`] bytes per round-trip. A chunk shorter than
//! `CHUNK_SIZE` marks the end of a remote file. Tree walks are depth-first with
//! entries in name order, so repeated runs over an unchanged tree issue the
//! same operations in the same order. Any failure aborts the whole operation.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use pyboard_repl::ByteLink;

use crate::board::Board;
use crate::commands::CHUNK_SIZE;
use crate::error::{FsError, FsResult};
use crate::responses::join_remote;

/// One entry of a walked tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    /// Path relative to the tree root, `/`-separated.
    pub path: String,
    /// True for directories.
    pub is_dir: bool,
}

impl TreeEntry {
    fn dir(path: String) -> Self {
        TreeEntry { path, is_dir: true }
    }

    fn file(path: String) -> Self {
        TreeEntry {
            path,
            is_dir: false,
        }
    }
}

/// Walk a local directory: depth-first, names in order, each directory listed
/// before its contents. The root itself is not included.
///
/// Symlinks to files are followed; symlinks to directories are skipped.
pub fn walk_local(root: &Path) -> FsResult<Vec<TreeEntry>> {
    let mut entries = Vec::new();
    walk_local_into(root, "", &mut entries)?;
    Ok(entries)
}

fn walk_local_into(dir: &Path, prefix: &str, out: &mut Vec<TreeEntry>) -> FsResult<()> {
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| FsError::local(dir, e))? {
        let entry = entry.map_err(|e| FsError::local(dir, e))?;
        let name = entry.file_name().into_string().map_err(|name| {
            FsError::local(
                dir.join(&name),
                io::Error::new(io::ErrorKind::InvalidData, "file name is not valid UTF-8"),
            )
        })?;
        children.push(name);
    }
    children.sort();

    for name in children {
        let path = dir.join(&name);
        let relative = join_remote(prefix, &name);
        let meta = fs::symlink_metadata(&path).map_err(|e| FsError::local(&path, e))?;
        let is_dir = if meta.file_type().is_symlink() {
            let target = fs::metadata(&path).map_err(|e| FsError::local(&path, e))?;
            if target.is_dir() {
                // Following directory links can loop forever (`loop -> .`).
                log::warn!("skipping symlinked directory {}", path.display());
                continue;
            }
            false
        } else {
            meta.is_dir()
        };
        if is_dir {
            out.push(TreeEntry::dir(relative.clone()));
            walk_local_into(&path, &relative, out)?;
        } else {
            out.push(TreeEntry::file(relative));
        }
    }
    Ok(())
}

/// Local path of a tree entry below `root`.
fn local_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|c| !c.is_empty())
        .fold(root.to_path_buf(), |acc, c| acc.join(c))
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<L: ByteLink> Board<'_, L> {
    // ========================================================================
    // Single Files
    // ========================================================================

    /// Stream a remote file into `sink`. Returns the number of bytes copied.
    pub fn cat<W: Write>(&mut self, path: &str, sink: &mut W) -> FsResult<u64> {
        self.copy_remote(path, |chunk| sink.write_all(chunk).map_err(FsError::Sink))
    }

    /// Copy remote `src` to local `dst`, replacing any existing file.
    pub fn get(&mut self, dst: &Path, src: &str) -> FsResult<u64> {
        let mut file = File::create(dst).map_err(|e| FsError::local(dst, e))?;
        let copied = self.copy_remote(src, |chunk| {
            file.write_all(chunk).map_err(|e| FsError::local(dst, e))
        })?;
        file.flush().map_err(|e| FsError::local(dst, e))?;
        log::debug!("got {} ({} bytes) -> {}", src, copied, dst.display());
        Ok(copied)
    }

    /// Copy local `src` to remote `dst`, replacing any existing file.
    pub fn put(&mut self, dst: &str, src: &Path) -> FsResult<u64> {
        let mut file = File::open(src).map_err(|e| FsError::local(src, e))?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut offset = 0u64;
        loop {
            let n = read_full(&mut file, &mut buf).map_err(|e| FsError::local(src, e))?;
            // The first write always happens so an empty source still truncates.
            if n > 0 || offset == 0 {
                self.write_chunk(dst, offset, &buf[..n])?;
            }
            offset += n as u64;
            if n < CHUNK_SIZE {
                break;
            }
        }
        log::debug!("put {} ({} bytes) -> {}", src.display(), offset, dst);
        Ok(offset)
    }

    fn copy_remote<F>(&mut self, path: &str, mut write: F) -> FsResult<u64>
    where
        F: FnMut(&[u8]) -> FsResult<()>,
    {
        let mut offset = 0u64;
        loop {
            let chunk = self.read_chunk(path, offset, CHUNK_SIZE)?;
            write(&chunk)?;
            offset += chunk.len() as u64;
            if chunk.len() < CHUNK_SIZE {
                return Ok(offset);
            }
        }
    }

    // ========================================================================
    // Trees
    // ========================================================================

    /// Walk a remote directory, in the same order as [`walk_local`].
    pub fn walk_remote(&mut self, root: &str) -> FsResult<Vec<TreeEntry>> {
        let mut entries = Vec::new();
        self.walk_remote_into(root, "", &mut entries)?;
        Ok(entries)
    }

    fn walk_remote_into(&mut self, root: &str, prefix: &str, out: &mut Vec<TreeEntry>) -> FsResult<()> {
        let dir = join_remote(root, prefix);
        let listing = self.list_dir(&dir).map_err(|e| {
            if prefix.is_empty() {
                e
            } else {
                e.at_entry(prefix)
            }
        })?;
        for entry in listing {
            let relative = join_remote(prefix, &entry.name);
            if entry.is_dir {
                out.push(TreeEntry::dir(relative.clone()));
                self.walk_remote_into(root, &relative, out)?;
            } else {
                out.push(TreeEntry::file(relative));
            }
        }
        Ok(())
    }

    /// Mirror the remote tree under `remote_root` (default: the board's working
    /// directory) into `local_root`.
    pub fn download(&mut self, remote_root: Option<&str>, local_root: &Path) -> FsResult<()> {
        let remote_root = match remote_root {
            Some(root) => root.to_string(),
            None => self.cwd()?,
        };
        let tree = self.walk_remote(&remote_root)?;
        log::debug!("downloading {} entries from {}", tree.len(), remote_root);

        fs::create_dir_all(local_root).map_err(|e| FsError::local(local_root, e))?;
        for entry in &tree {
            let local = local_path(local_root, &entry.path);
            let result = if entry.is_dir {
                fs::create_dir_all(&local).map_err(|e| FsError::local(&local, e))
            } else {
                self.get(&local, &join_remote(&remote_root, &entry.path)).map(|_| ())
            };
            result.map_err(|e| e.at_entry(&entry.path))?;
        }
        Ok(())
    }

    /// Mirror the local tree under `local_root` onto `remote_root` (default: the
    /// board's working directory).
    pub fn upload(&mut self, local_root: &Path, remote_root: Option<&str>) -> FsResult<()> {
        let remote_root = match remote_root {
            Some(root) => {
                self.ensure_dir(root)?;
                root.to_string()
            }
            None => self.cwd()?,
        };
        let tree = walk_local(local_root)?;
        log::debug!("uploading {} entries to {}", tree.len(), remote_root);

        for entry in &tree {
            let remote = join_remote(&remote_root, &entry.path);
            let result = if entry.is_dir {
                self.ensure_dir(&remote)
            } else {
                self.put(&remote, &local_path(local_root, &entry.path)).map(|_| ())
            };
            result.map_err(|e| e.at_entry(&entry.path))?;
        }
        Ok(())
    }
}
