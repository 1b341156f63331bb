//! MicroPython Board Filesystem
//!
//! Filesystem operations and file transfer for boards reached through
//! [`pyboard_repl`]. The board offers no file-transfer protocol of its own, so
//! every primitive is a short MicroPython script executed in the raw REPL and
//! its printed output is parsed back into typed results.
//!
//! # Layers
//!
//! - [`RemoteCommand`]: generates the script for one primitive (list, stat,
//!   getcwd, chdir, mkdir, rmdir, remove, read chunk, write chunk).
//! - Response parsers ([`parse_listing`] and friends): turn script output into
//!   typed values and classify tracebacks into [`FsError`] kinds.
//! - [`Board`]: the primitives plus the transfer engine (`cat`, `get`, `put`,
//!   `download`, `upload`).
//!
//! # Example
//!
//! ```rust,ignore
//! use pyboard_fs::Board;
//! use pyboard_repl::{connect_tcp, Session};
//!
//! let mut session = Session::new(connect_tcp("localhost:9000")?);
//! let mut raw = session.raw()?;
//! let mut board = Board::new(&mut raw);
//! board.mkdir("/lib")?;
//! board.put("/lib/x.py", "x.py".as_ref())?;
//! println!("{:?}", board.ls(Some("/lib"))?);
//! ```

mod board;
mod commands;
mod error;
mod responses;
mod transfer;

pub use board::*;
pub use commands::*;
pub use error::*;
pub use responses::*;
pub use transfer::*;
