//! MicroPython Raw REPL Protocol
//!
//! This crate drives the "raw REPL" of MicroPython-class boards over any duplex
//! byte stream. The raw REPL is a machine-oriented mode of the board's own
//! interpreter: the host sends a code block, the board executes it and returns
//! what it printed plus any traceback, framed by fixed control bytes.
//!
//! # Protocol Overview
//!
//! | Transition      | Host sends            | Board answers                               |
//! |-----------------|-----------------------|---------------------------------------------|
//! | Interrupt (x2)  | `0x03 0x03`           | prompt, not parsed                          |
//! | Enter raw mode  | `0x01`                | `raw REPL; CTRL-B to exit\r\n>`             |
//! | Execute         | code + `0x04`         | `OK`, output, `0x04`, error, `0x04`, `>`    |
//! | Exit raw mode   | `0x02`                | not awaited                                 |
//! | Soft reboot     | `0x04` on empty line  | not awaited                                 |
//!
//! # Example
//!
//! ```rust,ignore
//! use pyboard_repl::{connect_tcp, Session};
//!
//! let mut session = Session::new(connect_tcp("localhost:9000")?);
//! let mut raw = session.raw()?;
//! let result = raw.exec(b"print(1 + 1)")?;
//! assert_eq!(result.output_str().trim(), "2");
//! // raw mode is left when `raw` goes out of scope
//! ```

mod config;
mod constants;
mod error;
mod frame;
mod link;
#[cfg(feature = "mock")]
pub mod mock;
mod passthrough;
mod session;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use frame::*;
pub use link::*;
pub use passthrough::*;
pub use session::*;
