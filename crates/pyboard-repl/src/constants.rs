//! Protocol constants
//!
//! Control bytes and fixed markers of the MicroPython raw REPL. Every value here
//! goes over the wire verbatim.

// ============================================================================
// Control Bytes (host → board)
// ============================================================================

/// Enter raw REPL mode (Ctrl-A).
pub const CTRL_ENTER_RAW: u8 = 0x01;
/// Leave raw REPL mode and return to the friendly REPL (Ctrl-B).
pub const CTRL_EXIT_RAW: u8 = 0x02;
/// Interrupt the running program / cancel the current line (Ctrl-C).
pub const CTRL_INTERRUPT: u8 = 0x03;
/// Execute the buffered code block (Ctrl-D).
pub const CTRL_EXECUTE: u8 = 0x04;
/// Soft reset; only meaningful on an empty raw REPL line (Ctrl-D).
pub const CTRL_SOFT_REBOOT: u8 = 0x04;

// ============================================================================
// Response Framing (board → host)
// ============================================================================

/// Terminates the output segment and the error segment of an Exec response.
pub const TERMINATOR: u8 = 0x04;

/// Acknowledgment sent once a code block has been accepted for execution.
pub const EXEC_ACK: &[u8; 2] = b"OK";

/// Tail of the banner printed when the board enters raw mode.
pub const RAW_BANNER: &[u8] = b"raw REPL; CTRL-B to exit\r\n>";

/// Prompt printed by the raw REPL once it is ready for the next code block.
pub const RAW_PROMPT: u8 = b'>';

/// Number of interrupts sent before entering raw mode.
pub const INTERRUPT_COUNT: usize = 2;

/// Returns true if `byte` is reserved by the raw REPL framing and must never
/// appear inside generated code.
pub fn is_reserved(byte: u8) -> bool {
    matches!(
        byte,
        CTRL_ENTER_RAW | CTRL_EXIT_RAW | CTRL_INTERRUPT | CTRL_EXECUTE
    )
}
