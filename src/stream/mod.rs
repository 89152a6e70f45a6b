//! Rendering state for streamed replies.
pub mod driver;
pub mod session;

pub use driver::{Generation, Ticket, drive, drive_stream};
pub use session::{Outcome, SessionUpdate, StreamSession, TRANSPORT_ERROR_TEXT, TerminalState};
