//! TokenLedger Protocol
//!
//! Client payloads, function-name parsing of raw invocations and the
//! response envelope returned to clients.

pub mod invocation;
pub mod messages;

pub use invocation::{Invocation, ProtocolError};
pub use messages::*;
