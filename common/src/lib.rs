//! TokenLedger Common Types
//!
//! This crate contains the types shared across the TokenLedger workspace:
//! identifiers, token amounts, stored record shapes, operation requests and
//! the error taxonomy.

pub mod amount;
pub mod error;
pub mod identifiers;
pub mod record;
pub mod request;

pub use amount::*;
pub use error::*;
pub use identifiers::*;
pub use record::*;
pub use request::*;
