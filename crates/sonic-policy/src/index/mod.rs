//! Secondary match indices, built as conditions are attached to statements.

mod prefix;
mod protocol;

pub use prefix::{PrefixIndex, PrefixMatchEntry};
pub use protocol::ProtocolIndex;
