//! The [`Connection`] trait every transport (stdio, streamable HTTP, the
//! in-memory pair used by tests) implements, plus the in-memory pair itself.

mod connection;
mod memory;

pub use connection::{Connection, ConnectionError};
pub use memory::memory_pair;
