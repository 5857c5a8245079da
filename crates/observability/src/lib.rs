//! Process-wide tracing setup shared by the binaries.

pub mod tracing;

pub use self::tracing::{DEFAULT_DIRECTIVE, init, init_with_default};
