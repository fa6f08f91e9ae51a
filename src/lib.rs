//! ctxlog - concurrent, reference-scoped key/value accumulator.
//!
//! Open a session, push fields into it from any number of tasks, then drain
//! the final mapping in one step.

pub mod cli;
pub mod config;
pub mod session;

pub use config::{ConfigError, RegistryConfig};
pub use session::{Fields, SessionError, SessionId, SessionRegistry, SessionResult};
