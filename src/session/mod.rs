//! Session Module
//!
//! Reference-scoped field accumulation:
//! - Lock-free session table (DashMap)
//! - One serial worker task per session owning its field map
//! - Bounded command queues with backpressure
//! - Drain as a barrier over every accepted write

pub mod error;
pub mod registry;
pub mod types;
pub(crate) mod worker;

pub use error::{SessionError, SessionResult};
pub use registry::SessionRegistry;
pub use types::{Fields, SessionId, SessionStatus};
