//! Database repositories for switchboard.
//!
//! This module provides data access for conversation sessions.

pub mod session;

pub use session::{PgSessionStore, SESSIONS_TABLE};
