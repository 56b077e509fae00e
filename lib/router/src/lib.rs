//! Conversation routing for switchboard.
//!
//! The [`Router`] ties the channel adapter, session store and agent invoker
//! together: it picks the session's persona, invokes the agent, falls back
//! when the agent fails, and records the turns.

pub mod cancel;
pub mod config;
pub mod error;
pub mod router;

pub use cancel::{CancelHandle, CancelSignal};
pub use config::SessionConfig;
pub use error::RouteError;
pub use router::{FALLBACK_REPLY, ReplyKind, RouteReply, Router};
