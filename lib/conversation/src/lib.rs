//! Conversation service for switchboard.
//!
//! This crate provides:
//!
//! - **Channel Adapter**: normalizes web chat, SMS and voice payloads
//! - **Sessions**: per-(customer, channel) conversation state and lifecycle
//! - **Session Store**: the storage contract plus an in-memory implementation
//! - **Lead details**: heuristic extraction of booking details from turns

pub mod adapter;
pub mod error;
pub mod lead;
pub mod memory;
pub mod session;
pub mod store;
pub mod turn;

pub use adapter::{InboundMessage, normalize};
pub use error::{AdapterError, SessionStoreError};
pub use lead::LeadDetails;
pub use memory::InMemorySessionStore;
pub use session::{ConversationSession, SessionKey, SessionState};
pub use store::SessionStore;
pub use turn::{Turn, TurnRole};
