//! Core domain types and utilities for switchboard.
//!
//! This crate provides the foundational types shared by the channel, agent,
//! and telephony crates: error handling, identifiers, the customer identity
//! model, channels, and agent personas.

pub mod channel;
pub mod error;
pub mod id;
pub mod identity;
pub mod persona;

pub use channel::Channel;
pub use error::Result;
pub use id::{CallAttemptId, ConversationSessionId, ParseIdError, TurnId};
pub use identity::{CustomerIdentity, IdentityError};
pub use persona::AgentPersona;
