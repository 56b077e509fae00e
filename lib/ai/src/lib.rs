//! Agent invocation for switchboard.
//!
//! This crate provides:
//!
//! - **Backend**: the [`LlmBackend`] trait and an OpenAI-compatible client
//! - **Personas**: the catalog of per-persona instructions and models
//! - **Agent Invoker**: deadline, single retry and error normalization

pub mod backend;
pub mod error;
pub mod invoker;
pub mod openai;
pub mod persona;
pub mod scripted;

pub use backend::{LlmBackend, LlmMessage, LlmRequest, LlmResponse, MessageRole, TokenUsage};
pub use error::{AgentError, LlmError};
pub use invoker::{AgentConfig, AgentInvoker, CONTENT_FILTER_REFUSAL, Reply};
pub use openai::OpenAiBackend;
pub use persona::{PersonaCatalog, PersonaProfile};
pub use scripted::ScriptedBackend;
