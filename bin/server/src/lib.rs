//! switchboard web server.
//!
//! This crate provides the HTTP surface of the conversation router: web
//! chat, the SMS webhook, voice transcript hand-off and a health check,
//! backed by a PostgreSQL session store.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
