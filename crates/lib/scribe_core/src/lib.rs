//! # scribe_core
//!
//! Core domain logic for Scribe: accounts and tokens, role management,
//! blogs with image uploads, comments, social login, mail and the AI
//! passthrough.

pub mod ai;
pub mod auth;
pub mod blogs;
pub mod comments;
pub mod db;
pub mod email;
pub mod images;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod oauth;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
