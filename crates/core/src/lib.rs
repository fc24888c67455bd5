//! Shop Scout Core - Shared types library.
//!
//! This crate provides common types used across all Shop Scout components:
//! - `client` - Optimistic client state for favorites and reviews
//! - `cli` - Command-line front end driving the client library
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no state
//! stores. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, reviews, attachments and upload slots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
