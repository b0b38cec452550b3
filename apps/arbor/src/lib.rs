//! # Arbor
//!
//! The Arbor binary as a library: HTTP API, CLI and configuration over the
//! `arbor-core` tree engine. Split out of `main.rs` so the integration tests
//! can drive the router directly.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
