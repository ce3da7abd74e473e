//! Conduit Core - Foundation types for the Conduit request orchestrator.
//!
//! This crate provides:
//! - The [`OperatingMode`] selector (chat, rag, auto, agent)
//! - Parsing of mode-switch directives at the start of a user turn
//! - Small text utilities shared by the other crates

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod mode;
pub mod utils;

pub use mode::{Directive, ModeParseError, OperatingMode, parse_directive};
pub use utils::truncate_to_boundary;
