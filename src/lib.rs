//! Rezehor - a personal assistant shell for Claude
//!
//! Forwards text (optionally with a screenshot) to Anthropic's Messages API
//! and relays the reply, either in one piece or as a stream of fragments.

pub mod ai;
pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
