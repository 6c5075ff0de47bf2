//! Completion service integration

pub mod client;

pub use client::{LlmClient, LlmError};
