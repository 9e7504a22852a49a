//! LLM integration module.
//!
//! Provides an OpenAI-compatible client for the grading model, streamed
//! response parsing, and the prompts used to grade search results.

mod client;
mod prompts;
pub mod stream;

pub use client::{ChunkObserver, LlmClient, LlmResponse, Message, Role, TokenUsage};
pub use prompts::{Prompts, build_grading_prompt, dimension_criteria, format_results};
