//! Summarization service client
//!
//! One opaque request per conversation against the OpenRouter chat API.
//! The digest generator owns all parsing of what comes back.

mod client;
mod prompts;

pub use client::SummarizerClient;
pub use prompts::digest_prompt;
