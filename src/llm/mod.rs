//! LLM integration module.
//!
//! Provides an OpenAI-compatible client for chat-completion calls and
//! the prompts used for judging and answering.

mod client;
mod prompts;

pub use client::{ChatModel, LlmClient, LlmResponse, Message, Role, TokenUsage};
pub use prompts::{
    COMPLETENESS_WEIGHT, CONTENT_ACCURACY_WEIGHT, Prompts, RELEVANCE_WEIGHT,
    SOURCE_ACCURACY_WEIGHT, build_judge_prompt,
};
