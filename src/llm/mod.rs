//! OpenRouter-backed test generation: wire types, client, and prompts.

pub mod client;
pub mod models;
pub mod prompts;

pub use client::{generate, LlmResponse};
pub use models::{Model, Usage};
