pub mod analyzer;
pub mod client;
pub mod gemini;
pub mod names;
pub mod parser;
pub mod prompt;

pub use analyzer::Analyzer;
pub use client::{ChatBackend, OpenAiClient};
pub use gemini::GeminiClient;
pub use parser::parse_response;
pub use prompt::{format_prompt, SYSTEM_PROMPT};
