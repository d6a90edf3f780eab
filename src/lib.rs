pub mod chat;
pub mod config;
pub mod error;
pub mod providers;

/// Prompt asked by the `chatbot` binary.
pub const PROMPT: &str = "Write a haiku about recursion in programming.";

/// Marker printed when the provider returned no content.
pub const ABSENT_MARKER: &str = "null";

/// Format the single result line printed on stdout.
pub fn render_response(content: Option<&str>) -> String {
    format!("Chatbot response: {}", content.unwrap_or(ABSENT_MARKER))
}
