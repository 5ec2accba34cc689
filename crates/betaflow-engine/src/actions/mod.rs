//! Built-in action handlers.

pub mod llm_call;
