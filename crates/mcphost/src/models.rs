//! These models represent the objects passed around by the agent
//!
//! There are several different related formats we need to interact with:
//! - anthropic, openai and gemini messages/tools, sent from the agent to the LLM
//! - MCP tool descriptors and call results, exchanged with tool servers
//! - the conversation history shown to the user by `/history`
//!
//! These all overlap to varying degrees. We always immediately convert those data models
//! into the internal structs using to/from helpers. Because of the need for compatibility,
//! the internal models are not an exact match to any of these formats.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
