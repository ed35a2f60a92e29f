use std::time::Duration;
use thiserror::Error;

use crate::providers::base::Usage;

#[derive(Error, Debug)]
#[error("Failed to render output: {0}")]
pub struct RenderError(pub String);

/// Things the agent reports while it works, for the presentation layer to show
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ModelCall { provider: String, model: String },
    Usage(Usage),
    ToolCallStarted { name: String },
    ToolCallFinished { name: String, is_error: bool },
    RetryScheduled { attempt: u32, delay: Duration, reason: String },
}

/// Where the agent sends everything the user should see
pub trait Output: Send {
    /// Echo the prompt the user just entered
    fn user_prompt(&mut self, prompt: &str);

    /// Render assistant text, usually markdown
    fn assistant_text(&mut self, text: &str) -> Result<(), RenderError>;

    /// Print text as-is
    fn plain(&mut self, text: &str);

    fn error(&mut self, message: &str);

    fn event(&mut self, event: &AgentEvent);

    fn show_busy(&mut self);

    fn hide_busy(&mut self);
}

/// Render assistant text, falling back to plain output if rendering fails
pub fn render_assistant_text(output: &mut dyn Output, text: &str) {
    if let Err(err) = output.assistant_text(text) {
        tracing::debug!(%err, "Falling back to plain output");
        output.plain(text);
    }
}
