use anyhow::Result;
use mcphost::output::Output;

pub mod rustyline;

/// A terminal the session reads prompts from and renders the agent's output to
pub trait Prompt: Output {
    fn get_input(&mut self) -> Result<Input>;
    fn close(&mut self);
    fn ready(&mut self) {
        self.plain("\nmcphost is running! Enter a prompt, /help for commands, Ctrl+C to quit.\n");
    }
}

pub struct Input {
    pub input_type: InputType,
    pub content: Option<String>, // Only set for messages
}

impl Input {
    pub fn message(content: impl Into<String>) -> Self {
        Self {
            input_type: InputType::Message,
            content: Some(content.into()),
        }
    }

    pub fn exit() -> Self {
        Self {
            input_type: InputType::Exit,
            content: None,
        }
    }

    pub fn ask_again() -> Self {
        Self {
            input_type: InputType::AskAgain,
            content: None,
        }
    }
}

pub enum InputType {
    AskAgain, // Nothing to do, ask the user again
    Message,  // User sent a prompt or a command
    Exit,     // User wants to exit the session
}
