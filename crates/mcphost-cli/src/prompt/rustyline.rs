use std::io::{self, Write};

use anyhow::Result;
use bat::WrappingMode;
use cliclack::spinner;
use console::style;
use mcphost::output::{AgentEvent, Output, RenderError};
use mcphost::registry::split_tool_name;

use super::{Input, Prompt};

const PROMPT: &str = "\x1b[1m\x1b[38;5;30m> \x1b[0m";
const THEME: &str = "zenburn";

pub struct RustylinePrompt {
    spinner: cliclack::ProgressBar,
    busy: bool,
}

impl RustylinePrompt {
    pub fn new() -> Self {
        RustylinePrompt {
            spinner: spinner(),
            busy: false,
        }
    }
}

impl Default for RustylinePrompt {
    fn default() -> Self {
        Self::new()
    }
}

fn print_tool_header(name: &str) {
    let (server, tool) = split_tool_name(name).unwrap_or(("unknown", name));
    println!();
    println!(
        "─── {} | {} ──────────────────────────",
        style(tool),
        style(server).magenta().dim(),
    );
}

impl Output for RustylinePrompt {
    fn user_prompt(&mut self, prompt: &str) {
        println!("{} {}", style("You:").cyan().bold(), prompt);
    }

    fn assistant_text(&mut self, text: &str) -> Result<(), RenderError> {
        println!("\n{}", style("Assistant:").magenta().bold());
        bat::PrettyPrinter::new()
            .input(bat::Input::from_bytes(text.as_bytes()))
            .theme(THEME)
            .language("Markdown")
            .wrapping_mode(WrappingMode::Character)
            .print()
            .map_err(|e| RenderError(e.to_string()))?;
        println!();
        io::stdout()
            .flush()
            .map_err(|e| RenderError(e.to_string()))
    }

    fn plain(&mut self, text: &str) {
        println!("{}", text);
    }

    fn error(&mut self, message: &str) {
        eprintln!("{}", style(format!("Error: {}", message)).red().bold());
    }

    fn event(&mut self, event: &AgentEvent) {
        match event {
            AgentEvent::ToolCallStarted { name } => print_tool_header(name),
            AgentEvent::ToolCallFinished { name, is_error: true } => {
                println!("{}", style(format!("{} reported an error", name)).yellow());
            }
            AgentEvent::RetryScheduled { attempt, delay, .. } => {
                println!(
                    "{}",
                    style(format!(
                        "Model is overloaded, retrying in {}s (attempt {})",
                        delay.as_secs(),
                        attempt
                    ))
                    .yellow()
                );
            }
            // Model calls and token usage are already logged
            _ => {}
        }
    }

    fn show_busy(&mut self) {
        if self.busy {
            return;
        }
        self.spinner = spinner();
        self.spinner.start("Thinking...");
        self.busy = true;
    }

    fn hide_busy(&mut self) {
        if self.busy {
            self.spinner.stop("");
            self.busy = false;
        }
    }
}

impl Prompt for RustylinePrompt {
    fn get_input(&mut self) -> Result<Input> {
        let mut editor = rustyline::DefaultEditor::new()?;
        match editor.readline(PROMPT) {
            Ok(text) => {
                let text = text.trim();
                if text.is_empty() {
                    Ok(Input::ask_again())
                } else {
                    Ok(Input::message(text))
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted)
            | Err(rustyline::error::ReadlineError::Eof) => Ok(Input::exit()),
            Err(e) => {
                eprintln!("Input error: {}", e);
                Ok(Input::exit())
            }
        }
    }

    fn close(&mut self) {
        self.hide_busy();
        println!("\nGoodbye!");
    }
}
