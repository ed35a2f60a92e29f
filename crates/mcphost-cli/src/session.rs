use anyhow::Result;
use tracing::{info, warn};

use crate::commands::{self, SlashCommand};
use crate::prompt::{InputType, Prompt};

use mcphost::agent::Agent;
use mcphost::config::McpConfig;
use mcphost::output::render_assistant_text;

pub struct Session<P: Prompt> {
    agent: Agent,
    mcp_config: McpConfig,
    prompt: P,
}

enum Flow {
    Continue,
    Quit,
}

impl<P: Prompt> Session<P> {
    pub fn new(agent: Agent, mcp_config: McpConfig, prompt: P) -> Self {
        Session {
            agent,
            mcp_config,
            prompt,
        }
    }

    /// Read prompts until the user quits, then close every tool server
    pub async fn start(&mut self) -> Result<()> {
        self.prompt.ready();
        let result = self.run().await;
        self.agent.shutdown().await;
        self.prompt.close();
        result
    }

    async fn run(&mut self) -> Result<()> {
        loop {
            let input = self.prompt.get_input()?;
            let text = match input.input_type {
                InputType::Exit => return Ok(()),
                InputType::AskAgain => continue,
                InputType::Message => match input.content {
                    Some(text) if !text.trim().is_empty() => text,
                    _ => continue,
                },
            };

            if let Some(command) = SlashCommand::parse(&text) {
                match self.handle_command(command) {
                    Flow::Continue => continue,
                    Flow::Quit => return Ok(()),
                }
            }

            tokio::select! {
                result = self.agent.handle_user_turn(&text, &mut self.prompt) => {
                    if let Err(err) = result {
                        warn!(%err, "Turn ended with an error");
                        self.prompt.hide_busy();
                        self.prompt.error(&err.to_string());
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted during a turn");
                    self.prompt.hide_busy();
                    return Ok(());
                }
            }
        }
    }

    fn handle_command(&mut self, command: SlashCommand) -> Flow {
        let markdown = match command {
            SlashCommand::Help => commands::help_markdown(),
            SlashCommand::Tools => {
                let registry = self.agent.registry();
                commands::tools_markdown(registry.server_names(), registry.tools())
            }
            SlashCommand::Servers => commands::servers_markdown(&self.mcp_config),
            SlashCommand::History => commands::history_markdown(self.agent.history()),
            SlashCommand::Quit => return Flow::Quit,
            SlashCommand::Unknown(command) => {
                self.prompt.error(&format!("Unknown command: {}", command));
                self.prompt.plain("Type /help to see available commands\n");
                return Flow::Continue;
            }
        };
        render_assistant_text(&mut self.prompt, &markdown);
        Flow::Continue
    }
}
