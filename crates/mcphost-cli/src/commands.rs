use std::fmt::Write;

use mcphost::config::{McpConfig, ServerConfig};
use mcphost::models::message::{Message, MessageContent};
use mcphost::models::role::Role;
use mcphost::models::tool::Tool;
use mcphost::registry::split_tool_name;

/// Commands handled by the session itself, never sent to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Tools,
    Servers,
    History,
    Quit,
    Unknown(String),
}

impl SlashCommand {
    /// Recognize a command. Anything not starting with `/` is a prompt.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if !input.starts_with('/') {
            return None;
        }
        let command = match input.to_lowercase().as_str() {
            "/help" => Self::Help,
            "/tools" => Self::Tools,
            "/servers" => Self::Servers,
            "/history" => Self::History,
            "/quit" => Self::Quit,
            _ => Self::Unknown(input.to_string()),
        };
        Some(command)
    }
}

pub fn help_markdown() -> String {
    let mut markdown = String::from("# Available Commands\n\n");
    markdown.push_str("- **/help**: Show this help message\n");
    markdown.push_str("- **/tools**: List all available tools\n");
    markdown.push_str("- **/servers**: List configured MCP servers\n");
    markdown.push_str("- **/history**: Display the conversation history\n");
    markdown.push_str("- **/quit**: Exit the application\n");
    markdown.push_str("\nYou can also press Ctrl+C at any time to quit.\n");

    markdown.push_str("\n## Available Models\n\n");
    markdown.push_str("Pick a model with `--model` or `-m`:\n\n");
    markdown.push_str("- **Anthropic Claude**: `anthropic:claude-3-5-sonnet-latest`\n");
    markdown.push_str("- **OpenAI**: `openai:gpt-4o`\n");
    markdown.push_str("- **Ollama**: `ollama:modelname`\n");
    markdown.push_str("- **Google Gemini**: `google:gemini-2.0-flash`\n");
    markdown.push_str("\n```\nmcphost -m anthropic:claude-3-5-sonnet-latest\nmcphost -m ollama:qwen2.5:3b\n```\n");
    markdown
}

/// The tool catalogue grouped by the server that offers each tool
pub fn tools_markdown<'a>(servers: impl Iterator<Item = &'a str>, tools: &[Tool]) -> String {
    let mut markdown = String::new();
    for server in servers {
        let _ = writeln!(markdown, "## {}\n", server);
        let mut listed = 0;
        for tool in tools {
            match split_tool_name(&tool.name) {
                Ok((owner, name)) if owner == server => {
                    let _ = writeln!(markdown, "- **{}**: {}", name, tool.description);
                    listed += 1;
                }
                _ => {}
            }
        }
        if listed == 0 {
            markdown.push_str("- No tools available\n");
        }
        markdown.push('\n');
    }

    if markdown.is_empty() {
        return "Tools are currently disabled: no MCP servers are connected.\n".to_string();
    }
    format!("# Tools\n\n{}", markdown)
}

/// Configured servers, with header values hidden
pub fn servers_markdown(config: &McpConfig) -> String {
    if config.mcp_servers.is_empty() {
        return "No servers configured.\n".to_string();
    }

    let mut markdown = String::new();
    for (name, server) in &config.mcp_servers {
        let _ = writeln!(markdown, "# {}\n", name);
        match server {
            ServerConfig::Sse(sse) => {
                let _ = writeln!(markdown, "*Url*\n`{}`\n", sse.url);
                markdown.push_str("*Headers*\n");
                let pairs = sse.header_pairs();
                if pairs.is_empty() {
                    markdown.push_str("*None*\n");
                }
                for (key, _) in pairs {
                    let _ = writeln!(markdown, "`{}: [REDACTED]`", key);
                }
            }
            ServerConfig::Stdio(stdio) => {
                let _ = writeln!(markdown, "*Command*\n`{}`\n", stdio.command);
                markdown.push_str("*Arguments*\n");
                if stdio.args.is_empty() {
                    markdown.push_str("*None*\n");
                } else {
                    let _ = writeln!(markdown, "`{}`", stdio.args.join(" "));
                }
            }
        }
        markdown.push('\n');
    }
    markdown
}

pub fn history_markdown(messages: &[Message]) -> String {
    let mut markdown = String::from("# Conversation History\n\n");
    for message in messages {
        let heading = match message.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::Tool => "Tool",
            Role::System => "System",
        };
        let _ = writeln!(markdown, "## {}\n", heading);

        for block in &message.content {
            match block {
                MessageContent::Text(text) => {
                    let _ = writeln!(markdown, "### Text\n{}\n", text.text);
                }
                MessageContent::ToolRequest(request) => {
                    markdown.push_str("### Tool Use\n");
                    let _ = writeln!(markdown, "**Tool:** {}\n", request.tool_call.name);
                    match serde_json::to_string_pretty(&request.tool_call.arguments) {
                        Ok(input) => {
                            let _ = writeln!(markdown, "**Input:**\n```json\n{}\n```\n", input);
                        }
                        Err(err) => {
                            let _ = writeln!(markdown, "Error formatting input: {}\n", err);
                        }
                    }
                }
                MessageContent::ToolResponse(response) => {
                    markdown.push_str("### Tool Result\n");
                    let _ = writeln!(markdown, "**Tool ID:** {}\n", response.id);
                    let _ = writeln!(markdown, "```\n{}\n```\n", response.text);
                }
            }
        }
    }
    markdown
}
