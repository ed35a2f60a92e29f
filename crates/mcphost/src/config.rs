//! Configuration read once at startup: the tool server file, the system prompt
//! file and the knobs of the agent loop.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::retry::RetryPolicy;

pub const DEFAULT_CONFIG_FILE: &str = ".mcp.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine the home directory")]
    NoHomeDir,

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid header '{header}' for server '{server}', expected 'Key: Value'")]
    InvalidHeader { server: String, header: String },

    #[error("Invalid model format '{0}', expected provider:model")]
    InvalidModel(String),

    #[error("Unsupported provider: {0}")]
    UnknownProvider(String),

    #[error("{provider} API key not provided. Use --{flag} or set {env}")]
    MissingApiKey {
        provider: &'static str,
        flag: &'static str,
        env: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdioServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SseServerConfig {
    pub url: String,
    /// Extra request headers, each written as `Key: Value`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,
}

impl SseServerConfig {
    /// Headers split into name and value, in the order they were configured
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .filter_map(|header| header.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .collect()
    }
}

/// One entry of `mcpServers`. An entry carrying a `url` is an SSE server,
/// anything else must name a `command` to spawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawServerConfig", untagged)]
pub enum ServerConfig {
    Sse(SseServerConfig),
    Stdio(StdioServerConfig),
}

#[derive(Deserialize)]
struct RawServerConfig {
    url: Option<String>,
    #[serde(default)]
    headers: Vec<String>,
    command: Option<String>,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

impl TryFrom<RawServerConfig> for ServerConfig {
    type Error = String;

    fn try_from(raw: RawServerConfig) -> Result<Self, Self::Error> {
        match (raw.url, raw.command) {
            (Some(url), _) if !url.is_empty() => Ok(ServerConfig::Sse(SseServerConfig {
                url,
                headers: raw.headers,
            })),
            (_, Some(command)) if !command.is_empty() => {
                Ok(ServerConfig::Stdio(StdioServerConfig {
                    command,
                    args: raw.args,
                    env: raw.env,
                }))
            }
            _ => Err("server entry needs either a `url` or a `command`".to_string()),
        }
    }
}

impl ServerConfig {
    pub fn transport(&self) -> &'static str {
        match self {
            ServerConfig::Sse(_) => "sse",
            ServerConfig::Stdio(_) => "stdio",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, ServerConfig>,
}

impl McpConfig {
    /// `$HOME/.mcp.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(DEFAULT_CONFIG_FILE))
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Load the server config, writing an empty one first if the file is missing
    pub fn load_or_create(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, creating an empty one");
            let empty = McpConfig::default();
            let data = serde_json::to_string_pretty(&empty).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
            std::fs::write(path, data).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            return Ok(empty);
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: McpConfig =
            serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, server) in &self.mcp_servers {
            if let ServerConfig::Sse(sse) = server {
                if let Some(header) = sse.headers.iter().find(|h| !h.contains(':')) {
                    return Err(ConfigError::InvalidHeader {
                        server: name.clone(),
                        header: header.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct SystemPromptFile {
    #[serde(rename = "systemPrompt", default)]
    system_prompt: String,
}

/// Read `{"systemPrompt": "..."}` from `path`; no path means no system prompt
pub fn load_system_prompt(path: Option<&Path>) -> Result<String, ConfigError> {
    let Some(path) = path else {
        return Ok(String::new());
    };
    let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file: SystemPromptFile =
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(file.system_prompt)
}

/// Knobs of the conversation loop, built once and handed to the agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Number of most recent messages kept when history is pruned
    pub message_window: usize,
    pub retry: RetryPolicy,
    /// Model/tool rounds allowed within a single user turn
    pub max_tool_rounds: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub list_tools_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            message_window: 10,
            retry: RetryPolicy::default(),
            max_tool_rounds: 20,
            model_timeout: Duration::from_secs(600),
            tool_timeout: Duration::from_secs(120),
            list_tools_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(30),
        }
    }
}
