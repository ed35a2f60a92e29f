use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::{AgentConfig, McpConfig, ServerConfig};
use crate::errors::{ToolError, ToolResult};
use crate::mcp::protocol::CallToolResult;
use crate::mcp::{self, ConnectionError, McpClient};
use crate::models::tool::{Tool, ToolCall};

/// Separates the server name from the tool name in the names the model sees
pub const TOOL_NAME_SEPARATOR: &str = "__";

/// Opens connections to configured tool servers
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        name: &str,
        config: &ServerConfig,
    ) -> Result<Arc<dyn McpClient>, ConnectionError>;
}

/// Connects for real, over the transport each server is configured with
pub struct McpConnector {
    pub request_timeout: Duration,
}

#[async_trait]
impl Connector for McpConnector {
    async fn connect(
        &self,
        name: &str,
        config: &ServerConfig,
    ) -> Result<Arc<dyn McpClient>, ConnectionError> {
        let client = mcp::connect(name, config, self.request_timeout).await?;
        Ok(Arc::new(client))
    }
}

/// Split `server__tool` at the first separator
pub fn split_tool_name(prefixed_name: &str) -> ToolResult<(&str, &str)> {
    match prefixed_name.split_once(TOOL_NAME_SEPARATOR) {
        Some((server, tool)) if !server.is_empty() && !tool.is_empty() => Ok((server, tool)),
        _ => Err(ToolError::InvalidToolName(prefixed_name.to_string())),
    }
}

/// The live tool servers and the namespaced catalogue of their tools
#[derive(Default)]
pub struct ToolRegistry {
    clients: BTreeMap<String, Arc<dyn McpClient>>,
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every configured server at once. If any of them fails, the ones
    /// that did connect are closed again and the first failure is returned.
    pub async fn connect_all(
        config: &McpConfig,
        connector: &dyn Connector,
        agent_config: &AgentConfig,
    ) -> Result<Self, ConnectionError> {
        let timeout = agent_config.connect_timeout;
        let attempts = config.mcp_servers.iter().map(|(name, server)| async move {
            info!(server = %name, transport = server.transport(), "Connecting to MCP server");
            let result = match tokio::time::timeout(timeout, connector.connect(name, server)).await {
                Ok(result) => result,
                Err(_) => Err(ConnectionError::Timeout {
                    server: name.clone(),
                    timeout,
                }),
            };
            (name.clone(), result)
        });
        let results = join_all(attempts).await;

        let mut connected = Vec::new();
        let mut failure = None;
        for (name, result) in results {
            match result {
                Ok(client) => connected.push((name, client)),
                Err(err) if failure.is_none() => failure = Some(err),
                Err(err) => error!(server = %name, %err, "MCP server also failed to connect"),
            }
        }

        if let Some(err) = failure {
            error!(server = %err.server(), %err, "MCP server failed to connect, closing the others");
            for (name, client) in connected {
                debug!(server = %name, "Closing MCP server after failed startup");
                client.close().await;
            }
            return Err(err);
        }

        let mut registry = Self::new();
        for (name, client) in connected {
            registry
                .register(name, client, agent_config.list_tools_timeout)
                .await;
        }
        Ok(registry)
    }

    /// Add a connected server and load its tools. A server whose tools cannot be
    /// listed stays connected but offers nothing.
    pub async fn register(
        &mut self,
        name: impl Into<String>,
        client: Arc<dyn McpClient>,
        list_timeout: Duration,
    ) {
        let name = name.into();
        match tokio::time::timeout(list_timeout, client.list_tools()).await {
            Ok(Ok(tools)) => {
                info!(server = %name, count = tools.len(), "Loaded tools");
                self.tools.extend(tools.into_iter().map(|tool| {
                    Tool::new(
                        format!("{}{}{}", name, TOOL_NAME_SEPARATOR, tool.name),
                        tool.description.unwrap_or_default(),
                        tool.input_schema,
                    )
                }));
            }
            Ok(Err(err)) => warn!(server = %name, %err, "Failed to list tools"),
            Err(_) => warn!(server = %name, timeout = ?list_timeout, "Timed out listing tools"),
        }
        self.clients.insert(name, client);
    }

    /// The namespaced tool catalogue offered to the model
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Find the server that owns a namespaced tool
    pub fn resolve<'a>(&self, prefixed_name: &'a str) -> ToolResult<(Arc<dyn McpClient>, &'a str)> {
        let (server, tool) = split_tool_name(prefixed_name)?;
        let client = self
            .clients
            .get(server)
            .ok_or_else(|| ToolError::ServerNotFound(server.to_string()))?;
        Ok((Arc::clone(client), tool))
    }

    /// Dispatch a single tool call to the server that owns it
    pub async fn dispatch(&self, call: &ToolCall, timeout: Duration) -> ToolResult<CallToolResult> {
        let (client, tool) = self.resolve(&call.name)?;
        let arguments = match &call.arguments {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };

        debug!(server = %client.name(), tool = %tool, "Calling tool");
        match tokio::time::timeout(timeout, client.call_tool(tool, arguments)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(ToolError::ExecutionError(err.to_string())),
            Err(_) => Err(ToolError::Timeout(timeout)),
        }
    }

    /// Close every connection once. Later calls find nothing left to close.
    pub async fn close_all(&mut self) {
        self.tools.clear();
        let clients = std::mem::take(&mut self.clients);
        for (name, client) in clients {
            info!(server = %name, "Closing MCP server");
            client.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StdioServerConfig;
    use crate::mcp::error::McpError;
    use crate::mcp::mock::{MockClient, MockConnector};
    use crate::models::content::Content;
    use anyhow::Result;
    use serde_json::json;
    use std::collections::HashMap;

    fn stdio(command: &str) -> ServerConfig {
        ServerConfig::Stdio(StdioServerConfig {
            command: command.to_string(),
            args: vec![],
            env: HashMap::new(),
        })
    }

    fn config(names: &[&str]) -> McpConfig {
        McpConfig {
            mcp_servers: names.iter().map(|n| (n.to_string(), stdio(n))).collect(),
        }
    }

    #[test]
    fn test_split_tool_name() -> Result<()> {
        assert_eq!(split_tool_name("weather__get_forecast")?, ("weather", "get_forecast"));
        assert_eq!(split_tool_name("fs__read__all")?, ("fs", "read__all"));
        assert_eq!(
            split_tool_name("badname"),
            Err(ToolError::InvalidToolName("badname".to_string()))
        );
        assert!(split_tool_name("__tool").is_err());
        assert!(split_tool_name("server__").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_all_prefixes_tools() -> Result<()> {
        let weather = Arc::new(MockClient::new("weather").with_tool("get_forecast", "Forecast"));
        let calc = Arc::new(
            MockClient::new("calc")
                .with_tool("add", "Add")
                .with_tool("sub", "Subtract"),
        );
        let connector = MockConnector::default()
            .with_client(weather)
            .with_client(calc);

        let registry =
            ToolRegistry::connect_all(&config(&["weather", "calc"]), &connector, &AgentConfig::default())
                .await?;

        let mut names: Vec<_> = registry.tools().iter().map(|t| t.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["calc__add", "calc__sub", "weather__get_forecast"]);
        assert_eq!(registry.server_names().collect::<Vec<_>>(), vec!["calc", "weather"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_startup_closes_connected_servers() -> Result<()> {
        let first = Arc::new(MockClient::new("first"));
        let second = Arc::new(MockClient::new("second"));
        let connector = MockConnector::default()
            .with_client(Arc::clone(&first))
            .with_client(Arc::clone(&second))
            .failing("third");

        let result = ToolRegistry::connect_all(
            &config(&["first", "second", "third"]),
            &connector,
            &AgentConfig::default(),
        )
        .await;

        let err = result.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(err.server(), "third");
        assert_eq!(first.close_count(), 1);
        assert_eq!(second.close_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout_closes_connected_servers() -> Result<()> {
        let first = Arc::new(MockClient::new("first"));
        let second = Arc::new(MockClient::new("second"));
        let connector = MockConnector::default()
            .with_client(Arc::clone(&first))
            .with_client(Arc::clone(&second))
            .hanging("slow");
        let agent_config = AgentConfig {
            connect_timeout: Duration::from_secs(2),
            ..AgentConfig::default()
        };

        let result = ToolRegistry::connect_all(
            &config(&["first", "second", "slow"]),
            &connector,
            &agent_config,
        )
        .await;

        let err = result.err().ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert!(matches!(
            &err,
            ConnectionError::Timeout { server, timeout } if server == "slow" && *timeout == Duration::from_secs(2)
        ));
        assert_eq!(first.close_count(), 1);
        assert_eq!(second.close_count(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_timeout() -> Result<()> {
        let slow = Arc::new(MockClient::new("slow").with_tool("wait", "Wait").hanging_calls());
        let mut registry = ToolRegistry::new();
        registry
            .register("slow", slow as Arc<dyn McpClient>, Duration::from_secs(1))
            .await;

        let result = registry
            .dispatch(&ToolCall::new("slow__wait", json!({})), Duration::from_secs(4))
            .await;

        assert_eq!(result.err(), Some(ToolError::Timeout(Duration::from_secs(4))));
        Ok(())
    }

    #[tokio::test]
    async fn test_registers_dotted_names() -> Result<()> {
        let fs = Arc::new(MockClient::new("my.fs").with_tool("read.file", "Read a file"));
        let connector = MockConnector::default().with_client(Arc::clone(&fs));

        let registry =
            ToolRegistry::connect_all(&config(&["my.fs"]), &connector, &AgentConfig::default())
                .await?;
        assert_eq!(registry.tools()[0].name, "my.fs__read.file");

        registry
            .dispatch(&ToolCall::new("my.fs__read.file", json!({})), Duration::from_secs(1))
            .await?;
        assert_eq!(fs.calls(), vec![("read.file".to_string(), json!({}))]);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_failure_keeps_server_without_tools() -> Result<()> {
        let broken = Arc::new(MockClient::new("broken").with_tool("x", "x").failing_list());
        let connector = MockConnector::default().with_client(broken);

        let registry =
            ToolRegistry::connect_all(&config(&["broken"]), &connector, &AgentConfig::default())
                .await?;

        assert!(registry.tools().is_empty());
        assert!(!registry.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_dispatch() -> Result<()> {
        let calc = Arc::new(MockClient::new("calc").with_tool("add", "Add").with_handler(
            |tool, args| match tool {
                "add" => Ok(CallToolResult {
                    content: vec![Content::text(
                        (args["a"].as_i64().unwrap_or(0) + args["b"].as_i64().unwrap_or(0)).to_string(),
                    )],
                    is_error: false,
                }),
                other => Err(McpError::Rpc {
                    server: "calc".to_string(),
                    code: -32602,
                    message: format!("unknown tool {other}"),
                }),
            },
        ));
        let mut registry = ToolRegistry::new();
        registry
            .register("calc", Arc::clone(&calc) as Arc<dyn McpClient>, Duration::from_secs(1))
            .await;
        let timeout = Duration::from_secs(1);

        let result = registry
            .dispatch(&ToolCall::new("calc__add", json!({"a": 1, "b": 2})), timeout)
            .await?;
        assert_eq!(result.content, vec![Content::text("3")]);
        assert_eq!(calc.calls(), vec![("add".to_string(), json!({"a": 1, "b": 2}))]);

        let missing = registry
            .dispatch(&ToolCall::new("ghost__run", json!({})), timeout)
            .await;
        assert_eq!(missing.err(), Some(ToolError::ServerNotFound("ghost".to_string())));

        let malformed = registry.dispatch(&ToolCall::new("badname", json!({})), timeout).await;
        assert!(matches!(malformed, Err(ToolError::InvalidToolName(_))));

        let failed = registry.dispatch(&ToolCall::new("calc__mul", json!({})), timeout).await;
        assert!(matches!(failed, Err(ToolError::ExecutionError(ref m)) if m.contains("unknown tool mul")));
        Ok(())
    }

    #[tokio::test]
    async fn test_close_all_is_idempotent() {
        let calc = Arc::new(MockClient::new("calc"));
        let mut registry = ToolRegistry::new();
        registry
            .register("calc", Arc::clone(&calc) as Arc<dyn McpClient>, Duration::from_secs(1))
            .await;

        registry.close_all().await;
        registry.close_all().await;

        assert_eq!(calc.close_count(), 1);
        assert!(registry.is_empty());
    }
}
