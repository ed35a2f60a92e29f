use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::client::McpClient;
use super::error::{ConnectionError, McpError};
use super::protocol::{CallToolResult, ToolInfo};
use crate::config::ServerConfig;
use crate::models::content::Content;
use crate::registry::Connector;

type Handler = Box<dyn Fn(&str, &Value) -> Result<CallToolResult, McpError> + Send + Sync>;

/// A tool server that answers from memory and counts how it is used
pub struct MockClient {
    name: String,
    tools: Vec<ToolInfo>,
    handler: Handler,
    list_fails: bool,
    hangs: bool,
    calls: Mutex<Vec<(String, Value)>>,
    closes: AtomicUsize,
}

impl MockClient {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
            handler: Box::new(|tool, _| {
                Ok(CallToolResult {
                    content: vec![Content::text(format!("called {}", tool))],
                    is_error: false,
                })
            }),
            list_fails: false,
            hangs: false,
            calls: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
        }
    }

    pub fn with_tool(mut self, name: &str, description: &str) -> Self {
        self.tools.push(ToolInfo {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: json!({"type": "object", "properties": {}}),
        });
        self
    }

    pub fn with_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &Value) -> Result<CallToolResult, McpError> + Send + Sync + 'static,
    {
        self.handler = Box::new(handler);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.list_fails = true;
        self
    }

    /// Tool calls are recorded but never answered
    pub fn hanging_calls(mut self) -> Self {
        self.hangs = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl McpClient for MockClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        if self.list_fails {
            return Err(McpError::Closed {
                server: self.name.clone(),
            });
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        if self.hangs {
            std::future::pending::<()>().await;
        }
        (self.handler)(name, &arguments)
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Hands out prepared [`MockClient`]s by server name
#[derive(Default)]
pub struct MockConnector {
    clients: HashMap<String, Arc<MockClient>>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
}

impl MockConnector {
    pub fn with_client(mut self, client: Arc<MockClient>) -> Self {
        self.clients.insert(client.name.clone(), client);
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    /// Connecting to `name` never completes
    pub fn hanging(mut self, name: &str) -> Self {
        self.hanging.insert(name.to_string());
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        name: &str,
        _config: &ServerConfig,
    ) -> Result<Arc<dyn McpClient>, ConnectionError> {
        if self.hanging.contains(name) {
            std::future::pending::<()>().await;
        }
        if self.failing.contains(name) {
            return Err(ConnectionError::Connect {
                server: name.to_string(),
                message: "connection refused".to_string(),
            });
        }
        match self.clients.get(name) {
            Some(client) => Ok(Arc::clone(client) as Arc<dyn McpClient>),
            None => Err(ConnectionError::Connect {
                server: name.to_string(),
                message: "no such mock".to_string(),
            }),
        }
    }
}
