use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::error::{ConnectionError, McpError};
use super::protocol::{self, CallToolResult, Incoming, ListToolsResult, ToolInfo};

/// A live connection to one tool server
#[async_trait]
pub trait McpClient: Send + Sync {
    /// Name of the server in the config file
    fn name(&self) -> &str;

    /// Every tool the server offers, following pagination
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError>;

    /// Call a tool by its un-namespaced name
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError>;

    /// Release the connection. Calling it again does nothing.
    async fn close(&self);
}

type Responder = oneshot::Sender<Result<Value, McpError>>;

struct Inner {
    server: String,
    outbound: mpsc::UnboundedSender<Value>,
    pending: AsyncMutex<HashMap<u64, Responder>>,
    next_id: AtomicU64,
    transport_closed: AtomicBool,
}

#[derive(Default)]
struct Resources {
    closed: bool,
    child: Option<Child>,
    tasks: Vec<JoinHandle<()>>,
}

/// JSON-RPC client shared by every transport. Transports move outbound messages
/// from the receiver handed out by [`RpcClient::new`] onto the wire and feed
/// whatever arrives into an [`InboundHandle`].
pub struct RpcClient {
    inner: Arc<Inner>,
    request_timeout: Duration,
    resources: AsyncMutex<Resources>,
}

/// The transport side of an [`RpcClient`]
#[derive(Clone)]
pub struct InboundHandle {
    inner: Arc<Inner>,
}

impl RpcClient {
    pub fn new(
        server: impl Into<String>,
        request_timeout: Duration,
    ) -> (Self, InboundHandle, mpsc::UnboundedReceiver<Value>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let inner = Arc::new(Inner {
            server: server.into(),
            outbound,
            pending: AsyncMutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            transport_closed: AtomicBool::new(false),
        });
        let client = Self {
            inner: Arc::clone(&inner),
            request_timeout,
            resources: AsyncMutex::new(Resources::default()),
        };
        (client, InboundHandle { inner }, receiver)
    }

    /// Tie a background task to the lifetime of the connection
    pub async fn attach_task(&self, task: JoinHandle<()>) {
        self.resources.lock().await.tasks.push(task);
    }

    /// Tie a spawned server process to the lifetime of the connection
    pub async fn attach_child(&self, child: Child) {
        self.resources.lock().await.child = Some(child);
    }

    /// Run the MCP handshake. On failure the connection is closed.
    pub async fn initialize(&self) -> Result<(), ConnectionError> {
        let handshake = async {
            let result = self
                .request("initialize", protocol::initialize_params())
                .await?;
            let protocol = result
                .get("protocolVersion")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown");
            debug!(server = %self.inner.server, protocol, "MCP server initialized");
            self.notify("notifications/initialized", json!({}))
        };

        if let Err(source) = handshake.await {
            self.close().await;
            return Err(ConnectionError::Handshake {
                server: self.inner.server.clone(),
                source,
            });
        }
        Ok(())
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, McpError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.inner.pending.lock().await;
            if self.inner.transport_closed.load(Ordering::SeqCst) {
                return Err(self.inner.closed_error());
            }
            pending.insert(id, tx);
        }

        if self
            .inner
            .outbound
            .send(protocol::request(id, method, params))
            .is_err()
        {
            self.inner.pending.lock().await.remove(&id);
            return Err(self.inner.closed_error());
        }

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(self.inner.closed_error()),
            Err(_) => {
                self.inner.pending.lock().await.remove(&id);
                Err(McpError::Timeout {
                    server: self.inner.server.clone(),
                    method: method.to_string(),
                    timeout: self.request_timeout,
                })
            }
        }
    }

    pub fn notify(&self, method: &str, params: Value) -> Result<(), McpError> {
        self.inner
            .outbound
            .send(protocol::notification(method, params))
            .map_err(|_| self.inner.closed_error())
    }
}

#[async_trait]
impl McpClient for RpcClient {
    fn name(&self) -> &str {
        &self.inner.server
    }

    async fn list_tools(&self) -> Result<Vec<ToolInfo>, McpError> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let params = match &cursor {
                Some(cursor) => json!({"cursor": cursor}),
                None => json!({}),
            };
            let value = self.request("tools/list", params).await?;
            let page: ListToolsResult =
                serde_json::from_value(value).map_err(|e| McpError::InvalidResult {
                    server: self.inner.server.clone(),
                    message: e.to_string(),
                })?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => return Ok(tools),
            }
        }
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<CallToolResult, McpError> {
        let arguments = match arguments {
            Value::Null => json!({}),
            other => other,
        };
        let value = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await?;
        CallToolResult::from_value(value).map_err(|e| McpError::InvalidResult {
            server: self.inner.server.clone(),
            message: e.to_string(),
        })
    }

    async fn close(&self) {
        let mut resources = self.resources.lock().await;
        if resources.closed {
            return;
        }
        resources.closed = true;

        if let Some(mut child) = resources.child.take() {
            if let Err(err) = child.kill().await {
                debug!(
                    server = %self.inner.server,
                    %err,
                    "failed to kill MCP server process (may have already exited)"
                );
            }
        }
        for task in resources.tasks.drain(..) {
            task.abort();
        }
        drop(resources);

        self.inner.transport_closed.store(true, Ordering::SeqCst);
        self.inner.fail_pending().await;
        debug!(server = %self.inner.server, "MCP connection closed");
    }
}

impl Inner {
    fn closed_error(&self) -> McpError {
        McpError::Closed {
            server: self.server.clone(),
        }
    }

    async fn fail_pending(&self) {
        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(self.closed_error()));
        }
    }
}

impl InboundHandle {
    pub fn server(&self) -> &str {
        &self.inner.server
    }

    /// Route one message received from the server
    pub async fn handle_message(&self, value: Value) {
        let server = &self.inner.server;
        match Incoming::classify(value) {
            Incoming::Response { id, result } => {
                let responder = self.inner.pending.lock().await.remove(&id);
                match responder {
                    Some(sender) => {
                        let result = result.map_err(|(code, message)| McpError::Rpc {
                            server: server.clone(),
                            code,
                            message,
                        });
                        let _ = sender.send(result);
                    }
                    None => debug!(server = %server, id, "received response for unknown request"),
                }
            }
            Incoming::Request { id, method } => {
                let reply = if method == "ping" {
                    protocol::response(id, json!({}))
                } else {
                    warn!(server = %server, method = %method, "server sent unsupported request");
                    protocol::error_response(
                        id,
                        protocol::METHOD_NOT_FOUND,
                        &format!("Method not found: {}", method),
                    )
                };
                if self.inner.outbound.send(reply).is_err() {
                    debug!(server = %server, "connection closed before reply could be sent");
                }
            }
            Incoming::Notification { method } => {
                debug!(server = %server, method = %method, "received notification from server");
            }
            Incoming::Unrecognized => {
                debug!(server = %server, "ignoring unrecognized message");
            }
        }
    }

    /// The transport is gone; fail everything still waiting for an answer
    pub async fn transport_closed(&self) {
        self.inner.transport_closed.store(true, Ordering::SeqCst);
        self.inner.fail_pending().await;
    }
}
