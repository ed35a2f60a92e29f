use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::client::{InboundHandle, RpcClient};
use super::error::ConnectionError;
use crate::config::StdioServerConfig;

/// Spawn the server process and run the MCP handshake over its stdin/stdout
pub async fn connect_stdio(
    name: &str,
    config: &StdioServerConfig,
    request_timeout: Duration,
) -> Result<RpcClient, ConnectionError> {
    let mut command = Command::new(&config.command);
    command
        .args(&config.args)
        .envs(&config.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| ConnectionError::Spawn {
        server: name.to_string(),
        source,
    })?;

    let stdin = child.stdin.take().ok_or_else(|| ConnectionError::Connect {
        server: name.to_string(),
        message: "failed to capture server stdin".to_string(),
    })?;
    let stdout = child.stdout.take().ok_or_else(|| ConnectionError::Connect {
        server: name.to_string(),
        message: "failed to capture server stdout".to_string(),
    })?;

    let client = spawn_io(name, stdout, stdin, request_timeout).await;
    client.attach_child(child).await;
    client.initialize().await?;

    debug!(server = %name, command = %config.command, "stdio MCP server connected");
    Ok(client)
}

/// Run newline-delimited JSON-RPC over any reader/writer pair
pub async fn spawn_io<R, W>(name: &str, reader: R, writer: W, request_timeout: Duration) -> RpcClient
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (client, inbound, outbound) = RpcClient::new(name, request_timeout);
    let reader_task = tokio::spawn(read_loop(inbound.clone(), reader));
    let writer_task = tokio::spawn(write_loop(inbound, writer, outbound));
    client.attach_task(reader_task).await;
    client.attach_task(writer_task).await;
    client
}

async fn read_loop<R>(inbound: InboundHandle, reader: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(raw)) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<Value>(trimmed) {
                    Ok(value) => inbound.handle_message(value).await,
                    Err(_) => debug!(
                        server = %inbound.server(),
                        line = trimmed,
                        "skipping non-JSON line from MCP server"
                    ),
                }
            }
            Ok(None) => break,
            Err(err) => {
                warn!(server = %inbound.server(), %err, "failed to read from MCP server");
                break;
            }
        }
    }

    debug!(server = %inbound.server(), "MCP server closed its output");
    inbound.transport_closed().await;
}

async fn write_loop<W>(
    inbound: InboundHandle,
    writer: W,
    mut outbound: mpsc::UnboundedReceiver<Value>,
) where
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    while let Some(message) = outbound.recv().await {
        let mut line = message.to_string();
        line.push('\n');
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        }
        .await;
        if let Err(err) = written {
            warn!(server = %inbound.server(), %err, "failed to write to MCP server");
            break;
        }
    }
    inbound.transport_closed().await;
}
