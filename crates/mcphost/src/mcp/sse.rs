use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest_eventsource::{Event, EventSource};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

use super::client::{InboundHandle, RpcClient};
use super::error::ConnectionError;
use crate::config::SseServerConfig;

/// Open the event stream, wait for the server to announce where to post
/// messages, then run the MCP handshake
pub async fn connect_sse(
    name: &str,
    config: &SseServerConfig,
    request_timeout: Duration,
) -> Result<RpcClient, ConnectionError> {
    let connect_error = |message: String| ConnectionError::Connect {
        server: name.to_string(),
        message,
    };

    let base = Url::parse(&config.url).map_err(|e| connect_error(e.to_string()))?;
    let headers = build_headers(config).map_err(connect_error)?;
    let http = reqwest::Client::builder()
        .default_headers(headers)
        .build()
        .map_err(|e| connect_error(e.to_string()))?;

    let mut events =
        EventSource::new(http.get(base.clone())).map_err(|e| connect_error(e.to_string()))?;
    let endpoint = match tokio::time::timeout(request_timeout, wait_for_endpoint(&mut events, &base)).await {
        Ok(Ok(endpoint)) => endpoint,
        Ok(Err(message)) => return Err(connect_error(message)),
        Err(_) => {
            events.close();
            return Err(ConnectionError::Timeout {
                server: name.to_string(),
                timeout: request_timeout,
            });
        }
    };
    debug!(server = %name, endpoint = %endpoint, "SSE endpoint announced");

    let (client, inbound, outbound) = RpcClient::new(name, request_timeout);
    let reader_task = tokio::spawn(event_loop(inbound.clone(), events));
    let writer_task = tokio::spawn(post_loop(inbound, http, endpoint, outbound));
    client.attach_task(reader_task).await;
    client.attach_task(writer_task).await;
    client.initialize().await?;

    debug!(server = %name, url = %config.url, "SSE MCP server connected");
    Ok(client)
}

fn build_headers(config: &SseServerConfig) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();
    for (name, value) in config.header_pairs() {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| format!("invalid header name '{}': {}", name, e))?;
        let value = HeaderValue::from_str(&value)
            .map_err(|e| format!("invalid value for header '{}': {}", name, e))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

async fn wait_for_endpoint(events: &mut EventSource, base: &Url) -> Result<Url, String> {
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "endpoint" => {
                return base.join(message.data.trim()).map_err(|e| e.to_string());
            }
            Ok(Event::Message(message)) => {
                debug!(event = %message.event, "ignoring event received before the endpoint");
            }
            Err(err) => {
                events.close();
                return Err(err.to_string());
            }
        }
    }
    Err("event stream ended before the endpoint was announced".to_string())
}

async fn event_loop(inbound: InboundHandle, mut events: EventSource) {
    while let Some(event) = events.next().await {
        match event {
            Ok(Event::Open) => {}
            Ok(Event::Message(message)) if message.event == "message" => {
                match serde_json::from_str::<Value>(&message.data) {
                    Ok(value) => inbound.handle_message(value).await,
                    Err(err) => debug!(
                        server = %inbound.server(),
                        %err,
                        "skipping non-JSON message event"
                    ),
                }
            }
            Ok(Event::Message(message)) => {
                debug!(server = %inbound.server(), event = %message.event, "ignoring event");
            }
            Err(err) => {
                warn!(server = %inbound.server(), %err, "MCP event stream failed");
                break;
            }
        }
    }
    events.close();
    inbound.transport_closed().await;
}

async fn post_loop(
    inbound: InboundHandle,
    http: reqwest::Client,
    endpoint: Url,
    mut outbound: mpsc::UnboundedReceiver<Value>,
) {
    while let Some(message) = outbound.recv().await {
        match http.post(endpoint.clone()).json(&message).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                warn!(
                    server = %inbound.server(),
                    status = %response.status(),
                    "MCP server rejected message"
                );
            }
            Err(err) => {
                warn!(server = %inbound.server(), %err, "failed to post to MCP server");
                break;
            }
        }
    }
    inbound.transport_closed().await;
}
