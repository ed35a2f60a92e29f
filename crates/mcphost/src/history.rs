use std::collections::HashSet;

use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;

/// Keep the last `window` messages and drop any tool request or tool result
/// whose partner fell outside of them.
///
/// Assistant messages left without content are removed. User and tool messages
/// are kept if anything survives or if they carried text to begin with.
pub fn prune_messages(messages: &[Message], window: usize) -> Vec<Message> {
    if messages.len() <= window {
        return messages.to_vec();
    }
    let kept = &messages[messages.len() - window..];

    let request_ids: HashSet<&str> = kept
        .iter()
        .flat_map(Message::tool_requests)
        .map(|request| request.id.as_str())
        .collect();
    let response_ids: HashSet<&str> = kept
        .iter()
        .flat_map(Message::tool_responses)
        .map(|response| response.id.as_str())
        .collect();

    let mut pruned = Vec::with_capacity(kept.len());
    for message in kept {
        let content: Vec<MessageContent> = message
            .content
            .iter()
            .filter(|block| match block {
                MessageContent::ToolRequest(request) => response_ids.contains(request.id.as_str()),
                MessageContent::ToolResponse(response) => {
                    request_ids.contains(response.id.as_str())
                }
                MessageContent::Text(_) => true,
            })
            .cloned()
            .collect();

        let keep = match message.role {
            Role::Assistant => !content.is_empty(),
            _ => !content.is_empty() || message.has_text(),
        };
        if keep {
            pruned.push(Message {
                role: message.role,
                created: message.created,
                content,
            });
        }
    }
    pruned
}
