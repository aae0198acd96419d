//! Message history cleanup applied before a history reaches any target.

use std::collections::HashSet;

use dockbay_core::{Message, Role};

/// Drop tool results and assistant tool calls. Assistant turns left with no
/// content are dropped too.
pub fn strip_tool_traffic(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::Tool)
        .filter_map(|m| {
            if m.tool_calls.is_empty() {
                return Some(m.clone());
            }
            if m.content.trim().is_empty() {
                return None;
            }
            let mut m = m.clone();
            m.tool_calls.clear();
            Some(m)
        })
        .collect()
}

/// Drop tool results whose id was not declared by an earlier assistant turn.
pub fn strip_orphan_tool_results(messages: &[Message]) -> Vec<Message> {
    let mut declared: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(messages.len());
    for m in messages {
        match m.role {
            Role::Tool => {
                let known = m.tool_call_id.as_deref().is_some_and(|id| declared.contains(id));
                if known {
                    out.push(m.clone());
                }
            }
            _ => {
                declared.extend(m.tool_calls.iter().map(|c| c.id.as_str()));
                out.push(m.clone());
            }
        }
    }
    out
}

/// Calls without tool definitions carry no tool traffic at all; calls with
/// tools keep only results that answer a declared call.
pub fn sanitize(messages: &[Message], has_tools: bool) -> Vec<Message> {
    if has_tools {
        strip_orphan_tool_results(messages)
    } else {
        strip_tool_traffic(messages)
    }
}
