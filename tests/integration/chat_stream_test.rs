//! Chat Stream Integration Tests
//!
//! Token-by-token model output through `ChatStreamAssembler`.

use choreo_rca_core::ChatEvent;
use choreo_rca_llm::{ChatStreamAssembler, ModelChunk, StreamingDeltaParser};
use choreo_rca_tools::active_forms;
use serde_json::json;

#[test]
fn test_documented_delta_example() {
    let mut parser = StreamingDeltaParser::new();
    parser.push(r#"{"message":"Hel"#);
    assert_eq!(parser.push(r#"lo"}"#), Some("lo".to_string()));
    assert_eq!(parser.message(), "Hello");
}

#[test]
fn test_full_chat_stream() {
    let mut assembler = ChatStreamAssembler::with_request_id("msg_0123456789ab", active_forms());
    let mut events = Vec::new();

    let chunks = vec![
        ModelChunk::ToolCallChunk {
            name: Some("get_traces".to_string()),
            args: json!({"component": "api"}),
        },
        ModelChunk::Text(r#"{"message": "The API "#.to_string()),
        ModelChunk::Text(r#"is out of memory.", "actions": [{"description": "Raise"#.to_string()),
        ModelChunk::Text(r#" memory"}]}"#.to_string()),
    ];
    for chunk in chunks {
        events.extend(assembler.handle(chunk));
    }
    events.extend(assembler.finish());

    assert_eq!(
        events.first(),
        Some(&ChatEvent::ToolCall {
            tool: "get_traces".to_string(),
            active_form: Some("Fetching traces".to_string()),
            args: json!({"component": "api"}),
        })
    );

    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::MessageChunk { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(streamed, "The API is out of memory.");

    let n = events.len();
    assert_eq!(
        events[n - 2],
        ChatEvent::Actions {
            actions: vec![json!({"description": "Raise memory"})]
        }
    );
    assert_eq!(
        events[n - 1],
        ChatEvent::Done {
            message: "The API is out of memory.".to_string()
        }
    );
}

#[test]
fn test_events_render_as_ndjson() {
    let line = ChatEvent::MessageChunk {
        content: "hi".to_string(),
    }
    .to_ndjson()
    .unwrap();
    assert_eq!(line, "{\"type\":\"message_chunk\",\"content\":\"hi\"}\n");
}
