//! Conversation loop tests driven by a scripted transport

use async_trait::async_trait;
use futures::{FutureExt as _, StreamExt as _};
use futures::stream;
use openrouter_agent::schema::{FieldSpec, ToolInput};
use openrouter_agent::{
    Agent, AgentOptions, CancellationToken, ChatStream, ChatTransport, ContentPart, Error,
    ImageAttachment, MessageRole, Request, Response, Result, StreamEvent, Tool, tool,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

enum Script {
    Reply(Result<Response>),
    Lines(Vec<&'static str>),
    /// Lines, then a source that never ends
    Hang(Vec<&'static str>),
}

struct ScriptedTransport {
    script: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Script>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn next(&self, request: &Request) -> Option<Script> {
        self.requests.lock().unwrap().push(request.clone());
        self.script.lock().unwrap().pop_front()
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Response> {
        match self.next(request) {
            Some(Script::Reply(reply)) => reply,
            _ => Err(Error::other("script exhausted")),
        }
    }

    async fn stream(&self, request: &Request, cancel: CancellationToken) -> Result<ChatStream> {
        let to_lines = |lines: Vec<&'static str>| {
            lines
                .into_iter()
                .map(|l| Ok(l.to_string()))
                .collect::<Vec<std::io::Result<String>>>()
        };

        match self.next(request) {
            Some(Script::Lines(lines)) => Ok(ChatStream::from_lines(
                stream::iter(to_lines(lines)),
                cancel,
            )),
            Some(Script::Hang(lines)) => Ok(ChatStream::from_lines(
                stream::iter(to_lines(lines)).chain(stream::pending()),
                cancel,
            )),
            Some(Script::Reply(Err(err))) => Err(err),
            _ => Err(Error::other("script exhausted")),
        }
    }
}

fn response(value: Value) -> Script {
    Script::Reply(Ok(serde_json::from_value(value).unwrap()))
}

fn text_reply(text: &str) -> Script {
    response(json!({
        "id": "gen-text",
        "choices": [{
            "index": 0,
            "finish_reason": "stop",
            "message": {"role": "assistant", "content": text}
        }]
    }))
}

fn tool_reply(calls: Value) -> Script {
    response(json!({
        "id": "gen-tools",
        "choices": [{
            "index": 0,
            "finish_reason": "tool_calls",
            "message": {"role": "assistant", "content": null, "tool_calls": calls}
        }]
    }))
}

fn options() -> AgentOptions {
    AgentOptions::builder()
        .model("test/model")
        .system_prompt("You are a calculator")
        .temperature(0.2)
        .build()
        .unwrap()
}

#[derive(Deserialize)]
struct AddInput {
    a: f64,
    b: f64,
}

impl ToolInput for AddInput {
    fn fields() -> Vec<FieldSpec> {
        vec![FieldSpec::number("a"), FieldSpec::number("b")]
    }
}

fn add_tool() -> Tool {
    Tool::typed("add", "Add two numbers", |input: AddInput| async move {
        Ok(json!({"result": input.a + input.b}))
    })
}

fn agent_with(transport: &Arc<ScriptedTransport>) -> Agent {
    let mut agent = Agent::with_transport(transport.clone(), options());
    agent.register_tool(add_tool()).unwrap();
    agent
}

#[tokio::test]
async fn test_text_turn_appends_user_and_assistant() {
    let transport = ScriptedTransport::new(vec![text_reply("Hello!")]);
    let mut agent = agent_with(&transport);

    let added = agent.chat("Hi").await.unwrap();

    assert_eq!(added.len(), 2);
    assert_eq!(added[0].role, MessageRole::User);
    assert_eq!(added[1].role, MessageRole::Assistant);
    assert_eq!(added[1].text(), "Hello!");
    assert_eq!(agent.history().len(), 3);

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "test/model");
    assert_eq!(requests[0].temperature, Some(0.2));
    assert_eq!(requests[0].messages.len(), 2);
    assert_eq!(requests[0].messages[0].role, MessageRole::System);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tools[0].function.name, "add");
}

#[tokio::test]
async fn test_second_turn_sees_first_turn() {
    let transport = ScriptedTransport::new(vec![text_reply("4"), text_reply("12")]);
    let mut agent = agent_with(&transport);

    agent.chat("What's 2+2?").await.unwrap();
    agent.chat("Times 3?").await.unwrap();

    let requests = transport.requests();
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(agent.history().len(), 5);
}

#[tokio::test]
async fn test_tool_round_trip() {
    let transport = ScriptedTransport::new(vec![
        tool_reply(json!([{
            "id": "call_1",
            "type": "function",
            "function": {"name": "add", "arguments": "{\"a\": 2, \"b\": 3}"}
        }])),
        text_reply("2 + 3 = 5"),
    ]);
    let mut agent = agent_with(&transport);

    let added = agent.chat("Add 2 and 3").await.unwrap();

    assert_eq!(added.len(), 4);
    assert!(added[1].has_tool_calls());
    assert_eq!(added[2].role, MessageRole::Tool);
    assert_eq!(added[2].tool_call_id.as_deref(), Some("call_1"));
    assert_eq!(added[2].name.as_deref(), Some("add"));
    assert_eq!(added[2].text(), r#"{"result":5.0}"#);
    assert_eq!(added[3].text(), "2 + 3 = 5");

    // second request carries the tool exchange; tool-call messages have no content
    let requests = transport.requests();
    let second = &requests[1];
    assert_eq!(second.messages.len(), 4);
    assert!(second.messages[2].content.is_none());
    assert_eq!(second.messages[2].tool_calls.as_ref().unwrap().len(), 1);
    assert_eq!(second.messages[3].tool_call_id.as_deref(), Some("call_1"));
}

#[tokio::test]
async fn test_failing_tool_does_not_fail_turn() {
    let transport = ScriptedTransport::new(vec![
        tool_reply(json!([
            {"id": "call_1", "type": "function", "function": {"name": "divide", "arguments": "{}"}},
            {"id": "call_2", "type": "function", "function": {"name": "add", "arguments": "{\"a\": \"x\"}"}},
            {"id": "call_3", "type": "function", "function": {"name": "ghost", "arguments": ""}}
        ])),
        text_reply("Sorry, that did not work"),
    ]);
    let mut agent = agent_with(&transport);
    agent
        .register_tool(
            tool("divide", "Divide")
                .param("a", "number")
                .build(|_| async { Err(Error::other("division by zero")) }),
        )
        .unwrap();

    let added = agent.chat("Do math").await.unwrap();
    assert_eq!(added.len(), 6);

    let kinds: Vec<String> = added[2..5]
        .iter()
        .map(|m| {
            let payload: Value = serde_json::from_str(&m.text()).unwrap();
            payload["kind"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(kinds, ["execution", "argument", "not_found"]);

    let ids: Vec<&str> = added[2..5]
        .iter()
        .map(|m| m.tool_call_id.as_deref().unwrap())
        .collect();
    assert_eq!(ids, ["call_1", "call_2", "call_3"]);
}

#[tokio::test]
async fn test_panicking_tool_leaves_history_untouched() {
    let transport = ScriptedTransport::new(vec![
        tool_reply(json!([
            {"id": "call_1", "type": "function", "function": {"name": "crash", "arguments": "{}"}}
        ])),
        text_reply("unreachable"),
    ]);
    let mut agent = agent_with(&transport);
    agent
        .register_tool(
            tool("crash", "Always panics")
                .param("x", "string")
                .build(|args| async move {
                    if args.is_object() {
                        panic!("handler bug");
                    }
                    Ok(args)
                }),
        )
        .unwrap();
    let before = agent.history().to_vec();

    let outcome = AssertUnwindSafe(agent.chat("Crash please"))
        .catch_unwind()
        .await;

    assert!(outcome.is_err());
    assert_eq!(agent.history(), before.as_slice());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_transport_failure_rolls_back() {
    let transport = ScriptedTransport::new(vec![
        tool_reply(json!([{
            "id": "call_1",
            "type": "function",
            "function": {"name": "add", "arguments": "{\"a\": 1, \"b\": 1}"}
        }])),
        Script::Reply(Err(Error::transport(503, "overloaded"))),
    ]);
    let mut agent = agent_with(&transport);
    let before = agent.history().to_vec();

    let err = agent.chat("Add").await.unwrap_err();
    assert!(matches!(err, Error::Transport { status: 503, .. }));
    assert_eq!(agent.history(), before.as_slice());
}

#[tokio::test]
async fn test_missing_message_rolls_back() {
    let transport = ScriptedTransport::new(vec![response(json!({"id": "gen-empty", "choices": []}))]);
    let mut agent = agent_with(&transport);

    let err = agent.chat("Hello?").await.unwrap_err();
    assert!(matches!(err, Error::NoMessage));
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn test_tool_round_limit() {
    let call = json!([{
        "id": "call_n",
        "type": "function",
        "function": {"name": "add", "arguments": "{\"a\": 1, \"b\": 1}"}
    }]);
    let transport = ScriptedTransport::new(vec![tool_reply(call.clone()), tool_reply(call)]);

    let options = AgentOptions::builder()
        .model("test/model")
        .max_tool_rounds(1)
        .build()
        .unwrap();
    let mut agent = Agent::with_transport(transport.clone(), options);
    agent.register_tool(add_tool()).unwrap();

    let err = agent.chat("Loop forever").await.unwrap_err();
    assert!(matches!(err, Error::ToolLoopLimit(1)));
    assert!(agent.history().is_empty());
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_streaming_turn() {
    let transport = ScriptedTransport::new(vec![Script::Lines(vec![
        ": OPENROUTER PROCESSING",
        r#"data: {"id":"s1","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#,
        "",
        r#"data: {"id":"s1","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":"stop"}]}"#,
        "data: [DONE]",
    ])]);
    let mut agent = agent_with(&transport);

    let mut heartbeats = 0;
    let mut chunks = 0;
    let added = agent
        .chat_streaming("Hi", CancellationToken::new(), |event| match event {
            StreamEvent::Heartbeat => heartbeats += 1,
            StreamEvent::Data(_) => chunks += 1,
            StreamEvent::Terminal(_) => {}
        })
        .await
        .unwrap();

    assert_eq!(heartbeats, 1);
    assert_eq!(chunks, 2);
    assert_eq!(added.len(), 2);
    assert_eq!(added[1].text(), "Hello");
    assert!(transport.requests()[0].stream);
}

#[tokio::test]
async fn test_streaming_tool_round_matches_non_streaming_shape() {
    let transport = ScriptedTransport::new(vec![
        Script::Lines(vec![
            r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"id":"call_9","type":"function","function":{"name":"add","arguments":"{\"a\":"}}]}}]}"#,
            r#"data: {"choices":[{"index":0,"delta":{"tool_calls":[{"index":0,"function":{"arguments":"4,\"b\":5}"}}]},"finish_reason":"tool_calls"}]}"#,
            "data: [DONE]",
        ]),
        Script::Lines(vec![
            r#"data: {"choices":[{"index":0,"delta":{"content":"9"},"finish_reason":"stop"}]}"#,
        ]),
    ]);
    let mut agent = agent_with(&transport);

    let added = agent
        .chat_streaming("Add 4 and 5", CancellationToken::new(), |_| {})
        .await
        .unwrap();

    assert_eq!(added.len(), 4);
    assert_eq!(added[1].tool_calls[0].id, "call_9");
    assert_eq!(added[2].text(), r#"{"result":9.0}"#);
    assert_eq!(added[3].text(), "9");
}

#[tokio::test]
async fn test_streaming_cancel_rolls_back() {
    let transport = ScriptedTransport::new(vec![Script::Hang(vec![
        r#"data: {"choices":[{"index":0,"delta":{"content":"partial"}}]}"#,
    ])]);
    let mut agent = agent_with(&transport);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let mut terminals = 0;

    let err = agent
        .chat_streaming("Tell me a long story", token, |event| match event {
            StreamEvent::Data(_) => trigger.cancel(),
            StreamEvent::Terminal(_) => terminals += 1,
            StreamEvent::Heartbeat => {}
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
    assert_eq!(terminals, 1);
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn test_streaming_malformed_chunk_rolls_back() {
    let transport = ScriptedTransport::new(vec![Script::Lines(vec!["data: {broken"])]);
    let mut agent = agent_with(&transport);

    let err = agent
        .chat_streaming("Hi", CancellationToken::new(), |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Serialization(_)));
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn test_completion_leaves_history_alone() {
    let transport = ScriptedTransport::new(vec![response(json!({
        "id": "cmpl-1",
        "choices": [{"index": 0, "text": "blue", "finish_reason": "stop"}]
    }))]);
    let agent = agent_with(&transport);

    let text = agent.completion("The sky is").await.unwrap();

    assert_eq!(text, "blue");
    assert_eq!(agent.history().len(), 1);

    let requests = transport.requests();
    let request = &requests[0];
    assert_eq!(request.prompt.as_deref(), Some("The sky is"));
    assert!(request.messages.is_empty());
}

#[tokio::test]
async fn test_chat_with_images_sends_parts() {
    let transport = ScriptedTransport::new(vec![text_reply("A red square")]);
    let mut agent = agent_with(&transport);

    agent
        .chat_with_images("What is this?", &[ImageAttachment::png(vec![1u8, 2, 3])])
        .await
        .unwrap();

    let requests = transport.requests();
    let request = &requests[0];
    let user = serde_json::to_value(&request.messages[1]).unwrap();
    assert_eq!(user["content"][0], json!({"type": "text", "text": "What is this?"}));
    assert_eq!(user["content"][1]["type"], "image_url");
    assert_eq!(
        user["content"][1]["image_url"]["url"],
        "data:image/png;base64,AQID"
    );
}

#[tokio::test]
async fn test_chat_with_missing_pdf_sends_nothing() {
    let transport = ScriptedTransport::new(vec![text_reply("unused")]);
    let mut agent = agent_with(&transport);

    let err = agent
        .chat_with_pdf("Summarize", &["/no/such/file.pdf"])
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    assert!(transport.requests().is_empty());
    assert_eq!(agent.history().len(), 1);
}

#[tokio::test]
async fn test_chat_with_pdf_history_keeps_parts() {
    use std::io::Write;

    let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
    file.write_all(b"%PDF-1.7").unwrap();

    let transport = ScriptedTransport::new(vec![text_reply("It is a PDF")]);
    let mut agent = agent_with(&transport);

    let added = agent.chat_with_pdf("Summarize", &[file.path()]).await.unwrap();

    match &added[0].content {
        openrouter_agent::Content::Parts(parts) => {
            assert_eq!(parts.len(), 2);
            assert!(matches!(&parts[1], ContentPart::File { file } if file.file_data.starts_with("data:application/pdf;base64,")));
        }
        other => panic!("Expected parts, got {:?}", other),
    }
}
