//! Tool registry tests through the public API

use openrouter_agent::schema::{FieldKind, FieldSpec, ToolInput};
use openrouter_agent::{Error, Tool, ToolCall, ToolRegistry, tool};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Deserialize)]
struct SearchInput {
    query: String,
    limit: Option<u32>,
    filters: Vec<Filter>,
}

#[derive(Deserialize)]
struct Filter {
    field: String,
    op: String,
}

impl ToolInput for SearchInput {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::string("query").describe("Full-text query"),
            FieldSpec::integer("limit").optional(),
            FieldSpec::array(
                "filters",
                FieldKind::Object(vec![
                    FieldSpec::string("field"),
                    FieldSpec::enumeration("op", ["eq", "ne"]),
                ]),
            ),
        ]
    }
}

#[derive(Serialize)]
struct SearchOutput {
    hits: Vec<String>,
}

fn search_tool() -> Tool {
    Tool::typed("search", "Search documents", |input: SearchInput| async move {
        let limit = input.limit.unwrap_or(10) as usize;
        let mut hits = vec![input.query];
        hits.extend(input.filters.iter().map(|f| format!("{} {}", f.field, f.op)));
        hits.truncate(limit);
        Ok(SearchOutput { hits })
    })
}

#[test]
fn test_typed_tool_descriptor() {
    let mut registry = ToolRegistry::new();
    registry.register(search_tool()).unwrap();

    let list = registry.generate_tool_list();
    let descriptor = serde_json::to_value(&list[0]).unwrap();

    assert_eq!(descriptor["type"], "function");
    assert_eq!(descriptor["function"]["name"], "search");
    assert_eq!(descriptor["function"]["description"], "Search documents");

    let params = &descriptor["function"]["parameters"];
    assert_eq!(params["required"], json!(["query", "filters"]));
    assert_eq!(
        params["properties"]["filters"]["items"]["properties"]["op"]["enum"],
        json!(["eq", "ne"])
    );
}

#[tokio::test]
async fn test_typed_tool_call() {
    let mut registry = ToolRegistry::new();
    registry.register(search_tool()).unwrap();

    let output = registry
        .call(
            "search",
            r#"{"query": "rust", "limit": 2, "filters": [{"field": "lang", "op": "eq"}, {"field": "x", "op": "ne"}]}"#,
        )
        .await
        .unwrap();

    assert!(!output.is_error);
    let value: Value = serde_json::from_str(&output.content).unwrap();
    assert_eq!(value, json!({"hits": ["rust", "lang eq"]}));
}

#[tokio::test]
async fn test_missing_required_field_is_argument_error() {
    let mut registry = ToolRegistry::new();
    registry.register(search_tool()).unwrap();

    let output = registry.call("search", r#"{"limit": 1}"#).await.unwrap();

    assert!(output.is_error);
    let payload: Value = serde_json::from_str(&output.content).unwrap();
    assert_eq!(payload["kind"], "argument");
    assert_eq!(payload["tool"], "search");
    assert!(payload["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn test_invoke_matches_call() {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            tool("echo", "Echo input")
                .param("text", "string")
                .build(|args| async move { Ok(args) }),
        )
        .unwrap();

    let via_call = registry.call("echo", r#"{"text":"hi"}"#).await.unwrap();
    let via_invoke = registry
        .invoke(&ToolCall::new("call_1", "echo", r#"{"text":"hi"}"#))
        .await;

    assert_eq!(via_call, via_invoke);
    assert_eq!(via_invoke.content, r#"{"text":"hi"}"#);
}

#[test]
fn test_registration_errors() {
    let mut registry = ToolRegistry::new();
    registry.register(search_tool()).unwrap();

    assert!(matches!(
        registry.register(search_tool()),
        Err(Error::ToolRegistration(_))
    ));
    let bare = Tool::new("bare", "no schema", Value::Null, |v| async move { Ok(v) });
    assert!(matches!(
        registry.register(bare),
        Err(Error::ToolRegistration(_))
    ));
    assert_eq!(registry.names().collect::<Vec<_>>(), ["search"]);
}
