//! # Tool System
//!
//! Tools are named functions the model may ask the client to run. Each
//! [`Tool`] carries a name, a description, a JSON-Schema for its input and an
//! async handler. A [`ToolRegistry`] owns a set of tools for one agent.
//!
//! ## Defining tools
//!
//! Typed tools decode their arguments into a Rust type whose schema comes from
//! a field table (see [`crate::schema`]):
//!
//! ```rust
//! use openrouter_agent::{Tool, schema::{FieldSpec, ToolInput}};
//! use serde::Deserialize;
//! use serde_json::json;
//!
//! #[derive(Deserialize)]
//! struct AddInput { a: f64, b: f64 }
//!
//! impl ToolInput for AddInput {
//!     fn fields() -> Vec<FieldSpec> {
//!         vec![FieldSpec::number("a"), FieldSpec::number("b")]
//!     }
//! }
//!
//! let add = Tool::typed("add", "Add two numbers", |input: AddInput| async move {
//!     Ok(json!({"result": input.a + input.b}))
//! });
//! ```
//!
//! Untyped tools take `serde_json::Value` and accept either a full JSON Schema
//! or the simple notation `{"location": "string"}`:
//!
//! ```rust
//! use openrouter_agent::tool;
//! use serde_json::json;
//!
//! let weather = tool("get_weather", "Get current weather for a location")
//!     .param("location", "string")
//!     .build(|args| async move {
//!         Ok(json!({"location": args["location"], "temperature": 22}))
//!     });
//! ```
//!
//! ## Failure isolation
//!
//! [`ToolRegistry::call`] only fails when the tool does not exist. Bad
//! arguments and handler failures come back as an `Ok` [`ToolOutput`] whose
//! content is a JSON error payload, so the conversation loop can hand the
//! failure to the model as data.

use crate::schema::{ToolInput, schema_for};
use crate::types::{FunctionDescription, ToolCall, ToolDescriptor};
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type-erased handler: raw JSON arguments in, JSON result out.
pub type ToolHandler =
    Arc<dyn Fn(String) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// A tool definition
#[derive(Clone)]
pub struct Tool {
    name: String,

    description: String,

    input_schema: Value,

    handler: ToolHandler,
}

impl Tool {
    /// Untyped tool over a JSON schema (full or simple notation).
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        let tool_name = name.clone();
        let handler = Arc::new(handler);

        Self {
            name,
            description: description.into(),
            input_schema: normalize_schema(input_schema),
            handler: Arc::new(move |raw: String| {
                let handler = Arc::clone(&handler);
                let tool_name = tool_name.clone();
                Box::pin(async move {
                    let args: Value = decode_arguments(&tool_name, &raw)?;
                    handler(args).await
                })
            }),
        }
    }

    /// Typed tool: arguments decode into `I`, results serialize from `O`.
    pub fn typed<I, O, F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: F,
    ) -> Self
    where
        I: ToolInput,
        O: Serialize + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
    {
        let name = name.into();
        let tool_name = name.clone();
        let handler = Arc::new(handler);

        Self {
            name,
            description: description.into(),
            input_schema: schema_for::<I>(),
            handler: Arc::new(move |raw: String| {
                let handler = Arc::clone(&handler);
                let tool_name = tool_name.clone();
                Box::pin(async move {
                    let input: I = decode_arguments(&tool_name, &raw)?;
                    let output = handler(input).await?;
                    Ok(serde_json::to_value(output)?)
                })
            }),
        }
    }

    /// Run the handler on raw JSON arguments.
    ///
    /// Decode failures are [`Error::ToolArgument`]; any handler error is
    /// passed through untouched.
    pub async fn execute(&self, raw_arguments: &str) -> Result<Value> {
        (self.handler)(raw_arguments.to_string()).await
    }

    /// Descriptor for a request's `tools[]`.
    pub fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            tool_type: "function".to_string(),
            function: FunctionDescription {
                name: self.name.clone(),
                description: self.description.clone(),
                parameters: self.input_schema.clone(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .finish()
    }
}

/// Empty argument strings count as `{}`; models send them for no-arg tools.
fn decode_arguments<T: serde::de::DeserializeOwned>(tool: &str, raw: &str) -> Result<T> {
    let raw = if raw.trim().is_empty() { "{}" } else { raw };
    serde_json::from_str(raw).map_err(|e| Error::tool_argument(tool, e.to_string()))
}

/// Bring a schema into full JSON-Schema object form.
///
/// Full schemas (a string `type`, or a `$schema` or `properties` key) pass
/// through. Otherwise each key is a parameter: a type string (`"string"`,
/// `"int"`, ...) or a property object that may carry non-standard
/// `optional`/`required` flags.
fn normalize_schema(schema: Value) -> Value {
    let Value::Object(obj) = schema else {
        return schema;
    };

    let is_full_schema = obj.get("type").is_some_and(Value::is_string)
        || obj.contains_key("$schema")
        || obj.contains_key("properties");
    if obj.is_empty() || is_full_schema {
        return Value::Object(obj);
    }

    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for (param_name, param_type) in obj {
        match param_type {
            Value::String(type_str) => {
                properties.insert(param_name.clone(), type_to_json_schema(&type_str));
                required.push(param_name);
            }
            Value::Object(mut prop) => {
                let is_optional = prop
                    .remove("optional")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                let is_required = prop.remove("required").and_then(|v| v.as_bool());
                let has_default = prop.contains_key("default");

                properties.insert(param_name.clone(), Value::Object(prop));

                // explicit required wins, then optional, then default-implies-optional
                match is_required {
                    Some(true) => required.push(param_name),
                    Some(false) => {}
                    None if is_optional || has_default => {}
                    None => required.push(param_name),
                }
            }
            _ => {}
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn type_to_json_schema(type_str: &str) -> Value {
    let json_type = match type_str {
        "string" | "str" => "string",
        "integer" | "int" | "i32" | "i64" | "u32" | "u64" => "integer",
        "number" | "float" | "f32" | "f64" => "number",
        "boolean" | "bool" => "boolean",
        "array" | "list" | "vec" => "array",
        "object" | "dict" | "map" => "object",
        // Unknown type - default to string
        _ => "string",
    };

    json!({ "type": json_type })
}

/// Builder for untyped tools
pub struct ToolBuilder {
    name: String,

    description: String,

    schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema: json!({}),
        }
    }

    /// Replace the schema entirely
    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    /// Add a parameter in simple notation (`"string"`, `"number"`, ...)
    pub fn param(mut self, name: &str, type_str: &str) -> Self {
        if let Value::Object(obj) = &mut self.schema {
            obj.insert(name.to_string(), Value::String(type_str.to_string()));
        } else {
            self.schema = json!({ name: type_str });
        }
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> Tool
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Tool::new(self.name, self.description, self.schema, handler)
    }
}

/// Start building an untyped tool
pub fn tool(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
    ToolBuilder::new(name, description)
}

/// Text handed back to the model for one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// JSON text: the serialized result, or an error payload
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    fn success(value: &Value) -> Self {
        Self {
            content: value.to_string(),
            is_error: false,
        }
    }

    /// `{"error": ..., "kind": ..., "tool": ...}` payload for a failed call.
    pub fn error(tool: &str, err: &Error) -> Self {
        let payload = json!({
            "error": err.to_string(),
            "kind": err.kind(),
            "tool": tool,
        });
        Self {
            content: payload.to_string(),
            is_error: true,
        }
    }
}

/// Named tools owned by one agent, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool.
    ///
    /// Rejects empty names, null or empty schemas, and names that are
    /// already registered.
    pub fn register(&mut self, tool: Tool) -> Result<()> {
        if tool.name.trim().is_empty() {
            return Err(Error::tool_registration("tool name must not be empty"));
        }

        let schema_missing = match &tool.input_schema {
            Value::Null => true,
            Value::Object(obj) => obj.is_empty(),
            _ => true,
        };
        if schema_missing {
            return Err(Error::tool_registration(format!(
                "tool '{}' has no input schema",
                tool.name
            )));
        }

        if self.index.contains_key(&tool.name) {
            return Err(Error::tool_registration(format!(
                "tool '{}' is already registered",
                tool.name
            )));
        }

        log::debug!("registered tool '{}'", tool.name);
        self.index.insert(tool.name.clone(), self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Descriptors for every tool, in registration order.
    pub fn generate_tool_list(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(Tool::descriptor).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.iter().map(Tool::name)
    }

    /// Invoke `name` with raw JSON arguments.
    ///
    /// Returns `Err(ToolNotFound)` for unknown names. Argument and handler
    /// failures are returned as `Ok` with an error payload. Only `Err`
    /// returns are captured; a panicking handler unwinds to the caller.
    pub async fn call(&self, name: &str, raw_arguments: &str) -> Result<ToolOutput> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::ToolNotFound(name.to_string()))?;

        let output = match tool.execute(raw_arguments).await {
            Ok(value) => ToolOutput::success(&value),
            Err(err) => {
                let err = match err {
                    e @ (Error::ToolArgument { .. } | Error::ToolExecution { .. }) => e,
                    other => Error::tool_execution(name, other.to_string()),
                };
                log::warn!("tool '{}' failed: {}", name, err);
                ToolOutput::error(name, &err)
            }
        };

        Ok(output)
    }

    /// Run one model-requested call; every failure becomes an error payload.
    pub async fn invoke(&self, call: &ToolCall) -> ToolOutput {
        let name = call.function.name.as_str();
        log::debug!("invoking tool '{}' (call {})", name, call.id);

        match self.call(name, &call.function.arguments).await {
            Ok(output) => output,
            Err(err) => {
                log::warn!("tool call {} rejected: {}", call.id, err);
                ToolOutput::error(name, &err)
            }
        }
    }
}
