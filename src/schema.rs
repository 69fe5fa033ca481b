//! JSON Schema generation from explicit field tables.
//!
//! A typed tool input implements [`ToolInput`] by listing its fields in
//! declaration order. The generated schema keeps that order for `properties`
//! and for `required`, so identical definitions always produce identical
//! request bodies.
//!
//! ```rust
//! use openrouter_agent::schema::{FieldSpec, ToolInput, schema_for};
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct WeatherInput {
//!     city: String,
//!     units: Option<String>,
//! }
//!
//! impl ToolInput for WeatherInput {
//!     fn fields() -> Vec<FieldSpec> {
//!         vec![
//!             FieldSpec::string("city").describe("City name"),
//!             FieldSpec::enumeration("units", ["celsius", "fahrenheit"]).optional(),
//!         ]
//!     }
//! }
//!
//! let schema = schema_for::<WeatherInput>();
//! assert_eq!(schema["required"], serde_json::json!(["city"]));
//! ```

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

/// A type the model can fill in as tool arguments.
pub trait ToolInput: DeserializeOwned + Send + 'static {
    /// Field table in declaration order.
    fn fields() -> Vec<FieldSpec>;
}

/// JSON type of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    /// String restricted to the listed values
    Enum(Vec<String>),
    Array(Box<FieldKind>),
    Object(Vec<FieldSpec>),
}

/// One row of a field table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub required: bool,
    pub description: Option<String>,
}

impl FieldSpec {
    /// Required field of the given kind.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: None,
        }
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            FieldKind::Enum(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn array(name: impl Into<String>, items: FieldKind) -> Self {
        Self::new(name, FieldKind::Array(Box::new(items)))
    }

    pub fn object(name: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self::new(name, FieldKind::Object(fields))
    }

    /// Mark the field optional (left out of `required`).
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Object schema for `T`.
pub fn schema_for<T: ToolInput>() -> Value {
    object_schema(&T::fields())
}

/// Object schema for a field table.
///
/// Always has `type`, `properties` and `required`, even when empty.
pub fn object_schema(fields: &[FieldSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in fields {
        let mut prop = kind_schema(&field.kind);
        if let Some(description) = &field.description {
            prop.insert("description".to_string(), json!(description));
        }
        properties.insert(field.name.clone(), Value::Object(prop));

        if field.required {
            required.push(Value::String(field.name.clone()));
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

fn kind_schema(kind: &FieldKind) -> Map<String, Value> {
    let mut schema = Map::new();
    match kind {
        FieldKind::String => {
            schema.insert("type".to_string(), json!("string"));
        }
        FieldKind::Integer => {
            schema.insert("type".to_string(), json!("integer"));
        }
        FieldKind::Number => {
            schema.insert("type".to_string(), json!("number"));
        }
        FieldKind::Boolean => {
            schema.insert("type".to_string(), json!("boolean"));
        }
        FieldKind::Enum(values) => {
            schema.insert("type".to_string(), json!("string"));
            schema.insert("enum".to_string(), json!(values));
        }
        FieldKind::Array(items) => {
            schema.insert("type".to_string(), json!("array"));
            schema.insert("items".to_string(), Value::Object(kind_schema(items)));
        }
        FieldKind::Object(fields) => {
            if let Value::Object(nested) = object_schema(fields) {
                schema = nested;
            }
        }
    }
    schema
}
