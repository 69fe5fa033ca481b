//! Calculator with tools
//!
//! Registers one typed tool and one schema-notation tool, then lets the
//! model call them.

use openrouter_agent::prelude::*;
use openrouter_agent::get_model;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Deserialize)]
struct Operation {
    op: String,
    a: f64,
    b: f64,
}

impl ToolInput for Operation {
    fn fields() -> Vec<FieldSpec> {
        vec![
            FieldSpec::enumeration("op", ["add", "subtract", "multiply", "divide"])
                .describe("Arithmetic operation"),
            FieldSpec::number("a"),
            FieldSpec::number("b"),
        ]
    }
}

#[derive(Serialize)]
struct Answer {
    result: f64,
}

fn calculator() -> Tool {
    Tool::typed("calculate", "Apply an arithmetic operation to two numbers", |input: Operation| async move {
        let result = match input.op.as_str() {
            "add" => input.a + input.b,
            "subtract" => input.a - input.b,
            "multiply" => input.a * input.b,
            "divide" if input.b == 0.0 => {
                return Err(Error::tool_execution("calculate", "cannot divide by zero"));
            }
            "divide" => input.a / input.b,
            other => {
                return Err(Error::tool_execution("calculate", format!("unknown op '{}'", other)));
            }
        };
        Ok(Answer { result })
    })
}

fn square_root() -> Tool {
    tool("sqrt", "Square root of a non-negative number")
        .param("x", "number")
        .build(|args| async move {
            let x = args["x"].as_f64().unwrap_or(0.0);
            if x < 0.0 {
                return Err(Error::tool_execution("sqrt", "negative input"));
            }
            Ok(json!({"result": x.sqrt()}))
        })
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let model = get_model(Some("openai/gpt-4o-mini"), true).unwrap_or_default();
    let options = AgentOptions::builder()
        .model(model)
        .system_prompt(
            "You are a calculator assistant. Use the tools for every calculation \
             and explain the result briefly.",
        )
        .temperature(0.1)
        .max_tool_rounds(5)
        .build()?;

    let mut agent = Agent::from_env(options)?;
    agent.register_tool(calculator())?;
    agent.register_tool(square_root())?;

    for question in [
        "What is 25 plus 17?",
        "Calculate 144 divided by 12, then take the square root.",
        "What's 7 divided by 0?",
    ] {
        println!("User: {}", question);
        let added = agent.chat(question).await?;

        for message in &added {
            match message.role {
                MessageRole::Assistant if message.has_tool_calls() => {
                    for call in &message.tool_calls {
                        println!("  -> {}({})", call.function.name, call.function.arguments);
                    }
                }
                MessageRole::Tool => println!("  <- {}", message.text()),
                MessageRole::Assistant => println!("Assistant: {}\n", message.text()),
                _ => {}
            }
        }
    }

    Ok(())
}
