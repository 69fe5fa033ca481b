//! Simple chat example
//!
//! Two turns against the same agent; the second relies on the history.
//!
//! ```bash
//! OPENROUTER_API_KEY=sk-... cargo run --example simple_chat
//! ```

use openrouter_agent::{Agent, AgentOptions, get_model};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let model = get_model(Some("meta-llama/llama-3.2-1b-instruct"), true).unwrap_or_default();
    let options = AgentOptions::builder()
        .model(model)
        .system_prompt("You are a helpful assistant. Keep answers short.")
        .temperature(0.7)
        .max_tokens(300)
        .build()?;

    let mut agent = Agent::from_env(options)?;

    for question in [
        "What's the capital of France?",
        "And roughly how many people live there?",
    ] {
        println!("User: {}", question);
        let added = agent.chat(question).await?;
        if let Some(reply) = added.last() {
            println!("Assistant: {}\n", reply.text());
        }
    }

    println!("History holds {} messages", agent.history().len());

    let haiku = agent.completion("Write a haiku about the sea:").await?;
    println!("\nCompletion:\n{}", haiku.trim());

    Ok(())
}
