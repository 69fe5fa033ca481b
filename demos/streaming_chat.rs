//! Streaming chat example
//!
//! Prints content deltas as they arrive. Ctrl-C cancels the turn; the
//! history is left untouched when that happens.

use openrouter_agent::{Agent, AgentOptions, CancellationToken, Error, StreamEvent, get_model};
use std::io::Write;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let model = get_model(Some("meta-llama/llama-3.2-1b-instruct"), true).unwrap_or_default();
    let options = AgentOptions::builder()
        .model(model)
        .system_prompt("You are a storyteller.")
        .max_tokens(600)
        .build()?;

    let mut agent = Agent::from_env(options)?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let result = agent
        .chat_streaming("Tell me a short story about a lighthouse.", cancel, |event| {
            match event {
                StreamEvent::Data(chunk) => {
                    let text = chunk
                        .choices
                        .iter()
                        .filter_map(|c| c.delta.as_ref()?.content.as_deref())
                        .collect::<String>();
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
                StreamEvent::Heartbeat => log::debug!("heartbeat"),
                StreamEvent::Terminal(Some(err)) => eprintln!("\nstream failed: {}", err),
                StreamEvent::Terminal(None) => println!(),
            }
        })
        .await;

    match result {
        Ok(added) => println!("\n[{} messages added]", added.len()),
        Err(Error::Cancelled) => println!("\n[cancelled, history has {} messages]", agent.history().len()),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
