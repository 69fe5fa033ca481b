//! Vision example
//!
//! Sends an image by URL, then a local image file if a path is given.
//!
//! ```bash
//! cargo run --example vision_chat -- ./photo.png
//! ```

use openrouter_agent::{Agent, AgentOptions, ImageAttachment, ImageDetail, get_model};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let model = get_model(Some("openai/gpt-4o-mini"), true).unwrap_or_default();
    let options = AgentOptions::builder().model(model).max_tokens(400).build()?;
    let mut agent = Agent::from_env(options)?;

    let remote = ImageAttachment::from_url(
        "https://upload.wikimedia.org/wikipedia/commons/thumb/3/3a/Cat03.jpg/1200px-Cat03.jpg",
    )
    .with_detail(ImageDetail::Low);

    let added = agent
        .chat_with_images("What's in this image? One sentence.", &[remote])
        .await?;
    if let Some(reply) = added.last() {
        println!("Remote image: {}\n", reply.text());
    }

    if let Some(path) = std::env::args().nth(1) {
        let local = ImageAttachment::from_path(&path).await?.with_detail(ImageDetail::High);
        let added = agent
            .chat_with_images("Describe this one in detail.", &[local])
            .await?;
        if let Some(reply) = added.last() {
            println!("{}: {}", path, reply.text());
        }
    }

    Ok(())
}
