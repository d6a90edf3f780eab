use chatbot::chat::ChatRequestHandler;
use chatbot::config::Config;
use chatbot::providers::openai::OpenAiProvider;
use chatbot::{PROMPT, render_response};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; the key may come from the real environment.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env();
    tracing::debug!(?config, "loaded configuration");

    let handler = ChatRequestHandler::new(OpenAiProvider::new(&config));
    let content = handler.respond(PROMPT).await?;

    println!("{}", render_response(content.as_deref()));
    Ok(())
}
