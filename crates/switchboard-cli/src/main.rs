//! CLI binary for sending prompts and images through the switchboard adapters.

use std::path::Path;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use switchboard_llm::{
    initialize_client, ClientOptions, Image, Message, ModelConfig, Provider, Response,
};

#[derive(Parser)]
#[command(name = "switchboard", version, about = "One interface for OpenAI, Gemini and Bedrock")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the supported provider identifiers
    Providers,

    /// Send a text prompt
    Complete {
        /// Provider identifier (openai, gemini, bedrock)
        #[arg(short, long)]
        provider: String,

        /// The prompt text
        prompt: String,

        #[command(flatten)]
        request: RequestArgs,
    },

    /// Ask a question about one or more images
    Describe {
        /// Provider identifier (gemini, bedrock)
        #[arg(short, long)]
        provider: String,

        /// Image file path or http(s) URL; repeat for several images
        #[arg(short, long = "image", required = true)]
        images: Vec<String>,

        /// Question about the images
        #[arg(default_value = "")]
        prompt: String,

        #[command(flatten)]
        request: RequestArgs,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Model identifier (defaults to the provider's default model)
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    system: Option<String>,

    #[arg(long, default_value_t = 0.7)]
    temperature: f32,

    #[arg(long, default_value_t = 0.9)]
    top_p: f32,

    #[arg(long, default_value_t = 20)]
    top_k: u32,

    #[arg(long, default_value_t = 256)]
    max_tokens: u32,

    /// Stop sequence; repeat for several
    #[arg(long = "stop")]
    stop_sequences: Vec<String>,

    /// Print the provider's raw JSON response instead of the text
    #[arg(long)]
    raw: bool,
}

impl RequestArgs {
    fn model_config(&self) -> ModelConfig {
        ModelConfig {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_tokens: self.max_tokens,
            system_prompt: self.system.clone(),
            stop_sequences: self.stop_sequences.clone(),
        }
    }

    fn client_options(&self, provider: Provider) -> ClientOptions {
        let mut options = ClientOptions::from_env(provider);
        if let Some(model) = &self.model {
            options.model_id = Some(model.clone());
        }
        options
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match dotenv::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
        // Credentials may come from the process environment alone.
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "could not load .env"),
    }

    match cli.command {
        Commands::Providers => {
            for provider in Provider::ALL {
                println!("{provider}");
            }
        }
        Commands::Complete {
            provider,
            prompt,
            request,
        } => {
            cmd_complete(&provider, prompt, &request).await?;
        }
        Commands::Describe {
            provider,
            images,
            prompt,
            request,
        } => {
            cmd_describe(&provider, &images, prompt, &request).await?;
        }
    }

    Ok(())
}

async fn cmd_complete(
    provider: &str,
    prompt: String,
    request: &RequestArgs,
) -> anyhow::Result<()> {
    let options = request.client_options(provider.parse()?);
    let mut client = initialize_client(provider, options)
        .await
        .with_context(|| format!("failed to initialize {provider} client"))?;

    let result = client
        .text_completion(&[Message::user(prompt)], &request.model_config())
        .await;
    client.close().await?;

    let response = result.with_context(|| format!("error calling {provider}"))?;
    print_response(&response, request.raw)
}

async fn cmd_describe(
    provider: &str,
    images: &[String],
    prompt: String,
    request: &RequestArgs,
) -> anyhow::Result<()> {
    let options = request.client_options(provider.parse()?);
    let mut client = initialize_client(provider, options)
        .await
        .with_context(|| format!("failed to initialize {provider} client"))?;

    let images = images
        .iter()
        .map(|source| load_image(source))
        .collect::<anyhow::Result<Vec<_>>>()?;
    tracing::debug!(provider, images = images.len(), "loaded images");
    let message = Message::user(prompt).with_images(images);

    let result = client
        .image_recognition(&[message], &request.model_config())
        .await;
    client.close().await?;

    let response = result.with_context(|| format!("error calling {provider}"))?;
    print_response(&response, request.raw)
}

fn print_response(response: &Response, raw: bool) -> anyhow::Result<()> {
    if raw {
        println!("{}", serde_json::to_string_pretty(&response.raw)?);
        return Ok(());
    }
    println!("{}", response.text);
    println!(
        "\nTokens used: {} input, {} output, {} total",
        response.usage.input_tokens, response.usage.output_tokens, response.usage.total_tokens
    );
    Ok(())
}

/// Turns a CLI image argument into an [`Image`]: URLs are passed through for
/// the adapter to download, local files are read inline.
fn load_image(source: &str) -> anyhow::Result<Image> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let path = source.split(['?', '#']).next().unwrap_or(source);
        return Ok(Image::from_url(image_format(path), source));
    }
    let data = std::fs::read(source).with_context(|| format!("failed to read image {source}"))?;
    Ok(Image::from_bytes(image_format(source), data))
}

/// Format tag from a file extension. Unknown or missing extensions are
/// assumed to be JPEG.
fn image_format(path: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") | None => "jpeg".to_string(),
        Some(ext @ ("png" | "gif" | "webp")) => ext.to_string(),
        Some(_) => "jpeg".to_string(),
    }
}
