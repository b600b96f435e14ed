//! CLI for artgen - prompt-to-image generation.

use artgen::{CredentialMap, GenerationRequest, ImageSize, Orchestrator, ProviderKind};
use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "artgen")]
#[command(about = "Generate an image from a text prompt via OpenAI DALL-E or Stable Diffusion")]
#[command(version)]
struct Cli {
    /// The text prompt describing the image
    prompt: String,

    /// Provider to use
    #[arg(short, long, value_enum, default_value = "openai")]
    provider: ProviderArg,

    /// Image size as a WxH token (256x256, 512x512 or 1024x1024)
    #[arg(short, long, default_value = "1024x1024")]
    size: String,

    /// Append the artistic style suffix to the prompt
    #[arg(long)]
    artistic: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProviderArg {
    Openai,
    Replicate,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Openai => ProviderKind::OpenAi,
            ProviderArg::Replicate => ProviderKind::Replicate,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let provider: ProviderKind = cli.provider.into();
    let size: ImageSize = cli.size.parse()?;

    let mut credentials = CredentialMap::new();
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        credentials.insert(ProviderKind::OpenAi, key);
    }
    if let Ok(key) = std::env::var("REPLICATE_API_TOKEN") {
        credentials.insert(ProviderKind::Replicate, key);
    }

    let request = GenerationRequest::new(&cli.prompt, provider)
        .with_size(size)
        .with_style_modifier(cli.artistic);

    // Progress goes to stderr so stdout stays parseable.
    let (tx, mut rx) = mpsc::unbounded_channel::<artgen::ProgressEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &event.estimated_remaining {
                Some(estimate) => {
                    eprintln!("[{:>3}%] {} (est. {})", event.percentage, event.status, estimate)
                }
                None => eprintln!("[{:>3}%] {}", event.percentage, event.status),
            }
        }
    });

    let orchestrator = Orchestrator::new();
    let result = orchestrator
        .generate(&request, &credentials, Some(tx))
        .await;
    printer.await?;

    let result = match result {
        Ok(result) => result,
        Err(err) if err.is_timeout() => {
            anyhow::bail!("{err} - the provider may be busy, try again")
        }
        Err(err) => return Err(err.into()),
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.image_url);
        eprintln!(
            "Generated {} image via {} for prompt: {}",
            result.size,
            result.provider.display_name(),
            result.prompt
        );
    }

    Ok(())
}
