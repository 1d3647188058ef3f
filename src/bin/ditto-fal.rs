use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ditto_fal::{Env, FalConfig, FalQueueImages, GenerationParams, UserSettings};

/// Generate images through the fal.ai queue and print them as markdown.
#[derive(Debug, Parser)]
#[command(name = "ditto-fal", version)]
struct Cli {
    /// text_to_image or image_to_image
    #[arg(long = "type", default_value = "text_to_image")]
    kind: String,

    #[arg(long)]
    prompt: String,

    /// Source image for image_to_image.
    #[arg(long)]
    image_url: Option<String>,

    /// Built-in model variant (flux-lora, fast-sdxl). Overrides the config file.
    #[arg(long)]
    variant: Option<String>,

    /// TOML config file.
    #[arg(long, env = "DITTO_FAL_CONFIG")]
    config: Option<PathBuf>,

    /// .env file consulted before the process environment for the API key.
    #[arg(long)]
    dotenv: Option<PathBuf>,

    #[arg(long)]
    image_size: Option<String>,

    #[arg(long = "steps")]
    num_inference_steps: Option<String>,

    #[arg(long)]
    num_images: Option<String>,

    /// "true" enables the provider's safety checker; anything else disables it.
    #[arg(long = "safety-checker")]
    enable_safety_checker: Option<String>,

    #[arg(long, default_value = "info")]
    log_level: String,

    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = ditto_fal::logging::init_tracing(&cli.log_level, cli.json_logs) {
        eprintln!("failed to initialize logging: {err}");
    }

    let client = match build_client(&cli).await {
        Ok(client) => client,
        Err(err) => {
            println!("{}", err.to_markdown());
            return ExitCode::from(2);
        }
    };

    let params = GenerationParams {
        kind: cli.kind,
        prompt: cli.prompt,
        image_url: cli.image_url,
    };
    let settings = UserSettings {
        fal_ai_api_key: None,
        image_size: cli.image_size,
        num_inference_steps: cli.num_inference_steps,
        num_images: cli.num_images,
        enable_safety_checker: cli.enable_safety_checker,
    };

    let output = client.generate_markdown(params, &settings).await;
    println!("{output}");
    if output.starts_with("**Error:**") {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn build_client(cli: &Cli) -> ditto_fal::Result<FalQueueImages> {
    let mut config = match cli.config.as_ref() {
        Some(path) => FalConfig::load(path).await?,
        None => FalConfig::default(),
    };
    if let Some(variant) = cli.variant.as_ref() {
        config.variant = Some(variant.clone());
    }

    let env = match cli.dotenv.as_ref() {
        Some(path) => Env::from_dotenv_file(path).await?,
        None => Env::default(),
    };

    FalQueueImages::from_config(&config, &env)
}
