mod config;
mod error;
mod handlers;
mod models;
#[cfg(feature = "http-server")]
mod server; // HTTP API
mod services;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;

use config::Config;
use handlers::prompts::{default_instruction, preset_instructions};
use handlers::NutritionWorkflow;
use models::{ImageInput, LabelImage};
use services::{GeminiService, GenerativeModel};

#[derive(Parser)]
#[command(name = "nutrilabel", version, about = "Nutrition facts and FDA-style labels from food photos")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a food photo and render its nutrition label
    Analyze {
        /// Food photo (PNG, JPEG, ...); `-` reads it from stdin
        image: PathBuf,
        /// Analysis instruction; defaults to the nutritionist preset
        #[arg(short, long)]
        prompt: Option<String>,
        /// Where to write the label PNG
        #[arg(long)]
        label_out: Option<PathBuf>,
        /// Stop after the nutrition facts
        #[arg(long)]
        skip_label: bool,
    },
    /// Print the preset analysis instructions
    Prompts,
    /// Serve the HTTP API
    #[cfg(feature = "http-server")]
    Serve {
        /// Listen address; overrides BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    if let Command::Prompts = cli.command {
        for (i, prompt) in preset_instructions().iter().enumerate() {
            println!("--- preset {} ---\n{}\n", i + 1, prompt);
        }
        return Ok(());
    }

    log::info!("🚀 Starting nutrition label generator...");

    // Missing credentials stop the process here, before any request.
    let config = Config::from_env()?;

    let model: Arc<dyn GenerativeModel> = Arc::new(GeminiService::from_config(&config)?);
    log::info!(
        "✅ Gemini client initialized with analysis model: {} ({:?} image transport)",
        config.analysis_model,
        config.image_transport
    );

    let workflow = NutritionWorkflow::new(model, config.request_timeout);

    match cli.command {
        Command::Analyze {
            image,
            prompt,
            label_out,
            skip_label,
        } => {
            let instruction = prompt.unwrap_or_else(|| default_instruction().to_string());
            run_analyze(&workflow, &config, image, &instruction, label_out, skip_label).await?;
        }
        #[cfg(feature = "http-server")]
        Command::Serve { bind } => {
            let addr = bind.unwrap_or_else(|| config.bind_addr.clone());
            let router = server::create_router(workflow);

            let shutdown = async {
                tokio::signal::ctrl_c().await.ok();
                log::info!("🛑 Shutting down...");
            };
            tokio::select! {
                result = server::serve(&addr, router) => result?,
                _ = shutdown => {}
            }
        }
        Command::Prompts => {}
    }

    Ok(())
}

async fn run_analyze(
    workflow: &NutritionWorkflow,
    config: &Config,
    image: PathBuf,
    instruction: &str,
    label_out: Option<PathBuf>,
    skip_label: bool,
) -> Result<()> {
    let input = if image.as_os_str() == "-" {
        let mut bytes = Vec::new();
        std::io::stdin().read_to_end(&mut bytes)?;
        log::debug!("📥 Read {} image bytes from stdin", bytes.len());
        ImageInput::Bytes(bytes)
    } else {
        ImageInput::Path(image)
    };

    let outcome = workflow
        .analysis()
        .analyze(Some(input), Some(instruction))
        .await;

    println!("{}", outcome.display_text);

    let Some(record) = outcome.record else {
        return Ok(());
    };
    println!();
    if let Some(kind) = record.meal_kind() {
        println!("🍽️ Meal type: {}", kind);
    }
    if let Some(calories) = record.calories() {
        println!("🔥 Calories: {}", calories);
    }
    if let Some(serving) = record.serving_size() {
        println!("⚖️ Serving size: {}", serving);
    }
    println!("🥕 Ingredients: {}", record.ingredients().join(", "));
    if skip_label {
        return Ok(());
    }

    match workflow.label().synthesize(Some(&record)).await {
        Some(label) => {
            let path = label_out.unwrap_or_else(|| {
                config.label_output_dir.join(format!(
                    "label_{}.png",
                    chrono::Utc::now().format("%Y%m%d_%H%M%S")
                ))
            });
            save_label(&label, &path)?;
            println!("🏷️ Label saved to {}", path.display());
        }
        None => println!("⚠️ No label image was generated."),
    }

    Ok(())
}

fn save_label(label: &LabelImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    label.save(path)?;
    log::info!("💾 Label written: {} ({}x{})", path.display(), label.width(), label.height());
    Ok(())
}
