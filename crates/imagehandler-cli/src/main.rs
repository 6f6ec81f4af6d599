//! imagehandler: run the image pipeline against local files.
//!
//! Limits and output defaults come from IMAGE_* environment variables (or `.env`).

use anyhow::Context;
use base64::{engine::general_purpose, Engine as _};
use clap::{Parser, Subcommand};
use imagehandler_cli::{init_tracing, load_edits, LocalOverlaySource, StaticModerationDetector};
use imagehandler_core::{
    ContentType, ErrorResponse, ImageFormatType, ImageRequest, OutputSelection, PipelineConfig,
};
use imagehandler_processing::ImagePipeline;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "imagehandler", about = "Image transformation pipeline")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply edits to an image and encode the result
    Process {
        /// Source image
        input: PathBuf,
        /// Declared content type (image/png or png); guessed from the extension when omitted
        #[arg(long)]
        content_type: Option<String>,
        /// JSON file holding the edit set
        #[arg(long)]
        edits: Option<PathBuf>,
        /// Output format: jpg, jpeg, png, webp, tiff, gif, avif, raw
        #[arg(long)]
        format: Option<ImageFormatType>,
        /// Encoder quality (1-100)
        #[arg(long)]
        quality: Option<u8>,
        /// WEBP effort (0-6)
        #[arg(long)]
        effort: Option<u8>,
        /// Where to write the encoded image
        #[arg(long, short)]
        output: PathBuf,
        /// Directory holding overlay images as <bucket>/<key>
        #[arg(long)]
        overlay_dir: Option<PathBuf>,
        /// JSON file with recorded moderation labels
        #[arg(long)]
        moderation_labels: Option<PathBuf>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessSummary<'a> {
    output: String,
    content_type: &'a str,
    size: usize,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        "gif" => Some("image/gif"),
        "svg" => Some("image/svg+xml"),
        _ => None,
    }
}

/// `--content-type` accepts a MIME type or a short name (`png`, `svg`...);
/// without it the input's extension decides.
fn content_type_for(path: &Path, declared: Option<&str>) -> anyhow::Result<ContentType> {
    if let Some(declared) = declared {
        return ContentType::from_mime(declared)
            .or_else(|| mime_for_extension(declared).and_then(ContentType::from_mime))
            .with_context(|| format!("Unsupported content type '{}'", declared));
    }

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    mime_for_extension(extension)
        .and_then(ContentType::from_mime)
        .with_context(|| {
            format!(
                "Cannot infer the content type of '{}'; pass --content-type",
                path.display()
            )
        })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = PipelineConfig::from_env().context("Invalid IMAGE_* configuration")?;

    match cli.command {
        Commands::Process {
            input,
            content_type,
            edits,
            format,
            quality,
            effort,
            output,
            overlay_dir,
            moderation_labels,
        } => {
            let content_type = content_type_for(&input, content_type.as_deref())?;
            let original = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;

            let mut request = ImageRequest::new(original, content_type).with_output(OutputSelection {
                format,
                effort,
                quality,
            });
            if let Some(path) = edits {
                request = request.with_edits(load_edits(&path).await?);
            }

            let mut pipeline = ImagePipeline::new(config);
            if let Some(dir) = overlay_dir {
                pipeline = pipeline.with_overlay_source(Arc::new(LocalOverlaySource::new(dir)));
            }
            if let Some(path) = moderation_labels {
                let detector = StaticModerationDetector::from_file(&path).await?;
                pipeline = pipeline.with_moderation_detector(Arc::new(detector));
            }

            match pipeline.process(&request).await {
                Ok(processed) => {
                    let encoded = general_purpose::STANDARD
                        .decode(&processed.body)
                        .context("Pipeline returned an invalid body")?;
                    tokio::fs::write(&output, &encoded)
                        .await
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    print_json(&ProcessSummary {
                        output: output.display().to_string(),
                        content_type: &processed.content_type,
                        size: processed.size,
                    })?;
                }
                Err(err) => {
                    print_json(&ErrorResponse::from(&err))?;
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
