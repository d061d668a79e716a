use std::path::PathBuf;

use clap::Parser;
use color_eyre::{Result, eyre::eyre};
use header_image::{
    generator::{self, DEFAULT_ASPECT_RATIO, DEFAULT_RESOLUTION, GenerateRequest, Generated},
    replicate::DEFAULT_MODEL,
};

const TOKEN_VAR: &str = "REPLICATE_API_TOKEN";

/// Generate a blog header image via Replicate.
#[derive(Debug, clap::Parser)]
struct Cli {
    /// Image prompt text.
    #[arg(long)]
    prompt: String,

    /// Replicate model slug.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Aspect ratio for the image.
    #[arg(long, default_value = DEFAULT_ASPECT_RATIO)]
    aspect_ratio: String,

    /// Image resolution.
    #[arg(long, default_value = DEFAULT_RESOLUTION)]
    resolution: String,

    /// Path to a reference image (repeatable).
    #[arg(long)]
    reference_file: Vec<PathBuf>,

    /// URL to a reference image (repeatable).
    #[arg(long)]
    reference_url: Vec<String>,

    /// Print JSON metadata with path/model/output_url.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let token = require_env(TOKEN_VAR)?;

    let request = GenerateRequest {
        prompt: cli.prompt,
        model: cli.model,
        aspect_ratio: cli.aspect_ratio,
        resolution: cli.resolution,
        reference_files: cli.reference_file,
        reference_urls: cli.reference_url,
    };

    let generated = generator::generate(&request, &token).await?;
    println!("{}", render(&generated, cli.json));
    Ok(())
}

fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(eyre!("Missing required env var: {name}")),
    }
}

fn render(generated: &Generated, json: bool) -> String {
    if json {
        serde_json::json!({
            "path": generated.path,
            "model": generated.model,
            "output_url": generated.output_url,
        })
        .to_string()
    } else {
        generated.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Generated {
        Generated {
            path: PathBuf::from("/tmp/header-image-abc123.png"),
            model: "google/nano-banana-pro".to_string(),
            output_url: "http://a/1.png".to_string(),
        }
    }

    #[test]
    fn plain_mode_prints_only_the_path() {
        assert_eq!(render(&sample(), false), "/tmp/header-image-abc123.png");
    }

    #[test]
    fn json_mode_prints_path_model_and_output_url() {
        let rendered = render(&sample(), true);
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 3);
        assert_eq!(object["path"], "/tmp/header-image-abc123.png");
        assert_eq!(object["model"], "google/nano-banana-pro");
        assert_eq!(object["output_url"], "http://a/1.png");
    }

    #[test]
    fn cli_parses_repeatable_references_and_defaults() {
        let cli = Cli::parse_from([
            "generate-header-image",
            "--prompt",
            "a castle",
            "--reference-file",
            "a.png",
            "--reference-file",
            "b.png",
            "--reference-url",
            "http://a/c.png",
        ]);

        assert_eq!(cli.prompt, "a castle");
        assert_eq!(cli.model, DEFAULT_MODEL);
        assert_eq!(cli.aspect_ratio, "16:9");
        assert_eq!(cli.resolution, "2K");
        assert_eq!(cli.reference_file, [PathBuf::from("a.png"), "b.png".into()]);
        assert_eq!(cli.reference_url, ["http://a/c.png"]);
        assert!(!cli.json);
    }
}
