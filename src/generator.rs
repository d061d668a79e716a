use std::path::PathBuf;

use color_eyre::Result;
use log::warn;
use serde_json::{Value, json};

use crate::{
    download, reference,
    replicate::{Client, DEFAULT_MODEL, FALLBACK_MODEL},
};

pub const DEFAULT_ASPECT_RATIO: &str = "16:9";
pub const DEFAULT_RESOLUTION: &str = "2K";

const OUTPUT_PREFIX: &str = "header-image";

#[derive(Debug)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: String,
    pub aspect_ratio: String,
    pub resolution: String,
    pub reference_files: Vec<PathBuf>,
    pub reference_urls: Vec<String>,
}

/// One finished run: where the image landed, which model produced it, and
/// where the remote copy lives.
#[derive(Debug)]
pub struct Generated {
    pub path: PathBuf,
    pub model: String,
    pub output_url: String,
}

/// Runs submit, poll and download for the requested model. When that fails
/// and the requested model is the default one, the whole sequence is retried
/// once against the fallback model with a reduced payload. An explicitly
/// chosen model gets no second attempt.
pub async fn generate(request: &GenerateRequest, token: &str) -> Result<Generated> {
    let client = Client::new(token);
    let image_input =
        reference::collect(&request.reference_files, &request.reference_urls, client.http())
            .await?;

    let primary = primary_payload(request, image_input);
    match run_prediction(&client, &request.model, &primary).await {
        Ok((path, output_url)) => Ok(Generated {
            path,
            model: request.model.clone(),
            output_url,
        }),
        Err(err) if retries_with_fallback(&request.model) => {
            warn!("Primary image model failed ({}): {err:#}", request.model);
            warn!("Falling back to {FALLBACK_MODEL}...");
            let (path, output_url) =
                run_prediction(&client, FALLBACK_MODEL, &fallback_payload(request)).await?;
            Ok(Generated {
                path,
                model: FALLBACK_MODEL.to_string(),
                output_url,
            })
        }
        Err(err) => Err(err),
    }
}

async fn run_prediction(client: &Client, model: &str, payload: &Value) -> Result<(PathBuf, String)> {
    let id = client.submit(model, payload).await?;
    let prediction = client.wait(&id).await?;
    let output_url = download::first_output_url(prediction.output.as_ref())?.to_string();
    let path = download::fetch(client.http(), &output_url, OUTPUT_PREFIX).await?;
    Ok((path, output_url))
}

fn retries_with_fallback(model: &str) -> bool {
    model == DEFAULT_MODEL
}

fn primary_payload(request: &GenerateRequest, image_input: Vec<String>) -> Value {
    json!({
        "input": {
            "prompt": request.prompt,
            "image_input": image_input,
            "aspect_ratio": request.aspect_ratio,
            "resolution": request.resolution,
            "output_format": "jpg",
            "safety_filter_level": "block_only_high",
        }
    })
}

/// Reduced payload for the fallback model: no reference images, no
/// resolution, no safety filter.
fn fallback_payload(request: &GenerateRequest) -> Value {
    json!({
        "input": {
            "prompt": request.prompt,
            "aspect_ratio": request.aspect_ratio,
            "output_format": "png",
        }
    })
}

#[cfg(test)]
mod tests {
    use expect_test::expect;

    use super::*;

    fn sample_request(model: &str) -> GenerateRequest {
        GenerateRequest {
            prompt: "A castle on a mountain".to_string(),
            model: model.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO.to_string(),
            resolution: DEFAULT_RESOLUTION.to_string(),
            reference_files: vec![],
            reference_urls: vec![],
        }
    }

    #[test]
    fn only_the_default_model_falls_back() {
        assert!(retries_with_fallback(DEFAULT_MODEL));
        assert!(!retries_with_fallback(FALLBACK_MODEL));
        assert!(!retries_with_fallback("someone/custom-model"));
    }

    #[test]
    fn primary_payload_serialization() {
        let request = sample_request(DEFAULT_MODEL);
        let payload = primary_payload(&request, vec!["data:image/png;base64,YWJj".to_string()]);

        let expect = expect![[
            r#"{"input":{"aspect_ratio":"16:9","image_input":["data:image/png;base64,YWJj"],"output_format":"jpg","prompt":"A castle on a mountain","resolution":"2K","safety_filter_level":"block_only_high"}}"#
        ]];
        expect.assert_eq(&serde_json::to_string(&payload).unwrap());
    }

    #[test]
    fn fallback_payload_drops_references_resolution_and_safety_filter() {
        let request = sample_request(DEFAULT_MODEL);
        let payload = fallback_payload(&request);

        let expect = expect![[
            r#"{"input":{"aspect_ratio":"16:9","output_format":"png","prompt":"A castle on a mountain"}}"#
        ]];
        expect.assert_eq(&serde_json::to_string(&payload).unwrap());

        let input = &payload["input"];
        assert!(input.get("image_input").is_none());
        assert!(input.get("resolution").is_none());
        assert!(input.get("safety_filter_level").is_none());
    }
}
