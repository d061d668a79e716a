use std::path::{Path, PathBuf};

use base64::{Engine, engine::general_purpose::STANDARD};
use color_eyre::{Result, eyre::ensure};
use reqwest::header;

const FALLBACK_MIME: &str = "application/octet-stream";
const USER_AGENT: &str = "generate-header-image";

/// Turns local files and remote URLs into inline `data:` URIs, local files
/// first in the given order. A missing local file fails the whole run before
/// any URL is fetched.
pub async fn collect(
    paths: &[PathBuf],
    urls: &[String],
    client: &reqwest::Client,
) -> Result<Vec<String>> {
    let mut payloads = Vec::with_capacity(paths.len() + urls.len());
    for path in paths {
        payloads.push(data_uri_from_path(path)?);
    }
    for url in urls {
        payloads.push(data_uri_from_url(url, client).await?);
    }
    Ok(payloads)
}

pub fn data_uri_from_path(path: &Path) -> Result<String> {
    ensure!(
        path.exists(),
        "Reference image not found: {}",
        path.display()
    );
    let mime = mime_from_path(path).unwrap_or(FALLBACK_MIME);
    let bytes = std::fs::read(path)?;
    Ok(data_uri(mime, &bytes))
}

pub async fn data_uri_from_url(url: &str, client: &reqwest::Client) -> Result<String> {
    let resp = client
        .get(url)
        .header(header::USER_AGENT, USER_AGENT)
        .send()
        .await?
        .error_for_status()?;

    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(';').next().unwrap_or("").trim().to_string())
        .filter(|v| !v.is_empty());

    let bytes = resp.bytes().await?;
    let mime = match &content_type {
        Some(mime) => mime.as_str(),
        None => mime_from_path(Path::new(strip_query(url))).unwrap_or(FALLBACK_MIME),
    };
    Ok(data_uri(mime, &bytes))
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn mime_from_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
