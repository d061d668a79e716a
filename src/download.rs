use std::path::{Path, PathBuf};

use color_eyre::{Result, eyre::eyre};
use reqwest::header;
use serde_json::Value;
use uuid::Uuid;

const DEFAULT_EXTENSION: &str = ".jpg";

/// Picks the delivery URL out of a prediction's `output` field: a non-empty
/// string is used directly, a list yields its first non-empty string element,
/// anything else is a protocol violation.
pub fn first_output_url(output: Option<&Value>) -> Result<&str> {
    let url = match output {
        Some(Value::String(url)) if !url.is_empty() => Some(url.as_str()),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|url| !url.is_empty()),
        _ => None,
    };
    url.ok_or_else(|| eyre!("Unexpected prediction output: {output:?}"))
}

/// Fetches `url` and writes the bytes to a fresh randomly-named file in the
/// OS temp directory. The file is never cleaned up.
pub async fn fetch(client: &reqwest::Client, url: &str, prefix: &str) -> Result<PathBuf> {
    let resp = client.get(url).send().await?.error_for_status()?;
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let ext = guess_extension(url, content_type.as_deref());
    let bytes = resp.bytes().await?;

    let path = std::env::temp_dir().join(format!("{prefix}-{}{ext}", Uuid::new_v4().simple()));
    std::fs::write(&path, &bytes)?;
    Ok(path)
}

/// Content type wins over the URL suffix, the URL suffix wins over the
/// hard-coded default.
fn guess_extension(url: &str, content_type: Option<&str>) -> &'static str {
    if let Some(ext) = content_type.and_then(extension_for_mime) {
        return ext;
    }
    if let Some(ext) = url_suffix(url) {
        return ext;
    }
    DEFAULT_EXTENSION
}

fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/webp" => Some(".webp"),
        "image/gif" => Some(".gif"),
        _ => None,
    }
}

fn url_suffix(url: &str) -> Option<&'static str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let suffix = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match suffix.as_str() {
        "jpg" => Some(".jpg"),
        "jpeg" => Some(".jpeg"),
        "png" => Some(".png"),
        "webp" => Some(".webp"),
        _ => None,
    }
}
