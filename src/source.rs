use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageReader};

/// File extensions accepted for local images
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Where the photo to inspect comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    File(PathBuf),
    Url(String),
    /// Raw image bytes on stdin, e.g. a frame piped from a capture tool
    Stdin,
}

impl ImageInput {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == "-" {
            ImageInput::Stdin
        } else if is_url(trimmed) {
            ImageInput::Url(trimmed.to_string())
        } else {
            ImageInput::File(PathBuf::from(raw))
        }
    }

    /// Load and decode the image as RGB8
    pub fn load(&self) -> Result<DynamicImage> {
        let img = match self {
            ImageInput::File(path) => load_file(path)?,
            ImageInput::Url(url) => load_url(url)?,
            ImageInput::Stdin => {
                let mut bytes = Vec::new();
                std::io::stdin()
                    .lock()
                    .read_to_end(&mut bytes)
                    .context("reading image from stdin")?;
                decode_bytes(&bytes).context("decoding image from stdin")?
            }
        };
        Ok(DynamicImage::ImageRgb8(img.into_rgb8()))
    }
}

impl fmt::Display for ImageInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageInput::File(path) => write!(f, "{}", path.display()),
            ImageInput::Url(url) => f.write_str(url),
            ImageInput::Stdin => f.write_str("<stdin>"),
        }
    }
}

fn is_url(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn load_file(path: &Path) -> Result<DynamicImage> {
    if !has_supported_extension(path) {
        anyhow::bail!(
            "Unsupported image type: {} (expected one of: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        );
    }

    ImageReader::open(path)
        .with_context(|| format!("opening image {}", path.display()))?
        .decode()
        .map_err(|e| anyhow!("Failed to decode image {}: {}", path.display(), e))
}

fn load_url(url: &str) -> Result<DynamicImage> {
    let fetch = || -> Result<DynamicImage> {
        let response = ureq::get(url).call().context("request failed")?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .context("reading response body")?;
        decode_bytes(&bytes)
    };
    fetch().with_context(|| format!("Could not load the image from URL {}", url))
}

pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        anyhow::bail!("no image data");
    }
    image::load_from_memory(bytes).context("unrecognised image data")
}
