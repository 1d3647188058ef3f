//! Markdown rendering of finished jobs.

use crate::types::{GenerationKind, GenerationRequest, GenerationResult, ImageCaption};

pub const NO_IMAGES_MESSAGE: &str = "No images were generated.";

const MAX_ALT_CHARS: usize = 100;

/// One caption per image, in result order. Multi-image results are numbered.
pub fn captions(request: &GenerationRequest, result: &GenerationResult) -> Vec<ImageCaption> {
    let total = result.images.len();
    let base = base_alt_text(request, result);
    result
        .images
        .iter()
        .enumerate()
        .map(|(idx, image)| {
            let caption = if total > 1 {
                format!("{base} (Image {} of {total})", idx + 1)
            } else {
                base.clone()
            };
            ImageCaption {
                url: image.url.clone(),
                caption,
            }
        })
        .collect()
}

pub fn to_markdown(request: &GenerationRequest, result: &GenerationResult) -> String {
    let captions = captions(request, result);
    if captions.is_empty() {
        return NO_IMAGES_MESSAGE.to_string();
    }

    let mut out = String::new();
    for ImageCaption { url, caption } in captions {
        out.push_str(&format!("![{caption}]({url})\n\n"));
    }
    out
}

fn base_alt_text(request: &GenerationRequest, result: &GenerationResult) -> String {
    match request.kind {
        GenerationKind::TextToImage => {
            let prompt = result
                .prompt
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or(request.prompt.as_str());
            let alt = truncate_chars(prompt.trim(), MAX_ALT_CHARS);
            if alt.is_empty() {
                "Generated Image".to_string()
            } else {
                alt
            }
        }
        GenerationKind::ImageToImage => match request.source_image_url.as_deref() {
            Some(url) => format!("Generated image from {url}"),
            None => "Generated image".to_string(),
        },
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
