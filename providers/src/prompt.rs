//! Prompt composition and image payload encoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// Style directive appended to every generation prompt
pub const STYLE_SUFFIX: &str =
    "Cinematic horror short, dark moody lighting, film grain, vertical 9:16 framing, slow unsettling camera movement";

/// Compose the provider prompt from a scene's visual description and narration.
///
/// Blank parts are skipped. The result is truncated on a char boundary to
/// `max_chars` when a provider limits prompt length.
pub fn compose_prompt(visual_description: &str, narration: &str, max_chars: Option<usize>) -> String {
    let visual = visual_description.trim().trim_end_matches('.');
    let narration = narration.trim().trim_end_matches('.');

    let mut parts = Vec::with_capacity(3);
    if !visual.is_empty() {
        parts.push(format!("{visual}."));
    }
    if !narration.is_empty() {
        parts.push(format!("Narration: {narration}."));
    }
    parts.push(STYLE_SUFFIX.to_string());

    let prompt = parts.join(" ");
    match max_chars {
        Some(limit) => truncate_chars(&prompt, limit),
        None => prompt,
    }
}

/// Truncate to at most `limit` characters without splitting a code point
pub fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

/// Standard base64 of the raw image bytes
pub fn encode_image(image: &[u8]) -> String {
    STANDARD.encode(image)
}

/// `data:` URI carrying the image inline
pub fn image_data_uri(image: &[u8], mime: &str) -> String {
    format!("data:{};base64,{}", mime, encode_image(image))
}

/// Guess an image MIME type from a file name
pub fn mime_for_path(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else {
        "image/png"
    }
}
