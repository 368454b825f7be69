//! MIME inference for the serving collaborator.

use std::path::Path;

/// MIME type from the file extension.
///
/// Anything unrecognized (including jpg/jpeg) serves as JPEG, matching what
/// the platform accepts for campaign imagery.
pub fn mime_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(mime_for_path(Path::new("a.png")), "image/png");
        assert_eq!(mime_for_path(Path::new("a.GIF")), "image/gif");
        assert_eq!(mime_for_path(Path::new("a.webp")), "image/webp");
    }

    #[test]
    fn test_default_is_jpeg() {
        assert_eq!(mime_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("a.bin")), "image/jpeg");
        assert_eq!(mime_for_path(Path::new("no_extension")), "image/jpeg");
    }
}
