//! Filename and MIME helpers shared by both fetchers.

use std::path::Path;

/// Extension used when neither the content type nor the URL tells us better.
pub const FALLBACK_EXT: &str = ".bin";

/// MIME type reported for files whose container we do not recognize.
pub const FALLBACK_MIME: &str = "application/octet-stream";

const MIME_EXTENSIONS: &[(&str, &str)] = &[
    ("video/mp4", ".mp4"),
    ("video/webm", ".webm"),
    ("video/ogg", ".ogv"),
    ("video/quicktime", ".mov"),
];

const URL_EXTENSIONS: &[&str] = &[".mp4", ".webm", ".mkv", ".mov", ".ogv"];

const CONTAINER_MIMES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mov", "video/quicktime"),
];

/// Picks the extension for a downloaded payload.
///
/// The declared content type wins when it is one of the known video types
/// (parameters such as `; codecs=...` are ignored). Otherwise the URL path's
/// suffix is matched case-insensitively, and `.bin` is the last resort.
pub fn guess_ext(content_type: &str, url_path: &str) -> String {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if let Some((_, ext)) = MIME_EXTENSIONS.iter().find(|(mime, _)| *mime == essence) {
        return (*ext).to_string();
    }

    let lowered = url_path.to_ascii_lowercase();
    URL_EXTENSIONS
        .iter()
        .find(|ext| lowered.ends_with(*ext))
        .map(|ext| (*ext).to_string())
        .unwrap_or_else(|| FALLBACK_EXT.to_string())
}

/// MIME type for a file produced by the extractor, keyed on its extension.
pub fn mime_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext {
        Some(ext) => CONTAINER_MIMES
            .iter()
            .find(|(known, _)| *known == ext)
            .map(|(_, mime)| *mime)
            .unwrap_or(FALLBACK_MIME),
        None => FALLBACK_MIME,
    }
}

/// True when a `Content-Type` header value announces video content.
pub fn is_video(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("video/"))
}

/// Random, collision-free file name for a direct download.
pub fn unique_name(ext: &str) -> String {
    format!("{}{}", uuid::Uuid::new_v4().simple(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn guess_ext_ignores_content_type_parameters() {
        assert_eq!(guess_ext("video/mp4; codecs=\"avc1.42E01E\"", "/x"), ".mp4");
        assert_eq!(guess_ext(" Video/QuickTime ", "/x"), ".mov");
        assert_eq!(guess_ext("video/ogg", "/clip.webm"), ".ogv");
    }

    #[test]
    fn guess_ext_falls_back_to_url_suffix() {
        assert_eq!(guess_ext("", "/path/movie.webm"), ".webm");
        assert_eq!(guess_ext("video/x-matroska", "/path/MOVIE.MKV"), ".mkv");
        assert_eq!(guess_ext("application/octet-stream", "/a/b.mov"), ".mov");
    }

    #[test]
    fn guess_ext_defaults_to_bin() {
        assert_eq!(guess_ext("", "/path/unknown"), FALLBACK_EXT);
        assert_eq!(guess_ext("video/x-flv", "/path/movie.mp4.part"), FALLBACK_EXT);
    }

    #[test]
    fn mime_for_path_maps_known_containers() {
        assert_eq!(mime_for_path(&PathBuf::from("/lib/abc.mp4")), "video/mp4");
        assert_eq!(mime_for_path(&PathBuf::from("/lib/abc.WEBM")), "video/webm");
        assert_eq!(mime_for_path(&PathBuf::from("abc.mov")), "video/quicktime");
        assert_eq!(mime_for_path(&PathBuf::from("abc.mkv")), FALLBACK_MIME);
        assert_eq!(mime_for_path(&PathBuf::from("abc")), FALLBACK_MIME);
    }

    #[test]
    fn is_video_checks_prefix_case_insensitively() {
        assert!(is_video("video/mp4"));
        assert!(is_video("VIDEO/webm; charset=binary"));
        assert!(!is_video("text/html"));
        assert!(!is_video("vid"));
        assert!(!is_video(""));
    }

    #[test]
    fn unique_name_is_hex_token_plus_extension() {
        let first = unique_name(".mp4");
        let second = unique_name(".mp4");
        assert_ne!(first, second);
        let token = first.strip_suffix(".mp4").unwrap();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
