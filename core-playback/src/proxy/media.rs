//! Request path and media type helpers.

/// Split a request file name into `(remote_id, extension)`.
///
/// The extension keeps its leading dot and may be empty. Returns `None` when
/// no remote id remains.
pub fn split_file_name(file: &str) -> Option<(&str, &str)> {
    let (id, extension) = match file.rfind('.') {
        Some(dot) => file.split_at(dot),
        None => (file, ""),
    };

    if id.is_empty() {
        return None;
    }
    Some((id, extension))
}

/// Content type for a cached file's extension.
pub fn content_type_for(extension: &str) -> &'static str {
    match extension
        .trim_start_matches('.')
        .to_ascii_lowercase()
        .as_str()
    {
        "mp3" => "audio/mpeg",
        "flac" => "audio/flac",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "wav" => "audio/wav",
        "wma" => "audio/x-ms-wma",
        "aif" | "aiff" => "audio/aiff",
        _ => "application/octet-stream",
    }
}
