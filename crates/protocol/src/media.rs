use crate::messages::{MediaInformation, StreamType};

/// Content type used when the URL has no recognizable extension.
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

/// Guesses the MIME type of a media URL from its path extension.
pub fn content_type_for_url(url: &str) -> &'static str {
    // Strip query and fragment before looking at the extension.
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    let Some((_, ext)) = file.rsplit_once('.') else {
        return DEFAULT_CONTENT_TYPE;
    };

    match ext.to_ascii_lowercase().as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "flac" => "audio/flac",
        "wav" => "audio/wav",
        "ogg" | "oga" => "audio/ogg",
        "m3u8" => "application/x-mpegURL",
        "mpd" => "application/dash+xml",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Builds the `LOAD` media description for a URL.
pub fn media_for_url(url: &str) -> MediaInformation {
    MediaInformation {
        content_id: url.to_string(),
        content_type: content_type_for_url(url).to_string(),
        stream_type: StreamType::Buffered,
    }
}
