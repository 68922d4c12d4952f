/// Extensions recognized as videos, with the MIME type served for each.
///
/// Matching is case-sensitive: `clip.MP4` is not a video.
pub const VIDEO_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("mkv", "video/x-matroska"),
    ("webm", "video/webm"),
];

/// Return the MIME type for a video file name, or `None` if the extension is
/// not one of [`VIDEO_TYPES`]. A bare `.mp4` counts: the whole name is the
/// suffix.
pub fn video_mime(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    VIDEO_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
}

pub fn is_video(name: &str) -> bool {
    video_mime(name).is_some()
}
