/// Derives the destination filename from a URL.
///
/// Returns the substring after the last `/`, matching how the server-side
/// path component names the file. A URL with a trailing slash yields an
/// empty name, which later fails at file creation.
pub fn filename_from_url(url: &str) -> &str {
    match url.rfind('/') {
        Some(pos) => &url[pos + 1..],
        None => url,
    }
}
