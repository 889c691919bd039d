use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};

/// A canonical YouTube video identifier: exactly 11 characters of
/// `[a-zA-Z0-9_-]`. Only produced by [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolve a user-supplied reference into a [`VideoId`].
///
/// Accepts a raw 11-character id unchanged, or extracts the id from the
/// recognized URL shapes (`watch?v=`, `/embed/`, `/v/`, `/shorts/`, `/live/`,
/// `youtu.be/<id>`, playlist-qualified watch URLs). Purely syntactic — no
/// network access.
pub fn resolve(input: &str) -> Result<VideoId> {
    let trimmed = input.trim();

    if is_raw_id(trimmed) {
        return Ok(VideoId(trimmed.to_string()));
    }

    if let Some(id) = parse_url(trimmed).as_ref().and_then(id_from_url) {
        return Ok(VideoId(id));
    }

    Err(Error::InvalidReference(input.to_string()))
}

fn is_raw_id(s: &str) -> bool {
    s.len() == 11
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Parse as URL, tolerating scheme-less references like
/// `youtube.com/watch?v=...`.
fn parse_url(s: &str) -> Option<Url> {
    if let Ok(u) = Url::parse(s) {
        return Some(u);
    }
    Url::parse(&format!("https://{s}")).ok()
}

fn is_youtube_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "youtube.com" || h == "youtu.be" || h.ends_with(".youtube.com")
}

fn id_from_url(u: &Url) -> Option<String> {
    let host = u.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }

    // youtu.be/<id>
    if host.eq_ignore_ascii_case("youtu.be") {
        let seg = u.path_segments()?.next()?;
        return checked(seg);
    }

    // youtube.com/watch?v=<id>, including playlist-qualified watch URLs
    if u.path().starts_with("/watch") {
        for (k, v) in u.query_pairs() {
            if k == "v" {
                return checked(&v);
            }
        }
        return None;
    }

    // youtube.com/{embed,v,shorts,live}/<id>
    let mut segs = u.path_segments()?;
    let first = segs.next()?;
    if matches!(first, "embed" | "v" | "shorts" | "live") {
        return checked(segs.next()?);
    }

    None
}

/// Enforce the 11-character invariant on an extracted candidate.
fn checked(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    is_raw_id(candidate).then(|| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "dQw4w9WgXcQ";

    #[test]
    fn test_raw_id_passes_through() {
        assert_eq!(resolve(ID).unwrap().as_str(), ID);
    }

    #[test]
    fn test_raw_id_with_surrounding_whitespace() {
        assert_eq!(resolve("  dQw4w9WgXcQ\n").unwrap().as_str(), ID);
    }

    #[test]
    fn test_watch_url() {
        let input = format!("https://www.youtube.com/watch?v={ID}");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_playlist_qualified_watch_url() {
        let input = format!("https://www.youtube.com/watch?v={ID}&list=PLx0sYbCqOb8TBPRdmBHs5Iftvv9TPboYG&index=3");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_embed_url() {
        let input = format!("https://www.youtube.com/embed/{ID}");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_v_url() {
        let input = format!("https://youtube.com/v/{ID}");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_shorts_url() {
        let input = format!("https://www.youtube.com/shorts/{ID}");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_short_link() {
        let input = format!("https://youtu.be/{ID}");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_short_link_with_timestamp_query() {
        let input = format!("https://youtu.be/{ID}?t=42");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_schemeless_watch_url() {
        let input = format!("youtube.com/watch?v={ID}");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_mobile_host() {
        let input = format!("https://m.youtube.com/watch?v={ID}");
        assert_eq!(resolve(&input).unwrap().as_str(), ID);
    }

    #[test]
    fn test_rejects_empty() {
        assert!(matches!(resolve(""), Err(Error::InvalidReference(_))));
    }

    #[test]
    fn test_rejects_wrong_length_id() {
        assert!(resolve("dQw4w9WgXc").is_err());
        assert!(resolve("dQw4w9WgXcQQ").is_err());
    }

    #[test]
    fn test_rejects_invalid_characters() {
        assert!(resolve("dQw4w9WgXc!").is_err());
    }

    #[test]
    fn test_rejects_non_youtube_host() {
        assert!(resolve("https://vimeo.com/watch?v=dQw4w9WgXcQ").is_err());
    }

    #[test]
    fn test_rejects_watch_url_with_bad_id() {
        assert!(resolve("https://www.youtube.com/watch?v=tooShort").is_err());
    }
}
