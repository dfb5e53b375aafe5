use serde::Serialize;
use url::Url;

/// A track discovered on its own page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackRef {
    /// `Artist/Title` taken from the canonical page path
    pub id: String,
    pub title: String,
    /// Credited artists in page order
    pub artists: Vec<String>,
    pub source_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_year: Option<u16>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub producers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_link: Option<String>,
}

impl TrackRef {
    /// Creates a track with only the required fields set
    pub fn new(id: impl Into<String>, title: impl Into<String>, source_url: &Url) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artists: Vec::new(),
            source_url: source_url.to_string(),
            album: None,
            record_label: None,
            release_year: None,
            producers: Vec::new(),
            youtube_link: None,
        }
    }
}

/// Derives a track id from a track page URL
///
/// The id is the last two non-empty path segments joined with `/`, so
/// `https://www.example.com/Daft-Punk/Veridis-Quo/` becomes
/// `Daft-Punk/Veridis-Quo`. Returns None for shorter paths.
pub fn track_id_from_url(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();

    match segments.as_slice() {
        [.., artist, title] => Some(format!("{}/{}", artist, title)),
        _ => None,
    }
}
