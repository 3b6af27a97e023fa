use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Unknown,
    Ongoing,
    Completed,
    Licensed,
}

impl Status {
    /// Maps the status wording sites commonly use.
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_lowercase();
        if s.contains("ongoing") || s.contains("on going") || s.contains("publishing") {
            Self::Ongoing
        } else if s.contains("complete") || s.contains("finished") || s.contains("ended") {
            Self::Completed
        } else if s.contains("licensed") {
            Self::Licensed
        } else {
            Self::Unknown
        }
    }
}

/// A manga as listed by a source. `url` is its identity within the source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MangaSummary {
    pub url: String,
    pub title: String,
    pub thumbnail_url: Option<String>,
    pub author: Option<String>,
    pub artist: Option<String>,
    pub genres: Vec<String>,
    pub description: Option<String>,
    pub status: Status,
}

impl MangaSummary {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            ..Default::default()
        }
    }
}
