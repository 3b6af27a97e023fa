use serde::{Deserialize, Serialize};

/// A type represent chapter, normalized across source
///
/// `chapter_number` is `-1.0` when unknown and may be synthetic when a source
/// does not number its chapters. `uploaded` is epoch milliseconds, `0` when
/// unknown.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ChapterSummary {
    pub url: String,
    pub manga_url: String,
    pub name: String,
    pub chapter_number: f64,
    pub uploaded: i64,
    pub scanlator: Option<String>,
}

/// A chapter exactly as one stream of a multi-source site lists it, before
/// numbering.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RawChapter {
    pub url: String,
    pub name: String,
    pub uploaded: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SourceChapters {
    pub name: String,
    pub chapters: Vec<RawChapter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChapterListing {
    Flat(Vec<ChapterSummary>),
    /// One list per upload stream, in the site's listing order.
    BySource(Vec<SourceChapters>),
}

impl ChapterListing {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Flat(chapters) => chapters.is_empty(),
            Self::BySource(sources) => sources.iter().all(|s| s.chapters.is_empty()),
        }
    }

    /// Appends the next page of a paginated listing. Streams are matched by
    /// name; a flat page appended to a per-source listing lands in an
    /// unnamed stream.
    pub fn extend(&mut self, next: ChapterListing) {
        match (self, next) {
            (Self::Flat(chapters), Self::Flat(more)) => chapters.extend(more),
            (Self::BySource(sources), Self::BySource(more)) => {
                for source in more {
                    match sources.iter_mut().find(|s| s.name == source.name) {
                        Some(existing) => existing.chapters.extend(source.chapters),
                        None => sources.push(source),
                    }
                }
            }
            (Self::Flat(chapters), Self::BySource(more)) => {
                chapters.extend(more.into_iter().flat_map(|source| {
                    let name = source.name;
                    source.chapters.into_iter().map(move |raw| ChapterSummary {
                        url: raw.url,
                        name: raw.name,
                        uploaded: raw.uploaded,
                        chapter_number: -1.0,
                        scanlator: Some(name.clone()),
                        ..Default::default()
                    })
                }))
            }
            (Self::BySource(sources), Self::Flat(more)) => sources.push(SourceChapters {
                name: String::new(),
                chapters: more
                    .into_iter()
                    .map(|c| RawChapter {
                        url: c.url,
                        name: c.name,
                        uploaded: c.uploaded,
                    })
                    .collect(),
            }),
        }
    }
}
