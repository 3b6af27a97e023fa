//! Merging the per-stream chapter lists of multi-source sites into the one
//! list a user sees.

use std::collections::HashSet;

use itertools::Itertools;
use yomu_lib::{
    adapter::{ChapterOrder, SourceStrategy},
    models::{ChapterSummary, SourceChapters},
};

use crate::numbering::ChapterNumberer;

/// Numbers one stream oldest first and drops repeated numbers, keeping the
/// first. The result is oldest first.
pub fn number_stream(
    source: SourceChapters,
    order: ChapterOrder,
    manga_url: &str,
) -> Vec<ChapterSummary> {
    let mut raws = source.chapters;
    if order == ChapterOrder::NewestFirst {
        raws.reverse();
    }

    let mut numberer = ChapterNumberer::new();
    raws.into_iter()
        .map(|raw| ChapterSummary {
            chapter_number: numberer.next(&raw.name),
            url: raw.url,
            manga_url: manga_url.to_string(),
            name: raw.name,
            uploaded: raw.uploaded,
            scanlator: Some(source.name.clone()),
        })
        .unique_by(|c| c.chapter_number.to_bits())
        .collect()
}

fn numbers(chapters: &[ChapterSummary]) -> HashSet<u64> {
    chapters.iter().map(|c| c.chapter_number.to_bits()).collect()
}

/// Chapters of `all` whose number is not in `base`, first seen wins.
fn missing<'a>(
    base: &[ChapterSummary],
    all: impl Iterator<Item = &'a ChapterSummary>,
) -> Vec<ChapterSummary> {
    let known = numbers(base);
    all.filter(|c| !known.contains(&c.chapter_number.to_bits()))
        .unique_by(|c| c.chapter_number.to_bits())
        .cloned()
        .collect()
}

fn sorted_desc(chapters: Vec<ChapterSummary>) -> Vec<ChapterSummary> {
    chapters
        .into_iter()
        .sorted_by(|a, b| b.chapter_number.total_cmp(&a.chapter_number))
        .collect()
}

fn all(streams: &[Vec<ChapterSummary>]) -> Vec<ChapterSummary> {
    streams
        .iter()
        .flat_map(|stream| stream.iter().rev().cloned())
        .collect()
}

/// Builds the newest first list from streams numbered by [`number_stream`].
pub fn reconcile(streams: Vec<Vec<ChapterSummary>>, strategy: &SourceStrategy) -> Vec<ChapterSummary> {
    match strategy {
        SourceStrategy::All => all(&streams),
        SourceStrategy::Most => {
            let mut longest: Option<&Vec<ChapterSummary>> = None;
            for stream in &streams {
                if longest.is_none_or(|l| stream.len() > l.len()) {
                    longest = Some(stream);
                }
            }
            let Some(base) = longest else {
                return vec![];
            };

            let mut chapters = base.clone();
            chapters.extend(missing(base, streams.iter().flatten()));
            sorted_desc(chapters)
        }
        SourceStrategy::Smart => sorted_desc(
            streams
                .iter()
                .flatten()
                .unique_by(|c| c.chapter_number.to_bits())
                .cloned()
                .collect(),
        ),
        SourceStrategy::Prefer(name) => {
            let name = name.to_lowercase();
            let preferred: Vec<ChapterSummary> = streams
                .iter()
                .flatten()
                .filter(|c| {
                    c.scanlator
                        .as_deref()
                        .is_some_and(|s| s.to_lowercase().contains(&name))
                })
                .cloned()
                .collect();

            if preferred.is_empty() {
                debug!("no chapters from stream {name}, listing every stream");
                return all(&streams);
            }

            let mut chapters = preferred.clone();
            chapters.extend(missing(&preferred, streams.iter().flatten()));
            sorted_desc(chapters)
        }
    }
}

#[cfg(test)]
mod test {
    use yomu_lib::models::RawChapter;

    use super::*;

    fn stream(name: &str, chapters: &[&str]) -> SourceChapters {
        SourceChapters {
            name: name.to_string(),
            chapters: chapters
                .iter()
                .map(|c| RawChapter {
                    url: format!("/{name}/{c}"),
                    name: c.to_string(),
                    uploaded: 0,
                })
                .collect(),
        }
    }

    fn numbered(sources: Vec<SourceChapters>) -> Vec<Vec<ChapterSummary>> {
        sources
            .into_iter()
            .map(|s| number_stream(s, ChapterOrder::NewestFirst, "/manga"))
            .collect()
    }

    fn summary(chapters: &[ChapterSummary]) -> Vec<(f64, String)> {
        chapters
            .iter()
            .map(|c| (c.chapter_number, c.scanlator.clone().unwrap_or_default()))
            .collect()
    }

    fn fixture() -> Vec<Vec<ChapterSummary>> {
        // listed newest first, as on the site
        numbered(vec![
            stream("Rock", &["Ch.3", "Ch.2", "Ch.1"]),
            stream("Duck", &["Ch.5", "Ch.4", "Ch.3", "Ch.2"]),
        ])
    }

    #[test]
    fn test_number_stream_dedupes() {
        let chapters = number_stream(
            stream("Fox", &["Ch.2", "Ch.2", "Ch.1"]),
            ChapterOrder::NewestFirst,
            "/m",
        );
        assert_eq!(
            chapters.iter().map(|c| c.chapter_number).collect::<Vec<_>>(),
            vec![1.0, 2.0]
        );
        assert_eq!(chapters[0].manga_url, "/m");
    }

    #[test]
    fn test_all() {
        let chapters = reconcile(fixture(), &SourceStrategy::All);
        assert_eq!(
            summary(&chapters),
            vec![
                (3.0, "Rock".to_string()),
                (2.0, "Rock".to_string()),
                (1.0, "Rock".to_string()),
                (5.0, "Duck".to_string()),
                (4.0, "Duck".to_string()),
                (3.0, "Duck".to_string()),
                (2.0, "Duck".to_string()),
            ]
        );
    }

    #[test]
    fn test_most() {
        let chapters = reconcile(fixture(), &SourceStrategy::Most);
        assert_eq!(
            summary(&chapters),
            vec![
                (5.0, "Duck".to_string()),
                (4.0, "Duck".to_string()),
                (3.0, "Duck".to_string()),
                (2.0, "Duck".to_string()),
                (1.0, "Rock".to_string()),
            ]
        );
    }

    #[test]
    fn test_most_prefers_first_on_ties() {
        let streams = numbered(vec![stream("Mini", &["Ch.2", "Ch.1"]), stream("Panda", &["Ch.3", "Ch.2"])]);
        let chapters = reconcile(streams, &SourceStrategy::Most);
        assert_eq!(
            summary(&chapters),
            vec![
                (3.0, "Panda".to_string()),
                (2.0, "Mini".to_string()),
                (1.0, "Mini".to_string()),
            ]
        );
    }

    #[test]
    fn test_smart() {
        let chapters = reconcile(fixture(), &SourceStrategy::Smart);
        assert_eq!(
            summary(&chapters),
            vec![
                (5.0, "Duck".to_string()),
                (4.0, "Duck".to_string()),
                (3.0, "Rock".to_string()),
                (2.0, "Rock".to_string()),
                (1.0, "Rock".to_string()),
            ]
        );
    }

    #[test]
    fn test_prefer() {
        let chapters = reconcile(fixture(), &SourceStrategy::Prefer("rock".to_string()));
        assert_eq!(
            summary(&chapters),
            vec![
                (5.0, "Duck".to_string()),
                (4.0, "Duck".to_string()),
                (3.0, "Rock".to_string()),
                (2.0, "Rock".to_string()),
                (1.0, "Rock".to_string()),
            ]
        );
    }

    #[test]
    fn test_prefer_falls_back_to_all() {
        let chapters = reconcile(fixture(), &SourceStrategy::Prefer("fox".to_string()));
        assert_eq!(chapters, reconcile(fixture(), &SourceStrategy::All));
    }

    #[test]
    fn test_empty() {
        assert!(reconcile(vec![], &SourceStrategy::Most).is_empty());
        assert!(reconcile(vec![], &SourceStrategy::Smart).is_empty());
    }
}
