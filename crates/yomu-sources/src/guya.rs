//! Guya, a JSON API with per-chapter scanlator groups.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use anyhow::{Context, Result, anyhow};
use itertools::Itertools;
use serde::Deserialize;
use yomu_engine::{
    fetch::Transport,
    scanlator::{HttpScanlatorLoader, ScanlatorCache, ScanlatorMap, select_best_group},
};
use yomu_lib::{
    adapter::{Adapter, CatalogKind, SearchMode, unsupported},
    http::{Request, Response},
    models::{
        ChapterListing, ChapterSummary, Input, InputType, Lang, MangaSummary, PageRef,
        Preferences, SourceInfo,
    },
};

pub const BASE_URL: &str = "https://guya.moe";

const SCANLATOR_PREF: &str = "preferred_scanlator";
const SLUG_PREFIX: &str = "slug:";

#[derive(Debug, Deserialize)]
struct Series {
    slug: String,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    artist: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    cover: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesChapters {
    slug: String,
    #[serde(default)]
    preferred_sort: Vec<String>,
    chapters: HashMap<String, Chapter>,
}

#[derive(Debug, Deserialize)]
struct Chapter {
    #[serde(default)]
    title: String,
    folder: String,
    groups: HashMap<String, Vec<String>>,
    #[serde(default)]
    release_date: HashMap<String, i64>,
    #[serde(default)]
    preferred_sort: Option<Vec<String>>,
}

fn parse_groups(res: &Response) -> Result<ScanlatorMap> {
    Ok(res.json::<ScanlatorMap>()?)
}

pub struct Guya {
    scanlators: ScanlatorCache,
    /// Group picked by the last chapter list request's preferences.
    preferred: RwLock<Option<String>>,
    /// Slug of the last `slug:` search request.
    slug: RwLock<Option<String>>,
}

impl Guya {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        let loader = HttpScanlatorLoader::new(
            transport,
            Request::get(&format!("{BASE_URL}/api/get_all_groups/")),
            parse_groups,
        );

        Self {
            scanlators: ScanlatorCache::new(Arc::new(loader)),
            preferred: RwLock::new(None),
            slug: RwLock::new(None),
        }
    }

    pub fn scanlators(&self) -> &ScanlatorCache {
        &self.scanlators
    }

    fn preferred(&self) -> Option<String> {
        match self.preferred.read() {
            Ok(preferred) => preferred.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn set_preferred(&self, prefs: &Preferences) {
        let preferred = prefs
            .get(SCANLATOR_PREF)
            .map(|p| self.scanlators.key_for_name(p));
        match self.preferred.write() {
            Ok(mut current) => *current = preferred,
            Err(poisoned) => *poisoned.into_inner() = preferred,
        }
    }

    fn set_slug(&self, slug: Option<String>) {
        match self.slug.write() {
            Ok(mut current) => *current = slug,
            Err(poisoned) => *poisoned.into_inner() = slug,
        }
    }

    fn slug(&self) -> Option<String> {
        match self.slug.read() {
            Ok(slug) => slug.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn series(&self, res: &Response) -> Result<Vec<(String, Series)>> {
        let all: HashMap<String, Series> = res.json()?;
        Ok(all
            .into_iter()
            .sorted_by(|(a, _), (b, _)| a.cmp(b))
            .collect())
    }

    fn to_manga(title: String, series: Series) -> MangaSummary {
        MangaSummary {
            url: series.slug,
            title,
            thumbnail_url: series.cover.map(|cover| format!("{BASE_URL}/{cover}")),
            author: series.author,
            artist: series.artist,
            description: series.description,
            ..Default::default()
        }
    }
}

impl Adapter for Guya {
    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            id: 301,
            name: "Guya".to_string(),
            url: BASE_URL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            icon: format!("{BASE_URL}/static/logo_small.png"),
            languages: Lang::Single("en".to_string()),
            nsfw: false,
        }
    }

    fn preference_list(&self) -> Vec<Input> {
        let keys = self.scanlators.keys();
        let state = keys.iter().position(|k| k == "1").map(|i| i as i64);
        vec![Input::Select {
            name: SCANLATOR_PREF.to_string(),
            values: keys
                .into_iter()
                .map(|key| InputType::State {
                    name: self.scanlators.display_name(&key),
                    selected: None,
                })
                .collect(),
            state,
        }]
    }

    fn search_mode(&self) -> SearchMode {
        SearchMode::ClientSide
    }

    fn is_exact_query(&self, query: &str) -> bool {
        query.starts_with(SLUG_PREFIX)
    }

    fn build_catalog_request(
        &self,
        kind: CatalogKind,
        _page: i64,
        query: Option<&str>,
        _filters: &[Input],
        _prefs: &Preferences,
    ) -> Result<Request> {
        let slug = match kind {
            CatalogKind::Search => query
                .and_then(|q| q.strip_prefix(SLUG_PREFIX))
                .map(|slug| slug.trim().to_string()),
            _ => None,
        };
        self.set_slug(slug);

        match kind {
            CatalogKind::Popular | CatalogKind::Search => {
                Ok(Request::get(&format!("{BASE_URL}/api/get_all_series/")))
            }
            CatalogKind::Latest => Err(unsupported(kind, "Guya")),
        }
    }

    fn extract_catalog_items(&self, kind: CatalogKind, res: &Response) -> Result<Vec<MangaSummary>> {
        let slug = match kind {
            CatalogKind::Search => self.slug(),
            _ => None,
        };

        Ok(self
            .series(res)?
            .into_iter()
            .filter(|(_, series)| slug.as_ref().is_none_or(|slug| &series.slug == slug))
            .map(|(title, series)| Self::to_manga(title, series))
            .collect())
    }

    fn build_detail_request(&self, _manga: &MangaSummary, _prefs: &Preferences) -> Result<Option<Request>> {
        Ok(Some(Request::get(&format!("{BASE_URL}/api/get_all_series/"))))
    }

    fn extract_detail(&self, manga: &MangaSummary, res: &Response) -> Result<MangaSummary> {
        self.series(res)?
            .into_iter()
            .find(|(_, series)| series.slug == manga.url)
            .map(|(title, series)| Self::to_manga(title, series))
            .ok_or_else(|| anyhow!("series {} not found", manga.url))
    }

    fn build_chapter_list_request(
        &self,
        manga: &MangaSummary,
        _page: i64,
        _detail: Option<&Response>,
        prefs: &Preferences,
    ) -> Result<Request> {
        self.set_preferred(prefs);
        Ok(Request::get(&format!("{BASE_URL}/api/series/{}/", manga.url)))
    }

    fn extract_chapters(&self, manga: &MangaSummary, res: &Response) -> Result<ChapterListing> {
        let series: SeriesChapters = res.json()?;
        let preferred = self.preferred();

        let chapters = series
            .chapters
            .iter()
            .filter(|(_, chapter)| !chapter.groups.is_empty())
            .map(|(num, chapter)| {
                let candidates: Vec<&str> = chapter.groups.keys().map(String::as_str).sorted().collect();
                let ranked: Vec<&str> = chapter
                    .preferred_sort
                    .as_ref()
                    .unwrap_or(&series.preferred_sort)
                    .iter()
                    .map(String::as_str)
                    .collect();
                let group = select_best_group(&candidates, &ranked, preferred.as_deref());

                ChapterSummary {
                    url: format!("{}/{num}/{group}", series.slug),
                    manga_url: manga.url.clone(),
                    name: format!("{num} - {}", chapter.title),
                    chapter_number: num.parse().unwrap_or(-1.0),
                    uploaded: chapter.release_date.get(group).copied().unwrap_or_default() * 1000,
                    scanlator: Some(self.scanlators.display_name(group)),
                }
            })
            .sorted_by(|a, b| b.chapter_number.total_cmp(&a.chapter_number))
            .collect();

        Ok(ChapterListing::Flat(chapters))
    }

    fn build_page_list_request(&self, chapter: &ChapterSummary, _prefs: &Preferences) -> Result<Request> {
        let slug = chapter
            .url
            .split('/')
            .next()
            .filter(|s| !s.is_empty())
            .context("chapter url has no series")?;
        Ok(Request::get(&format!("{BASE_URL}/api/series/{slug}/")))
    }

    fn extract_pages(&self, chapter: &ChapterSummary, res: &Response) -> Result<Vec<PageRef>> {
        let series: SeriesChapters = res.json()?;
        let Some((_, num, group)) = chapter.url.splitn(3, '/').collect_tuple() else {
            return Err(anyhow!("malformed chapter url {}", chapter.url));
        };

        let entry = series
            .chapters
            .get(num)
            .ok_or_else(|| anyhow!("chapter {num} not found"))?;
        let files = entry
            .groups
            .get(group)
            .ok_or_else(|| anyhow!("chapter {num} has no pages from group {group}"))?;

        Ok(files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                PageRef::new(
                    i,
                    format!(
                        "{BASE_URL}/media/manga/{}/chapters/{}/{group}/{file}",
                        series.slug, entry.folder
                    ),
                )
            })
            .collect())
    }
}
