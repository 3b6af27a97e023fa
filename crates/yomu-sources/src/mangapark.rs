//! MangaPark. Each title is uploaded by several independent streams, which
//! are merged by the user's chapter source preference.

use anyhow::{Context, Result, anyhow};
use fancy_regex::Regex;
use once_cell::sync::Lazy;
use serde::Deserialize;
use yomu_engine::date::DateParser;
use yomu_lib::{
    adapter::{Adapter, CatalogKind, SourceStrategy},
    http::{Request, Response, absolute_url, with_query},
    models::{
        ChapterListing, ChapterSummary, Input, InputType, Lang, MangaSummary, PageRef,
        Preferences, RawChapter, SourceChapters, SourceInfo, Status,
    },
};

use crate::html;

pub const BASE_URL: &str = "https://mangapark.net";

const NEXT_PAGE: &str = ".paging:not(.order) > li:last-child > a";
const SOURCE_PREF: &str = "chapter_source";
const SOURCES: [&str; 8] = ["all", "most", "smart", "rock", "duck", "mini", "fox", "panda"];

static LOAD_PAGES: Lazy<Regex> = Lazy::new(|| Regex::new(r"var _load_pages = (\[.*\])").unwrap());

/// A select filter that becomes one query parameter.
struct UriSelect {
    name: &'static str,
    param: &'static str,
    values: &'static [(&'static str, &'static str)],
    /// Selecting the first value adds nothing to the query.
    first_is_unspecified: bool,
    default: i64,
}

const SELECTS: &[UriSelect] = &[
    UriSelect {
        name: "Sort",
        param: "orderby",
        values: &[
            ("a-z", "A-Z"),
            ("views_a", "Views all-time"),
            ("views_y", "Views last 365 days"),
            ("views_s", "Views last 180 days"),
            ("views_t", "Views last 90 days"),
            ("rating", "Rating"),
            ("update", "Latest"),
            ("create", "New manga"),
        ],
        first_is_unspecified: false,
        default: 1,
    },
    UriSelect {
        name: "Status",
        param: "status",
        values: &[("any", "Any"), ("completed", "Completed"), ("ongoing", "Ongoing")],
        first_is_unspecified: true,
        default: 0,
    },
    UriSelect {
        name: "Type",
        param: "types",
        values: &[
            ("any", "Any"),
            ("manga", "Japanese Manga"),
            ("manhwa", "Korean Manhwa"),
            ("manhua", "Chinese Manhua"),
            ("unknown", "Unknown"),
        ],
        first_is_unspecified: true,
        default: 0,
    },
];

const AUTHOR_FILTER: &str = "Author/Artist";

#[derive(Debug, Deserialize)]
struct LoadPage {
    u: String,
}

pub struct MangaPark {
    date: DateParser,
}

impl Default for MangaPark {
    fn default() -> Self {
        Self::new()
    }
}

impl MangaPark {
    pub fn new() -> Self {
        Self {
            date: DateParser::new(&["%b %d, %Y, %I:%M %p", "%b %d, %Y"]),
        }
    }

    fn search_params(query: Option<&str>, filters: &[Input], page: i64) -> Vec<(String, String)> {
        let mut params = vec![];
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            params.push(("q".to_string(), query.to_string()));
        }

        for filter in filters {
            match filter {
                Input::Text { name, state: Some(state) } if name == AUTHOR_FILTER && !state.is_empty() => {
                    params.push(("autart".to_string(), state.clone()));
                }
                Input::Select { name, state, .. } => {
                    let Some(select) = SELECTS.iter().find(|s| s.name == name) else {
                        continue;
                    };
                    let index = state.unwrap_or(select.default);
                    if index == 0 && select.first_is_unspecified {
                        continue;
                    }
                    if let Some((value, _)) = usize::try_from(index).ok().and_then(|i| select.values.get(i)) {
                        params.push((select.param.to_string(), value.to_string()));
                    }
                }
                _ => {}
            }
        }

        if page != 1 {
            params.push(("page".to_string(), page.to_string()));
        }
        params
    }

    fn parse_item(item: scraper::ElementRef<'_>) -> Result<Option<MangaSummary>> {
        let Some(cover) = html::select_first(item, ".cover")? else {
            return Ok(None);
        };

        let mut manga = MangaSummary::new(
            html::attr(cover, "href").unwrap_or_default(),
            html::attr(cover, "title").unwrap_or_default(),
        );
        manga.thumbnail_url = html::select_first(cover, "img")?
            .and_then(|img| html::attr(img, "src"))
            .map(|src| absolute_url(BASE_URL, &src));

        Ok(Some(manga))
    }

    fn parse_stream(&self, stream: scraper::ElementRef<'_>) -> Result<SourceChapters> {
        let name = html::text_of(stream, "i + span")?.unwrap_or_default();

        let mut chapters = vec![];
        for li in html::select_all(stream, ".volume .chapter li")? {
            let Some(link) = html::select_first(li, ".tit > a")? else {
                continue;
            };
            let href = html::attr(link, "href").unwrap_or_default();

            chapters.push(RawChapter {
                url: href.strip_suffix('1').unwrap_or(&href).to_string(),
                name: html::text(link),
                uploaded: html::text_of(li, ".time")?
                    .map(|date| self.date.parse(&date))
                    .unwrap_or(0),
            });
        }

        Ok(SourceChapters { name, chapters })
    }
}

impl Adapter for MangaPark {
    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            id: 401,
            name: "MangaPark".to_string(),
            url: BASE_URL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            icon: format!("{BASE_URL}/favicon.ico"),
            languages: Lang::Single("en".to_string()),
            nsfw: false,
        }
    }

    fn filter_list(&self) -> Vec<Input> {
        let mut filters = vec![Input::Text {
            name: AUTHOR_FILTER.to_string(),
            state: None,
        }];
        filters.extend(SELECTS.iter().map(|select| Input::Select {
            name: select.name.to_string(),
            values: select
                .values
                .iter()
                .map(|(_, label)| InputType::from(*label))
                .collect(),
            state: Some(select.default),
        }));
        filters
    }

    fn preference_list(&self) -> Vec<Input> {
        vec![Input::Select {
            name: SOURCE_PREF.to_string(),
            values: SOURCES.iter().map(|s| InputType::from(*s)).collect(),
            state: Some(0),
        }]
    }

    fn build_catalog_request(
        &self,
        kind: CatalogKind,
        page: i64,
        query: Option<&str>,
        filters: &[Input],
        _prefs: &Preferences,
    ) -> Result<Request> {
        let url = match kind {
            CatalogKind::Popular => format!("{BASE_URL}/search?orderby=views_a&page={page}"),
            CatalogKind::Latest if page > 1 => format!("{BASE_URL}/latest/{page}"),
            CatalogKind::Latest => format!("{BASE_URL}/latest"),
            CatalogKind::Search => {
                let params = Self::search_params(query, filters, page);
                let params: Vec<(&str, &str)> = params
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                with_query(&format!("{BASE_URL}/search"), &params)?
            }
        };

        Ok(Request::get(&url))
    }

    fn extract_catalog_items(&self, kind: CatalogKind, res: &Response) -> Result<Vec<MangaSummary>> {
        let doc = html::document(&res.text());
        let selector = match kind {
            CatalogKind::Latest => ".ls1 .item",
            _ => ".item",
        };

        let mut items = vec![];
        for item in html::select_all(doc.root_element(), selector)? {
            if let Some(manga) = Self::parse_item(item)? {
                items.push(manga);
            }
        }

        Ok(items)
    }

    fn has_next_page(&self, _kind: CatalogKind, res: &Response) -> Result<bool> {
        let doc = html::document(&res.text());
        html::exists(doc.root_element(), NEXT_PAGE)
    }

    fn build_detail_request(&self, manga: &MangaSummary, _prefs: &Preferences) -> Result<Option<Request>> {
        Ok(Some(Request::get(&absolute_url(BASE_URL, &manga.url))))
    }

    fn extract_detail(&self, manga: &MangaSummary, res: &Response) -> Result<MangaSummary> {
        let doc = html::document(&res.text());
        let root = doc.root_element();

        let mut detail = manga.clone();
        if let Some(cover) = html::select_first(root, ".cover > img")? {
            if let Some(title) = html::attr(cover, "title") {
                detail.title = title;
            }
            detail.thumbnail_url = html::attr(cover, "src")
                .map(|src| absolute_url(BASE_URL, &src))
                .or(detail.thumbnail_url);
        }

        for row in html::select_all(root, ".attr > tbody > tr")? {
            let Some(header) = html::text_of(row, "th")? else {
                continue;
            };
            let links = || -> Result<Vec<String>> {
                Ok(html::select_all(row, "a")?.into_iter().map(html::text).collect())
            };

            match header.to_lowercase().as_str() {
                "author(s)" => detail.author = Some(links()?.join(", ")),
                "artist(s)" => detail.artist = Some(links()?.join(", ")),
                "genre(s)" => detail.genres = links()?,
                "status" => detail.status = Status::parse(&html::text_of(row, "td")?.unwrap_or_default()),
                _ => {}
            }
        }

        detail.description = html::text_of(root, ".summary")?;
        Ok(detail)
    }

    fn build_chapter_list_request(
        &self,
        manga: &MangaSummary,
        _page: i64,
        _detail: Option<&Response>,
        _prefs: &Preferences,
    ) -> Result<Request> {
        Ok(Request::get(&absolute_url(BASE_URL, &manga.url)))
    }

    fn source_strategy(&self, prefs: &Preferences) -> SourceStrategy {
        SourceStrategy::parse(prefs.get_or(SOURCE_PREF, "all"))
    }

    fn extract_chapters(&self, _manga: &MangaSummary, res: &Response) -> Result<ChapterListing> {
        let doc = html::document(&res.text());
        let streams = html::select_all(doc.root_element(), "div[id^=stream]")?
            .into_iter()
            .map(|stream| self.parse_stream(stream))
            .collect::<Result<Vec<_>>>()?;

        Ok(ChapterListing::BySource(streams))
    }

    fn build_page_list_request(&self, chapter: &ChapterSummary, _prefs: &Preferences) -> Result<Request> {
        Ok(Request::get(&absolute_url(BASE_URL, &chapter.url)))
    }

    fn extract_pages(&self, _chapter: &ChapterSummary, res: &Response) -> Result<Vec<PageRef>> {
        let body = res.text();
        let json = LOAD_PAGES
            .captures(&body)?
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(|| anyhow!("_load_pages not found in {}", res.url))?;

        let pages: Vec<LoadPage> = serde_json::from_str(json).context("malformed _load_pages")?;
        Ok(pages
            .into_iter()
            .enumerate()
            .map(|(i, page)| {
                let url = match page.u.strip_prefix("//") {
                    Some(rest) => format!("https://{rest}"),
                    None => page.u,
                };
                PageRef::new(i, url)
            })
            .collect())
    }
}
