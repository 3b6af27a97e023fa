//! Sites running the Madara WordPress theme. They share one layout and differ
//! in a handful of settings captured by [`MadaraSite`].

use std::collections::HashMap;

use anyhow::{Context, Result, anyhow, bail};
use yomu_engine::{date::DateParser, numbering::parse_chapter_number};
use yomu_lib::{
    adapter::{Adapter, CatalogKind, ChapterOrder},
    http::{Request, Response, absolute_url},
    models::{
        ChapterListing, ChapterSummary, Input, Lang, MangaSummary, PageRef, Preferences,
        SourceInfo, Status,
    },
};

use crate::html;

#[derive(Debug, Clone, Copy)]
pub struct MadaraSite {
    pub id: i64,
    pub name: &'static str,
    pub url: &'static str,
    pub lang: &'static str,
    /// chrono format of absolute chapter dates.
    pub date_format: &'static str,
    /// Path of the popular listing, `{page}` is replaced by the page number.
    pub popular_path: &'static str,
    pub latest_path: &'static str,
    /// Appended to every search query.
    pub search_suffix: &'static str,
    pub next_page_selector: &'static str,
    pub chapter_selector: &'static str,
    /// Send the site url as Referer on every request.
    pub referer: bool,
    pub chapter_order: ChapterOrder,
}

impl MadaraSite {
    pub const DEFAULT: MadaraSite = MadaraSite {
        id: 0,
        name: "",
        url: "",
        lang: "en",
        date_format: "%B %d, %Y",
        popular_path: "/page/{page}/?s&post_type=wp-manga&m_orderby=views",
        latest_path: "/page/{page}/?s&post_type=wp-manga&m_orderby=latest",
        search_suffix: "",
        next_page_selector: "div.nav-previous, nav.navigation-ajax, a.nextpostslink",
        chapter_selector: "li.wp-manga-chapter",
        referer: false,
        chapter_order: ChapterOrder::NewestFirst,
    };
}

pub const SITES: &[MadaraSite] = &[
    MadaraSite {
        id: 101,
        name: "Mangasushi",
        url: "https://mangasushi.net",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 102,
        name: "ReadManhua",
        url: "https://readmanhua.net",
        date_format: "%d %b %y",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 103,
        name: "Just For Fun",
        url: "https://just-for-fun.ru",
        lang: "ru",
        date_format: "%y.%m.%d",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 104,
        name: "Tsubaki No Scan",
        url: "https://tsubakinoscan.com",
        lang: "fr",
        date_format: "%d/%m/%y",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 105,
        name: "1st Kiss",
        url: "https://1stkissmanga.com",
        date_format: "%d %b %Y",
        referer: true,
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 106,
        name: "WuxiaWorld",
        url: "https://wuxiaworld.site",
        popular_path: "/tag/webcomic/page/{page}/?m_orderby=views",
        latest_path: "/tag/webcomic/page/{page}/?m_orderby=latest",
        search_suffix: " comics",
        next_page_selector: "div.nav-previous.float-left",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 107,
        name: "Chibi Manga",
        url: "http://www.cmreader.info",
        date_format: "%Y-%m-%d",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 108,
        name: "Plot Twist No Fansub",
        url: "https://www.plotwistscan.com",
        lang: "es",
        chapter_order: ChapterOrder::OldestFirst,
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 109,
        name: "Toonily",
        url: "https://toonily.com",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 110,
        name: "Azora",
        url: "https://www.azoramanga.com",
        lang: "ar",
        popular_path: "/page/{page}/?m_orderby=views",
        chapter_selector: "li.wp-manga-chapter:not(.premium-block)",
        ..MadaraSite::DEFAULT
    },
    MadaraSite {
        id: 111,
        name: "MangaKomi",
        url: "https://mangakomi.com",
        date_format: "%m/%d/%Y",
        ..MadaraSite::DEFAULT
    },
];

pub struct Madara {
    site: MadaraSite,
    date: DateParser,
}

impl Madara {
    pub fn new(site: MadaraSite) -> Self {
        Self {
            date: DateParser::new(&[site.date_format]),
            site,
        }
    }

    fn listing_url(&self, path: &str, page: i64) -> String {
        format!("{}{}", self.site.url, path.replace("{page}", &page.to_string()))
    }

    fn manga_url(&self, url: &str) -> String {
        absolute_url(self.site.url, url)
    }

    fn parse_item(&self, item: scraper::ElementRef<'_>) -> Result<Option<MangaSummary>> {
        let link = match html::select_first(item, "div.post-title a")? {
            Some(link) => Some(link),
            None => html::select_first(item, "h3 a")?,
        };
        let Some(link) = link else {
            return Ok(None);
        };

        let mut manga = MangaSummary::new(
            html::attr(link, "href").unwrap_or_default(),
            html::text(link),
        );
        manga.thumbnail_url = html::select_first(item, "img")?.and_then(html::img_src);

        Ok(Some(manga))
    }

    fn parse_chapter(
        &self,
        manga: &MangaSummary,
        li: scraper::ElementRef<'_>,
    ) -> Result<Option<ChapterSummary>> {
        let Some(link) = html::select_first(li, "a")? else {
            return Ok(None);
        };
        let name = html::text(link);

        let date = match html::text_of(li, "span.chapter-release-date i")? {
            Some(date) => Some(date),
            // freshly released chapters show "2 hours ago" in a title attribute
            None => html::select_first(li, "span.chapter-release-date a[title], a[title]")?
                .and_then(|a| html::attr(a, "title")),
        };

        Ok(Some(ChapterSummary {
            url: html::attr(link, "href").unwrap_or_default(),
            manga_url: manga.url.clone(),
            chapter_number: parse_chapter_number(&name).unwrap_or(-1.0),
            uploaded: date.map(|d| self.date.parse(&d)).unwrap_or(0),
            name,
            scanlator: None,
        }))
    }
}

impl Adapter for Madara {
    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            id: self.site.id,
            name: self.site.name.to_string(),
            url: self.site.url.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            icon: format!("{}/favicon.ico", self.site.url),
            languages: Lang::Single(self.site.lang.to_string()),
            nsfw: false,
        }
    }

    fn headers(&self) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if self.site.referer {
            headers.insert("Referer".to_string(), self.site.url.to_string());
        }
        headers
    }

    fn build_catalog_request(
        &self,
        kind: CatalogKind,
        page: i64,
        query: Option<&str>,
        _filters: &[Input],
        _prefs: &Preferences,
    ) -> Result<Request> {
        let url = match kind {
            CatalogKind::Popular => self.listing_url(self.site.popular_path, page),
            CatalogKind::Latest => self.listing_url(self.site.latest_path, page),
            CatalogKind::Search => {
                let query = format!("{}{}", query.unwrap_or_default(), self.site.search_suffix);
                let query: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
                format!("{}/page/{page}/?s={query}&post_type=wp-manga", self.site.url)
            }
        };

        Ok(Request::get(&url))
    }

    fn extract_catalog_items(&self, _kind: CatalogKind, res: &Response) -> Result<Vec<MangaSummary>> {
        let doc = html::document(&res.text());
        let mut items = vec![];
        for item in html::select_all(doc.root_element(), "div.page-item-detail, div.c-tabs-item__content")? {
            if let Some(manga) = self.parse_item(item)? {
                items.push(manga);
            }
        }

        Ok(items)
    }

    fn has_next_page(&self, _kind: CatalogKind, res: &Response) -> Result<bool> {
        let doc = html::document(&res.text());
        html::exists(doc.root_element(), self.site.next_page_selector)
    }

    fn build_detail_request(&self, manga: &MangaSummary, _prefs: &Preferences) -> Result<Option<Request>> {
        Ok(Some(Request::get(&self.manga_url(&manga.url))))
    }

    fn extract_detail(&self, manga: &MangaSummary, res: &Response) -> Result<MangaSummary> {
        let doc = html::document(&res.text());
        let root = doc.root_element();

        let genres = html::select_all(root, "div.genres-content a")?
            .into_iter()
            .map(html::text)
            .filter(|g| !g.is_empty())
            .collect();

        let status = html::select_all(root, "div.post-status div.summary-content")?
            .into_iter()
            .map(html::text)
            .map(|s| Status::parse(&s))
            .find(|s| *s != Status::Unknown)
            .unwrap_or_default();

        Ok(MangaSummary {
            url: manga.url.clone(),
            title: html::text_of(root, "div.post-title h1")?.unwrap_or_else(|| manga.title.clone()),
            thumbnail_url: html::select_first(root, "div.summary_image img")?
                .and_then(html::img_src)
                .or_else(|| manga.thumbnail_url.clone()),
            author: html::text_of(root, "div.author-content a")?,
            artist: html::text_of(root, "div.artist-content a")?,
            genres,
            description: html::text_of(root, "div.description-summary div.summary__content")?,
            status,
        })
    }

    fn chapters_need_detail(&self) -> bool {
        true
    }

    fn build_chapter_list_request(
        &self,
        _manga: &MangaSummary,
        _page: i64,
        detail: Option<&Response>,
        _prefs: &Preferences,
    ) -> Result<Request> {
        let detail = detail.context("detail page missing")?;
        let doc = html::document(&detail.text());
        let holder = html::select_first(doc.root_element(), "div[id^=manga-chapters-holder]")?
            .ok_or_else(|| anyhow!("chapter holder not found"))?;
        let Some(id) = html::attr(holder, "data-id") else {
            bail!("chapter holder has no data-id");
        };

        Ok(
            Request::post(&format!("{}/wp-admin/admin-ajax.php", self.site.url))
                .form(&[("action", "manga_get_chapters"), ("manga", &id)]),
        )
    }

    fn chapter_order(&self) -> ChapterOrder {
        self.site.chapter_order
    }

    fn extract_chapters(&self, manga: &MangaSummary, res: &Response) -> Result<ChapterListing> {
        let doc = html::document(&res.text());
        let mut chapters = vec![];
        for li in html::select_all(doc.root_element(), self.site.chapter_selector)? {
            if let Some(chapter) = self.parse_chapter(manga, li)? {
                chapters.push(chapter);
            }
        }

        Ok(ChapterListing::Flat(chapters))
    }

    fn build_page_list_request(&self, chapter: &ChapterSummary, _prefs: &Preferences) -> Result<Request> {
        Ok(Request::get(&self.manga_url(&chapter.url)))
    }

    fn extract_pages(&self, _chapter: &ChapterSummary, res: &Response) -> Result<Vec<PageRef>> {
        let doc = html::document(&res.text());
        let referer = format!("{}/", self.site.url);

        Ok(html::select_all(doc.root_element(), "div.page-break img")?
            .into_iter()
            .filter_map(html::img_src)
            .enumerate()
            .map(|(i, url)| PageRef::new(i, url).with_header("Referer", &referer))
            .collect())
    }
}

pub fn all() -> Vec<Madara> {
    SITES.iter().map(|site| Madara::new(*site)).collect()
}
