//! 漫画堆. Chapter image lists are AES-CBC encrypted inside the reader page.

use anyhow::{Result, anyhow};
use fancy_regex::Regex;
use once_cell::sync::Lazy;
use yomu_codec::cipher::decrypt_block_to_string;
use yomu_engine::numbering::parse_chapter_number;
use yomu_lib::{
    adapter::{Adapter, CatalogKind, ChapterOrder},
    http::{Request, Response, absolute_url, with_query},
    models::{
        ChapterListing, ChapterSummary, Input, InputType, Lang, MangaSummary, PageRef,
        Preferences, SourceInfo,
    },
};

use crate::html;

pub const BASE_URL: &str = "https://www.manhuadai.com";
const MOBILE_URL: &str = "https://m.manhuadai.com";
const IMAGE_SERVER: &str = "https://mhcdn.manhuazj.com";
const DMZJ_PREFIX: &str = "http://images.dmzj.com";
const DMZJ_PROXY: &str = "https://img01.eshanyao.com/showImage.php?url=";

const KEY: &[u8] = b"KA58ZAQ321oobbG8";
const IV: &[u8] = b"A1B2C3DEF1G321o8";

static CHAPTER_IMAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"var chapterImages =\s*"(.*?)";"#).unwrap());
static CHAPTER_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"var chapterPath =\s*"(.*?)";"#).unwrap());

/// Category filters, joined with `-` into the listing path. The first value
/// of each is "all" and adds nothing.
const FILTERS: &[(&str, &[(&str, &str)])] = &[
    (
        "按类型",
        &[
            ("全部", ""),
            ("儿童漫画", "ertong"),
            ("少年漫画", "shaonian"),
            ("少女漫画", "shaonv"),
            ("青年漫画", "qingnian"),
        ],
    ),
    (
        "按地区",
        &[
            ("全部", ""),
            ("日本", "riben"),
            ("大陆", "dalu"),
            ("香港", "hongkong"),
            ("台湾", "taiwan"),
            ("欧美", "oumei"),
            ("韩国", "hanguo"),
            ("其他", "qita"),
        ],
    ),
    (
        "按剧情",
        &[
            ("全部", ""),
            ("热血", "rexue"),
            ("冒险", "maoxian"),
            ("玄幻", "xuanhuan"),
            ("搞笑", "gaoxiao"),
            ("恋爱", "lianai"),
            ("宠物", "chongwu"),
            ("新作", "xinzuo"),
        ],
    ),
    ("按进度", &[("全部", ""), ("已完结", "wanjie"), ("连载中", "lianzai")]),
];

#[derive(Default)]
pub struct Manhuadui;

impl Manhuadui {
    pub fn new() -> Self {
        Self
    }

    fn filter_path(filters: &[Input]) -> String {
        filters
            .iter()
            .filter_map(|filter| match filter {
                Input::Select {
                    name,
                    state: Some(index),
                    ..
                } => {
                    let (_, values) = FILTERS.iter().find(|(n, _)| n == name)?;
                    let (_, part) = values.get(usize::try_from(*index).ok()?)?;
                    Some(*part)
                }
                _ => None,
            })
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }

    fn https(src: String) -> String {
        if src.contains("http") {
            src
        } else {
            format!("https:{src}")
        }
    }

    fn parse_item(item: scraper::ElementRef<'_>) -> Result<Option<MangaSummary>> {
        if let Some(link) = html::select_first(item, "a.comic_img")? {
            let img = html::select_first(link, "img")?;
            let mut manga = MangaSummary::new(
                html::attr(link, "href").unwrap_or_default(),
                img.and_then(|img| html::attr(img, "alt")).unwrap_or_default(),
            );
            manga.thumbnail_url = img.and_then(|img| html::attr(img, "src")).map(Self::https);
            // "作者：" prefix
            manga.author = html::text_of(item, "span.comic_list_det > p")?
                .map(|author| author.chars().skip(3).collect::<String>().trim().to_string());
            return Ok(Some(manga));
        }

        // search results use a different card
        if let Some(link) = html::select_first(item, "a.image-link")? {
            let mut manga = MangaSummary::new(
                html::attr(link, "href").unwrap_or_default(),
                html::attr(link, "title").unwrap_or_default(),
            );
            manga.thumbnail_url = html::select_first(link, "img")?
                .and_then(|img| html::attr(img, "src"))
                .map(Self::https);
            manga.author = html::text_of(item, "p.auth")?;
            return Ok(Some(manga));
        }

        Ok(None)
    }

    fn capture(regex: &Regex, body: &str, what: &str) -> Result<String> {
        regex
            .captures(body)?
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| anyhow!("{what} not found"))
    }
}

impl Adapter for Manhuadui {
    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            id: 501,
            name: "漫画堆".to_string(),
            url: BASE_URL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            icon: format!("{BASE_URL}/favicon.ico"),
            languages: Lang::Single("zh".to_string()),
            nsfw: false,
        }
    }

    fn filter_list(&self) -> Vec<Input> {
        FILTERS
            .iter()
            .map(|(name, values)| Input::Select {
                name: name.to_string(),
                values: values.iter().map(|(label, _)| InputType::from(*label)).collect(),
                state: Some(0),
            })
            .collect()
    }

    fn build_catalog_request(
        &self,
        kind: CatalogKind,
        page: i64,
        query: Option<&str>,
        filters: &[Input],
        _prefs: &Preferences,
    ) -> Result<Request> {
        let url = match (kind, query.map(str::trim).filter(|q| !q.is_empty())) {
            (CatalogKind::Popular, _) => format!("{BASE_URL}/list_{page}/"),
            (CatalogKind::Latest, _) => format!("{BASE_URL}/update/{page}/"),
            (CatalogKind::Search, Some(query)) => with_query(
                &format!("{BASE_URL}/search/"),
                &[("keywords", query), ("page", &page.to_string())],
            )?,
            (CatalogKind::Search, None) => match Self::filter_path(filters) {
                path if path.is_empty() => format!("{BASE_URL}/list_{page}/"),
                path => format!("{BASE_URL}/list/{path}/{page}/"),
            },
        };

        Ok(Request::get(&url))
    }

    fn extract_catalog_items(&self, _kind: CatalogKind, res: &Response) -> Result<Vec<MangaSummary>> {
        let doc = html::document(&res.text());

        let mut items = vec![];
        for item in html::select_all(doc.root_element(), "li.list-comic")? {
            if let Some(manga) = Self::parse_item(item)? {
                items.push(manga);
            }
        }
        Ok(items)
    }

    fn has_next_page(&self, _kind: CatalogKind, res: &Response) -> Result<bool> {
        let doc = html::document(&res.text());
        html::exists(doc.root_element(), "li.next")
    }

    fn build_detail_request(&self, manga: &MangaSummary, _prefs: &Preferences) -> Result<Option<Request>> {
        Ok(Some(Request::get(&absolute_url(BASE_URL, &manga.url))))
    }

    fn extract_detail(&self, manga: &MangaSummary, res: &Response) -> Result<MangaSummary> {
        let doc = html::document(&res.text());
        let root = doc.root_element();

        let mut detail = manga.clone();
        detail.description = html::text_of(root, "p.comic_deCon_d")?;
        if let Some(cover) = html::select_first(root, "div.comic_i_img > img")? {
            detail.thumbnail_url = html::attr(cover, "src").or(detail.thumbnail_url);
        }
        Ok(detail)
    }

    fn build_chapter_list_request(
        &self,
        manga: &MangaSummary,
        _page: i64,
        _detail: Option<&Response>,
        _prefs: &Preferences,
    ) -> Result<Request> {
        Ok(Request::get(&absolute_url(MOBILE_URL, &manga.url)))
    }

    fn chapter_order(&self) -> ChapterOrder {
        ChapterOrder::OldestFirst
    }

    fn extract_chapters(&self, manga: &MangaSummary, res: &Response) -> Result<ChapterListing> {
        let doc = html::document(&res.text());

        let mut chapters = vec![];
        for link in html::select_all(doc.root_element(), "ul[id^=chapter-list] > li a")? {
            let name = html::text_of(link, "span:first-child")?.unwrap_or_default();
            chapters.push(ChapterSummary {
                url: html::attr(link, "href").unwrap_or_default(),
                manga_url: manga.url.clone(),
                chapter_number: parse_chapter_number(&name).unwrap_or(-1.0),
                uploaded: 0,
                name,
                scanlator: None,
            });
        }

        Ok(ChapterListing::Flat(chapters))
    }

    fn build_page_list_request(&self, chapter: &ChapterSummary, _prefs: &Preferences) -> Result<Request> {
        Ok(Request::get(&absolute_url(BASE_URL, &chapter.url)))
    }

    fn extract_pages(&self, _chapter: &ChapterSummary, res: &Response) -> Result<Vec<PageRef>> {
        let body = res.text();

        let encrypted = Self::capture(&CHAPTER_IMAGES, &body, "chapterImages")?;
        let images: String = decrypt_block_to_string(&encrypted, KEY, IV)?
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | '"' | '\\'))
            .collect();
        let images = images.replace('%', "%25");
        let path = Self::capture(&CHAPTER_PATH, &body, "chapterPath")?;

        Ok(images
            .split(',')
            .enumerate()
            .map(|(i, image)| {
                let url = if image.starts_with(DMZJ_PREFIX) {
                    format!("{DMZJ_PROXY}{image}")
                } else if image.contains("http") {
                    image.to_string()
                } else {
                    format!("{IMAGE_SERVER}/{path}{image}")
                };
                PageRef::new(i, url)
            })
            .collect())
    }
}

#[cfg(test)]
mod test {
    use yomu_codec::cipher::encrypt_block;

    use super::*;

    fn select(name: &str, state: i64) -> Input {
        Input::Select {
            name: name.to_string(),
            values: vec![],
            state: Some(state),
        }
    }

    #[test]
    fn test_catalog_requests() {
        let source = Manhuadui::new();
        let prefs = Preferences::new();
        let url = |kind, page, query, filters: &[Input]| {
            source
                .build_catalog_request(kind, page, query, filters, &prefs)
                .unwrap()
                .url
        };

        assert_eq!(url(CatalogKind::Popular, 2, None, &[]), "https://www.manhuadai.com/list_2/");
        assert_eq!(url(CatalogKind::Latest, 1, None, &[]), "https://www.manhuadai.com/update/1/");
        assert_eq!(
            url(CatalogKind::Search, 1, Some("斗罗"), &[]),
            "https://www.manhuadai.com/search/?keywords=%E6%96%97%E7%BD%97&page=1"
        );
        assert_eq!(
            url(
                CatalogKind::Search,
                3,
                None,
                &[select("按类型", 2), select("按地区", 0), select("按进度", 1)]
            ),
            "https://www.manhuadai.com/list/shaonian-wanjie/3/"
        );
        assert_eq!(url(CatalogKind::Search, 1, Some("  "), &[]), "https://www.manhuadai.com/list_1/");
    }

    #[test]
    fn test_extract_catalog() {
        let body = r#"
            <ul>
                <li class="list-comic">
                    <a class="comic_img" href="/manhua/douluodalu/"><img alt="斗罗大陆" src="//img.manhuadai.com/dl.jpg"></a>
                    <span class="comic_list_det"><p>作者：唐家三少</p></span>
                </li>
                <li class="list-comic">
                    <a class="image-link" href="/manhua/wudong/" title="武动乾坤"><img src="https://img.manhuadai.com/wd.jpg"></a>
                    <p class="auth">天蚕土豆</p>
                </li>
            </ul>
            <ul class="pagination"><li class="next"><a href="/list_2/">下一页</a></li></ul>
        "#;
        let res = Response::new(BASE_URL, 200, body);
        let source = Manhuadui::new();

        let items = source.extract_catalog_items(CatalogKind::Popular, &res).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "斗罗大陆");
        assert_eq!(items[0].thumbnail_url.as_deref(), Some("https://img.manhuadai.com/dl.jpg"));
        assert_eq!(items[0].author.as_deref(), Some("唐家三少"));
        assert_eq!(items[1].url, "/manhua/wudong/");
        assert_eq!(items[1].author.as_deref(), Some("天蚕土豆"));
        assert!(source.has_next_page(CatalogKind::Popular, &res).unwrap());
    }

    #[test]
    fn test_extract_chapters() {
        let body = r#"
            <ul id="chapter-list-1">
                <li><a href="/manhua/douluodalu/1.html"><span>第1话</span><span>new</span></a></li>
                <li><a href="/manhua/douluodalu/2.html"><span>第2话</span></a></li>
            </ul>
        "#;
        let res = Response::new(MOBILE_URL, 200, body);
        let manga = MangaSummary::new("/manhua/douluodalu/", "斗罗大陆");
        let source = Manhuadui::new();

        assert_eq!(
            source
                .build_chapter_list_request(&manga, 1, None, &Preferences::new())
                .unwrap()
                .url,
            "https://m.manhuadai.com/manhua/douluodalu/"
        );
        assert_eq!(source.chapter_order(), ChapterOrder::OldestFirst);

        let ChapterListing::Flat(chapters) = source.extract_chapters(&manga, &res).unwrap() else {
            panic!("expected flat chapters");
        };
        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].name, "第1话");
        assert_eq!(chapters[0].url, "/manhua/douluodalu/1.html");
        assert_eq!(chapters[1].manga_url, "/manhua/douluodalu/");
    }

    #[test]
    fn test_extract_pages() {
        let images = r#"["0001.jpg","a%20b.jpg","http:\/\/images.dmzj.com\/x.jpg","https:\/\/cdn.example.com\/y.jpg"]"#;
        let encrypted = encrypt_block(images.as_bytes(), KEY, IV).unwrap();
        let body = format!(
            r#"<script>;var chapterImages = "{encrypted}";var chapterPath = "images/comic/12/34/";</script>"#
        );
        let res = Response::new(BASE_URL, 200, body);

        let pages = Manhuadui::new()
            .extract_pages(&ChapterSummary::default(), &res)
            .unwrap();
        let urls: Vec<&str> = pages.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://mhcdn.manhuazj.com/images/comic/12/34/0001.jpg",
                "https://mhcdn.manhuazj.com/images/comic/12/34/a%2520b.jpg",
                "https://img01.eshanyao.com/showImage.php?url=http://images.dmzj.com/x.jpg",
                "https://cdn.example.com/y.jpg",
            ]
        );
        assert_eq!(pages[3].index, 3);
    }

    #[test]
    fn test_extract_pages_errors() {
        let source = Manhuadui::new();

        let res = Response::new(BASE_URL, 200, "<html></html>");
        assert!(source.extract_pages(&ChapterSummary::default(), &res).is_err());

        let res = Response::new(
            BASE_URL,
            200,
            r#"var chapterImages = "bm90IGVuY3J5cHRlZA==";var chapterPath = "x/";"#,
        );
        assert!(source.extract_pages(&ChapterSummary::default(), &res).is_err());
    }
}
