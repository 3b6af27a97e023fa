//! MANGA Plus by SHUEISHA. The API answers in protobuf; page images are
//! XORed with a per-page key.

mod schema;

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use anyhow::{Result, bail};
use itertools::Itertools;
use serde_json::Value;
use yomu_codec::proto::{DecodeError, Decoder, DecoderKind};
use yomu_lib::{
    adapter::{Adapter, CatalogKind, ChapterOrder, Obfuscation, SearchMode},
    http::{Request, Response, with_query},
    models::{
        ChapterListing, ChapterSummary, Input, InputType, Lang, MangaSummary, PageRef,
        Preferences, SourceInfo, Status,
    },
};

pub use schema::schema;

pub const BASE_URL: &str = "https://mangaplus.shueisha.co.jp";
pub const API_URL: &str = "https://jumpg-webapi.tokyo-cdn.com/api";

const RESOLUTION_PREF: &str = "resolution";
const SPLIT_PREF: &str = "split";
const DECODER_PREF: &str = "decoder";
const RESOLUTIONS: [&str; 3] = ["low", "high", "super_high"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    English,
    Spanish,
}

impl Language {
    fn code(self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Spanish => "es",
        }
    }

    /// Language parameter of the web home endpoint.
    fn internal(self) -> &'static str {
        match self {
            Self::English => "eng",
            Self::Spanish => "esp",
        }
    }

    /// Enum name the API gives titles in this language.
    fn proto_name(self) -> &'static str {
        match self {
            Self::English => "ENGLISH",
            Self::Spanish => "SPANISH",
        }
    }

    fn popup(self) -> &'static str {
        match self {
            Self::English => "englishPopup",
            Self::Spanish => "spanishPopup",
        }
    }
}

pub struct MangaPlus {
    lang: Language,
    native: Arc<dyn Decoder>,
    interpreted: Arc<dyn Decoder>,
    use_interpreted: AtomicBool,
}

impl MangaPlus {
    pub fn new(lang: Language) -> Result<Self, DecodeError> {
        Ok(Self {
            lang,
            native: DecoderKind::Native.build(schema())?,
            interpreted: DecoderKind::Interpreted.build(schema())?,
            use_interpreted: AtomicBool::new(false),
        })
    }

    /// Every request built picks the decoder its response is read with.
    fn select_decoder(&self, prefs: &Preferences) {
        let kind = match prefs.get_or(DECODER_PREF, "native").parse::<DecoderKind>() {
            Ok(kind) => kind,
            Err(e) => {
                warn!("{e}, using the native decoder");
                DecoderKind::Native
            }
        };
        self.use_interpreted
            .store(kind == DecoderKind::Interpreted, Ordering::Relaxed);
    }

    fn decoder(&self) -> &dyn Decoder {
        if self.use_interpreted.load(Ordering::Relaxed) {
            self.interpreted.as_ref()
        } else {
            self.native.as_ref()
        }
    }

    /// The `success` payload of a response, failing with the API's own
    /// message when it carries an error.
    fn decode(&self, res: &Response) -> Result<Value> {
        let mut decoded = self.decoder().decode("Response", &res.body)?;
        if decoded["success"].is_null() {
            let popup = &decoded["error"][self.lang.popup()];
            match popup["body"].as_str().filter(|body| !body.is_empty()) {
                Some(body) => bail!("{body}"),
                None => bail!("request failed: {}", decoded["error"]["action"]),
            }
        }

        Ok(decoded["success"].take())
    }

    fn api_request(&self, url: &str, referer: &str) -> Request {
        Request::get(url).header("Referer", &format!("{BASE_URL}{referer}"))
    }

    fn is_own_language(&self, title: &Value) -> bool {
        title["language"].as_str() == Some(self.lang.proto_name())
    }

    fn title_to_manga(title: &Value) -> MangaSummary {
        let mut manga = MangaSummary::new(
            format!("#/titles/{}", number(&title["titleId"])),
            str_of(&title["name"]),
        );
        manga.thumbnail_url = Some(str_of(&title["portraitImageUrl"]).to_string()).filter(|u| !u.is_empty());
        manga.author = Some(str_of(&title["author"]).replace(" / ", ", ")).filter(|a| !a.is_empty());
        manga
    }

    fn titles(&self, titles: &Value) -> Vec<MangaSummary> {
        array(titles)
            .filter(|t| self.is_own_language(t))
            .map(Self::title_to_manga)
            .collect()
    }

    fn title_id(manga: &MangaSummary) -> &str {
        manga.url.rsplit('/').next().unwrap_or_default()
    }

    fn title_detail_request(&self, manga: &MangaSummary) -> Result<Request> {
        let id = Self::title_id(manga);
        Ok(self.api_request(
            &with_query(&format!("{API_URL}/title_detail"), &[("title_id", id)])?,
            &format!("/titles/{id}"),
        ))
    }
}

fn str_of(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn number(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or_default(),
        Value::String(s) => s.parse().unwrap_or_default(),
        _ => 0,
    }
}

fn array(value: &Value) -> impl Iterator<Item = &Value> {
    value.as_array().into_iter().flatten()
}

impl Adapter for MangaPlus {
    fn source_info(&self) -> SourceInfo {
        let (id, suffix) = match self.lang {
            Language::English => (201, "EN"),
            Language::Spanish => (202, "ES"),
        };
        SourceInfo {
            id,
            name: format!("MANGA Plus ({suffix})"),
            url: BASE_URL.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            icon: format!("{BASE_URL}/favicon.ico"),
            languages: Lang::Single(self.lang.code().to_string()),
            nsfw: false,
        }
    }

    fn headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("Origin".to_string(), BASE_URL.to_string()),
            ("Referer".to_string(), BASE_URL.to_string()),
        ])
    }

    fn preference_list(&self) -> Vec<Input> {
        vec![
            Input::Select {
                name: RESOLUTION_PREF.to_string(),
                values: RESOLUTIONS.iter().map(|r| InputType::from(*r)).collect(),
                state: Some(2),
            },
            Input::Checkbox {
                name: SPLIT_PREF.to_string(),
                state: Some(true),
            },
            Input::Select {
                name: DECODER_PREF.to_string(),
                values: vec!["native".into(), "interpreted".into()],
                state: Some(0),
            },
        ]
    }

    fn search_mode(&self) -> SearchMode {
        SearchMode::ClientSide
    }

    fn build_catalog_request(
        &self,
        kind: CatalogKind,
        _page: i64,
        _query: Option<&str>,
        _filters: &[Input],
        prefs: &Preferences,
    ) -> Result<Request> {
        self.select_decoder(prefs);
        let req = match kind {
            CatalogKind::Popular => {
                self.api_request(&format!("{API_URL}/title_list/ranking"), "/manga_list/hot")
            }
            CatalogKind::Latest => self.api_request(
                &with_query(&format!("{API_URL}/web/web_home"), &[("lang", self.lang.internal())])?,
                "/updates",
            ),
            CatalogKind::Search => {
                self.api_request(&format!("{API_URL}/title_list/all"), "/manga_list/all")
            }
        };

        Ok(req)
    }

    fn extract_catalog_items(&self, kind: CatalogKind, res: &Response) -> Result<Vec<MangaSummary>> {
        let success = self.decode(res)?;
        let items = match kind {
            CatalogKind::Popular => self.titles(&success["titleRankingView"]["titles"]),
            CatalogKind::Search => self.titles(&success["allTitlesView"]["titles"]),
            CatalogKind::Latest => array(&success["webHomeView"]["groups"])
                .flat_map(|group| array(&group["titles"]))
                .map(|updated| &updated["title"])
                .filter(|title| !title.is_null() && self.is_own_language(title))
                .map(Self::title_to_manga)
                .unique_by(|manga| manga.title.clone())
                .collect(),
        };

        Ok(items)
    }

    fn build_detail_request(&self, manga: &MangaSummary, prefs: &Preferences) -> Result<Option<Request>> {
        self.select_decoder(prefs);
        self.title_detail_request(manga).map(Some)
    }

    fn extract_detail(&self, manga: &MangaSummary, res: &Response) -> Result<MangaSummary> {
        let success = self.decode(res)?;
        let details = &success["titleDetailView"];
        let title = &details["title"];

        let completed = str_of(&details["nonAppearanceInfo"]).to_lowercase();
        let status = if completed.contains("completado") || completed.contains("complete") {
            Status::Completed
        } else {
            Status::Ongoing
        };
        let author = Some(str_of(&title["author"]).replace(" / ", ", ")).filter(|a| !a.is_empty());

        Ok(MangaSummary {
            url: manga.url.clone(),
            title: Some(str_of(&title["name"]))
                .filter(|n| !n.is_empty())
                .unwrap_or(manga.title.as_str())
                .to_string(),
            thumbnail_url: Some(str_of(&title["portraitImageUrl"]).to_string())
                .filter(|u| !u.is_empty())
                .or_else(|| manga.thumbnail_url.clone()),
            artist: author.clone(),
            author,
            genres: vec![],
            description: Some(format!(
                "{}\n\n{}",
                str_of(&details["overview"]),
                str_of(&details["viewingPeriodDescription"])
            )),
            status,
        })
    }

    fn build_chapter_list_request(
        &self,
        manga: &MangaSummary,
        _page: i64,
        _detail: Option<&Response>,
        prefs: &Preferences,
    ) -> Result<Request> {
        self.select_decoder(prefs);
        self.title_detail_request(manga)
    }

    fn chapter_order(&self) -> ChapterOrder {
        ChapterOrder::OldestFirst
    }

    fn extract_chapters(&self, manga: &MangaSummary, res: &Response) -> Result<ChapterListing> {
        let success = self.decode(res)?;
        let details = &success["titleDetailView"];

        let chapters = array(&details["firstChapterList"])
            .chain(array(&details["lastChapterList"]))
            // expired chapters lose their subtitle
            .filter(|c| c["subTitle"].is_string())
            .map(|c| {
                let name = str_of(&c["name"]);
                ChapterSummary {
                    url: format!("#/viewer/{}", number(&c["chapterId"])),
                    manga_url: manga.url.clone(),
                    name: format!("{name} - {}", str_of(&c["subTitle"])),
                    chapter_number: name
                        .split_once('#')
                        .and_then(|(_, n)| n.trim().parse::<f64>().ok())
                        .unwrap_or(-1.0),
                    uploaded: 1000 * number(&c["startTimeStamp"]) as i64,
                    scanlator: Some("Shueisha".to_string()),
                }
            })
            .collect();

        Ok(ChapterListing::Flat(chapters))
    }

    fn build_page_list_request(&self, chapter: &ChapterSummary, prefs: &Preferences) -> Result<Request> {
        self.select_decoder(prefs);

        let id = chapter.url.rsplit('/').next().unwrap_or_default();
        let resolution = prefs.get_or(RESOLUTION_PREF, "super_high");
        let resolution = if RESOLUTIONS.contains(&resolution) {
            resolution
        } else {
            "super_high"
        };
        let split = if prefs.get_bool(SPLIT_PREF, true) { "yes" } else { "no" };

        Ok(self.api_request(
            &with_query(
                &format!("{API_URL}/manga_viewer"),
                &[("chapter_id", id), ("split", split), ("img_quality", resolution)],
            )?,
            &format!("/viewer/{id}"),
        ))
    }

    fn extract_pages(&self, chapter: &ChapterSummary, res: &Response) -> Result<Vec<PageRef>> {
        let success = self.decode(res)?;
        let id = chapter.url.rsplit('/').next().unwrap_or_default();
        let referer = format!("{BASE_URL}/viewer/{id}");

        Ok(array(&success["mangaViewer"]["pages"])
            .map(|page| &page["page"])
            .filter(|page| !page.is_null())
            .enumerate()
            .map(|(i, page)| {
                let page_ref = PageRef::new(i, str_of(&page["imageUrl"])).with_header("Referer", &referer);
                match page["encryptionKey"].as_str().filter(|k| !k.is_empty()) {
                    Some(key) => page_ref.with_decode_key(key),
                    None => page_ref,
                }
            })
            .collect())
    }

    fn obfuscation(&self) -> Obfuscation {
        Obfuscation::XorStream
    }
}

#[cfg(test)]
mod test {
    use yomu_codec::proto::Encoder;

    use super::*;

    fn title(id: u64, name: &str, lang: u64) -> Encoder {
        Encoder::new()
            .varint(1, id)
            .string(2, name)
            .string(3, "Eiichiro Oda / Shueisha")
            .string(4, &format!("https://img.test/{id}.jpg"))
            .varint(7, lang)
    }

    fn success(field: u32, view: Encoder) -> Vec<u8> {
        Encoder::new()
            .message(1, Encoder::new().message(field, view))
            .finish()
    }

    fn res(body: Vec<u8>) -> Response {
        Response::new(API_URL, 200, body)
    }

    fn english() -> MangaPlus {
        MangaPlus::new(Language::English).unwrap()
    }

    #[test]
    fn test_popular() {
        let body = success(
            6,
            Encoder::new()
                .message(1, title(100, "One Piece", 0))
                .message(1, title(200, "One Piece (ES)", 1)),
        );

        for decoder in ["native", "interpreted"] {
            let mp = english();
            let prefs = Preferences::new().with(DECODER_PREF, decoder);
            let req = mp
                .build_catalog_request(CatalogKind::Popular, 1, None, &[], &prefs)
                .unwrap();
            assert_eq!(req.url, format!("{API_URL}/title_list/ranking"));

            let items = mp.extract_catalog_items(CatalogKind::Popular, &res(body.clone())).unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].url, "#/titles/100");
            assert_eq!(items[0].title, "One Piece");
            assert_eq!(items[0].author.as_deref(), Some("Eiichiro Oda, Shueisha"));
            assert_eq!(items[0].thumbnail_url.as_deref(), Some("https://img.test/100.jpg"));
        }
    }

    #[test]
    fn test_latest_distinct_titles() {
        let group = |t: Encoder| Encoder::new().string(1, "today").message(2, Encoder::new().message(1, t));
        let body = success(
            11,
            Encoder::new()
                .message(2, group(title(100, "One Piece", 0)))
                .message(2, group(title(100, "One Piece", 0)))
                .message(2, group(title(300, "Spy x Family", 0))),
        );

        let mp = english();
        let req = mp
            .build_catalog_request(CatalogKind::Latest, 1, None, &[], &Preferences::new())
            .unwrap();
        assert_eq!(req.url, format!("{API_URL}/web/web_home?lang=eng"));

        let items = mp.extract_catalog_items(CatalogKind::Latest, &res(body)).unwrap();
        let titles: Vec<_> = items.iter().map(|m| m.title.as_str()).collect();
        assert_eq!(titles, vec!["One Piece", "Spy x Family"]);
    }

    #[test]
    fn test_error_popup() {
        let popup = |body: &str| Encoder::new().string(1, "Error").string(2, body);
        let body = Encoder::new()
            .message(
                2,
                Encoder::new()
                    .varint(1, 2)
                    .message(2, popup("Under maintenance"))
                    .message(3, popup("En mantenimiento")),
            )
            .finish();

        let err = english()
            .extract_catalog_items(CatalogKind::Popular, &res(body.clone()))
            .unwrap_err();
        assert_eq!(err.to_string(), "Under maintenance");

        let err = MangaPlus::new(Language::Spanish)
            .unwrap()
            .extract_catalog_items(CatalogKind::Popular, &res(body))
            .unwrap_err();
        assert_eq!(err.to_string(), "En mantenimiento");
    }

    #[test]
    fn test_malformed_body_is_decode_error() {
        let err = english()
            .extract_catalog_items(CatalogKind::Popular, &res(vec![0x0a, 0x05, 0x01]))
            .unwrap_err();
        assert!(err.downcast_ref::<DecodeError>().is_some());
    }

    fn detail() -> Vec<u8> {
        let chapter = |id: u64, name: &str, subtitle: Option<&str>| {
            let c = Encoder::new()
                .varint(1, 100)
                .varint(2, id)
                .string(3, name)
                .varint(6, 1_600_000_000);
            match subtitle {
                Some(s) => c.string(4, s),
                None => c,
            }
        };

        success(
            8,
            Encoder::new()
                .message(1, title(100, "One Piece", 0))
                .string(3, "Pirates.")
                .string(7, "All chapters are free.")
                .string(8, "This series has been completed.")
                .message(9, chapter(1000, "#001", Some("Romance Dawn")))
                .message(9, chapter(1001, "#002", None))
                .message(10, chapter(1050, "#1050", Some("Honor"))),
        )
    }

    fn manga() -> MangaSummary {
        MangaSummary::new("#/titles/100", "One Piece")
    }

    #[test]
    fn test_detail() {
        let mp = english();
        let req = mp
            .build_detail_request(&manga(), &Preferences::new())
            .unwrap()
            .unwrap();
        assert_eq!(req.url, format!("{API_URL}/title_detail?title_id=100"));

        let detail = mp.extract_detail(&manga(), &res(detail())).unwrap();
        assert_eq!(detail.status, Status::Completed);
        assert_eq!(detail.artist, detail.author);
        assert_eq!(detail.description.as_deref(), Some("Pirates.\n\nAll chapters are free."));
    }

    #[test]
    fn test_chapters() {
        let ChapterListing::Flat(chapters) = english().extract_chapters(&manga(), &res(detail())).unwrap()
        else {
            panic!("expected a flat listing");
        };

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].name, "#001 - Romance Dawn");
        assert_eq!(chapters[0].url, "#/viewer/1000");
        assert_eq!(chapters[0].chapter_number, 1.0);
        assert_eq!(chapters[0].uploaded, 1_600_000_000_000);
        assert_eq!(chapters[1].chapter_number, 1050.0);
        assert_eq!(chapters[1].scanlator.as_deref(), Some("Shueisha"));
    }

    #[test]
    fn test_pages() {
        let chapter = ChapterSummary {
            url: "#/viewer/1000".to_string(),
            ..Default::default()
        };

        let mp = english();
        let prefs = Preferences::new().with(RESOLUTION_PREF, "low").with(SPLIT_PREF, "false");
        let req = mp.build_page_list_request(&chapter, &prefs).unwrap();
        assert_eq!(
            req.url,
            format!("{API_URL}/manga_viewer?chapter_id=1000&split=no&img_quality=low")
        );
        assert_eq!(req.headers["Referer"], vec![format!("{BASE_URL}/viewer/1000")]);

        let page = |url: &str, key: Option<&str>| {
            let p = Encoder::new().string(1, url).varint(2, 800).varint(3, 1200);
            let p = match key {
                Some(k) => p.string(5, k),
                None => p,
            };
            Encoder::new().message(1, p)
        };
        let body = success(
            10,
            Encoder::new()
                .message(1, page("https://img.test/1.jpg", Some("a1b2")))
                .message(1, Encoder::new())
                .message(1, page("https://img.test/2.jpg", None)),
        );

        let pages = mp.extract_pages(&chapter, &res(body)).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].decode_key.as_deref(), Some("a1b2"));
        assert_eq!(pages[1].index, 1);
        assert_eq!(pages[1].decode_key, None);
        assert_eq!(mp.obfuscation(), Obfuscation::XorStream);
    }
}
