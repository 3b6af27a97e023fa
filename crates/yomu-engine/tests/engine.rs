use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use yomu_codec::{DecodeError, cipher};
use tokio::time::Instant;
use yomu_engine::{config::Config, engine::Engine, fetch::Transport, manager::SourceManager};
use yomu_lib::{
    adapter::{
        Adapter, CatalogKind, ChapterOrder, ChapterPagination, Obfuscation, SearchMode,
        SourceStrategy,
    },
    error::{Error, Result},
    http::{Request, Response},
    models::{
        ChapterListing, ChapterSummary, Input, Lang, MangaSummary, PageRef, Preferences,
        RawChapter, SourceChapters, SourceInfo,
    },
};

const BASE: &str = "https://fake.test";
const KEY: &[u8] = b"KA58ZAQ321oobbG8";
const IV: &[u8] = b"A1B2C3DEF1G321o8";

#[derive(Default)]
struct MockTransport {
    routes: HashMap<String, Response>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    fn new() -> Self {
        Self::default()
    }

    fn route(mut self, url: &str, body: impl Into<bytes::Bytes>) -> Self {
        self.routes
            .insert(url.to_string(), Response::new(url, 200, body));
        self
    }

    fn json(self, url: &str, value: Value) -> Self {
        self.route(url, value.to_string())
    }

    fn requests(&self) -> Vec<Request> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(self
            .routes
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Response::new(&request.url, 404, "not found")))
    }
}

#[derive(Default)]
struct FakeAdapter {
    search_mode: SearchMode,
    dedupe: bool,
    need_detail: bool,
    pagination: ChapterPagination,
    order: ChapterOrder,
    obfuscation: Obfuscation,
}

fn body(res: &Response) -> anyhow::Result<Value> {
    if res.body.first() == Some(&0xff) {
        return Err(DecodeError::Truncated.into());
    }
    Ok(serde_json::from_slice(&res.body)?)
}

fn str_field<'a>(value: &'a Value, name: &str) -> &'a str {
    value[name].as_str().unwrap_or_default()
}

impl Adapter for FakeAdapter {
    fn source_info(&self) -> SourceInfo {
        SourceInfo {
            id: 7,
            name: "Fake".to_string(),
            url: BASE.to_string(),
            version: "0.1.0".to_string(),
            icon: String::new(),
            languages: Lang::Single("en".to_string()),
            nsfw: false,
        }
    }

    fn headers(&self) -> HashMap<String, String> {
        HashMap::from([
            ("Referer".to_string(), BASE.to_string()),
            ("X-Source".to_string(), "fake".to_string()),
        ])
    }

    fn search_mode(&self) -> SearchMode {
        self.search_mode
    }

    fn is_exact_query(&self, query: &str) -> bool {
        query.starts_with("id:")
    }

    fn dedupe_search_titles(&self) -> bool {
        self.dedupe
    }

    fn build_catalog_request(
        &self,
        kind: CatalogKind,
        page: i64,
        query: Option<&str>,
        _filters: &[Input],
        _prefs: &Preferences,
    ) -> anyhow::Result<Request> {
        let url = match (kind, query) {
            (CatalogKind::Search, Some(q)) if self.search_mode == SearchMode::Server => {
                format!("{BASE}/search/{q}/{page}")
            }
            (CatalogKind::Search, _) => format!("{BASE}/all"),
            _ => format!("{BASE}/{kind:?}/{page}").to_lowercase(),
        };
        Ok(Request::get(&url).header("X-Source", "override"))
    }

    fn extract_catalog_items(
        &self,
        _kind: CatalogKind,
        res: &Response,
    ) -> anyhow::Result<Vec<MangaSummary>> {
        let body = body(res)?;
        let items = body["items"].as_array().context("no items")?;
        Ok(items
            .iter()
            .map(|item| MangaSummary::new(str_field(item, "url"), str_field(item, "title")))
            .collect())
    }

    fn has_next_page(&self, _kind: CatalogKind, res: &Response) -> anyhow::Result<bool> {
        body(res)?["next"]
            .as_bool()
            .ok_or_else(|| anyhow!("next page marker missing"))
    }

    fn build_detail_request(
        &self,
        manga: &MangaSummary,
        _prefs: &Preferences,
    ) -> anyhow::Result<Option<Request>> {
        Ok(Some(Request::get(&format!("{BASE}{}", manga.url))))
    }

    fn extract_detail(&self, manga: &MangaSummary, res: &Response) -> anyhow::Result<MangaSummary> {
        let body = body(res)?;
        Ok(MangaSummary {
            author: body["author"].as_str().map(str::to_string),
            ..manga.clone()
        })
    }

    fn chapters_need_detail(&self) -> bool {
        self.need_detail
    }

    fn build_chapter_list_request(
        &self,
        manga: &MangaSummary,
        page: i64,
        detail: Option<&Response>,
        _prefs: &Preferences,
    ) -> anyhow::Result<Request> {
        let mut url = format!("{BASE}{}/chapters/{page}", manga.url);
        if let Some(detail) = detail {
            url = format!("{url}?id={}", body(detail)?["id"]);
        }
        Ok(Request::get(&url))
    }

    fn chapter_pagination(&self) -> ChapterPagination {
        self.pagination
    }

    fn chapter_order(&self) -> ChapterOrder {
        self.order
    }

    fn source_strategy(&self, prefs: &Preferences) -> SourceStrategy {
        SourceStrategy::parse(prefs.get_or("chapter_source", "all"))
    }

    fn extract_chapters(&self, manga: &MangaSummary, res: &Response) -> anyhow::Result<ChapterListing> {
        let body = body(res)?;
        if let Some(streams) = body["streams"].as_array() {
            return Ok(ChapterListing::BySource(
                streams
                    .iter()
                    .map(|stream| SourceChapters {
                        name: str_field(stream, "name").to_string(),
                        chapters: stream["chapters"]
                            .as_array()
                            .into_iter()
                            .flatten()
                            .map(|name| RawChapter {
                                url: format!("/c/{}", name.as_str().unwrap_or_default()),
                                name: name.as_str().unwrap_or_default().to_string(),
                                uploaded: 0,
                            })
                            .collect(),
                    })
                    .collect(),
            ));
        }

        Ok(ChapterListing::Flat(
            body["chapters"]
                .as_array()
                .into_iter()
                .flatten()
                .map(|c| ChapterSummary {
                    url: str_field(c, "url").to_string(),
                    manga_url: manga.url.clone(),
                    name: str_field(c, "name").to_string(),
                    chapter_number: c["number"].as_f64().unwrap_or(-1.0),
                    uploaded: 0,
                    scanlator: None,
                })
                .collect(),
        ))
    }

    fn build_page_list_request(
        &self,
        chapter: &ChapterSummary,
        _prefs: &Preferences,
    ) -> anyhow::Result<Request> {
        Ok(Request::get(&format!("{BASE}{}/pages", chapter.url)))
    }

    fn extract_pages(&self, _chapter: &ChapterSummary, res: &Response) -> anyhow::Result<Vec<PageRef>> {
        let body = body(res)?;
        Ok(body["pages"]
            .as_array()
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(i, page)| {
                let page_ref = PageRef::new(i * 10, str_field(page, "url"));
                match page["key"].as_str() {
                    Some(key) => page_ref.with_decode_key(key),
                    None => page_ref,
                }
            })
            .collect())
    }

    fn obfuscation(&self) -> Obfuscation {
        self.obfuscation.clone()
    }
}

fn engine(adapter: FakeAdapter, transport: MockTransport) -> (Engine, Arc<MockTransport>) {
    let transport = Arc::new(transport);
    (Engine::new(Arc::new(adapter), transport.clone()), transport)
}

fn items(titles: &[&str]) -> Value {
    Value::Array(
        titles
            .iter()
            .map(|t| json!({ "url": format!("/manga/{}", t.to_lowercase()), "title": t }))
            .collect(),
    )
}

fn manga() -> MangaSummary {
    MangaSummary::new("/manga/berserk", "Berserk")
}

#[tokio::test]
async fn test_catalog_page() {
    let (engine, transport) = engine(
        FakeAdapter::default(),
        MockTransport::new().json(
            "https://fake.test/popular/1",
            json!({ "items": items(&["Berserk", "Vagabond"]), "next": true }),
        ),
    );

    let page = engine
        .list_catalog(CatalogKind::Popular, 0, None, &[])
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert!(page.has_more);

    let request = &transport.requests()[0];
    assert_eq!(request.headers["X-Source"], vec!["override".to_string()]);
    assert_eq!(request.headers["Referer"], vec![BASE.to_string()]);
}

#[tokio::test]
async fn test_catalog_two_pages() {
    let titles: Vec<String> = (1..=35).map(|i| format!("Title {i:02}")).collect();
    let titles: Vec<&str> = titles.iter().map(String::as_str).collect();

    let (engine, transport) = engine(
        FakeAdapter::default(),
        MockTransport::new()
            .json(
                "https://fake.test/popular/1",
                json!({ "items": items(&titles[..20]), "next": true }),
            )
            .json(
                "https://fake.test/popular/2",
                json!({ "items": items(&titles[20..]), "next": false }),
            ),
    );

    let mut all = vec![];
    let mut page = 1;
    loop {
        let listing = engine
            .list_catalog(CatalogKind::Popular, page, None, &[])
            .await
            .unwrap();
        all.extend(listing.items);
        if !listing.has_more {
            break;
        }
        page += 1;
    }

    assert_eq!(transport.requests().len(), 2);
    assert_eq!(all.iter().map(|m| m.title.as_str()).collect::<Vec<_>>(), titles);
    let urls: HashSet<&str> = all.iter().map(|m| m.url.as_str()).collect();
    assert_eq!(urls.len(), 35);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_per_engine() {
    let mut config = Config::default();
    config.rate_limit_ms = 500;

    let transport = Arc::new(MockTransport::new().json(
        "https://fake.test/popular/1",
        json!({ "items": items(&["Berserk"]), "next": false }),
    ));
    let first = Engine::with_config(Arc::new(FakeAdapter::default()), transport.clone(), &config);
    let second = Engine::with_config(Arc::new(FakeAdapter::default()), transport.clone(), &config);

    let start = Instant::now();
    first.list_catalog(CatalogKind::Popular, 1, None, &[]).await.unwrap();
    second.list_catalog(CatalogKind::Popular, 1, None, &[]).await.unwrap();
    assert!(start.elapsed() < Duration::from_millis(500));

    first.list_catalog(CatalogKind::Popular, 1, None, &[]).await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(500));
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_catalog_rejects_incomplete_items() {
    let (engine, _) = engine(
        FakeAdapter::default(),
        MockTransport::new().json(
            "https://fake.test/latest/1",
            json!({ "items": [{ "url": "/manga/a", "title": "" }], "next": false }),
        ),
    );

    let err = engine
        .list_catalog(CatalogKind::Latest, 1, None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
}

#[tokio::test]
async fn test_has_more_failure_is_false() {
    let (engine, _) = engine(
        FakeAdapter::default(),
        MockTransport::new().json("https://fake.test/popular/2", json!({ "items": items(&["Berserk"]) })),
    );

    let page = engine
        .list_catalog(CatalogKind::Popular, 2, None, &[])
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_client_side_search() {
    let (engine, _) = engine(
        FakeAdapter {
            search_mode: SearchMode::ClientSide,
            ..Default::default()
        },
        MockTransport::new().json(
            "https://fake.test/all",
            json!({ "items": items(&["Kaguya-sama", "Oshi no Ko", "Kaiju No. 8"]), "next": false }),
        ),
    );

    let page = engine
        .list_catalog(CatalogKind::Search, 1, Some("ka"), &[])
        .await
        .unwrap();
    let titles: Vec<_> = page.items.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Kaguya-sama", "Kaiju No. 8"]);

    let exact = engine
        .list_catalog(CatalogKind::Search, 1, Some("id:oshi"), &[])
        .await
        .unwrap();
    assert_eq!(exact.items.len(), 3);
}

#[tokio::test]
async fn test_search_dedup_across_pages() {
    let (engine, _) = engine(
        FakeAdapter {
            dedupe: true,
            ..Default::default()
        },
        MockTransport::new()
            .json(
                "https://fake.test/search/one/1",
                json!({ "items": items(&["One Piece", "One Punch-Man"]), "next": true }),
            )
            .json(
                "https://fake.test/search/one/2",
                json!({ "items": items(&["One Piece", "One Outs"]), "next": false }),
            ),
    );

    let first = engine
        .list_catalog(CatalogKind::Search, 1, Some("one"), &[])
        .await
        .unwrap();
    assert_eq!(first.items.len(), 2);

    let second = engine
        .list_catalog(CatalogKind::Search, 2, Some("one"), &[])
        .await
        .unwrap();
    let titles: Vec<_> = second.items.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["One Outs"]);

    let restarted = engine
        .list_catalog(CatalogKind::Search, 1, Some("one"), &[])
        .await
        .unwrap();
    assert_eq!(restarted.items.len(), 2);
}

#[tokio::test]
async fn test_status_error() {
    let (engine, _) = engine(FakeAdapter::default(), MockTransport::new());

    let err = engine
        .list_catalog(CatalogKind::Popular, 1, None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Status { status: 404, .. }));
}

#[tokio::test]
async fn test_protocol_decode_error_kind() {
    let (engine, _) = engine(
        FakeAdapter::default(),
        MockTransport::new().route("https://fake.test/popular/1", vec![0xff_u8, 0x01]),
    );

    let err = engine
        .list_catalog(CatalogKind::Popular, 1, None, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProtocolDecode(DecodeError::Truncated)));
}

#[tokio::test]
async fn test_manga_detail() {
    let (engine, _) = engine(
        FakeAdapter::default(),
        MockTransport::new().json("https://fake.test/manga/berserk", json!({ "author": "Kentaro Miura", "id": 1 })),
    );

    let detail = engine.manga_detail(&manga()).await.unwrap();
    assert_eq!(detail.author.as_deref(), Some("Kentaro Miura"));
    assert_eq!(detail.title, "Berserk");
}

#[tokio::test]
async fn test_chapters_with_detail_prerequisite() {
    let (engine, transport) = engine(
        FakeAdapter {
            need_detail: true,
            ..Default::default()
        },
        MockTransport::new()
            .json("https://fake.test/manga/berserk", json!({ "id": 42 }))
            .json(
                "https://fake.test/manga/berserk/chapters/1?id=42",
                json!({ "chapters": [
                    { "url": "/c/2", "name": "Chapter 2", "number": 2.0 },
                    { "url": "/c/1", "name": "Chapter 1", "number": 1.0 },
                ] }),
            ),
    );

    let chapters = engine.list_chapters(&manga()).await.unwrap();
    assert_eq!(chapters.len(), 2);
    assert_eq!(chapters[0].chapter_number, 2.0);

    let urls: Vec<_> = transport.requests().into_iter().map(|r| r.url).collect();
    assert_eq!(
        urls,
        vec![
            "https://fake.test/manga/berserk".to_string(),
            "https://fake.test/manga/berserk/chapters/1?id=42".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_chapters_until_empty_oldest_first() {
    let (engine, transport) = engine(
        FakeAdapter {
            pagination: ChapterPagination::UntilEmpty { max_pages: 10 },
            order: ChapterOrder::OldestFirst,
            ..Default::default()
        },
        MockTransport::new()
            .json(
                "https://fake.test/manga/berserk/chapters/1",
                json!({ "chapters": [
                    { "url": "/c/1", "name": "Chapter 1", "number": 1.0 },
                    { "url": "/c/2", "name": "Chapter 2", "number": 2.0 },
                ] }),
            )
            .json(
                "https://fake.test/manga/berserk/chapters/2",
                json!({ "chapters": [{ "url": "/c/3", "name": "Chapter 3", "number": 3.0 }] }),
            )
            .json("https://fake.test/manga/berserk/chapters/3", json!({ "chapters": [] })),
    );

    let chapters = engine.list_chapters(&manga()).await.unwrap();
    let numbers: Vec<_> = chapters.iter().map(|c| c.chapter_number).collect();
    assert_eq!(numbers, vec![3.0, 2.0, 1.0]);
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_chapters_by_source() {
    let (engine, _) = engine(
        FakeAdapter::default(),
        MockTransport::new().json(
            "https://fake.test/manga/berserk/chapters/1",
            json!({ "streams": [
                { "name": "Rock", "chapters": ["Ch.3", "Ch.2", "Ch.1"] },
                { "name": "Duck", "chapters": ["Ch.5", "Ch.4", "Ch.3", "Ch.2"] },
            ] }),
        ),
    );

    engine.set_preferences(Preferences::new().with("chapter_source", "most"));
    let chapters = engine.list_chapters(&manga()).await.unwrap();
    let numbers: Vec<_> = chapters.iter().map(|c| c.chapter_number).collect();
    assert_eq!(numbers, vec![5.0, 4.0, 3.0, 2.0, 1.0]);
    assert_eq!(chapters[4].scanlator.as_deref(), Some("Rock"));
    assert_eq!(chapters[0].manga_url, "/manga/berserk");

    engine.set_preferences(Preferences::new());
    let chapters = engine.list_chapters(&manga()).await.unwrap();
    assert_eq!(chapters.len(), 7);
}

fn chapter() -> ChapterSummary {
    ChapterSummary {
        url: "/c/1".to_string(),
        manga_url: "/manga/berserk".to_string(),
        name: "Chapter 1".to_string(),
        chapter_number: 1.0,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_pages_are_dense() {
    let (engine, _) = engine(
        FakeAdapter::default(),
        MockTransport::new().json(
            "https://fake.test/c/1/pages",
            json!({ "pages": [{ "url": "https://cdn.test/1.jpg" }, { "url": " " }, { "url": "https://cdn.test/3.jpg" }] }),
        ),
    );

    let pages = engine.list_pages(&chapter()).await.unwrap();
    let indexed: Vec<_> = pages.iter().map(|p| (p.index, p.url.as_str())).collect();
    assert_eq!(
        indexed,
        vec![(0, "https://cdn.test/1.jpg"), (1, "https://cdn.test/3.jpg")]
    );
}

#[tokio::test]
async fn test_block_cipher_pages_resolve_independently() {
    let good = cipher::encrypt_block(b"https://cdn.test/1.jpg", KEY, IV).unwrap();
    let (engine, _) = engine(
        FakeAdapter {
            obfuscation: Obfuscation::BlockCipher {
                key: KEY.to_vec(),
                iv: IV.to_vec(),
            },
            ..Default::default()
        },
        MockTransport::new().json(
            "https://fake.test/c/1/pages",
            json!({ "pages": [{ "url": good }, { "url": "bm90IGEgYmxvY2s=" }] }),
        ),
    );

    let pages = engine.list_pages(&chapter()).await.unwrap();
    let resolved = engine.resolve_images(&pages);

    assert_eq!(resolved.len(), 2);
    assert_eq!(resolved[0].as_deref().unwrap(), "https://cdn.test/1.jpg");
    assert!(matches!(resolved[1], Err(Error::Codec(_))));
}

#[tokio::test]
async fn test_fetch_xor_image() {
    let image = b"\x89PNG\r\n\x1a\nimage".to_vec();
    let obfuscated = cipher::xor_keystream(&image, &[0xab, 0x01]);

    let (engine, transport) = engine(
        FakeAdapter {
            obfuscation: Obfuscation::XorStream,
            ..Default::default()
        },
        MockTransport::new().route("https://cdn.test/1.jpg", obfuscated),
    );

    let page = PageRef::new(0, "https://cdn.test/1.jpg")
        .with_header("Referer", "https://reader.test")
        .with_decode_key("ab01");
    let bytes = engine.fetch_image(&page).await.unwrap();
    assert_eq!(bytes.to_vec(), image);
    assert_eq!(
        transport.requests()[0].headers["Referer"],
        vec!["https://reader.test".to_string()]
    );

    let err = engine
        .fetch_image(&PageRef::new(0, "https://cdn.test/1.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Codec(_)));
}

#[tokio::test]
async fn test_source_manager() {
    let mut manager = SourceManager::new();
    let (engine, _) = engine(FakeAdapter::default(), MockTransport::new());

    let info = manager.insert(engine);
    assert_eq!(info.id, 7);
    assert!(manager.get(7).is_ok());
    assert!(manager.find_by_name("fake").is_some());
    assert_eq!(manager.list().len(), 1);

    assert!(matches!(manager.get(8), Err(Error::UnknownSource(8))));
    assert!(manager.unload(7).is_ok());
    assert!(manager.list().is_empty());
}
