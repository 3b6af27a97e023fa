use std::{
    sync::{Arc, Mutex, RwLock},
    time::Duration,
};

use bytes::Bytes;
use yomu_codec::cipher;
use yomu_lib::{
    adapter::{Adapter, CatalogKind, ChapterOrder, ChapterPagination, Obfuscation, SearchMode},
    error::{Error, Result},
    http::{Request, Response},
    models::{ChapterListing, ChapterSummary, Input, MangaSummary, PageRef, Preferences, SourceInfo},
};

use crate::{
    catalog::{self, CatalogPage, SearchDedup},
    config::Config,
    fetch::{RateLimiter, Transport, ensure_success},
    reconcile,
};

/// Drives one adapter: builds its requests, fetches them and turns the
/// responses into host facing results.
pub struct Engine {
    adapter: Arc<dyn Adapter>,
    transport: Arc<dyn Transport>,
    preferences: RwLock<Preferences>,
    search_dedup: Mutex<SearchDedup>,
    limiter: RateLimiter,
}

impl Engine {
    pub fn new(adapter: Arc<dyn Adapter>, transport: Arc<dyn Transport>) -> Self {
        Self {
            adapter,
            transport,
            preferences: RwLock::new(Preferences::new()),
            search_dedup: Mutex::new(SearchDedup::new(5000)),
            limiter: RateLimiter::new(Duration::ZERO),
        }
    }

    /// An engine set up from configuration: dedup capacity, request spacing
    /// and the source's stored preferences.
    pub fn with_config(adapter: Arc<dyn Adapter>, transport: Arc<dyn Transport>, config: &Config) -> Self {
        let prefs = config.preferences_for(&adapter.source_info().name);
        Self {
            preferences: RwLock::new(prefs),
            search_dedup: Mutex::new(SearchDedup::new(config.search_dedup_capacity)),
            limiter: RateLimiter::new(Duration::from_millis(config.rate_limit_ms)),
            ..Self::new(adapter, transport)
        }
    }

    pub fn source_info(&self) -> SourceInfo {
        self.adapter.source_info()
    }

    pub fn filter_list(&self) -> Vec<Input> {
        self.adapter.filter_list()
    }

    pub fn preference_list(&self) -> Vec<Input> {
        self.adapter.preference_list()
    }

    pub fn preferences(&self) -> Preferences {
        match self.preferences.read() {
            Ok(prefs) => prefs.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_preferences(&self, preferences: Preferences) {
        match self.preferences.write() {
            Ok(mut prefs) => *prefs = preferences,
            Err(poisoned) => *poisoned.into_inner() = preferences,
        }
    }

    async fn fetch(&self, mut request: Request) -> Result<Response> {
        for (name, value) in self.adapter.headers() {
            if !request.has_header(&name) {
                request = request.header(&name, &value);
            }
        }

        self.limiter.acquire().await;
        ensure_success(self.transport.execute(request).await?)
    }

    pub async fn list_catalog(
        &self,
        kind: CatalogKind,
        page: i64,
        query: Option<&str>,
        filters: &[Input],
    ) -> Result<CatalogPage> {
        let page = page.max(1);
        let prefs = self.preferences();

        let request = self
            .adapter
            .build_catalog_request(kind, page, query, filters, &prefs)
            .map_err(Error::from_adapter)?;
        let res = self.fetch(request).await?;

        let mut items = self
            .adapter
            .extract_catalog_items(kind, &res)
            .map_err(Error::from_adapter)?;
        catalog::validate_items(&items)?;

        let has_more = match self.adapter.has_next_page(kind, &res) {
            Ok(has_more) => has_more,
            Err(e) => {
                warn!("next page detection failed for {}: {e}", res.url);
                false
            }
        };

        if kind == CatalogKind::Search {
            if let (SearchMode::ClientSide, Some(query)) = (self.adapter.search_mode(), query) {
                if !self.adapter.is_exact_query(query) {
                    items = catalog::filter_by_title(items, query);
                }
            }

            if self.adapter.dedupe_search_titles() {
                let session = format!(
                    "{}\u{1f}{}",
                    query.unwrap_or_default(),
                    serde_json::to_string(filters).unwrap_or_default()
                );
                let mut dedup = match self.search_dedup.lock() {
                    Ok(dedup) => dedup,
                    Err(poisoned) => poisoned.into_inner(),
                };
                items = dedup.filter(&session, page, items);
            }
        }

        debug!("{:?} page {page}: {} items, has_more {has_more}", kind, items.len());

        Ok(CatalogPage { items, has_more })
    }

    /// Fills in details the listing lacks. Sources whose listing is complete
    /// return the manga unchanged without fetching.
    pub async fn manga_detail(&self, manga: &MangaSummary) -> Result<MangaSummary> {
        let prefs = self.preferences();
        let Some(request) = self
            .adapter
            .build_detail_request(manga, &prefs)
            .map_err(Error::from_adapter)?
        else {
            return Ok(manga.clone());
        };

        let res = self.fetch(request).await?;
        let detail = self
            .adapter
            .extract_detail(manga, &res)
            .map_err(Error::from_adapter)?;
        catalog::validate_items(std::slice::from_ref(&detail))?;

        Ok(detail)
    }

    async fn fetch_chapter_page(
        &self,
        manga: &MangaSummary,
        page: i64,
        detail: Option<&Response>,
        prefs: &Preferences,
    ) -> Result<ChapterListing> {
        let request = self
            .adapter
            .build_chapter_list_request(manga, page, detail, prefs)
            .map_err(Error::from_adapter)?;
        let res = self.fetch(request).await?;

        self.adapter
            .extract_chapters(manga, &res)
            .map_err(Error::from_adapter)
    }

    /// Chapters of a manga, newest first.
    pub async fn list_chapters(&self, manga: &MangaSummary) -> Result<Vec<ChapterSummary>> {
        let prefs = self.preferences();

        let detail = if self.adapter.chapters_need_detail() {
            let request = self
                .adapter
                .build_detail_request(manga, &prefs)
                .map_err(Error::from_adapter)?
                .ok_or_else(|| Error::extraction("chapter list needs a detail page but none is built"))?;
            Some(self.fetch(request).await?)
        } else {
            None
        };

        let listing = match self.adapter.chapter_pagination() {
            ChapterPagination::Single => {
                self.fetch_chapter_page(manga, 1, detail.as_ref(), &prefs)
                    .await?
            }
            ChapterPagination::UntilEmpty { max_pages } => {
                let mut listing: Option<ChapterListing> = None;
                for page in 1..=i64::from(max_pages.max(1)) {
                    let next = self
                        .fetch_chapter_page(manga, page, detail.as_ref(), &prefs)
                        .await?;
                    if next.is_empty() {
                        break;
                    }
                    match listing.as_mut() {
                        Some(listing) => listing.extend(next),
                        None => listing = Some(next),
                    }
                }
                listing.unwrap_or(ChapterListing::Flat(vec![]))
            }
        };

        let order = self.adapter.chapter_order();
        let chapters = match listing {
            ChapterListing::Flat(mut chapters) => {
                if order == ChapterOrder::OldestFirst {
                    chapters.reverse();
                }
                chapters
            }
            ChapterListing::BySource(sources) => {
                let streams = sources
                    .into_iter()
                    .map(|source| reconcile::number_stream(source, order, &manga.url))
                    .collect();
                reconcile::reconcile(streams, &self.adapter.source_strategy(&prefs))
            }
        };

        debug!("{}: {} chapters", manga.url, chapters.len());
        Ok(chapters)
    }

    /// Pages of a chapter. Entries without an url are dropped and indices
    /// are reassigned to stay dense.
    pub async fn list_pages(&self, chapter: &ChapterSummary) -> Result<Vec<PageRef>> {
        let prefs = self.preferences();
        let request = self
            .adapter
            .build_page_list_request(chapter, &prefs)
            .map_err(Error::from_adapter)?;
        let res = self.fetch(request).await?;

        let pages = self
            .adapter
            .extract_pages(chapter, &res)
            .map_err(Error::from_adapter)?
            .into_iter()
            .filter(|page| !page.url.trim().is_empty())
            .enumerate()
            .map(|(index, page)| PageRef { index, ..page })
            .collect();

        Ok(pages)
    }

    /// The url to fetch a page image from.
    pub fn resolve_image(&self, page: &PageRef) -> Result<String> {
        match self.adapter.obfuscation() {
            Obfuscation::BlockCipher { key, iv } => {
                Ok(cipher::decrypt_block_to_string(&page.url, &key, &iv)?)
            }
            Obfuscation::None | Obfuscation::XorStream | Obfuscation::BinaryProtocol => {
                Ok(page.url.clone())
            }
        }
    }

    /// Resolves every page on its own; one bad page does not fail the rest.
    pub fn resolve_images(&self, pages: &[PageRef]) -> Vec<Result<String>> {
        pages.iter().map(|page| self.resolve_image(page)).collect()
    }

    /// Downloads a page image, undoing keystream obfuscation.
    pub async fn fetch_image(&self, page: &PageRef) -> Result<Bytes> {
        let url = self.resolve_image(page)?;
        let mut request = Request::get(&url);
        for (name, value) in &page.headers {
            request = request.header(name, value);
        }

        let res = self.fetch(request).await?;
        if self.adapter.obfuscation() != Obfuscation::XorStream {
            return Ok(res.body);
        }

        let key = page.decode_key.as_deref().unwrap_or_default();
        Ok(Bytes::from(cipher::decode_xor_payload(&res.body, key)?))
    }
}
