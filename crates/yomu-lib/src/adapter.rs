use std::collections::HashMap;

use anyhow::{Result, anyhow};

use crate::{
    http::{Request, Response},
    models::{ChapterListing, ChapterSummary, Input, MangaSummary, PageRef, Preferences, SourceInfo},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogKind {
    Popular,
    Latest,
    Search,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// The site filters by query.
    #[default]
    Server,
    /// The site returns its full list and results are filtered by title
    /// locally.
    ClientSide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChapterPagination {
    #[default]
    Single,
    /// Keep fetching pages 1, 2, ... until one extracts nothing.
    UntilEmpty { max_pages: u32 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChapterOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// How page images are hidden from plain fetching.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Obfuscation {
    #[default]
    None,
    /// Page urls are base64 AES-CBC tokens.
    BlockCipher { key: Vec<u8>, iv: Vec<u8> },
    /// Image bytes are XORed with the page's decode key.
    XorStream,
    /// Responses are binary protocol payloads decoded during extraction.
    BinaryProtocol,
}

/// Which streams a multi-source chapter listing is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SourceStrategy {
    /// Every stream, one after another.
    #[default]
    All,
    /// The longest stream, completed with numbers it lacks.
    Most,
    /// Every number once, first stream wins.
    Smart,
    /// Streams whose name contains the value, completed with numbers they
    /// lack.
    Prefer(String),
}

impl SourceStrategy {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "all" => Self::All,
            "most" => Self::Most,
            "smart" => Self::Smart,
            other => Self::Prefer(other.to_string()),
        }
    }
}

/// The contract every source site implements.
///
/// Adapters describe requests and extract results; they never perform I/O
/// themselves. All hooks are synchronous, the engine drives fetching.
pub trait Adapter: Send + Sync {
    fn source_info(&self) -> SourceInfo;

    /// Headers added to every request that does not already set them.
    fn headers(&self) -> HashMap<String, String> {
        HashMap::new()
    }

    fn filter_list(&self) -> Vec<Input> {
        vec![]
    }

    fn preference_list(&self) -> Vec<Input> {
        vec![]
    }

    fn search_mode(&self) -> SearchMode {
        SearchMode::Server
    }

    /// Client-side search queries the adapter resolves exactly itself, such
    /// as deep links. The engine does not filter these by title.
    fn is_exact_query(&self, _query: &str) -> bool {
        false
    }

    /// Whether search results repeat across pages and need de-duplicating by
    /// title.
    fn dedupe_search_titles(&self) -> bool {
        false
    }

    fn build_catalog_request(
        &self,
        kind: CatalogKind,
        page: i64,
        query: Option<&str>,
        filters: &[Input],
        prefs: &Preferences,
    ) -> Result<Request>;

    fn extract_catalog_items(&self, kind: CatalogKind, res: &Response) -> Result<Vec<MangaSummary>>;

    fn has_next_page(&self, _kind: CatalogKind, _res: &Response) -> Result<bool> {
        Ok(false)
    }

    /// `None` when the listing already carries every detail.
    fn build_detail_request(&self, _manga: &MangaSummary, _prefs: &Preferences) -> Result<Option<Request>> {
        Ok(None)
    }

    fn extract_detail(&self, manga: &MangaSummary, _res: &Response) -> Result<MangaSummary> {
        Ok(manga.clone())
    }

    /// Whether the chapter list request needs the detail page first.
    fn chapters_need_detail(&self) -> bool {
        false
    }

    fn build_chapter_list_request(
        &self,
        manga: &MangaSummary,
        page: i64,
        detail: Option<&Response>,
        prefs: &Preferences,
    ) -> Result<Request>;

    fn chapter_pagination(&self) -> ChapterPagination {
        ChapterPagination::Single
    }

    fn chapter_order(&self) -> ChapterOrder {
        ChapterOrder::NewestFirst
    }

    fn source_strategy(&self, _prefs: &Preferences) -> SourceStrategy {
        SourceStrategy::All
    }

    fn extract_chapters(&self, manga: &MangaSummary, res: &Response) -> Result<ChapterListing>;

    fn build_page_list_request(&self, chapter: &ChapterSummary, prefs: &Preferences) -> Result<Request>;

    fn extract_pages(&self, chapter: &ChapterSummary, res: &Response) -> Result<Vec<PageRef>>;

    fn obfuscation(&self) -> Obfuscation {
        Obfuscation::None
    }
}

/// Fails with a readable message for catalog kinds a site does not offer.
pub fn unsupported(kind: CatalogKind, source: &str) -> anyhow::Error {
    anyhow!("{source} does not support {kind:?} listings")
}
