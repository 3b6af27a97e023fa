use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use yomu_engine::{engine::Engine, manager::SourceManager};
use yomu_lib::{
    adapter::CatalogKind,
    models::{ChapterSummary, Input, MangaSummary},
};

/// Looks a source up by id first, then by name.
pub fn find_source(manager: &SourceManager, source: &str) -> Result<std::sync::Arc<Engine>> {
    if let Ok(id) = source.parse::<i64>() {
        return Ok(manager.get(id)?);
    }
    manager
        .find_by_name(source)
        .ok_or_else(|| anyhow!("no source named {source}"))
}

pub fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn parse_filters(filters: Option<&str>) -> Result<Vec<Input>> {
    match filters {
        Some(json) => serde_json::from_str(json).context("filters must be a json array of inputs"),
        None => Ok(vec![]),
    }
}

pub async fn catalog(
    engine: &Engine,
    kind: CatalogKind,
    page: i64,
    query: Option<&str>,
    filters: &[Input],
) -> Result<()> {
    let page = engine.list_catalog(kind, page, query, filters).await?;
    print(&page)
}

pub async fn detail(engine: &Engine, url: &str) -> Result<()> {
    let manga = engine.manga_detail(&MangaSummary::new(url, "")).await?;
    print(&manga)
}

pub async fn chapters(engine: &Engine, url: &str) -> Result<()> {
    let chapters = engine.list_chapters(&MangaSummary::new(url, "")).await?;
    print(&chapters)
}

pub async fn pages(engine: &Engine, url: &str) -> Result<()> {
    let chapter = ChapterSummary {
        url: url.to_string(),
        ..Default::default()
    };
    let pages = engine.list_pages(&chapter).await?;

    for (page, resolved) in pages.iter().zip(engine.resolve_images(&pages)) {
        match resolved {
            Ok(url) => println!("{}\t{url}", page.index),
            Err(e) => error!("page {}: {e}", page.index),
        }
    }
    Ok(())
}
