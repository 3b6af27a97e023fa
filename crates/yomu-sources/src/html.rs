//! Small helpers over `scraper` shared by the HTML sites.

use anyhow::{Result, anyhow};
use scraper::{ElementRef, Html, Selector};

pub fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css}: {e:?}"))
}

pub fn select_all<'a>(el: ElementRef<'a>, css: &str) -> Result<Vec<ElementRef<'a>>> {
    let selector = selector(css)?;
    Ok(el.select(&selector).collect())
}

pub fn select_first<'a>(el: ElementRef<'a>, css: &str) -> Result<Option<ElementRef<'a>>> {
    let selector = selector(css)?;
    Ok(el.select(&selector).next())
}

/// Trimmed text of the first match, `None` when nothing matches or the text
/// is blank.
pub fn text_of(el: ElementRef<'_>, css: &str) -> Result<Option<String>> {
    Ok(select_first(el, css)?.map(text).filter(|t| !t.is_empty()))
}

/// Text of an element with whitespace runs collapsed.
pub fn text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn attr(el: ElementRef<'_>, name: &str) -> Option<String> {
    el.value()
        .attr(name)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Image source, preferring lazy-load attributes over `src`.
pub fn img_src(img: ElementRef<'_>) -> Option<String> {
    ["data-src", "data-lazy-src", "src"]
        .iter()
        .find_map(|name| attr(img, name))
}

pub fn exists(el: ElementRef<'_>, css: &str) -> Result<bool> {
    Ok(select_first(el, css)?.is_some())
}

pub fn document(body: &str) -> Html {
    Html::parse_document(body)
}
