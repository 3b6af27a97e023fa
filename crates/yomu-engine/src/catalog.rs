use std::collections::HashSet;

use serde::Serialize;
use yomu_lib::{
    error::{Error, Result},
    models::MangaSummary,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogPage {
    pub items: Vec<MangaSummary>,
    pub has_more: bool,
}

/// Rejects the whole page when any item lacks an url or a title.
pub fn validate_items(items: &[MangaSummary]) -> Result<()> {
    for (i, item) in items.iter().enumerate() {
        if item.url.trim().is_empty() {
            return Err(Error::extraction(format!("catalog item {i} has no url")));
        }
        if item.title.trim().is_empty() {
            return Err(Error::extraction(format!(
                "catalog item {i} ({}) has no title",
                item.url
            )));
        }
    }

    Ok(())
}

/// Keeps items whose title contains `query`, ignoring case.
pub fn filter_by_title(items: Vec<MangaSummary>, query: &str) -> Vec<MangaSummary> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return items;
    }

    items
        .into_iter()
        .filter(|item| item.title.to_lowercase().contains(&query))
        .collect()
}

/// Drops search results whose title was already returned in the same search
/// session.
///
/// A session is one query and filter combination; asking for page 1 or for a
/// different combination starts a new one. The seen set holds at most
/// `capacity` titles and is cleared when full.
#[derive(Debug)]
pub struct SearchDedup {
    capacity: usize,
    session: Option<String>,
    seen: HashSet<String>,
}

impl SearchDedup {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            session: None,
            seen: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn filter(&mut self, session: &str, page: i64, items: Vec<MangaSummary>) -> Vec<MangaSummary> {
        if page <= 1 || self.session.as_deref() != Some(session) {
            self.seen.clear();
            self.session = Some(session.to_string());
        }

        items
            .into_iter()
            .filter(|item| {
                let title = item.title.trim().to_lowercase();
                if self.seen.contains(&title) {
                    return false;
                }
                if self.seen.len() >= self.capacity {
                    debug!("search dedup reached {} titles, clearing", self.capacity);
                    self.seen.clear();
                }
                self.seen.insert(title);
                true
            })
            .collect()
    }
}
