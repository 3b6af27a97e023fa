//! Reference adapters for a handful of real sites.

#[macro_use]
extern crate log;

use std::sync::Arc;

use yomu_engine::fetch::Transport;
use yomu_lib::adapter::Adapter;

pub mod guya;
mod html;
pub mod madara;
pub mod mangapark;
pub mod mangaplus;
pub mod manhuadui;

use mangaplus::{Language, MangaPlus};

/// Every bundled adapter. `transport` serves sources that load reference
/// data of their own, such as Guya's scanlator groups.
pub fn all(transport: Arc<dyn Transport>) -> Vec<Arc<dyn Adapter>> {
    let mut adapters: Vec<Arc<dyn Adapter>> = madara::all()
        .into_iter()
        .map(|source| Arc::new(source) as Arc<dyn Adapter>)
        .collect();

    for lang in [Language::English, Language::Spanish] {
        match MangaPlus::new(lang) {
            Ok(source) => adapters.push(Arc::new(source)),
            Err(e) => error!("failed to load MANGA Plus {lang:?}: {e}"),
        }
    }

    adapters.push(Arc::new(guya::Guya::new(transport)));
    adapters.push(Arc::new(mangapark::MangaPark::new()));
    adapters.push(Arc::new(manhuadui::Manhuadui::new()));

    adapters
}
