pub use crate::catalog::CatalogPage;
pub use crate::config::Config;
pub use crate::date::{DateParser, TimeUnit};
pub use crate::engine::Engine;
pub use crate::fetch::{Fetcher, Transport};
pub use crate::manager::SourceManager;
pub use crate::numbering::parse_chapter_number;
pub use crate::scanlator::{ScanlatorCache, select_best_group};
