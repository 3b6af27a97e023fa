pub use crate::adapter::{
    Adapter, CatalogKind, ChapterOrder, ChapterPagination, Obfuscation, SearchMode,
    SourceStrategy,
};
pub use crate::error::Error;
pub use crate::http::{Request, Response};
pub use crate::models::*;
