pub mod source_info;
pub use source_info::*;

pub mod manga;
pub use manga::*;

pub mod chapter;
pub use chapter::*;

pub mod page;
pub use page::*;

pub mod input;
pub use input::*;

pub mod preferences;
pub use preferences::*;
