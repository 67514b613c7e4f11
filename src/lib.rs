//! Page model for a comic reader
//!
//! A comic is a session of pages. Each page is an image or a plain text file,
//! stored loose on disk or as an entry of an archive group. This crate derives
//! everything a viewer needs from a page: raw bytes, the display image, a
//! rendered text page, the aspect ratio used for two-page spreads, and a
//! cached thumbnail.

pub mod config;
pub mod encoding;
pub mod error;
pub mod geometry;
pub mod group;
pub mod model;
pub mod render;
pub mod store;

pub use config::ReaderConfig;
pub use error::{CatalogError, ConfigError, FontError, SourceError};
pub use group::{ArchiveGroup, DirectoryGroup, GroupResolver, MemoryGroup};
pub use model::{Page, PageAttributes, PageId, PageImage};
pub use store::{Catalog, ObjectContext};
