//! Page data model
//!
//! - `attributes.rs` - persisted page attributes and typed ids
//! - `page.rs` - the `Page` entity and its image derivations

pub mod attributes;
pub mod page;

pub use attributes::{GroupId, PageAttributes, PageId, SessionId, SizeInfo};
pub use page::{
    image_extensions, is_image_path, is_page_path, is_text_path, CacheMode, Page, PageImage,
    TEXT_EXTENSIONS, THUMBNAIL_SIZE,
};
