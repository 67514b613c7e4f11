//! Archive groups: containers that own an ordered list of page entries
//!
//! Pages never own their group. They store a `GroupId` and resolve it
//! through a [`GroupResolver`] when they need bytes.
//!
//! - `directory.rs` - a folder on disk, entries in sorted name order
//! - `memory.rs` - entries already extracted into memory

pub mod directory;
pub mod memory;

pub use directory::DirectoryGroup;
pub use memory::MemoryGroup;

use std::sync::Arc;

use crate::model::GroupId;

/// A container of page entries addressed by zero-based index
pub trait ArchiveGroup: Send + Sync {
    /// Raw bytes of entry `index`, or `None` if out of range or unreadable
    fn data_for_page_index(&self, index: i64) -> Option<Vec<u8>>;

    /// Number of entries
    fn page_count(&self) -> usize;

    /// Display name of entry `index` (used to classify text entries)
    fn entry_name(&self, index: i64) -> Option<String>;
}

/// Resolves a page's weak group reference to the live group
pub trait GroupResolver {
    fn group(&self, id: GroupId) -> Option<Arc<dyn ArchiveGroup>>;
}

/// Resolver with no groups, for pages that only use loose files
pub struct NoGroups;

impl GroupResolver for NoGroups {
    fn group(&self, _id: GroupId) -> Option<Arc<dyn ArchiveGroup>> {
        None
    }
}

/// Convert a signed page index into a slice position
pub(crate) fn entry_position(index: i64, len: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < len)
}
