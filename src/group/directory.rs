use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{entry_position, ArchiveGroup};
use crate::model::is_page_path;

/// A folder of loose page files, treated as one group
///
/// Entries are every image or text file below the root (recursively),
/// ordered by path so page indexes are stable between runs.
#[derive(Debug, Clone)]
pub struct DirectoryGroup {
    root: PathBuf,
    entries: Vec<PathBuf>,
}

impl DirectoryGroup {
    /// Scan `root` for page files
    pub fn scan(root: impl Into<PathBuf>) -> Self {
        let root = root.into();

        let mut entries: Vec<PathBuf> = WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|path| is_page_path(path))
            .collect();
        entries.sort();

        log::info!("📁 Found {} pages in {}", entries.len(), root.display());

        Self { root, entries }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }
}

impl ArchiveGroup for DirectoryGroup {
    fn data_for_page_index(&self, index: i64) -> Option<Vec<u8>> {
        let position = entry_position(index, self.entries.len())?;
        let path = &self.entries[position];

        match std::fs::read(path) {
            Ok(data) => Some(data),
            Err(e) => {
                log::debug!("failed to read group entry {}: {}", path.display(), e);
                None
            }
        }
    }

    fn page_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_name(&self, index: i64) -> Option<String> {
        let position = entry_position(index, self.entries.len())?;
        self.entries[position]
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    }
}
