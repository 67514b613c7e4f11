use super::{entry_position, ArchiveGroup};

/// Named entries held in memory, e.g. the output of an archive extractor
#[derive(Debug, Clone, Default)]
pub struct MemoryGroup {
    entries: Vec<(String, Vec<u8>)>,
}

impl MemoryGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; its index is the current entry count
    pub fn push(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> i64 {
        self.entries.push((name.into(), data.into()));
        (self.entries.len() - 1) as i64
    }

    pub fn with_entry(mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.push(name, data);
        self
    }
}

impl ArchiveGroup for MemoryGroup {
    fn data_for_page_index(&self, index: i64) -> Option<Vec<u8>> {
        let position = entry_position(index, self.entries.len())?;
        Some(self.entries[position].1.clone())
    }

    fn page_count(&self) -> usize {
        self.entries.len()
    }

    fn entry_name(&self, index: i64) -> Option<String> {
        let position = entry_position(index, self.entries.len())?;
        Some(self.entries[position].0.clone())
    }
}
