use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use super::catalog::Catalog;
use crate::error::CatalogError;
use crate::group::{ArchiveGroup, DirectoryGroup, GroupResolver};
use crate::model::{is_text_path, GroupId, Page, PageAttributes, PageId, SessionId};

type Result<T> = std::result::Result<T, CatalogError>;

/// The in-memory object graph of live pages
///
/// Pages come to life here, either inserted as new rows or fetched from the
/// catalog, and stay cached until evicted. Dropping the last `Arc<Page>`
/// releases the page's locks. Groups are runtime objects registered by id;
/// pages only hold the id and resolve it through this context.
pub struct ObjectContext {
    catalog: Catalog,
    pages: RwLock<HashMap<PageId, Arc<Page>>>,
    groups: RwLock<HashMap<GroupId, Arc<dyn ArchiveGroup>>>,
}

impl ObjectContext {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            pages: RwLock::new(HashMap::new()),
            groups: RwLock::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn create_session(&self) -> Result<SessionId> {
        self.catalog.create_session()
    }

    /// Persist a new page and return it live
    pub fn insert_page(&self, attrs: PageAttributes) -> Result<Arc<Page>> {
        let id = self.catalog.insert_page(&attrs)?;
        let page = Arc::new(Page::new(id, attrs));

        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, page.clone());

        log::debug!("inserted page {:?}", id);
        Ok(page)
    }

    /// The live page for `id`, loading it from the catalog if needed
    pub fn fetch_page(&self, id: PageId) -> Result<Arc<Page>> {
        if let Some(page) = self.page(id) {
            return Ok(page);
        }

        let attrs = self.catalog.fetch_page(id)?;
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        // Another thread may have loaded it meanwhile; keep the first one
        let page = pages
            .entry(id)
            .or_insert_with(|| Arc::new(Page::new(id, attrs)))
            .clone();
        Ok(page)
    }

    /// The live page for `id`, without touching the catalog
    pub fn page(&self, id: PageId) -> Option<Arc<Page>> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Every page of a session, in reading order
    pub fn session_pages(&self, session: SessionId) -> Result<Vec<Arc<Page>>> {
        self.catalog
            .pages_for_session(session)?
            .into_iter()
            .map(|(id, _)| self.fetch_page(id))
            .collect()
    }

    /// Drop a page from the graph, writing pending changes first
    ///
    /// Returns whether the page was live. When the write fails the page
    /// stays live and changed, so a later `save` or `evict` can retry.
    pub fn evict(&self, id: PageId) -> Result<bool> {
        let removed = self
            .pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);

        let Some(page) = removed else {
            return Ok(false);
        };

        if let Err(e) = self.write_back(&page) {
            log::warn!("⚠️  Keeping page {:?} live, write failed: {}", id, e);
            self.pages
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .entry(id)
                .or_insert(page);
            return Err(e);
        }

        log::debug!("evicted page {:?}", id);
        Ok(true)
    }

    pub fn live_count(&self) -> usize {
        self.pages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Write every changed page to the catalog; returns how many were written
    pub fn save(&self) -> Result<usize> {
        // Work on a snapshot so no graph lock is held during the writes
        let live: Vec<Arc<Page>> = self
            .pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        let mut written = 0;
        for page in live {
            if self.write_back(&page)? {
                written += 1;
            }
        }

        if written > 0 {
            log::info!("💾 Saved {} changed pages", written);
        }
        Ok(written)
    }

    fn write_back(&self, page: &Page) -> Result<bool> {
        if !page.take_dirty() {
            return Ok(false);
        }

        if let Err(e) = self.catalog.update_page(page.id(), &page.attributes()) {
            page.mark_dirty();
            return Err(e);
        }
        Ok(true)
    }

    // ========== Groups ==========

    pub fn register_group(&self, id: GroupId, group: Arc<dyn ArchiveGroup>) {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, group);
    }

    /// Record a group in the catalog and add one page per entry
    pub fn add_group_pages(
        &self,
        session: SessionId,
        path: &str,
        group: Arc<dyn ArchiveGroup>,
    ) -> Result<(GroupId, Vec<Arc<Page>>)> {
        let group_id = self.catalog.insert_group(path, Some(session))?;
        self.register_group(group_id, group.clone());

        let mut pages = Vec::with_capacity(group.page_count());
        for index in 0..group.page_count() as i64 {
            let is_text = group
                .entry_name(index)
                .is_some_and(|name| is_text_path(Path::new(&name)));

            let attrs = PageAttributes::group_entry(group_id, index, is_text).with_session(session);
            pages.push(self.insert_page(attrs)?);
        }

        log::info!("📚 Added group {} with {} pages", path, pages.len());
        Ok((group_id, pages))
    }

    /// Add a loose file from disk as a page of `session`
    pub fn add_loose_file(&self, session: SessionId, path: &Path) -> Result<Arc<Page>> {
        let attrs = PageAttributes::loose_file(path.to_string_lossy(), is_text_path(path))
            .with_session(session);
        self.insert_page(attrs)
    }

    /// Re-register the folder groups of a stored session
    ///
    /// Returns how many groups were found on disk. Folders that no longer
    /// exist stay unregistered and their pages read as unavailable.
    pub fn restore_directory_groups(&self, session: SessionId) -> Result<usize> {
        let mut restored = 0;
        for (id, path) in self.catalog.groups_for_session(session)? {
            if Path::new(&path).is_dir() {
                self.register_group(id, Arc::new(DirectoryGroup::scan(&path)));
                restored += 1;
            } else {
                log::warn!("⚠️  Group folder is gone: {}", path);
            }
        }
        Ok(restored)
    }
}

impl GroupResolver for ObjectContext {
    fn group(&self, id: GroupId) -> Option<Arc<dyn ArchiveGroup>> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::MemoryGroup;
    use image::{ImageFormat, RgbaImage};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::new(width, height)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn context() -> ObjectContext {
        ObjectContext::new(Catalog::open_in_memory().unwrap())
    }

    #[test]
    fn test_group_pages_are_classified() {
        let ctx = context();
        let session = ctx.create_session().unwrap();
        let group = MemoryGroup::new()
            .with_entry("01.png", png_bytes(10, 20))
            .with_entry("release.nfo", b"greetings".to_vec());

        let (group_id, pages) = ctx.add_group_pages(session, "memory", Arc::new(group)).unwrap();

        assert_eq!(pages.len(), 2);
        assert!(!pages[0].is_text());
        assert!(pages[1].is_text());
        assert_eq!(pages[1].index(), Some(1));
        assert_eq!(pages[0].group(), Some(group_id));
        assert_eq!(pages[0].page_data(&ctx).unwrap(), png_bytes(10, 20));
    }

    #[test]
    fn test_derived_fields_survive_eviction() {
        let ctx = context();
        let session = ctx.create_session().unwrap();
        let group = MemoryGroup::new().with_entry("01.png", png_bytes(30, 60));
        let (_, pages) = ctx.add_group_pages(session, "memory", Arc::new(group)).unwrap();
        let id = pages[0].id();

        assert!(pages[0].thumbnail(&ctx).is_some());
        drop(pages);

        assert!(ctx.evict(id).unwrap());
        assert_eq!(ctx.live_count(), 0);

        let page = ctx.fetch_page(id).unwrap();
        assert_eq!(page.aspect_ratio(), Some(0.5));
        assert!(page.thumbnail_data().is_some());
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_save_writes_only_changed_pages() {
        let ctx = context();
        let session = ctx.create_session().unwrap();
        let first = ctx.add_loose_file(session, Path::new("/tmp/one.png")).unwrap();
        let _second = ctx.add_loose_file(session, Path::new("/tmp/two.txt")).unwrap();

        assert_eq!(ctx.save().unwrap(), 0);

        first.set_thumbnail_data(Some(vec![9, 9]));
        assert_eq!(ctx.save().unwrap(), 1);
        assert_eq!(ctx.save().unwrap(), 0);

        let stored = ctx.catalog().fetch_page(first.id()).unwrap();
        assert_eq!(stored.thumbnail_data, Some(vec![9, 9]));
    }

    #[test]
    fn test_failed_eviction_keeps_the_page() {
        let ctx = context();
        let session = ctx.create_session().unwrap();
        let page = ctx.add_loose_file(session, Path::new("/tmp/one.png")).unwrap();
        let id = page.id();

        // Removing the session takes the page row with it
        ctx.catalog().delete_session(session).unwrap();
        page.set_thumbnail_data(Some(vec![1, 2, 3]));

        assert!(matches!(ctx.evict(id), Err(CatalogError::PageNotFound(missing)) if missing == id));
        assert_eq!(ctx.live_count(), 1);
        assert!(page.is_dirty());

        let live = ctx.page(id).unwrap();
        assert!(Arc::ptr_eq(&page, &live));
        assert_eq!(live.thumbnail_data(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_fetch_returns_the_live_instance() {
        let ctx = context();
        let session = ctx.create_session().unwrap();
        let page = ctx.add_loose_file(session, Path::new("/tmp/notes.txt")).unwrap();

        assert!(page.is_text());
        assert!(Arc::ptr_eq(&page, &ctx.fetch_page(page.id()).unwrap()));
        assert_eq!(ctx.session_pages(session).unwrap().len(), 1);
        assert!(!ctx.evict(PageId(999)).unwrap());
    }

    #[test]
    fn test_restore_directory_groups() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("01.png"), png_bytes(4, 4)).unwrap();

        let ctx = context();
        let session = ctx.create_session().unwrap();
        let path = dir.path().to_string_lossy().to_string();
        let (_, pages) = ctx
            .add_group_pages(session, &path, Arc::new(DirectoryGroup::scan(dir.path())))
            .unwrap();
        let id = pages[0].id();
        drop(pages);
        ctx.evict(id).unwrap();

        // A fresh context over the same catalog knows nothing about the folder
        let reopened = ObjectContext::new(ctx.catalog);
        let page = reopened.fetch_page(id).unwrap();
        assert!(page.page_data(&reopened).is_none());

        assert_eq!(reopened.restore_directory_groups(session).unwrap(), 1);
        assert!(page.page_data(&reopened).is_some());
    }
}
