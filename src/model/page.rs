//! The page entity
//!
//! A `Page` is one viewable unit of a comic: an image or a plain text file,
//! either loose on disk (`image_path`) or entry `index` of an archive group.
//! It derives, on demand:
//! - the raw page bytes
//! - the decoded display image (or a rendered text page)
//! - the cached pixel size and aspect ratio
//! - a 256px thumbnail, cached as PNG bytes
//!
//! Derivations never fail loudly. An unavailable source or an undecodable
//! image yields `None` and the caller shows a placeholder.

use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::attributes::{GroupId, PageAttributes, PageId, SessionId, SizeInfo};
use crate::encoding::UniversalDetector;
use crate::error::SourceError;
use crate::geometry::{constrain_size, Size};
use crate::group::GroupResolver;
use crate::render::render_text_page;

/// Largest dimension of generated thumbnails
pub const THUMBNAIL_SIZE: u32 = 256;

/// Pages wider than this aspect ratio are spreads and shown alone
const SINGLE_PAGE_ASPECT: f64 = 1.0;

/// Extensions of files that are rendered as text pages
pub const TEXT_EXTENSIONS: [&str; 3] = ["txt", "nfo", "info"];

/// Lowercase extensions of every raster format the decoder can read
///
/// Document formats (PDF, EPS) are never page images.
pub fn image_extensions() -> &'static [&'static str] {
    static EXTENSIONS: OnceLock<Vec<&'static str>> = OnceLock::new();
    EXTENSIONS.get_or_init(|| {
        ImageFormat::all()
            .filter(|format| format.reading_enabled())
            .flat_map(|format| format.extensions_str().iter().copied())
            .filter(|ext| !matches!(*ext, "pdf" | "eps"))
            .collect()
    })
}

fn lowercase_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

pub fn is_image_path(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| image_extensions().contains(&ext.as_str()))
}

pub fn is_text_path(path: &Path) -> bool {
    lowercase_extension(path).is_some_and(|ext| TEXT_EXTENSIONS.contains(&ext.as_str()))
}

/// Anything a comic can contain as a page
pub fn is_page_path(path: &Path) -> bool {
    is_image_path(path) || is_text_path(path)
}

/// How a rendering layer may cache a page image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// No instruction, the consumer decides
    Default,
    /// Cache only keyed by the explicit display size, never by content
    BySize,
}

/// A decoded page ready for display
#[derive(Debug, Clone)]
pub struct PageImage {
    pub image: DynamicImage,
    /// Authoritative display size; wins over the bitmap's own dimensions
    pub size: Size,
    pub cache_mode: CacheMode,
}

/// One page of a comic or a loose file in a session
///
/// Attributes live behind a lock so a page can be shared between the UI
/// thread and background thumbnail workers. Two advisory locks live as long
/// as the entity:
/// - the thumbnail lock serializes `prep_thumbnail`
/// - the loader lock is reserved for streaming page loads and is not taken
///   by any derivation here
pub struct Page {
    id: PageId,
    attributes: RwLock<PageAttributes>,
    dirty: AtomicBool,
    thumb_lock: Mutex<()>,
    loader_lock: Mutex<()>,
}

impl Page {
    /// Bring a page to life, either freshly inserted or loaded from storage
    pub fn new(id: PageId, attributes: PageAttributes) -> Self {
        Self {
            id,
            attributes: RwLock::new(attributes),
            dirty: AtomicBool::new(false),
            thumb_lock: Mutex::new(()),
            loader_lock: Mutex::new(()),
        }
    }

    fn attrs(&self) -> RwLockReadGuard<'_, PageAttributes> {
        self.attributes.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write access that marks the page changed
    ///
    /// The flag is raised only once the write lock is held, so a saver that
    /// clears it and then snapshots always sees the new value.
    fn attrs_mut(&self) -> RwLockWriteGuard<'_, PageAttributes> {
        let guard = self.attributes.write().unwrap_or_else(PoisonError::into_inner);
        self.dirty.store(true, Ordering::Release);
        guard
    }

    // ========== Attributes ==========

    pub fn id(&self) -> PageId {
        self.id
    }

    /// Snapshot of every stored attribute
    pub fn attributes(&self) -> PageAttributes {
        self.attrs().clone()
    }

    pub fn image_path(&self) -> Option<String> {
        self.attrs().image_path.clone()
    }

    pub fn index(&self) -> Option<i64> {
        self.attrs().index
    }

    pub fn is_text(&self) -> bool {
        self.attrs().is_text
    }

    pub fn group(&self) -> Option<GroupId> {
        self.attrs().group
    }

    pub fn session(&self) -> Option<SessionId> {
        self.attrs().session
    }

    pub fn size(&self) -> Option<SizeInfo> {
        self.attrs().size
    }

    pub fn width(&self) -> Option<f64> {
        self.size().map(|s| s.width)
    }

    pub fn height(&self) -> Option<f64> {
        self.size().map(|s| s.height)
    }

    pub fn aspect_ratio(&self) -> Option<f64> {
        self.size().map(|s| s.aspect_ratio)
    }

    pub fn thumbnail_data(&self) -> Option<Vec<u8>> {
        self.attrs().thumbnail_data.clone()
    }

    pub fn set_image_path(&self, path: Option<String>) {
        self.attrs_mut().image_path = path;
    }

    pub fn set_index(&self, index: Option<i64>) {
        self.attrs_mut().index = index;
    }

    pub fn set_is_text(&self, is_text: bool) {
        self.attrs_mut().is_text = is_text;
    }

    pub fn set_thumbnail_data(&self, data: Option<Vec<u8>>) {
        self.attrs_mut().thumbnail_data = data;
    }

    /// Forget the cached size and thumbnail
    ///
    /// Nothing calls this automatically; whoever changes the page source
    /// is responsible for it.
    pub fn clear_cached_derivations(&self) {
        let mut attrs = self.attrs_mut();
        attrs.size = None;
        attrs.thumbnail_data = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Read and reset the change flag (used by the persistence layer)
    pub(crate) fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Hold the loader lock for the lifetime of the guard
    pub fn lock_loader(&self) -> MutexGuard<'_, ()> {
        self.loader_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ========== Derivations ==========

    /// Last path component of `image_path`
    pub fn name(&self) -> Option<String> {
        let path = self.image_path()?;
        Path::new(&path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
    }

    /// Raw page bytes from the owning group or from disk
    pub fn page_data(&self, groups: &dyn GroupResolver) -> Option<Vec<u8>> {
        match self.read_source(groups) {
            Ok(data) => Some(data),
            Err(e) => {
                log::debug!("page {:?} unavailable: {}", self.id, e);
                None
            }
        }
    }

    fn read_source(&self, groups: &dyn GroupResolver) -> Result<Vec<u8>, SourceError> {
        // Copy what we need; the attribute lock is not held while reading
        let (index, group, image_path) = {
            let attrs = self.attrs();
            (attrs.index, attrs.group, attrs.image_path.clone())
        };

        if let Some(index) = index {
            let group_id = group.ok_or(SourceError::MissingGroup)?;
            let group = groups
                .group(group_id)
                .ok_or(SourceError::GroupUnavailable(group_id))?;
            return group
                .data_for_page_index(index)
                .ok_or(SourceError::IndexOutOfRange(index));
        }

        let path = image_path.ok_or(SourceError::NoSource)?;
        std::fs::read(&path).map_err(|source| SourceError::Read {
            path: path.into(),
            source,
        })
    }

    /// Cache width, height and aspect ratio from an image header
    ///
    /// Bytes that are not an image, or that describe a zero-area image,
    /// leave the cached size untouched.
    pub fn set_own_size_info(&self, data: &[u8]) {
        let Some(size) = read_dimensions(data).and_then(|(w, h)| SizeInfo::from_pixels(w, h)) else {
            return;
        };

        if self.size() == Some(size) {
            return;
        }
        self.attrs_mut().size = Some(size);
    }

    /// Whether this page is shown on its own instead of in a two-page spread
    ///
    /// Text pages and wide pages stand alone. An unknown aspect ratio is
    /// resolved by fetching the page once; if it stays unknown the page
    /// stands alone.
    pub fn should_display_alone(&self, groups: &dyn GroupResolver) -> bool {
        if self.is_text() {
            return true;
        }

        if self.aspect_ratio().is_none() {
            if let Some(data) = self.page_data(groups) {
                self.set_own_size_info(&data);
            }
        }

        match self.aspect_ratio() {
            Some(aspect) => aspect > SINGLE_PAGE_ASPECT,
            None => true,
        }
    }

    /// Render the page's text onto a white raster
    ///
    /// `None` only when the source is unavailable. Text that cannot be
    /// decoded gives a blank page.
    pub fn text_page(&self, groups: &dyn GroupResolver) -> Option<RgbaImage> {
        let data = self.page_data(groups)?;
        Some(render_text_page(&data, &mut UniversalDetector::new()))
    }

    /// The display image: a rendered text page or the decoded page bytes
    pub fn page_image(&self, groups: &dyn GroupResolver) -> Option<PageImage> {
        if self.is_text() {
            let canvas = self.text_page(groups)?;
            let size = Size::new(f64::from(canvas.width()), f64::from(canvas.height()));
            return Some(PageImage {
                image: DynamicImage::ImageRgba8(canvas),
                size,
                cache_mode: CacheMode::Default,
            });
        }

        let data = self.page_data(groups)?;
        self.set_own_size_info(&data);

        let image = match image::load_from_memory(&data) {
            Ok(image) => image,
            Err(e) => {
                log::debug!("page {:?} is not a decodable image: {}", self.id, e);
                return None;
            }
        };

        // Zero-area sizes are never cached, so a known size is a usable one
        let size = self.size()?;

        Some(PageImage {
            image,
            size: Size::new(size.width, size.height),
            cache_mode: CacheMode::BySize,
        })
    }

    /// The thumbnail, from the cached bytes when present
    pub fn thumbnail(&self, groups: &dyn GroupResolver) -> Option<DynamicImage> {
        let data = match self.thumbnail_data() {
            Some(data) => data,
            None => self.prep_thumbnail(groups)?,
        };

        match image::load_from_memory(&data) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!("page {:?} has an unreadable thumbnail cache: {}", self.id, e);
                None
            }
        }
    }

    /// Build the encoded thumbnail and store it in `thumbnail_data`
    ///
    /// Runs under the thumbnail lock. A caller that waited on the lock picks
    /// up the bytes the previous holder stored instead of deriving again.
    pub fn prep_thumbnail(&self, groups: &dyn GroupResolver) -> Option<Vec<u8>> {
        let _guard = self.thumb_lock.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(cached) = self.thumbnail_data() {
            return Some(cached);
        }

        let page_image = self.page_image(groups)?;
        let data = encode_thumbnail(&page_image)?;

        log::debug!("page {:?}: built {} byte thumbnail", self.id, data.len());
        self.set_thumbnail_data(Some(data.clone()));
        Some(data)
    }
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("id", &self.id)
            .field("attributes", &*self.attrs())
            .finish()
    }
}

/// Pixel dimensions from the image header, without decoding pixels
fn read_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Scale to `THUMBNAIL_SIZE` and encode as PNG
fn encode_thumbnail(page_image: &PageImage) -> Option<Vec<u8>> {
    let target = constrain_size(page_image.size, f64::from(THUMBNAIL_SIZE));
    let (width, height) = target.to_pixels();

    let canvas = page_image
        .image
        .resize_exact(width, height, FilterType::Lanczos3)
        .to_rgba8();

    let mut bytes = Vec::new();
    if let Err(e) = canvas.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png) {
        log::warn!("failed to encode thumbnail: {}", e);
        return None;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{ArchiveGroup, MemoryGroup, NoGroups};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([200, 30, 30, 255]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    /// Group that counts how often entries are read
    struct CountingGroup {
        inner: MemoryGroup,
        reads: AtomicUsize,
    }

    impl ArchiveGroup for CountingGroup {
        fn data_for_page_index(&self, index: i64) -> Option<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.data_for_page_index(index)
        }

        fn page_count(&self) -> usize {
            self.inner.page_count()
        }

        fn entry_name(&self, index: i64) -> Option<String> {
            self.inner.entry_name(index)
        }
    }

    struct OneGroup(Arc<CountingGroup>);

    impl GroupResolver for OneGroup {
        fn group(&self, id: GroupId) -> Option<Arc<dyn ArchiveGroup>> {
            (id == GroupId(1)).then(|| self.0.clone() as Arc<dyn ArchiveGroup>)
        }
    }

    impl OneGroup {
        fn with_entry(name: &str, data: Vec<u8>) -> Self {
            OneGroup(Arc::new(CountingGroup {
                inner: MemoryGroup::new().with_entry(name, data),
                reads: AtomicUsize::new(0),
            }))
        }

        fn reads(&self) -> usize {
            self.0.reads.load(Ordering::SeqCst)
        }
    }

    fn group_page(is_text: bool) -> Page {
        Page::new(PageId(1), PageAttributes::group_entry(GroupId(1), 0, is_text))
    }

    #[test]
    fn test_name_is_last_path_component() {
        let page = Page::new(PageId(1), PageAttributes::loose_file("/comics/issue1/003.jpg", false));
        assert_eq!(page.name().as_deref(), Some("003.jpg"));
        assert!(group_page(false).name().is_none());
    }

    #[test]
    fn test_set_own_size_info() {
        let page = group_page(false);
        let data = png_bytes(300, 200);

        page.set_own_size_info(&data);
        let first = page.size().unwrap();
        assert_eq!(first.width, 300.0);
        assert_eq!(first.height, 200.0);
        assert!((first.aspect_ratio - 1.5).abs() < 1e-12);

        // Same bytes again: same state, no new change to save
        assert!(page.take_dirty());
        page.set_own_size_info(&data);
        assert_eq!(page.size(), Some(first));
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_size_info_ignores_garbage() {
        let page = group_page(false);
        page.set_own_size_info(&png_bytes(10, 20));
        page.set_own_size_info(b"definitely not an image");
        assert_eq!(page.width(), Some(10.0));
        assert_eq!(page.height(), Some(20.0));
    }

    #[test]
    fn test_missing_file_collapses_to_absent() {
        let page = Page::new(
            PageId(1),
            PageAttributes::loose_file("/nonexistent/page.png", false),
        );

        assert!(page.page_data(&NoGroups).is_none());
        assert!(page.page_image(&NoGroups).is_none());
        assert!(page.thumbnail(&NoGroups).is_none());
        assert!(page.should_display_alone(&NoGroups));
        assert!(page.thumbnail_data().is_none());
    }

    #[test]
    fn test_unresolvable_group_is_absent() {
        let page = group_page(false);
        assert!(page.page_data(&NoGroups).is_none());

        let groups = OneGroup::with_entry("01.png", png_bytes(4, 4));
        let out_of_range = Page::new(PageId(2), PageAttributes::group_entry(GroupId(1), 5, false));
        assert!(out_of_range.page_data(&groups).is_none());
    }

    #[test]
    fn test_display_alone_by_aspect() {
        let wide = OneGroup::with_entry("spread.png", png_bytes(200, 100));
        assert!(group_page(false).should_display_alone(&wide));

        let tall = OneGroup::with_entry("page.png", png_bytes(100, 200));
        let page = group_page(false);
        assert!(!page.should_display_alone(&tall));
        assert_eq!(page.aspect_ratio(), Some(0.5));

        // Known aspect ratio: no second fetch
        assert!(!page.should_display_alone(&tall));
        assert_eq!(tall.reads(), 1);
    }

    #[test]
    fn test_square_page_pairs_up() {
        let square = OneGroup::with_entry("square.png", png_bytes(100, 100));
        let page = group_page(false);
        assert!(!page.should_display_alone(&square));
        assert_eq!(page.aspect_ratio(), Some(1.0));
    }

    #[test]
    fn test_change_flag_waits_for_the_write() {
        let page = group_page(false);

        std::thread::scope(|scope| {
            // A reader holding the attributes, as a save snapshot does
            let reading = page.attrs();
            let writer = scope.spawn(|| page.set_thumbnail_data(Some(vec![7])));

            std::thread::sleep(std::time::Duration::from_millis(50));
            assert!(!page.is_dirty());
            assert!(reading.thumbnail_data.is_none());
            drop(reading);

            writer.join().unwrap();
        });

        // Whoever clears the flag afterwards snapshots the new value
        assert!(page.take_dirty());
        assert_eq!(page.attributes().thumbnail_data, Some(vec![7]));
    }

    #[test]
    fn test_text_pages_display_alone() {
        let groups = OneGroup::with_entry("info.txt", b"hello".to_vec());
        assert!(group_page(true).should_display_alone(&groups));
        assert_eq!(groups.reads(), 0);
    }

    #[test]
    fn test_undecodable_image_is_absent() {
        let groups = OneGroup::with_entry("broken.png", b"\x89PNG but not really".to_vec());
        let page = group_page(false);
        assert!(page.page_image(&groups).is_none());
        assert!(page.size().is_none());
        assert!(page.should_display_alone(&groups));
    }

    #[test]
    fn test_page_image_uses_cached_size() {
        let groups = OneGroup::with_entry("01.png", png_bytes(64, 48));
        let page = group_page(false);

        let page_image = page.page_image(&groups).unwrap();
        assert_eq!(page_image.size, Size::new(64.0, 48.0));
        assert_eq!(page_image.cache_mode, CacheMode::BySize);
        assert_eq!(page.aspect_ratio(), Some(64.0 / 48.0));
    }

    #[test]
    fn test_text_page_from_loose_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme.txt");
        std::fs::write(&path, "A\tB\nC").unwrap();

        let page = Page::new(
            PageId(1),
            PageAttributes::loose_file(path.to_string_lossy(), true),
        );

        let canvas = page.text_page(&NoGroups).unwrap();
        assert!(canvas.height() >= 500);
        assert!(canvas.width() >= 10);

        let page_image = page.page_image(&NoGroups).unwrap();
        assert_eq!(page_image.cache_mode, CacheMode::Default);
        assert_eq!(page_image.size.height, f64::from(canvas.height()));
    }

    #[test]
    fn test_text_page_without_source_is_absent() {
        let page = group_page(true);
        assert!(page.text_page(&NoGroups).is_none());
        assert!(page.page_image(&NoGroups).is_none());
    }

    #[test]
    fn test_thumbnail_is_constrained_and_cached() {
        let groups = OneGroup::with_entry("01.png", png_bytes(512, 256));
        let page = group_page(false);

        let first = page.thumbnail(&groups).unwrap();
        assert_eq!((first.width(), first.height()), (256, 128));
        let cached = page.thumbnail_data().unwrap();

        let second = page.thumbnail(&groups).unwrap();
        assert_eq!(second.to_rgba8(), first.to_rgba8());
        assert_eq!(page.thumbnail_data().unwrap(), cached);
        assert_eq!(groups.reads(), 1);
    }

    #[test]
    fn test_text_thumbnail() {
        let groups = OneGroup::with_entry("info.nfo", b"line one\nline two\n".to_vec());
        let page = group_page(true);

        let thumbnail = page.thumbnail(&groups).unwrap();
        assert_eq!(thumbnail.height(), 256);
        assert!(thumbnail.width() < 256);
    }

    #[test]
    fn test_corrupt_thumbnail_cache_is_absent() {
        let groups = OneGroup::with_entry("01.png", png_bytes(8, 8));
        let page = group_page(false);
        page.set_thumbnail_data(Some(b"junk".to_vec()));

        assert!(page.thumbnail(&groups).is_none());
        assert_eq!(groups.reads(), 0);

        page.clear_cached_derivations();
        assert!(page.thumbnail(&groups).is_some());
    }

    #[test]
    fn test_concurrent_prep_thumbnail_derives_once() {
        let groups = OneGroup::with_entry("01.png", png_bytes(300, 400));
        let page = group_page(false);

        let (a, b) = std::thread::scope(|scope| {
            let first = scope.spawn(|| page.prep_thumbnail(&groups));
            let second = scope.spawn(|| page.prep_thumbnail(&groups));
            (first.join().unwrap(), second.join().unwrap())
        });

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(groups.reads(), 1);
    }

    #[test]
    fn test_loader_lock_is_independent() {
        let groups = OneGroup::with_entry("01.png", png_bytes(2, 2));
        let page = group_page(false);
        let _loader = page.lock_loader();
        assert!(page.prep_thumbnail(&groups).is_some());
    }

    #[test]
    fn test_file_type_tables() {
        assert!(is_image_path(Path::new("a/B.JPG")));
        assert!(is_image_path(Path::new("page.webp")));
        assert!(is_text_path(Path::new("release.NFO")));
        assert!(is_page_path(Path::new("notes.info")));
        assert!(!is_page_path(Path::new("book.pdf")));
        assert!(!is_page_path(Path::new("noextension")));
        assert!(!image_extensions().contains(&"pdf"));
    }
}
