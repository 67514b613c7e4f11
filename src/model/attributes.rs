//! Persisted attributes of a page and the typed ids that link pages to
//! their owning group and session.
//!
//! These are plain records: the catalog reads and writes them, the `Page`
//! entity keeps one behind a lock.

/// Row id of a page in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub i64);

/// Row id of an archive group (archive or folder)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(pub i64);

/// Row id of a viewing session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub i64);

/// Cached pixel dimensions of the decoded page image
///
/// Width, height and aspect ratio are only ever stored together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizeInfo {
    pub width: f64,
    pub height: f64,
    pub aspect_ratio: f64,
}

impl SizeInfo {
    /// Build from pixel dimensions. Returns `None` for a zero-area size.
    pub fn from_pixels(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            return None;
        }
        let (width, height) = (f64::from(width), f64::from(height));
        Some(Self {
            width,
            height,
            aspect_ratio: width / height,
        })
    }

    /// Rebuild from stored columns; anything incomplete or zero is unknown
    pub fn from_columns(
        width: Option<f64>,
        height: Option<f64>,
        aspect_ratio: Option<f64>,
    ) -> Option<Self> {
        match (width, height, aspect_ratio) {
            (Some(width), Some(height), Some(aspect_ratio))
                if width > 0.0 && height > 0.0 && aspect_ratio > 0.0 =>
            {
                Some(Self {
                    width,
                    height,
                    aspect_ratio,
                })
            }
            _ => None,
        }
    }
}

/// Everything the catalog stores about one page
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageAttributes {
    /// Location of a loose file on disk
    pub image_path: Option<String>,
    /// Zero-based position inside the owning group
    pub index: Option<i64>,
    /// Page bytes are plain text to be rendered, not an image
    pub is_text: bool,
    pub size: Option<SizeInfo>,
    /// Encoded thumbnail (PNG)
    pub thumbnail_data: Option<Vec<u8>>,
    pub group: Option<GroupId>,
    pub session: Option<SessionId>,
}

impl PageAttributes {
    /// Attributes for a loose file
    pub fn loose_file(path: impl Into<String>, is_text: bool) -> Self {
        Self {
            image_path: Some(path.into()),
            is_text,
            ..Self::default()
        }
    }

    /// Attributes for entry `index` of `group`
    pub fn group_entry(group: GroupId, index: i64, is_text: bool) -> Self {
        Self {
            index: Some(index),
            group: Some(group),
            is_text,
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_area_is_unknown() {
        assert!(SizeInfo::from_pixels(0, 10).is_none());
        assert!(SizeInfo::from_pixels(10, 0).is_none());
        assert_eq!(SizeInfo::from_pixels(200, 100).unwrap().aspect_ratio, 2.0);
    }

    #[test]
    fn test_partial_columns_are_unknown() {
        assert!(SizeInfo::from_columns(Some(10.0), None, Some(1.0)).is_none());
        assert!(SizeInfo::from_columns(Some(10.0), Some(0.0), Some(1.0)).is_none());
        assert!(SizeInfo::from_columns(Some(10.0), Some(5.0), Some(2.0)).is_some());
    }

    #[test]
    fn test_constructors() {
        let page = PageAttributes::group_entry(GroupId(3), 7, false).with_session(SessionId(1));
        assert_eq!(page.index, Some(7));
        assert_eq!(page.group, Some(GroupId(3)));
        assert_eq!(page.session, Some(SessionId(1)));
        assert!(page.image_path.is_none());
    }
}
