//! Size arithmetic shared by page layout and thumbnail scaling

/// A width/height pair in layout units (pixels for decoded images)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const ZERO: Size = Size { width: 0.0, height: 0.0 };

    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero (or negative)
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Round to whole pixels, never going below 1x1
    pub fn to_pixels(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

/// Scale `size` so its largest dimension equals `max_dimension`
///
/// The aspect ratio is preserved and the result may be larger than the
/// input (scale-up). Callers must not pass an empty size.
pub fn constrain_size(size: Size, max_dimension: f64) -> Size {
    debug_assert!(!size.is_empty(), "constrain_size called with an empty size");

    if size.width >= size.height {
        Size {
            width: max_dimension,
            height: max_dimension * size.height / size.width,
        }
    } else {
        Size {
            width: max_dimension * size.width / size.height,
            height: max_dimension,
        }
    }
}
