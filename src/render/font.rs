//! Outline fonts for text pages
//!
//! The built-in bitmap font only covers Latin-1. An outline font (TTF/OTF)
//! installed here takes over text page drawing so other scripts get real
//! glyphs. It is scaled so one line is exactly `LINE_ADVANCE` tall and drawn
//! on the same cell grid as the bitmap font. A glyph much wider than a cell
//! (CJK, for instance) takes as many cells as its advance covers.

use std::path::Path;
use std::sync::OnceLock;

use super::canvas::Canvas;
use super::text_page::{CHAR_WIDTH, LINE_ADVANCE};
use crate::error::FontError;

/// Pixel size used when the font carries no horizontal line metrics
const FALLBACK_PX: f32 = 16.0;

static INSTALLED: OnceLock<OutlineFont> = OnceLock::new();

/// Make `font` the text page font for the rest of the process
///
/// Only the first installed font is kept.
pub fn install_font(font: OutlineFont) {
    if INSTALLED.set(font).is_err() {
        log::debug!("text font already installed, keeping the first one");
    }
}

/// The installed outline font, if any
pub fn installed_font() -> Option<&'static OutlineFont> {
    INSTALLED.get()
}

pub struct OutlineFont {
    font: fontdue::Font,
    px: f32,
    ascent: f32,
}

impl OutlineFont {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, FontError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(FontError::Parse)?;

        // Line metrics scale linearly with the pixel size
        let px = match font.horizontal_line_metrics(1.0) {
            Some(lines) if lines.new_line_size > 0.0 => LINE_ADVANCE as f32 / lines.new_line_size,
            _ => FALLBACK_PX,
        };
        let ascent = font
            .horizontal_line_metrics(px)
            .map_or(px, |lines| lines.ascent);

        Ok(Self { font, px, ascent })
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let bytes = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let font = Self::from_bytes(bytes)?;
        log::info!("🔤 Loaded text font {}", path.display());
        Ok(font)
    }

    /// Whether the font has a glyph for `ch`
    pub fn covers(&self, ch: char) -> bool {
        self.font.lookup_glyph_index(ch) != 0
    }

    /// Cells of the layout grid taken by `ch`
    pub fn cells(&self, ch: char) -> usize {
        if ch.is_ascii() {
            return 1;
        }
        let advance = self.font.metrics(ch, self.px).advance_width;
        ((advance / CHAR_WIDTH as f32).round() as usize).max(1)
    }

    /// Draw one laid-out row with its top-left corner at (`x`, `y`)
    pub fn draw_row(&self, canvas: &mut Canvas, row: &str, x: i32, y: i32) {
        let baseline = y + self.ascent.round() as i32;
        let mut column = 0;

        for ch in row.chars() {
            if !ch.is_whitespace() {
                let (metrics, coverage) = self.font.rasterize(ch, self.px);
                let left = x + (column * CHAR_WIDTH) as i32 + metrics.xmin;
                let top = baseline - (metrics.ymin + metrics.height as i32);

                // An empty bitmap has zero width and no coverage to walk
                for (i, &alpha) in coverage.iter().enumerate() {
                    if alpha > 0 {
                        let gx = (i % metrics.width) as i32;
                        let gy = (i / metrics.width) as i32;
                        canvas.darken(left + gx, top + gy, alpha);
                    }
                }
            }
            column += self.cells(ch);
        }
    }
}

impl std::fmt::Debug for OutlineFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutlineFont")
            .field("px", &self.px)
            .field("ascent", &self.ascent)
            .finish()
    }
}
