//! Text page rendering
//!
//! Plain text (`.txt`, `.nfo`, ...) found among the pages of a comic is drawn
//! onto a white raster so it can be displayed and thumbnailed like any other
//! page. Layout is monospaced with tab stops and wraps inside an 800x800 box.
//!
//! Page size is computed line by line:
//! - width is the widest line plus padding
//! - height sums each line's measured height minus one line advance, because
//!   a line measured together with its trailing newline carries an extra
//!   empty line fragment
//! - the result is padded and never shorter than `MIN_PAGE_HEIGHT`
//! - nor taller than `MAX_PAGE_HEIGHT`; rows below that are not drawn
//!
//! Glyphs come from the bitmap `FONT_9X18`, or from the outline font
//! installed through `render::font` when there is one.

use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_9X18, MonoFont, MonoTextStyle},
    pixelcolor::Rgb888,
    prelude::{Point, RgbColor},
    text::{Baseline, Text},
    Drawable,
};
use image::RgbaImage;

use super::canvas::Canvas;
use super::font::{installed_font, OutlineFont};
use crate::encoding::{decode_text, EncodingDetector};
use crate::geometry::Size;

/// Monospaced font used for every text page (ISO-8859-1 coverage)
const TEXT_FONT: &MonoFont<'static> = &FONT_9X18;

/// Width of one character cell
pub(super) const CHAR_WIDTH: usize = 9;

/// Vertical advance from one line to the next (glyph height plus spacing)
pub(super) const LINE_ADVANCE: f64 = 19.0;

/// Tab stops sit every `TAB_INTERVAL` characters, below `TAB_LIMIT`
const TAB_INTERVAL: usize = 8;
const TAB_LIMIT: usize = 120;

/// Lines are measured inside a box of this width and wrapped at it
const LAYOUT_WIDTH: usize = 800;

/// Subtracted from each measured line height so consecutive lines pack tightly
const LINE_SPACING_COMPENSATION: f64 = 19.0;

const PAGE_PADDING: f64 = 10.0;
const MIN_PAGE_HEIGHT: f64 = 500.0;
/// Tallest canvas ever allocated; about 52 MB of RGBA at full width
const MAX_PAGE_HEIGHT: f64 = 16384.0;
const TEXT_INSET: i32 = 5;

/// Result of laying out a text: the rows to draw and the canvas size
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    /// Visual rows with tabs already expanded to spaces
    pub rows: Vec<String>,
    pub page_size: Size,
}

/// Lay out `text` into rows and compute the page size, in the bitmap font
pub fn layout_text(text: &str) -> TextLayout {
    layout_text_with(text, None)
}

/// Lay out `text` for `font`, or for the bitmap font when `None`
pub fn layout_text_with(text: &str, font: Option<&OutlineFont>) -> TextLayout {
    layout_with_cells(text, |ch| font.map_or(1, |font| font.cells(ch)))
}

fn layout_with_cells(text: &str, cells: impl Fn(char) -> usize) -> TextLayout {
    let max_columns = LAYOUT_WIDTH / CHAR_WIDTH;
    let mut rows = Vec::new();
    let mut page_size = Size::ZERO;

    for line in text.split_inclusive('\n') {
        let line_rows = wrap_line(line, max_columns, &cells);

        let widest = line_rows.iter().map(|(_, columns)| *columns).max().unwrap_or(0);
        let mut fragments = line_rows.len();
        if line.ends_with('\n') {
            fragments += 1;
        }

        let line_width = (widest * CHAR_WIDTH) as f64;
        let line_height = fragments as f64 * LINE_ADVANCE;

        if line_width > page_size.width {
            page_size.width = line_width;
        }
        page_size.height += line_height - LINE_SPACING_COMPENSATION;

        rows.extend(line_rows.into_iter().map(|(row, _)| row));
    }

    page_size.width += PAGE_PADDING;
    page_size.height += PAGE_PADDING;
    page_size.height = page_size.height.clamp(MIN_PAGE_HEIGHT, MAX_PAGE_HEIGHT);

    TextLayout { rows, page_size }
}

/// Expand tabs and wrap one line (with or without its newline) into rows,
/// each paired with the columns it spans.
/// Always yields at least one row, possibly empty.
fn wrap_line(line: &str, max_columns: usize, cells: &impl Fn(char) -> usize) -> Vec<(String, usize)> {
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut column = 0;

    for ch in line.chars() {
        let advance = match ch {
            '\t' => next_tab_stop(column) - column,
            c if c.is_control() => continue,
            c => cells(c),
        };

        if column + advance > max_columns && column > 0 {
            rows.push((std::mem::take(&mut row), column));
            column = 0;
        }

        if ch == '\t' {
            // Tab stops are measured from the start of the visual row
            let advance = next_tab_stop(column) - column;
            row.extend(std::iter::repeat(' ').take(advance));
            column += advance;
        } else {
            row.push(ch);
            column += advance;
        }
    }

    rows.push((row, column));
    rows
}

/// Column reached by a tab typed at `column`
fn next_tab_stop(column: usize) -> usize {
    let stop = (column / TAB_INTERVAL + 1) * TAB_INTERVAL;
    if stop < TAB_LIMIT {
        stop
    } else {
        // Past the last stop a tab behaves like a single space
        column + 1
    }
}

/// Render already-decoded text onto a white page, in the installed font
pub fn render_text(text: &str) -> RgbaImage {
    render_text_with(text, installed_font())
}

/// Render already-decoded text in `font`, or in the bitmap font when `None`
pub fn render_text_with(text: &str, font: Option<&OutlineFont>) -> RgbaImage {
    let layout = layout_text_with(text, font);
    let (width, height) = layout.page_size.to_pixels();

    let mut canvas = Canvas::white(width, height);
    let style = MonoTextStyle::new(TEXT_FONT, Rgb888::BLACK);

    for (i, row) in layout.rows.iter().enumerate() {
        let y = TEXT_INSET + (i as f64 * LINE_ADVANCE) as i32;
        if y as u32 >= height {
            // Past the height cap
            break;
        }
        if row.trim().is_empty() {
            continue;
        }

        match font {
            Some(font) => font.draw_row(&mut canvas, row, TEXT_INSET, y),
            None => {
                // Canvas drawing is infallible; partial rows are clipped
                let _ = Text::with_baseline(row, Point::new(TEXT_INSET, y), style, Baseline::Top)
                    .draw(&mut canvas);
            }
        }
    }

    canvas.into_image()
}

/// Decode `bytes` with `detector` and render them as a text page
///
/// Bytes that cannot be decoded produce a blank page rather than an error.
pub fn render_text_page(bytes: &[u8], detector: &mut dyn EncodingDetector) -> RgbaImage {
    match decode_text(bytes, detector) {
        Some(text) => render_text(&text),
        None => {
            log::debug!("rendering blank text page for {} undecodable bytes", bytes.len());
            render_text("")
        }
    }
}
