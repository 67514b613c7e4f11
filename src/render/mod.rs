//! Raster rendering for pages that are not images
//!
//! - `canvas.rs` - an RGBA image that embedded-graphics can draw into
//! - `font.rs` - optional outline font for text outside Latin-1
//! - `text_page.rs` - lays out plain text and draws it onto a white page

pub mod canvas;
pub mod font;
pub mod text_page;

pub use canvas::Canvas;
pub use font::{install_font, installed_font, OutlineFont};
pub use text_page::{
    layout_text, layout_text_with, render_text, render_text_page, render_text_with, TextLayout,
};
