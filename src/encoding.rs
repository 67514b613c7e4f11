//! Text encoding detection for text pages
//!
//! Detection is a two-step, stateful exchange: feed the whole buffer to
//! [`EncodingDetector::analyze`], then read back the best guess with
//! [`EncodingDetector::encoding`].

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use std::borrow::Cow;

/// Anything that can guess the character encoding of a byte buffer
pub trait EncodingDetector {
    /// Examine the buffer. Replaces the result of any earlier call.
    fn analyze(&mut self, bytes: &[u8]);

    /// Best guess for the last analyzed buffer
    fn encoding(&self) -> &'static Encoding;

    /// Confidence in [`Self::encoding`], from 0.0 to 1.0
    fn confidence(&self) -> f32 {
        1.0
    }
}

/// Default detector: byte order marks, then a zero-byte heuristic for
/// unmarked UTF-16, then UTF-8 validity, then Windows-1252.
#[derive(Debug, Clone)]
pub struct UniversalDetector {
    encoding: &'static Encoding,
    confidence: f32,
}

impl Default for UniversalDetector {
    fn default() -> Self {
        Self {
            encoding: WINDOWS_1252,
            confidence: 0.0,
        }
    }
}

impl UniversalDetector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EncodingDetector for UniversalDetector {
    fn analyze(&mut self, bytes: &[u8]) {
        if let Some((encoding, _)) = Encoding::for_bom(bytes) {
            self.encoding = encoding;
            self.confidence = 1.0;
            return;
        }

        // NUL bytes are valid UTF-8, so the UTF-16 check has to come first
        if let Some(encoding) = guess_utf16(bytes) {
            self.encoding = encoding;
            self.confidence = 0.6;
            return;
        }

        if std::str::from_utf8(bytes).is_ok() {
            self.encoding = UTF_8;
            self.confidence = if bytes.is_ascii() { 0.99 } else { 0.9 };
            return;
        }

        self.encoding = WINDOWS_1252;
        self.confidence = 0.3;
    }

    fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }
}

/// Unmarked UTF-16 text in Latin scripts has a zero byte in every other slot
fn guess_utf16(bytes: &[u8]) -> Option<&'static Encoding> {
    if bytes.len() < 4 || bytes.len() % 2 != 0 {
        return None;
    }

    let pairs = bytes.len() / 2;
    let even_zeros = bytes.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_zeros = bytes.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();

    if odd_zeros * 10 >= pairs * 7 && even_zeros * 10 < pairs {
        Some(UTF_16LE)
    } else if even_zeros * 10 >= pairs * 7 && odd_zeros * 10 < pairs {
        Some(UTF_16BE)
    } else {
        None
    }
}

/// Run `detector` over `bytes` and decode them with its guess
///
/// Returns `None` when the bytes are malformed for the detected encoding.
/// A leading byte order mark is stripped.
pub fn decode_text<'a>(bytes: &'a [u8], detector: &mut dyn EncodingDetector) -> Option<Cow<'a, str>> {
    detector.analyze(bytes);
    let encoding = detector.encoding();

    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };

    let text = encoding.decode_without_bom_handling_and_without_replacement(body);
    if text.is_none() {
        log::debug!(
            "text is not valid {} (confidence {:.2})",
            encoding.name(),
            detector.confidence()
        );
    }
    text
}
