//! ArchiView QR - share codes for handing a page over to a phone
//!
//! [`encode`] turns a URL into a module matrix with a quiet zone; the result
//! can be painted by the web UI, written as SVG, or printed to a terminal.

use qrcode::{Color, EcLevel, QrCode};
use std::fmt::Write as _;
use thiserror::Error;
use tracing::debug;

/// Light modules around the symbol, as the QR standard requires
pub const QUIET_ZONE: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShareCodeError {
    #[error("URL is too long for a QR code ({0} bytes)")]
    TooLong(usize),
    #[error("QR encoding failed: {0}")]
    Encoding(String),
}

/// Encoded QR symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareCode {
    /// Modules per side, without the quiet zone
    width: usize,
    /// Row-major, true for dark modules
    modules: Vec<bool>,
    ec_level: EcLevel,
}

/// Encode `url` with the highest error correction that fits
///
/// Level H survives a damaged or partly covered print. Longer URLs step
/// down to M and then L before giving up.
pub fn encode(url: &str) -> Result<ShareCode, ShareCodeError> {
    for level in [EcLevel::H, EcLevel::M, EcLevel::L] {
        match QrCode::with_error_correction_level(url, level) {
            Ok(code) => {
                let width = code.width();
                let modules = code
                    .to_colors()
                    .into_iter()
                    .map(|c| c == Color::Dark)
                    .collect();
                debug!(width, ?level, "Encoded share code");
                return Ok(ShareCode {
                    width,
                    modules,
                    ec_level: level,
                });
            }
            Err(qrcode::types::QrError::DataTooLong) => continue,
            Err(e) => return Err(ShareCodeError::Encoding(e.to_string())),
        }
    }
    Err(ShareCodeError::TooLong(url.len()))
}

impl ShareCode {
    /// Side length in modules including the quiet zone
    pub fn size(&self) -> usize {
        self.width + 2 * QUIET_ZONE
    }

    /// Side length of the symbol alone
    pub fn symbol_width(&self) -> usize {
        self.width
    }

    pub fn ec_level(&self) -> EcLevel {
        self.ec_level
    }

    /// Module at (x, y) in quiet-zone coordinates; anything outside the symbol is light
    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        let (Some(sx), Some(sy)) = (x.checked_sub(QUIET_ZONE), y.checked_sub(QUIET_ZONE)) else {
            return false;
        };
        if sx >= self.width || sy >= self.width {
            return false;
        }
        self.modules[sy * self.width + sx]
    }

    /// Dark modules as (x, y) in quiet-zone coordinates
    pub fn dark_modules(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let size = self.size();
        (0..size)
            .flat_map(move |y| (0..size).map(move |x| (x, y)))
            .filter(|&(x, y)| self.is_dark(x, y))
    }

    /// Standalone SVG document, `module_px` pixels per module
    pub fn to_svg(&self, module_px: usize) -> String {
        let px = self.size() * module_px;
        let mut svg = String::new();
        let _ = write!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{px}\" height=\"{px}\" \
             viewBox=\"0 0 {s} {s}\" shape-rendering=\"crispEdges\">",
            px = px,
            s = self.size()
        );
        let _ = write!(
            svg,
            "<rect width=\"{s}\" height=\"{s}\" fill=\"#ffffff\"/><path fill=\"#000000\" d=\"",
            s = self.size()
        );
        for (x, y) in self.dark_modules() {
            let _ = write!(svg, "M{} {}h1v1h-1z", x, y);
        }
        svg.push_str("\"/></svg>\n");
        svg
    }

    /// Render with Unicode half blocks, two module rows per text line
    pub fn render_terminal(&self) -> String {
        let size = self.size();
        let mut result = String::new();

        for y in (0..size).step_by(2) {
            for x in 0..size {
                let top = self.is_dark(x, y);
                let bottom = self.is_dark(x, y + 1);
                let ch = match (top, bottom) {
                    (true, true) => "\u{2588}\u{2588}",
                    (true, false) => "\u{2580}\u{2580}",
                    (false, true) => "\u{2584}\u{2584}",
                    (false, false) => "  ",
                };
                result.push_str(ch);
            }
            result.push('\n');
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode("https://archiview.app/?model=bldg-001").unwrap();
        let b = encode("https://archiview.app/?model=bldg-001").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.ec_level(), EcLevel::H);
        assert_ne!(a, encode("https://archiview.app/?model=bldg-002").unwrap());
    }

    #[test]
    fn test_quiet_zone_is_light() {
        let code = encode("http://192.168.1.20:8080/").unwrap();
        let size = code.size();
        assert_eq!(size, code.symbol_width() + 8);
        for i in 0..size {
            for band in 0..QUIET_ZONE {
                assert!(!code.is_dark(i, band));
                assert!(!code.is_dark(band, i));
                assert!(!code.is_dark(i, size - 1 - band));
                assert!(!code.is_dark(size - 1 - band, i));
            }
        }
        // Finder pattern corner
        assert!(code.is_dark(QUIET_ZONE, QUIET_ZONE));
    }

    #[test]
    fn test_long_url_falls_back() {
        let url = format!("https://archiview.app/?model={}", "x".repeat(1500));
        let code = encode(&url).unwrap();
        assert_ne!(code.ec_level(), EcLevel::H);

        let too_long = "x".repeat(8000);
        assert_eq!(encode(&too_long), Err(ShareCodeError::TooLong(8000)));
    }

    #[test]
    fn test_svg_output() {
        let code = encode("https://archiview.app/").unwrap();
        let svg = code.to_svg(4);
        let px = code.size() * 4;
        let head = format!("<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\"", px);
        assert!(svg.starts_with(&head));
        assert_eq!(svg.matches("h1v1h-1z").count(), code.dark_modules().count());
    }

    #[test]
    fn test_terminal_rows() {
        let code = encode("https://archiview.app/").unwrap();
        let text = code.render_terminal();
        assert_eq!(text.lines().count(), (code.size() + 1) / 2);
        assert!(text.lines().all(|l| l.chars().count() == code.size() * 2));
    }
}
