//! Pipeline stages for turning one fetched PDF into uploadable pages.
//!
//! Each submodule implements exactly one step; [`crate::convert`] runs them
//! strictly in order for a task.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ document ──▶ render ──▶ classify ──▶ raster
//! (HTTP)    (lopdf)      (pdf2svg)  (SVG scan)   (convert)
//! ```
//!
//! 1. [`fetch`]    — stream the source into the working directory, size-capped
//! 2. [`document`] — parse the PDF and enforce the page limit
//! 3. [`render`]   — one SVG per page; presence on disk is the only success signal
//! 4. [`classify`] — decide per page whether the SVG draws anything itself
//! 5. [`raster`]   — image-only pages become JPEG when the rasteriser delivers

pub mod classify;
pub mod document;
pub mod fetch;
pub mod raster;
pub mod render;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Format of one uploaded page file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    Svg,
    Jpg,
}

impl PageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            PageFormat::Svg => "svg",
            PageFormat::Jpg => "jpg",
        }
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Outcome of a successful conversion.
///
/// `page_formats[i]` is the format of page `i + 1`; the constructor keeps its
/// length equal to the page count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    page_formats: Vec<PageFormat>,
}

impl ConversionResult {
    pub fn new(page_formats: Vec<PageFormat>) -> Self {
        Self { page_formats }
    }

    pub fn page_count(&self) -> usize {
        self.page_formats.len()
    }

    pub fn page_formats(&self) -> &[PageFormat] {
        &self.page_formats
    }

    /// Formats joined as `svg,jpg,…` for the Phase-1 report.
    pub fn formats_field(&self) -> String {
        self.page_formats
            .iter()
            .map(|f| f.extension())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_count_tracks_formats() {
        let r = ConversionResult::new(vec![PageFormat::Jpg, PageFormat::Jpg, PageFormat::Svg]);
        assert_eq!(r.page_count(), 3);
        assert_eq!(r.formats_field(), "jpg,jpg,svg");
        assert_eq!(ConversionResult::new(vec![]).formats_field(), "");
    }

    #[test]
    fn format_serialises_lowercase() {
        let json = serde_json::to_string(&vec![PageFormat::Svg, PageFormat::Jpg]).unwrap();
        assert_eq!(json, r#"["svg","jpg"]"#);
        assert_eq!(PageFormat::Jpg.to_string(), "jpg");
    }
}
