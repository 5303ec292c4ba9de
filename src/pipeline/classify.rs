//! Per-page format decision: does a rendered SVG draw anything itself?
//!
//! A page whose markup contains none of the vector drawing elements is made
//! of embedded raster images only; shipping it as SVG buys nothing, so it
//! is a candidate for JPEG. The scan stops at the first drawing element.
//!
//! Pages are judged independently. Markup that cannot be parsed keeps its
//! vector form.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::path::Path;
use tracing::warn;

/// Element names whose presence marks a page as vector content.
///
/// `path` also catches text that pdf2svg emits as glyph outlines.
pub const DRAWING_ELEMENTS: &[&[u8]] = &[
    b"circle",
    b"ellipse",
    b"line",
    b"mpath",
    b"path",
    b"polygon",
    b"polyline",
    b"rect",
    b"text",
];

/// Classification of one rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// No drawing element anywhere in the markup.
    ImageOnly,
    /// At least one drawing element, or markup that could not be judged.
    Vector,
}

/// Why a page could not be judged.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("failed to read SVG: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse SVG: {0}")]
    Parse(#[from] quick_xml::Error),
    #[error("SVG has no root element")]
    Empty,
    #[error("SVG ends with {0} unclosed element(s)")]
    Truncated(usize),
}

/// Scan SVG markup for drawing elements.
pub fn scan_markup(markup: &[u8]) -> Result<PageKind, ClassifyError> {
    let mut reader = Reader::from_reader(markup);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut saw_element = false;
    let mut depth: usize = 0;

    loop {
        let event = reader.read_event_into(&mut buf)?;
        let element = match &event {
            Event::Start(e) => {
                depth += 1;
                Some(e.local_name())
            }
            Event::Empty(e) => Some(e.local_name()),
            _ => None,
        };
        if let Some(name) = element {
            saw_element = true;
            if DRAWING_ELEMENTS.iter().any(|el| *el == name.as_ref()) {
                return Ok(PageKind::Vector);
            }
        }

        match event {
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof if depth > 0 => return Err(ClassifyError::Truncated(depth)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_element {
        return Err(ClassifyError::Empty);
    }
    Ok(PageKind::ImageOnly)
}

/// Classify the SVG at `svg_path`, falling back to [`PageKind::Vector`]
/// (with a warning) when it cannot be read or parsed.
pub async fn classify_page(svg_path: &Path, page: usize) -> PageKind {
    let scanned = match tokio::fs::read(svg_path).await {
        Ok(markup) => scan_markup(&markup),
        Err(e) => Err(ClassifyError::Read(e)),
    };

    match scanned {
        Ok(kind) => kind,
        Err(e) => {
            // TODO: decide whether unclassifiable pages should be rasterised
            // instead; a broken SVG is a poor thing to upload.
            warn!("Failed to classify SVG for page {}: {}; keeping SVG", page, e);
            PageKind::Vector
        }
    }
}
