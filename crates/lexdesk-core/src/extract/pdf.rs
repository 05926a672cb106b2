use lopdf::Document;
use tracing::debug;

use crate::error::LexError;

/// Read the text layer of every page, in ascending page order.
///
/// Each page's text items are joined with single spaces and pages are joined
/// with `\n`. No column or layout reconstruction is attempted.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<String, LexError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| LexError::ExtractionFailed(format!("PDF parse error: {e}")))?;

    let pages = doc.get_pages();
    debug!(pages = pages.len(), "reading PDF text layer");

    let mut texts = Vec::with_capacity(pages.len());
    for &page_number in pages.keys() {
        let text = doc.extract_text(&[page_number]).map_err(|e| {
            LexError::ExtractionFailed(format!("page {page_number}: {e}"))
        })?;
        texts.push((page_number, text));
    }
    Ok(join_pages(texts))
}

/// Collapse each page to single-space-joined items and join pages by number.
pub fn join_pages(pages: impl IntoIterator<Item = (u32, String)>) -> String {
    let mut pages: Vec<(u32, String)> = pages.into_iter().collect();
    pages.sort_by_key(|(n, _)| *n);
    pages
        .iter()
        .map(|(_, text)| text.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}
