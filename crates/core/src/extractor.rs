use crate::error::IngestError;
use lopdf::Document;
use std::fmt::Display;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

pub trait PdfExtractor: Send + Sync {
    /// Returns the text of each page that has any, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
        let document = Document::load(path).map_err(|error| {
            IngestError::DocumentRead(format!("{}: {error}", path.display()))
        })?;

        collect_pages(
            path,
            document
                .get_pages()
                .into_keys()
                .map(|page_no| (page_no, document.extract_text(&[page_no]))),
        )
    }
}

/// Keeps the non-blank pages. A page that fails to decode is logged and
/// skipped; the document only fails when no page yields text.
fn collect_pages<E: Display>(
    path: &Path,
    extracted: impl IntoIterator<Item = (u32, Result<String, E>)>,
) -> Result<Vec<PageText>, IngestError> {
    let mut pages = Vec::new();
    for (page_no, result) in extracted {
        match result {
            Ok(text) if !text.trim().is_empty() => pages.push(PageText {
                number: page_no,
                text,
            }),
            Ok(_) => {}
            Err(error) => {
                warn!(path = %path.display(), page = page_no, %error, "skipping unreadable page");
            }
        }
    }

    if pages.is_empty() {
        return Err(IngestError::DocumentRead(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages)
}

pub fn join_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .map(|page| page.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
