use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "markdown" => Some(Self::PlainText),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// Reads the knowledge-base document. Files without a recognised extension
/// are read as UTF-8 text.
pub fn load_document(path: &Path) -> Result<String> {
    match DocumentFormat::from_path(path).unwrap_or(DocumentFormat::PlainText) {
        DocumentFormat::PlainText => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text file: {}", path.display())),
        DocumentFormat::Pdf => pdf_extract::extract_text(path)
            .with_context(|| format!("Failed to extract PDF text: {}", path.display())),
        DocumentFormat::Docx => extract_docx(path),
    }
}

fn extract_docx(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open DOCX: {}", path.display()))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read DOCX as ZIP: {}", path.display()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("No word/document.xml found in DOCX")?
        .read_to_string(&mut xml)?;

    Ok(docx_paragraphs(&xml).join("\n\n"))
}

/// Collects `<w:t>` runs, keeping `<w:p>` paragraphs apart so the chunker
/// can split on them.
fn docx_paragraphs(xml: &str) -> Vec<String> {
    xml.split("</w:p>")
        .map(|paragraph| text_runs(paragraph, "w:t").join(""))
        .filter(|paragraph| !paragraph.trim().is_empty())
        .collect()
}

fn text_runs<'a>(xml: &'a str, tag: &str) -> Vec<&'a str> {
    let open_tag = format!("<{}", tag);
    let close_tag = format!("</{}>", tag);
    let mut runs = Vec::new();
    let mut rest = xml;

    while let Some(open_pos) = rest.find(&open_tag) {
        let after_open = &rest[open_pos + open_tag.len()..];
        // `<w:tab/>` and friends share the prefix.
        if !after_open.starts_with('>') && !after_open.starts_with(' ') {
            rest = after_open;
            continue;
        }
        let Some(tag_end) = after_open.find('>') else { break };
        let content = &after_open[tag_end + 1..];
        let Some(close_pos) = content.find(&close_tag) else { break };
        runs.push(&content[..close_pos]);
        rest = &content[close_pos + close_tag.len()..];
    }

    runs
}
