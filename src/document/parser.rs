//! Turns an uploaded file into ordered content units.

use std::{
    io::{Cursor, Read},
    path::Path,
    sync::OnceLock,
};

use anyhow::{anyhow, bail, Context, Result};
use quick_xml::{events::Event, Reader};
use regex::Regex;
use zip::ZipArchive;

use crate::models::{ContentUnit, DocumentKind};

/// Paragraphs this short (in characters) are headings, page numbers and the like.
const MIN_SECTION_LENGTH: usize = 50;

/// Resolves the document kind from a MIME type, falling back to the file
/// extension for generic or missing types.
pub fn detect_kind(mime_type: &str, file_name: &str) -> Result<DocumentKind> {
    let mime = mime_type.split(';').next().unwrap_or("").trim();
    if let Some(kind) = DocumentKind::from_mime(mime) {
        return Ok(kind);
    }

    if mime.is_empty() || mime == "application/octet-stream" {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        if let Some(kind) = DocumentKind::from_extension(extension) {
            return Ok(kind);
        }
    }

    Err(anyhow!(
        "Unsupported file type: {} ({})",
        if mime.is_empty() { "unknown" } else { mime },
        file_name
    ))
}

pub fn parse_bytes(bytes: &[u8], mime_type: &str, file_name: &str) -> Result<Vec<ContentUnit>> {
    let kind = detect_kind(mime_type, file_name)?;
    let text = extract_text(bytes, kind)
        .with_context(|| format!("failed to extract text from {file_name}"))?;
    Ok(split_into_units(&text))
}

pub fn extract_text(bytes: &[u8], kind: DocumentKind) -> Result<String> {
    match kind {
        DocumentKind::PlainText | DocumentKind::Markdown => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        DocumentKind::Html => Ok(html_to_text(&String::from_utf8_lossy(bytes))),
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|err| anyhow!("Failed to extract PDF text: {err}")),
        DocumentKind::Docx => docx_to_text(bytes),
    }
}

/// Splits text on blank lines. Short paragraphs are dropped; if that leaves
/// nothing, the whole text becomes one unit.
pub fn split_into_units(text: &str) -> Vec<ContentUnit> {
    let normalized = text.replace("\r\n", "\n");

    let mut units: Vec<ContentUnit> = paragraph_break()
        .split(&normalized)
        .map(str::trim)
        .filter(|paragraph| paragraph.chars().count() > MIN_SECTION_LENGTH)
        .enumerate()
        .map(|(index, paragraph)| ContentUnit::new(format!("section_{}", index + 1), paragraph))
        .collect();

    let trimmed = text.trim();
    if units.is_empty() && !trimmed.is_empty() {
        units.push(ContentUnit::new("section_1", trimmed));
    }

    units
}

fn paragraph_break() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid paragraph regex"))
}

fn html_to_text(html: &str) -> String {
    static SCRIPTS: OnceLock<Regex> = OnceLock::new();
    static BLOCK_ENDS: OnceLock<Regex> = OnceLock::new();
    static TAGS: OnceLock<Regex> = OnceLock::new();

    let scripts = SCRIPTS.get_or_init(|| {
        Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid script regex")
    });
    let block_ends = BLOCK_ENDS.get_or_init(|| {
        Regex::new(r"(?i)</(p|div|h[1-6]|li|section|article|blockquote)\s*>|<br\s*/?>")
            .expect("valid block regex")
    });
    let tags = TAGS.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));

    let body = body_of(html);
    let without_scripts = scripts.replace_all(body, "");
    let with_breaks = block_ends.replace_all(&without_scripts, "\n\n");
    let stripped = tags.replace_all(&with_breaks, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}

/// Text runs (`w:t`) of `word/document.xml`; each `w:p` ends a paragraph.
fn docx_to_text(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("DOCX is not a zip archive")?;
    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .context("Could not find document.xml in DOCX file")?
        .read_to_string(&mut xml)
        .context("failed to read document.xml")?;

    let mut reader = Reader::from_str(&xml);
    let mut content = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::Text(e)) if in_text => {
                let text = e
                    .unescape()
                    .map_err(|err| anyhow!("XML decode error: {err}"))?;
                content.push_str(&text);
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => content.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => bail!("XML parsing error: {err}"),
            _ => {}
        }
    }

    Ok(content)
}

fn body_of(html: &str) -> &str {
    let lower = html.to_ascii_lowercase();
    let Some(open) = lower.find("<body") else {
        return html;
    };
    let Some(start) = lower[open..].find('>').map(|offset| open + offset + 1) else {
        return html;
    };
    let end = lower[start..]
        .find("</body")
        .map(|offset| start + offset)
        .unwrap_or(html.len());
    &html[start..end]
}

/// Reads a file from disk and parses it, guessing the type from its extension.
pub fn parse_file(path: &Path) -> Result<Vec<ContentUnit>> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let units = parse_bytes(&bytes, "application/octet-stream", file_name)?;
    if units.is_empty() {
        bail!("{} contains no readable text", path.display());
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_A: &str = "The first paragraph is comfortably longer than fifty characters in total.";
    const LONG_B: &str = "The second paragraph also clears the minimum length needed to be kept.";

    #[test]
    fn detects_kind_from_mime_then_extension() {
        assert_eq!(detect_kind("text/html; charset=utf-8", "x").unwrap(), DocumentKind::Html);
        assert_eq!(
            detect_kind("application/octet-stream", "notes.MD").unwrap(),
            DocumentKind::Markdown
        );
        assert_eq!(detect_kind("", "paper.pdf").unwrap(), DocumentKind::Pdf);
        assert!(detect_kind("application/zip", "archive.txt").is_err());
        assert!(detect_kind("application/octet-stream", "file.doc").is_err());
        assert_eq!(
            detect_kind("application/octet-stream", "report.DOCX").unwrap(),
            DocumentKind::Docx
        );
        assert_eq!(
            detect_kind(DocumentKind::Docx.as_str(), "upload").unwrap(),
            DocumentKind::Docx
        );
    }

    #[test]
    fn splits_on_blank_lines_and_drops_short_paragraphs() {
        let text = format!("Title\r\n\r\n{LONG_A}\r\n  \r\n{LONG_B}\n\nshort tail");
        let units = split_into_units(&text);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0], ContentUnit::new("section_1", LONG_A));
        assert_eq!(units[1], ContentUnit::new("section_2", LONG_B));
    }

    #[test]
    fn short_text_becomes_single_unit() {
        let units = split_into_units("  just a line  \n\n another ");
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id, "section_1");
        assert_eq!(units[0].text, "just a line  \n\n another");

        assert!(split_into_units("   \n ").is_empty());
    }

    #[test]
    fn html_drops_scripts_and_tags() {
        let html = format!(
            "<html><head><title>ignored</title></head><body><script>var x = 1;</script>\
             <style>p {{ color: red; }}</style><p>{LONG_A}</p><p>Tom &amp; Jerry {LONG_B}</p></body></html>"
        );
        let units = parse_bytes(html.as_bytes(), "text/html", "page.html").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, LONG_A);
        assert!(units[1].text.starts_with("Tom & Jerry"));
        assert!(units.iter().all(|unit| !unit.text.contains("var x")));
    }

    fn docx_bytes(document_xml: &str) -> Vec<u8> {
        use std::io::Write;
        use zip::{write::SimpleFileOptions, ZipWriter};

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn docx_paragraphs_become_units() {
        let xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:r><w:t>Heading</w:t></w:r></w:p>
<w:p><w:r><w:t xml:space="preserve">{LONG_A} </w:t></w:r><w:r><w:t>Tom &amp; Jerry.</w:t></w:r></w:p>
<w:p><w:r><w:t>{LONG_B}</w:t></w:r></w:p>
</w:body></w:document>"#
        );
        let units = parse_bytes(&docx_bytes(&xml), "application/octet-stream", "essay.docx").unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].text, format!("{LONG_A} Tom & Jerry."));
        assert_eq!(units[1], ContentUnit::new("section_2", LONG_B));
    }

    #[test]
    fn docx_without_document_part_is_rejected() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", zip::write::SimpleFileOptions::default())
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();
        assert!(parse_bytes(&bytes, "", "empty.docx").is_err());
        assert!(parse_bytes(b"not a zip", "", "broken.docx").is_err());
    }

    #[test]
    fn parse_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("article.txt");
        std::fs::write(&path, format!("{LONG_A}\n\n{LONG_B}")).unwrap();

        let units = parse_file(&path).unwrap();
        assert_eq!(units.len(), 2);

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(parse_file(&empty).is_err());
    }
}
