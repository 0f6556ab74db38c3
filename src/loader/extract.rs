//! Format-specific plain-text extraction.
//!
//! PDF goes through `pdftotext` from poppler-utils. DOCX archives are opened
//! in-process; TXT and JSON are read directly.

use crate::error::{AgribotError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Extracts plain text from one kind of file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<String>;
}

fn extraction_error(path: &Path, message: impl Into<String>) -> AgribotError {
    AgribotError::Extraction {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Run an external tool and return its stdout as UTF-8 (lossy).
async fn run_tool(tool: &str, args: &[&OsStr], path: &Path) -> Result<String> {
    let result = Command::new(tool)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AgribotError::ToolNotFound(tool.to_string()));
        }
        Err(e) => return Err(extraction_error(path, format!("{tool} execution failed: {e}"))),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(extraction_error(path, format!("{tool} failed: {}", stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// PDF text via `pdftotext -layout <file> -`.
pub struct PdfExtractor;

#[async_trait]
impl TextExtractor for PdfExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        debug!("Extracting PDF text from {:?}", path);
        run_tool(
            "pdftotext",
            &[
                OsStr::new("-layout"),
                OsStr::new("-enc"),
                OsStr::new("UTF-8"),
                path.as_os_str(),
                OsStr::new("-"),
            ],
            path,
        )
        .await
    }
}

/// DOCX raw text: the body XML is read out of the archive and reduced to paragraphs.
pub struct DocxExtractor {
    paragraph_end: Regex,
    line_break: Regex,
    tab: Regex,
    tag: Regex,
}

impl DocxExtractor {
    pub fn new() -> Self {
        Self {
            paragraph_end: Regex::new(r"</w:p>").expect("Invalid regex"),
            line_break: Regex::new(r"<w:(br|cr)\b[^>]*/>").expect("Invalid regex"),
            tab: Regex::new(r"<w:tab\b[^>]*/>").expect("Invalid regex"),
            tag: Regex::new(r"<[^>]+>").expect("Invalid regex"),
        }
    }

    /// Convert WordprocessingML body XML to plain text.
    pub fn xml_to_text(&self, xml: &str) -> String {
        let text = self.paragraph_end.replace_all(xml, "\n");
        let text = self.line_break.replace_all(&text, "\n");
        let text = self.tab.replace_all(&text, "\t");
        let text = self.tag.replace_all(&text, "");

        let decoded = text
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&apos;", "'")
            .replace("&amp;", "&");

        decoded.trim_end().to_string()
    }
}

/// Read `word/document.xml` out of a DOCX archive. Blocking.
fn read_document_xml(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| extraction_error(path, format!("not a DOCX archive: {e}")))?;
    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|_| extraction_error(path, "archive has no word/document.xml"))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|e| extraction_error(path, format!("unreadable word/document.xml: {e}")))?;
    Ok(xml)
}

impl Default for DocxExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for DocxExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        debug!("Extracting DOCX text from {:?}", path);
        let owned = path.to_path_buf();
        let xml = tokio::task::spawn_blocking(move || read_document_xml(&owned))
            .await
            .map_err(|e| extraction_error(path, format!("DOCX task failed: {e}")))??;

        if xml.trim().is_empty() {
            return Err(extraction_error(path, "archive has no word/document.xml"));
        }

        Ok(self.xml_to_text(&xml))
    }
}

/// UTF-8 plain text.
pub struct PlainTextExtractor;

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        String::from_utf8(bytes).map_err(|e| extraction_error(path, format!("not valid UTF-8: {e}")))
    }
}

/// JSON documents, re-serialized with two-space indentation.
pub struct JsonExtractor;

#[async_trait]
impl TextExtractor for JsonExtractor {
    async fn extract(&self, path: &Path) -> Result<String> {
        let content = tokio::fs::read_to_string(path).await?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| extraction_error(path, format!("invalid JSON: {e}")))?;
        Ok(serde_json::to_string_pretty(&value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docx_xml_to_text() {
        let xml = r#"<?xml version="1.0"?><w:document><w:body>
<w:p><w:r><w:t>Crop</w:t></w:r><w:r><w:tab/><w:t>Water &amp; fertilizer</w:t></w:r></w:p>
<w:p><w:r><w:t>Wheat</w:t><w:br/><w:t>Rabi season &lt;Nov&gt;</w:t></w:r></w:p>
</w:body></w:document>"#;

        let text = DocxExtractor::new().xml_to_text(xml);
        assert!(text.contains("Crop\tWater & fertilizer\n"));
        assert!(text.contains("Wheat\nRabi season <Nov>"));
        assert!(!text.contains("<w:"));
    }

    #[tokio::test]
    async fn test_json_is_pretty_printed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scheme.json");
        std::fs::write(&path, r#"{"scheme":"PM-KISAN","amount":6000}"#).unwrap();

        let text = JsonExtractor.extract(&path).await.unwrap();
        assert_eq!(text, "{\n  \"scheme\": \"PM-KISAN\",\n  \"amount\": 6000\n}");
    }

    #[tokio::test]
    async fn test_json_keeps_nested_key_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crops.json");
        std::fs::write(&path, r#"{"zone":"north","crops":{"wheat":4,"barley":2}}"#).unwrap();

        let text = JsonExtractor.extract(&path).await.unwrap();
        let zone = text.find("zone").unwrap();
        let wheat = text.find("wheat").unwrap();
        let barley = text.find("barley").unwrap();
        assert!(zone < wheat && wheat < barley);
    }

    fn write_docx(path: &Path, entry: &str, body: &str) {
        use std::io::Write;
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer
            .start_file(entry, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap();
    }

    #[tokio::test]
    async fn test_docx_archive_is_read_in_process() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("advisory.docx");
        write_docx(
            &path,
            "word/document.xml",
            "<w:document><w:body><w:p><w:r><w:t>Sow wheat in November.</w:t></w:r></w:p>\
             <w:p><w:r><w:t>Irrigate at crown root stage.</w:t></w:r></w:p></w:body></w:document>",
        );

        let text = DocxExtractor::new().extract(&path).await.unwrap();
        assert_eq!(text, "Sow wheat in November.\nIrrigate at crown root stage.");
    }

    #[tokio::test]
    async fn test_docx_without_body_or_not_zip_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let no_body = dir.path().join("empty.docx");
        write_docx(&no_body, "docProps/core.xml", "<cp:coreProperties/>");
        let not_zip = dir.path().join("fake.docx");
        std::fs::write(&not_zip, "plain text pretending").unwrap();

        let extractor = DocxExtractor::new();
        for path in [no_body, not_zip] {
            let err = extractor.extract(&path).await.unwrap_err();
            assert!(matches!(err, AgribotError::Extraction { .. }));
        }
    }

    #[tokio::test]
    async fn test_invalid_json_is_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonExtractor.extract(&path).await.unwrap_err();
        assert!(matches!(err, AgribotError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_plain_text_rejects_binary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, [0xff, 0xfe, 0x00, 0x80]).unwrap();

        assert!(PlainTextExtractor.extract(&path).await.is_err());
    }
}
