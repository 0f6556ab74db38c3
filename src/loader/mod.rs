//! Document loading: text extraction and chunking for a directory of source files.
//!
//! Supported formats are PDF, DOCX, TXT and JSON. Every other file is skipped.
//! A file that fails to extract is reported and the rest of the batch carries on.

mod chunker;
mod extract;

pub use chunker::{chunk_text, ChunkingConfig};
pub use extract::{
    DocxExtractor, JsonExtractor, PdfExtractor, PlainTextExtractor, TextExtractor,
};

use crate::error::{AgribotError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Extensions the loader knows how to extract.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["pdf", "docx", "txt", "json"];

/// Provenance of a chunk. Serialized with the camelCase keys stored alongside embeddings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// File name the chunk was cut from.
    pub source: String,
    /// Canonical path of that file. Scopes chunk ids and stale cleanup.
    #[serde(default)]
    pub path: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    /// File extension without the dot.
    #[serde(rename = "type")]
    pub file_type: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A bounded piece of a source document; the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Stable chunk id: file stem, chunk index, and a UUIDv5 of `path#index`.
///
/// Re-ingesting an unchanged file produces the same ids, so upserts overwrite
/// instead of duplicating. Files sharing a name in different directories get
/// distinct ids.
pub fn chunk_id(path: &str, stem: &str, index: usize) -> String {
    let suffix = Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{}#{}", path, index).as_bytes());
    format!("{}_{}_{}", stem, index, suffix)
}

/// Outcome of loading a directory.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Chunks from every file that extracted successfully.
    pub chunks: Vec<DocumentChunk>,
    /// Files that produced at least one chunk.
    pub loaded_files: Vec<PathBuf>,
    /// Unsupported or empty files.
    pub skipped: Vec<PathBuf>,
    /// Files whose extraction failed.
    pub failures: Vec<AgribotError>,
}

/// Loads and chunks documents using one extractor per file extension.
pub struct DocumentLoader {
    extractors: HashMap<String, Arc<dyn TextExtractor>>,
    config: ChunkingConfig,
}

impl DocumentLoader {
    /// Create a loader with the built-in extractors.
    pub fn new(config: ChunkingConfig) -> Self {
        let mut extractors: HashMap<String, Arc<dyn TextExtractor>> = HashMap::new();
        extractors.insert("pdf".to_string(), Arc::new(PdfExtractor));
        extractors.insert("docx".to_string(), Arc::new(DocxExtractor::new()));
        extractors.insert("txt".to_string(), Arc::new(PlainTextExtractor));
        extractors.insert("json".to_string(), Arc::new(JsonExtractor));
        Self { extractors, config }
    }

    /// Replace the extractor for one of the supported extensions.
    pub fn with_extractor(mut self, extension: &str, extractor: Arc<dyn TextExtractor>) -> Self {
        let extension = extension.trim_start_matches('.').to_lowercase();
        if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            self.extractors.insert(extension, extractor);
        } else {
            warn!("Ignoring extractor for unsupported extension: {}", extension);
        }
        self
    }

    /// Chunking configuration in use.
    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    fn extension_of(path: &Path) -> Option<String> {
        path.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .filter(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
    }

    /// Split the regular files of `dir` into supported and skipped, both sorted by name.
    pub async fn list_files(&self, dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut supported = Vec::new();
        let mut skipped = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            match Self::extension_of(&path) {
                Some(_) => supported.push(path),
                None => {
                    info!("Skipping unsupported file: {}", path.display());
                    skipped.push(path);
                }
            }
        }

        supported.sort();
        skipped.sort();
        Ok((supported, skipped))
    }

    /// Extract and chunk one file. Returns no chunks when the file holds no text.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn load_file(&self, path: &Path) -> Result<Vec<DocumentChunk>> {
        let extension = Self::extension_of(path).ok_or_else(|| {
            AgribotError::InvalidInput(format!("Unsupported file type: {}", path.display()))
        })?;
        let extractor = self.extractors.get(&extension).ok_or_else(|| {
            AgribotError::InvalidInput(format!("No extractor registered for .{}", extension))
        })?;

        let canonical = tokio::fs::canonicalize(path).await?;
        let stats = tokio::fs::metadata(&canonical).await?;
        let modified: DateTime<Utc> = stats.modified()?.into();
        let created: DateTime<Utc> = stats.created().map(Into::into).unwrap_or(modified);

        let text = extractor.extract(path).await.map_err(|e| match e {
            AgribotError::Extraction { .. } => e,
            other => AgribotError::Extraction {
                path: path.to_path_buf(),
                message: other.to_string(),
            },
        })?;

        if text.trim().is_empty() {
            info!("No text extracted from {}", path.display());
            return Ok(Vec::new());
        }

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source_path = canonical.to_string_lossy().into_owned();

        let pieces = chunk_text(&text, &self.config);
        let total_chunks = pieces.len();
        debug!("Split {} into {} chunks", source, total_chunks);

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(chunk_index, text)| DocumentChunk {
                id: chunk_id(&source_path, &stem, chunk_index),
                text,
                metadata: ChunkMetadata {
                    source: source.clone(),
                    path: source_path.clone(),
                    chunk_index,
                    total_chunks,
                    file_type: extension.clone(),
                    created,
                    modified,
                },
            })
            .collect())
    }

    /// Load every supported file in `dir`. Only an unreadable directory is an error;
    /// per-file failures land in the report.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub async fn load_directory(&self, dir: &Path) -> Result<LoadReport> {
        let (files, skipped) = self.list_files(dir).await?;
        let mut report = LoadReport {
            skipped,
            ..Default::default()
        };

        for path in files {
            match self.load_file(&path).await {
                Ok(chunks) if chunks.is_empty() => report.skipped.push(path),
                Ok(chunks) => {
                    report.chunks.extend(chunks);
                    report.loaded_files.push(path);
                }
                Err(e) => {
                    warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }

        info!(
            "Loaded {} chunks from {} files ({} skipped, {} failed)",
            report.chunks.len(),
            report.loaded_files.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Stands in for `pdftotext` so tests don't depend on poppler being installed.
    pub(crate) struct StubPdfExtractor(pub &'static str);

    #[async_trait]
    impl TextExtractor for StubPdfExtractor {
        async fn extract(&self, _path: &Path) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    pub(crate) fn stub_loader(config: ChunkingConfig) -> DocumentLoader {
        DocumentLoader::new(config).with_extractor(
            "pdf",
            Arc::new(StubPdfExtractor(
                "Drip irrigation delivers water directly to plant roots. Schedule it early morning.",
            )),
        )
    }

    #[tokio::test]
    async fn test_mixed_directory_skips_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("guide.pdf"), b"%PDF-1.4 stub").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "Apply mulch after sowing.").unwrap();
        std::fs::write(dir.path().join("photo.xyz"), "binary junk").unwrap();

        let report = stub_loader(ChunkingConfig::default())
            .load_directory(dir.path())
            .await
            .unwrap();

        assert_eq!(report.loaded_files.len(), 2);
        assert_eq!(report.skipped, vec![dir.path().join("photo.xyz")]);
        assert!(report.failures.is_empty());

        let mut sources: Vec<_> = report.chunks.iter().map(|c| c.metadata.source.as_str()).collect();
        sources.dedup();
        assert_eq!(sources, vec!["guide.pdf", "notes.txt"]);
        assert_eq!(report.chunks[0].metadata.file_type, "pdf");
    }

    #[tokio::test]
    async fn test_bad_file_does_not_abort_batch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a_broken.json"), "{oops").unwrap();
        std::fs::write(dir.path().join("b_good.txt"), "Rotate crops yearly.").unwrap();

        let report = DocumentLoader::new(ChunkingConfig::default())
            .load_directory(dir.path())
            .await
            .unwrap();

        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0], AgribotError::Extraction { .. }));
        assert_eq!(report.loaded_files, vec![dir.path().join("b_good.txt")]);
        assert_eq!(report.chunks.len(), 1);
        assert_eq!(report.chunks[0].text, "Rotate crops yearly.");
    }

    #[tokio::test]
    async fn test_chunk_metadata_and_stable_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Soil Health.TXT");
        let body = "Healthy soil holds water. ".repeat(100);
        std::fs::write(&path, &body).unwrap();

        let loader = DocumentLoader::new(ChunkingConfig::default());
        let first = loader.load_file(&path).await.unwrap();
        let second = loader.load_file(&path).await.unwrap();

        assert!(first.len() > 1);
        for (i, chunk) in first.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i);
            assert_eq!(chunk.metadata.total_chunks, first.len());
            assert_eq!(chunk.metadata.file_type, "txt");
            assert_eq!(chunk.metadata.source, "Soil Health.TXT");
            assert!(chunk.metadata.path.ends_with("Soil Health.TXT"));
            assert!(Path::new(&chunk.metadata.path).is_absolute());
            assert!(chunk.id.starts_with(&format!("Soil Health_{}_", i)));
        }
        let ids: Vec<_> = first.iter().map(|c| &c.id).collect();
        let again: Vec<_> = second.iter().map(|c| &c.id).collect();
        assert_eq!(ids, again);
    }

    #[tokio::test]
    async fn test_blank_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   \n").unwrap();

        let report = DocumentLoader::new(ChunkingConfig::default())
            .load_directory(dir.path())
            .await
            .unwrap();

        assert!(report.chunks.is_empty());
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_metadata_serializes_camel_case() {
        let now = Utc::now();
        let metadata = ChunkMetadata {
            source: "drip.pdf".to_string(),
            path: "/docs/drip.pdf".to_string(),
            chunk_index: 2,
            total_chunks: 5,
            file_type: "pdf".to_string(),
            created: now,
            modified: now,
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["chunkIndex"], 2);
        assert_eq!(value["totalChunks"], 5);
        assert_eq!(value["type"], "pdf");
        assert_eq!(value["path"], "/docs/drip.pdf");
    }

    #[test]
    fn test_metadata_without_path_still_parses() {
        let value = serde_json::json!({
            "source": "drip.pdf",
            "chunkIndex": 0,
            "totalChunks": 1,
            "type": "pdf",
            "created": "2024-05-01T00:00:00Z",
            "modified": "2024-05-01T00:00:00Z"
        });
        let metadata: ChunkMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(metadata.path, "");
    }

    #[test]
    fn test_chunk_id_differs_per_path() {
        assert_ne!(chunk_id("/d/a.txt", "a", 0), chunk_id("/d/a.pdf", "a", 0));
        assert_ne!(chunk_id("/x/a.txt", "a", 0), chunk_id("/y/a.txt", "a", 0));
        assert_eq!(chunk_id("/d/a.txt", "a", 0), chunk_id("/d/a.txt", "a", 0));
    }

    #[tokio::test]
    async fn test_same_name_in_two_directories_gets_distinct_ids() {
        let root = tempfile::tempdir().unwrap();
        for sub in ["a", "b"] {
            std::fs::create_dir(root.path().join(sub)).unwrap();
            std::fs::write(root.path().join(sub).join("guide.txt"), "Prune vines in winter.").unwrap();
        }

        let loader = DocumentLoader::new(ChunkingConfig::default());
        let a = loader.load_file(&root.path().join("a/guide.txt")).await.unwrap();
        let b = loader.load_file(&root.path().join("b/guide.txt")).await.unwrap();

        assert_eq!(a[0].metadata.source, b[0].metadata.source);
        assert_ne!(a[0].metadata.path, b[0].metadata.path);
        assert_ne!(a[0].id, b[0].id);
    }
}
