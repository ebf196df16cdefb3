//! Loading contract text files from a directory.
//!
//! [`DocumentLoader`] reads every matching file directly inside a directory
//! (no recursion) and never fails on a single bad file: undecodable or
//! unreadable files come back with empty content and a logged warning.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::document::Document;
use crate::error::{RagError, Result};

/// A decoder tried after strict UTF-8 fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackEncoding {
    /// UTF-16 (either byte order), only when the file starts with a byte-order mark.
    Utf16,
    /// ISO-8859-1. Every byte maps to a code point, so this never fails.
    Latin1,
}

impl FallbackEncoding {
    /// Label used in log output.
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf16 => "utf-16",
            Self::Latin1 => "latin-1",
        }
    }

    fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            Self::Utf16 => {
                let (body, little_endian) = match bytes {
                    [0xFF, 0xFE, rest @ ..] => (rest, true),
                    [0xFE, 0xFF, rest @ ..] => (rest, false),
                    _ => return None,
                };
                if body.len() % 2 != 0 {
                    return None;
                }
                let units = body.chunks_exact(2).map(|pair| {
                    if little_endian {
                        u16::from_le_bytes([pair[0], pair[1]])
                    } else {
                        u16::from_be_bytes([pair[0], pair[1]])
                    }
                });
                char::decode_utf16(units).collect::<std::result::Result<String, _>>().ok()
            }
            Self::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// How a file's bytes were turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Strict UTF-8 succeeded.
    Utf8,
    /// A fallback decoder succeeded.
    Fallback(FallbackEncoding),
    /// Lossy UTF-8 with replacement characters.
    Lossy,
}

/// Decode raw file bytes: strict UTF-8, then each fallback in order, then lossy UTF-8.
pub fn decode_bytes(bytes: &[u8], fallbacks: &[FallbackEncoding]) -> (String, Decoded) {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return (text.to_string(), Decoded::Utf8);
    }
    for encoding in fallbacks {
        if let Some(text) = encoding.decode(bytes) {
            return (text, Decoded::Fallback(*encoding));
        }
    }
    (String::from_utf8_lossy(bytes).into_owned(), Decoded::Lossy)
}

/// Reads plain-text contracts from a directory into [`Document`]s.
///
/// # Example
///
/// ```rust,ignore
/// use legal_rag::DocumentLoader;
///
/// let documents = DocumentLoader::new().load_all_documents("data/raw/contracts").await?;
/// ```
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    extension: String,
    fallbacks: Vec<FallbackEncoding>,
}

impl Default for DocumentLoader {
    fn default() -> Self {
        Self {
            extension: "txt".to_string(),
            fallbacks: vec![FallbackEncoding::Utf16, FallbackEncoding::Latin1],
        }
    }
}

impl DocumentLoader {
    /// Create a loader for `*.txt` files with the default fallback chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only load files with this extension (compared case-insensitively).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_lowercase();
        self
    }

    /// Replace the ordered list of fallback decoders.
    pub fn with_fallbacks(mut self, fallbacks: Vec<FallbackEncoding>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Load every matching file directly inside `directory`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DirectoryNotFound`] if `directory` is not a
    /// directory, or [`RagError::Io`] if it cannot be listed. Individual file
    /// failures never abort the batch.
    pub async fn load_all_documents(&self, directory: impl AsRef<Path>) -> Result<Vec<Document>> {
        let directory = directory.as_ref();
        let is_dir = tokio::fs::metadata(directory).await.map(|m| m.is_dir()).unwrap_or(false);
        if !is_dir {
            return Err(RagError::DirectoryNotFound { path: directory.to_path_buf() });
        }

        info!(
            directory = %directory.display(),
            extension = %self.extension,
            "scanning for documents"
        );

        let mut paths = Vec::new();
        let mut entries =
            tokio::fs::read_dir(directory).await.map_err(|e| RagError::io(directory, e))?;
        while let Some(entry) =
            entries.next_entry().await.map_err(|e| RagError::io(directory, e))?
        {
            let path = entry.path();
            if !self.matches_extension(&path) {
                continue;
            }
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => paths.push(path),
                Ok(_) => debug!(path = %path.display(), "skipping non-file path"),
                Err(e) => warn!(path = %path.display(), error = %e, "cannot stat entry"),
            }
        }
        paths.sort();

        let mut documents = Vec::with_capacity(paths.len());
        for path in paths {
            documents.push(self.load_file(&path).await);
        }

        info!(document_count = documents.len(), "loaded documents");
        Ok(documents)
    }

    fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
    }

    async fn load_file(&self, path: &Path) -> Document {
        let filename =
            path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let file_type = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let content = match tokio::fs::read(path).await {
            Ok(bytes) => {
                let (text, decoded) = decode_bytes(&bytes, &self.fallbacks);
                match decoded {
                    Decoded::Utf8 => {}
                    Decoded::Fallback(encoding) => {
                        warn!(
                            file = %filename,
                            encoding = encoding.name(),
                            "file is not valid UTF-8, decoded with fallback"
                        );
                    }
                    Decoded::Lossy => {
                        warn!(
                            file = %filename,
                            "file is not valid UTF-8, decoded with replacement characters"
                        );
                    }
                }
                text
            }
            Err(e) => {
                warn!(file = %filename, error = %e, "cannot read file");
                String::new()
            }
        };

        if content.is_empty() {
            warn!(file = %filename, "file produced empty content");
        }

        Document { filename, content, source_path: path.display().to_string(), file_type }
    }
}

/// Drop documents with empty content, logging how many were discarded.
pub fn filter_readable(documents: Vec<Document>) -> Vec<Document> {
    let total = documents.len();
    let readable: Vec<Document> = documents.into_iter().filter(Document::is_readable).collect();
    if readable.len() < total {
        warn!(skipped = total - readable.len(), "documents with empty content will be ignored");
    }
    readable
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_is_preferred() {
        let (text, decoded) = decode_bytes("Sección 1".as_bytes(), &[FallbackEncoding::Latin1]);
        assert_eq!(text, "Sección 1");
        assert_eq!(decoded, Decoded::Utf8);
    }

    #[test]
    fn latin1_fallback_decodes_windows_style_bytes() {
        let bytes = b"Secci\xf3n 1";
        let (text, decoded) =
            decode_bytes(bytes, &[FallbackEncoding::Utf16, FallbackEncoding::Latin1]);
        assert_eq!(text, "Sección 1");
        assert_eq!(decoded, Decoded::Fallback(FallbackEncoding::Latin1));
        assert_eq!(FallbackEncoding::Latin1.name(), "latin-1");
    }

    #[test]
    fn utf16_requires_byte_order_mark() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "Term".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, decoded) = decode_bytes(&bytes, &[FallbackEncoding::Utf16]);
        assert_eq!(text, "Term");
        assert_eq!(decoded, Decoded::Fallback(FallbackEncoding::Utf16));

        assert_eq!(FallbackEncoding::Utf16.decode(b"T\0e\0"), None);
    }

    #[test]
    fn no_fallbacks_means_lossy() {
        let (text, decoded) = decode_bytes(b"ok \xff", &[]);
        assert_eq!(decoded, Decoded::Lossy);
        assert!(text.starts_with("ok "));
        assert!(text.contains('\u{FFFD}'));
    }

    #[test]
    fn filter_drops_empty_documents() {
        let doc = |name: &str, content: &str| Document {
            filename: name.to_string(),
            content: content.to_string(),
            source_path: format!("/tmp/{name}"),
            file_type: "txt".to_string(),
        };
        let kept = filter_readable(vec![doc("a.txt", "text"), doc("b.txt", "")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].filename, "a.txt");
    }

    fn names(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.filename.as_str()).collect()
    }

    #[tokio::test]
    async fn missing_directory_or_plain_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loader = DocumentLoader::new();

        let missing = dir.path().join("missing");
        let result = loader.load_all_documents(&missing).await;
        assert!(matches!(result, Err(RagError::DirectoryNotFound { path }) if path == missing));

        let file = dir.path().join("contract.txt");
        tokio::fs::write(&file, "Term.").await.unwrap();
        let result = loader.load_all_documents(&file).await;
        assert!(matches!(result, Err(RagError::DirectoryNotFound { .. })));
    }

    #[tokio::test]
    async fn only_top_level_matching_files_are_loaded_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        tokio::fs::write(root.join("b.txt"), "Second.").await.unwrap();
        tokio::fs::write(root.join("A.TXT"), "First.").await.unwrap();
        tokio::fs::write(root.join("notes.md"), "Not a contract.").await.unwrap();
        tokio::fs::create_dir(root.join("nested")).await.unwrap();
        tokio::fs::write(root.join("nested").join("c.txt"), "Nested.").await.unwrap();
        tokio::fs::create_dir(root.join("folder.txt")).await.unwrap();

        let documents = DocumentLoader::new().load_all_documents(root).await.unwrap();
        assert_eq!(names(&documents), vec!["A.TXT", "b.txt"]);
        assert_eq!(documents[0].content, "First.");
        assert_eq!(documents[0].file_type, "txt");
        assert!(documents[1].source_path.ends_with("b.txt"));

        let markdown =
            DocumentLoader::new().with_extension(".MD").load_all_documents(root).await.unwrap();
        assert_eq!(names(&markdown), vec!["notes.md"]);
    }

    #[tokio::test]
    async fn undecodable_bytes_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("a_bad.txt"), b"Fee \xff\xfe due").await.unwrap();
        tokio::fs::write(dir.path().join("b_good.txt"), "Fee due.").await.unwrap();

        let lossy = DocumentLoader::new()
            .with_fallbacks(Vec::new())
            .load_all_documents(dir.path())
            .await
            .unwrap();
        assert_eq!(names(&lossy), vec!["a_bad.txt", "b_good.txt"]);
        assert!(lossy[0].content.starts_with("Fee "));
        assert!(lossy[0].content.contains('\u{FFFD}'));
        assert_eq!(lossy[1].content, "Fee due.");

        let latin1 = DocumentLoader::new().load_all_documents(dir.path()).await.unwrap();
        assert_eq!(latin1[0].content, "Fee \u{ff}\u{fe} due");
    }

    #[tokio::test]
    async fn unreadable_file_becomes_an_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let document = DocumentLoader::new().load_file(&dir.path().join("gone.txt")).await;
        assert_eq!(document.filename, "gone.txt");
        assert!(document.content.is_empty());
        assert!(filter_readable(vec![document]).is_empty());
    }
}
