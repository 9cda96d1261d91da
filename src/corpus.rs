//! Corpus ingestion: text files on disk to page-level documents with metadata

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::CorpusConfig;
use crate::errors::Result;
use crate::errors::TierRagError;
use crate::models::keys;
use crate::models::Document;
use crate::models::Metadata;
use crate::text;

/// Page separator inside extracted text files
const PAGE_BREAK: char = '\x0c';

const UNCATEGORIZED: &str = "uncategorized";

/// Anything that can hand the orchestrator a fresh set of documents to index
pub trait DocumentSource: Send + Sync {
    fn load(&self) -> Result<Vec<Document>>;
}

/// Loads every text file under a corpus root, one document per page
#[derive(Debug, Clone)]
pub struct CorpusLoader {
    root: PathBuf,
    extension: String,
}

impl CorpusLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            extension: "txt".to_string(),
        }
    }

    pub fn from_config(config: &CorpusConfig) -> Self {
        Self {
            root: config.root.clone(),
            extension: config.extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Matching files under the root, sorted by path
    pub fn list_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = walkdir::WalkDir::new(&self.root)
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_file())
            .map(walkdir::DirEntry::into_path)
            .filter(|p| {
                p.extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
            })
            .collect();
        files.sort();
        files
    }

    /// Split one file into page documents
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let content = read_file_content(path)?;
        let base = self.file_metadata(path);

        let documents: Vec<Document> = content
            .split(PAGE_BREAK)
            .enumerate()
            .filter_map(|(idx, page)| {
                let cleaned = text::clean_text(page);
                if cleaned.is_empty() {
                    return None;
                }
                let page_number = u32::try_from(idx + 1).ok()?;
                let mut metadata = base.clone();
                metadata.insert(keys::PAGE.to_string(), Value::from(page_number));
                Some(Document::new(cleaned, metadata).with_page_number(page_number))
            })
            .collect();

        debug!("Loaded {} pages from {}", documents.len(), path.display());
        Ok(documents)
    }

    fn file_metadata(&self, path: &Path) -> Metadata {
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let title = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut metadata = Metadata::new();
        metadata.insert(keys::SOURCE.to_string(), Value::from(source));
        metadata.insert(
            keys::FILE_PATH.to_string(),
            Value::from(path.to_string_lossy().to_string()),
        );
        metadata.insert(keys::CATEGORY.to_string(), Value::from(self.category(path)));
        insert_title_metadata(&mut metadata, &title);
        metadata
    }

    /// Parent directories relative to the root, joined with " > "
    fn category(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        let parts: Vec<String> = relative
            .parent()
            .map(|parent| {
                parent
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();

        if parts.is_empty() {
            UNCATEGORIZED.to_string()
        } else {
            parts.join(" > ")
        }
    }
}

impl DocumentSource for CorpusLoader {
    fn load(&self) -> Result<Vec<Document>> {
        if !self.root.exists() {
            return Err(TierRagError::InvalidConfiguration(format!(
                "corpus directory does not exist: {}",
                self.root.display()
            )));
        }

        let files = self.list_files();
        info!("Found {} .{} files under {}", files.len(), self.extension, self.root.display());

        let mut documents = Vec::new();
        for (i, path) in files.iter().enumerate() {
            debug!("Processing file {}/{}: {}", i + 1, files.len(), path.display());
            match self.load_file(path) {
                Ok(pages) => documents.extend(pages),
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        info!("Loaded {} pages from {} files", documents.len(), files.len());
        Ok(documents)
    }
}

/// Documents already in memory
impl DocumentSource for Vec<Document> {
    fn load(&self) -> Result<Vec<Document>> {
        Ok(self.clone())
    }
}

fn read_file_content(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(path)?).to_string()),
    }
}

/// Title, year signals and acronym keywords derived from a file title
fn insert_title_metadata(metadata: &mut Metadata, title: &str) {
    metadata.insert(keys::TITLE.to_string(), Value::from(title));

    if let Some(&(start, end)) = text::extract_year_ranges(title).first() {
        metadata.insert(keys::YEAR_RANGE_START.to_string(), Value::from(start));
        metadata.insert(keys::YEAR_RANGE_END.to_string(), Value::from(end));
        metadata.insert(
            keys::YEAR_RANGE_TEXT.to_string(),
            Value::from(format!("{start}-{end}")),
        );
    } else if let Some(&year) = text::extract_standalone_years(title).first() {
        metadata.insert(keys::YEAR.to_string(), Value::from(year));
    }

    let keywords = text::extract_acronyms(title);
    if !keywords.is_empty() {
        metadata.insert(keys::KEYWORDS.to_string(), Value::from(keywords));
    }
}
