
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::{RagError, Result};

/// A source file's full text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: PathBuf,
    pub content: String,
}

impl Document {
    #[inline]
    pub fn new(source: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            content: content.into(),
        }
    }
}

/// Read every file under `root` whose extension is `extension` (with or
/// without the leading dot), in file-name order.
///
/// Other files are skipped unread. The first entry or file that cannot be read
/// aborts the walk with `DocumentRead`.
#[inline]
pub fn load_documents(root: &Path, extension: &str) -> Result<Vec<Document>> {
    let wanted = extension.trim_start_matches('.');
    let mut documents = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            RagError::DocumentRead {
                path,
                source: io::Error::from(e),
            }
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != wanted) {
            continue;
        }

        let content = std::fs::read_to_string(path).map_err(|source| RagError::DocumentRead {
            path: path.to_path_buf(),
            source,
        })?;

        debug!("Read {} ({} bytes)", path.display(), content.len());
        documents.push(Document::new(path, content));
    }

    debug!(
        "Loaded {} .{} documents from {}",
        documents.len(),
        wanted,
        root.display()
    );
    Ok(documents)
}
