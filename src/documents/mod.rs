// Document loading module
// Reads plain-text files from a directory into memory


use std::fs;
use std::path::Path;

use tracing::{debug, error, info};

use crate::Result;

/// File extensions treated as plain text
pub const TEXT_EXTENSIONS: &[&str] = &["txt"];

/// A loaded source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// File name, used as the source of every chunk cut from it
    pub id: String,
    /// Trimmed file contents
    pub text: String,
}

impl Document {
    #[inline]
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// Load every non-empty text file in `directory`.
///
/// Files that cannot be read or are not valid UTF-8 are logged and skipped.
/// Only a failure to list the directory itself is returned as an error.
#[inline]
pub fn load_docs<P: AsRef<Path>>(directory: P) -> Result<Vec<Document>> {
    let directory = directory.as_ref();
    info!("Loading documents from {}", directory.display());

    let mut documents = Vec::new();

    for entry in fs::read_dir(directory)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Error reading entry in {}: {}", directory.display(), e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !has_text_extension(&path) {
            continue;
        }

        let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
            error!("Skipping file with non UTF-8 name: {}", path.display());
            continue;
        };

        match fs::read_to_string(&path) {
            Ok(content) => {
                let content = content.trim();
                if content.is_empty() {
                    debug!("Skipping empty document: {}", file_name);
                    continue;
                }
                documents.push(Document::new(file_name, content));
                debug!("Loaded document: {}", file_name);
            }
            Err(e) => {
                error!("Error loading {}: {}", file_name, e);
            }
        }
    }

    documents.sort_by(|a, b| a.id.cmp(&b.id));

    info!("Successfully loaded {} documents", documents.len());
    Ok(documents)
}

fn has_text_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            TEXT_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
}
