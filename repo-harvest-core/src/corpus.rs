use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::content::FileContent;
use crate::contract::RepositoryRef;
use crate::ledger::artifact_file_name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Written { path: PathBuf, files: usize },
    /// Nothing to write; no file was created or touched.
    Empty,
}

/// Writes one artifact per repository into the output directory.
#[derive(Debug, Clone)]
pub struct CorpusWriter {
    output_dir: PathBuf,
    extension: String,
    separator: String,
}

impl CorpusWriter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        separator: impl Into<String>,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            separator: separator.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn artifact_path(&self, repo: &RepositoryRef) -> PathBuf {
        self.output_dir.join(artifact_file_name(repo, &self.extension))
    }

    /// Contents in order with the separator between consecutive files only.
    pub fn join(&self, contents: &[FileContent]) -> Option<String> {
        if contents.is_empty() {
            return None;
        }
        Some(
            contents
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(&self.separator),
        )
    }

    /// Write the corpus for `repo`. The body goes to a temporary file in the
    /// output directory first and is renamed over the destination, so an
    /// interrupted run never leaves a truncated artifact behind.
    ///
    /// An empty body is never written: a zero-length artifact would not count
    /// as a ledger entry on the next load.
    pub fn write(&self, repo: &RepositoryRef, contents: &[FileContent]) -> io::Result<WriteResult> {
        let Some(body) = self.join(contents).filter(|body| !body.is_empty()) else {
            debug!(repo = %repo, "[CORPUS] No content, nothing written");
            return Ok(WriteResult::Empty);
        };
        let path = self.artifact_path(repo);

        let mut tmp = NamedTempFile::new_in(&self.output_dir)?;
        tmp.write_all(body.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;

        info!(repo = %repo, path = %path.display(), files = contents.len(), bytes = body.len(), "[CORPUS] Artifact written");
        Ok(WriteResult::Written {
            path,
            files: contents.len(),
        })
    }
}
