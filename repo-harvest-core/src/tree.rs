use tracing::{info, warn};

use crate::config::ExtractConfig;
use crate::contract::{EntryKind, HostError, RepositoryRef, SourceHost, TreeEntry};

/// Which tree entries are worth fetching.
#[derive(Debug, Clone)]
pub struct SourceFilter {
    /// Path prefix, e.g. `src/main/`.
    pub source_root: String,
    /// Accepted file suffixes, e.g. `.java`.
    pub extensions: Vec<String>,
}

impl SourceFilter {
    pub fn new(source_root: impl Into<String>, extensions: Vec<String>) -> Self {
        Self {
            source_root: source_root.into(),
            extensions,
        }
    }

    pub fn matches(&self, entry: &TreeEntry) -> bool {
        entry.kind == EntryKind::Blob
            && entry.path.starts_with(&self.source_root)
            && self.extensions.iter().any(|ext| entry.path.ends_with(ext.as_str()))
    }

    /// Matching entries in tree order, or `None` when nothing in the tree
    /// lives under the source root.
    pub fn select(&self, entries: &[TreeEntry]) -> Option<Vec<TreeEntry>> {
        if !entries.iter().any(|e| e.path.starts_with(&self.source_root)) {
            return None;
        }
        Some(entries.iter().filter(|e| self.matches(e)).cloned().collect())
    }
}

impl From<&ExtractConfig> for SourceFilter {
    fn from(config: &ExtractConfig) -> Self {
        SourceFilter::new(config.source_root.clone(), config.extensions.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeListing {
    /// Entries selected for fetching; may be empty.
    Files(Vec<TreeEntry>),
    /// The source root does not exist on this branch.
    SourceRootMissing,
}

pub async fn list_files<H>(
    host: &H,
    repo: &RepositoryRef,
    branch: &str,
    filter: &SourceFilter,
) -> Result<TreeListing, HostError>
where
    H: SourceHost + ?Sized,
{
    let tree = host.tree(repo, branch).await?;
    if tree.truncated {
        warn!(repo = %repo, branch, entries = tree.entries.len(), "[TREE] Listing truncated upstream, using partial tree");
    }
    match filter.select(&tree.entries) {
        Some(files) => {
            info!(repo = %repo, branch, total = tree.entries.len(), selected = files.len(), "[TREE] Filtered tree");
            Ok(TreeListing::Files(files))
        }
        None => {
            info!(repo = %repo, branch, root = %filter.source_root, "[TREE] Source root not found");
            Ok(TreeListing::SourceRootMissing)
        }
    }
}
