#![allow(unused)]

//! # contract: the upstream code-hosting API, as seen by the pipeline
//!
//! This module defines a single trait ([`SourceHost`]) and the plain data types
//! that flow across it. Every pipeline stage (search, branch resolution, tree
//! listing, content fetching) talks to the hosting service only through this
//! trait, so stages can be exercised against a mock in tests.
//!
//! ## Interface & Extensibility
//! - Implement [`SourceHost`] to add a new backend (the reqwest client in
//!   [`crate::github`] is the production implementation).
//! - All methods are async and return [`HostError`] on transport, status or
//!   payload problems. Callers decide which errors are fatal for their stage.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`; `MockSourceHost` is exported under
//!   the default `test-export-mocks` feature for integration tests.

use async_trait::async_trait;
use std::fmt;

use mockall::{automock, predicate::*};

/// A repository found through search. Identity is `"owner/name"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepositoryRef {
    pub owner: String,
    pub name: String,
}

impl RepositoryRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// Ledger key, `"owner/name"`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Repository metadata; only the default branch matters to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct RepositoryMetadata {
    pub default_branch: Option<String>,
}

/// A branch and the SHA of its head commit.
#[derive(Debug, Clone)]
pub struct BranchInfo {
    pub name: String,
    pub head_sha: String,
}

/// Raw (unparsed) timestamps of a commit, as reported upstream.
#[derive(Debug, Clone, Default)]
pub struct CommitDates {
    pub committer_date: Option<String>,
    pub author_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Blob,
    Tree,
    Other,
}

impl From<&str> for EntryKind {
    fn from(s: &str) -> Self {
        match s {
            "blob" => EntryKind::Blob,
            "tree" => EntryKind::Tree,
            _ => EntryKind::Other,
        }
    }
}

/// One entry of a recursive tree listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
        }
    }
}

/// Result of a recursive tree listing.
#[derive(Debug, Clone, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntry>,
    /// Upstream stopped listing before the end of the tree.
    pub truncated: bool,
}

/// Errors surfaced by a [`SourceHost`].
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("unexpected payload from {url}: {detail}")]
    Payload { url: String, detail: String },
    #[error("invalid endpoint: {0}")]
    Endpoint(String),
    #[error("request cancelled before it was sent")]
    Cancelled,
}

/// The code-hosting API surface consumed by the pipeline.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceHost: Send + Sync {
    /// One page of repository search results, in API order. Pages start at 1.
    async fn search_repositories(
        &self,
        query: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<RepositoryRef>, HostError>;

    /// Repository metadata (default branch).
    async fn repository_metadata(
        &self,
        repo: &RepositoryRef,
    ) -> Result<RepositoryMetadata, HostError>;

    /// All branches of the repository with their head commit SHA.
    async fn list_branches(&self, repo: &RepositoryRef) -> Result<Vec<BranchInfo>, HostError>;

    /// Committer/author timestamps of a commit.
    async fn commit_dates(&self, repo: &RepositoryRef, sha: &str)
        -> Result<CommitDates, HostError>;

    /// Recursive file tree of a branch.
    async fn tree(&self, repo: &RepositoryRef, branch: &str) -> Result<Tree, HostError>;

    /// Base64 payload of a file at the given branch.
    async fn file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        reference: &str,
    ) -> Result<String, HostError>;
}
