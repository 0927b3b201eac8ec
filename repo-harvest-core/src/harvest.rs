//! High-level pipeline: search → resolve branch → list tree → fetch files → write corpus.
//!
//! This module drives one harvest run as described by a [`HarvestConfig`]:
//!   - Ensures the output directory exists and rebuilds the [`Ledger`] from it
//!   - Collects candidate repositories through the paged search
//!   - For each repository not yet in the ledger, resolves a branch, lists and
//!     filters its tree, fetches the selected files and writes the corpus artifact
//!   - Returns a [`HarvestReport`] with one [`RepoOutcome`] per candidate
//!
//! # Error Handling
//! Only startup problems (output directory unusable) abort the run with a
//! [`HarvestError`]. Everything below that is absorbed into the repository's
//! outcome and logged; a bad repository never stops the others.
//!
//! # Concurrency
//! `config.concurrency` repositories are processed at a time (default 1, fully
//! sequential). Claiming a ledger key is the only critical section; the
//! upstream request budget is shared inside the [`SourceHost`] implementation.
//! A duplicate search hit that another worker is still extracting is reported
//! as [`SkipReason::InFlight`], not as already processed.
//!
//! # Cancellation
//! When the token fires, no new page, repository or file request is started
//! and the report gathered so far is returned.

use futures::stream::{self, StreamExt};
use std::fs;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::branch::resolve_branch;
use crate::config::HarvestConfig;
use crate::content::fetch_files;
use crate::contract::{HostError, RepositoryRef, SourceHost};
use crate::corpus::{CorpusWriter, WriteResult};
use crate::ledger::Ledger;
use crate::search::fetch_repositories;
use crate::tree::{list_files, SourceFilter, TreeListing};

#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error("output directory {path:?} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Already in the ledger.
    AlreadyProcessed,
    /// A duplicate search hit while another worker still holds the repository.
    InFlight,
    SourceRootMissing,
    NoMatchingFiles,
    /// Matching files existed but none produced any text.
    NothingFetched,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    Written {
        path: PathBuf,
        branch: String,
        files: usize,
    },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RepoReport {
    pub repo: RepositoryRef,
    pub outcome: RepoOutcome,
}

#[derive(Debug, Default)]
pub struct HarvestReport {
    pub repositories: Vec<RepoReport>,
    /// Ledger size once the run finished.
    pub ledger_size: usize,
}

impl HarvestReport {
    fn keys_where(&self, pred: impl Fn(&RepoOutcome) -> bool) -> Vec<String> {
        self.repositories
            .iter()
            .filter(|r| pred(&r.outcome))
            .map(|r| r.repo.key())
            .collect()
    }

    pub fn written(&self) -> Vec<String> {
        self.keys_where(|o| matches!(o, RepoOutcome::Written { .. }))
    }

    pub fn already_processed(&self) -> Vec<String> {
        self.keys_where(|o| *o == RepoOutcome::Skipped(SkipReason::AlreadyProcessed))
    }

    pub fn in_flight(&self) -> Vec<String> {
        self.keys_where(|o| *o == RepoOutcome::Skipped(SkipReason::InFlight))
    }

    pub fn skipped(&self) -> Vec<String> {
        self.keys_where(|o| matches!(o, RepoOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> Vec<String> {
        self.keys_where(|o| matches!(o, RepoOutcome::Failed(_)))
    }
}

/// Everything a single repository needs, shared by all workers.
struct RunContext<'a, H: ?Sized> {
    host: &'a H,
    config: &'a HarvestConfig,
    filter: SourceFilter,
    writer: CorpusWriter,
    ledger: Mutex<Ledger>,
    cancel: &'a CancellationToken,
}

pub async fn harvest<H>(
    config: &HarvestConfig,
    host: &H,
    cancel: &CancellationToken,
) -> Result<HarvestReport, HarvestError>
where
    H: SourceHost + ?Sized,
{
    info!("[HARVEST] Starting harvest run");
    config.trace_loaded();

    let output_dir = &config.output.dir;
    fs::create_dir_all(output_dir).map_err(|source| {
        error!(error = ?source, path = %output_dir.display(), "[HARVEST][ERROR] Failed to create output directory");
        HarvestError::OutputDir {
            path: output_dir.clone(),
            source,
        }
    })?;
    let ledger = Ledger::load(output_dir, &config.output.extension).map_err(|source| {
        error!(error = ?source, path = %output_dir.display(), "[HARVEST][ERROR] Failed to load ledger");
        HarvestError::OutputDir {
            path: output_dir.clone(),
            source,
        }
    })?;
    info!(previously_processed = ledger.len(), "[HARVEST] Ledger loaded");

    let candidates = fetch_repositories(
        host,
        &config.search.query,
        config.search.per_page,
        config.search.pages,
        cancel,
    )
    .await;
    info!(total = candidates.len(), "[HARVEST] Repositories fetched");

    let ctx = RunContext {
        host,
        config,
        filter: SourceFilter::from(&config.extract),
        writer: CorpusWriter::new(
            output_dir.clone(),
            config.output.extension.clone(),
            config.extract.separator.clone(),
        ),
        ledger: Mutex::new(ledger),
        cancel,
    };

    let total = candidates.len();
    let repositories: Vec<RepoReport> = stream::iter(candidates.into_iter().enumerate())
        .map(|(index, repo)| {
            let ctx = &ctx;
            async move {
                info!(repo = %repo, position = index + 1, total, "[HARVEST] Processing repository");
                let outcome = process_repository(ctx, &repo).await;
                log_outcome(&repo, &outcome);
                RepoReport { repo, outcome }
            }
        })
        .buffered(config.concurrency.max(1))
        .collect()
        .await;

    let report = HarvestReport {
        repositories,
        ledger_size: ctx.ledger.lock().await.len(),
    };
    info!(
        written = report.written().len(),
        skipped = report.skipped().len(),
        failed = report.failed().len(),
        total = report.repositories.len(),
        "[HARVEST] Harvest finished"
    );
    Ok(report)
}

async fn process_repository<H>(ctx: &RunContext<'_, H>, repo: &RepositoryRef) -> RepoOutcome
where
    H: SourceHost + ?Sized,
{
    if ctx.cancel.is_cancelled() {
        return RepoOutcome::Skipped(SkipReason::Cancelled);
    }
    let key = repo.key();
    {
        let mut ledger = ctx.ledger.lock().await;
        if ledger.contains(&key) {
            return RepoOutcome::Skipped(SkipReason::AlreadyProcessed);
        }
        if !ledger.claim(&key) {
            return RepoOutcome::Skipped(SkipReason::InFlight);
        }
    }

    let outcome = extract_repository(ctx, repo).await;

    let mut ledger = ctx.ledger.lock().await;
    match outcome {
        RepoOutcome::Written { .. } => ledger.add(&key),
        _ => ledger.release(&key),
    }
    outcome
}

async fn extract_repository<H>(ctx: &RunContext<'_, H>, repo: &RepositoryRef) -> RepoOutcome
where
    H: SourceHost + ?Sized,
{
    let branch = resolve_branch(ctx.host, repo, &ctx.config.extract.fallback_branch).await;

    if ctx.cancel.is_cancelled() {
        return RepoOutcome::Skipped(SkipReason::Cancelled);
    }
    let entries = match list_files(ctx.host, repo, &branch.name, &ctx.filter).await {
        Ok(TreeListing::Files(entries)) if entries.is_empty() => {
            return RepoOutcome::Skipped(SkipReason::NoMatchingFiles)
        }
        Ok(TreeListing::Files(entries)) => entries,
        Ok(TreeListing::SourceRootMissing) => {
            return RepoOutcome::Skipped(SkipReason::SourceRootMissing)
        }
        Err(HostError::Cancelled) => return RepoOutcome::Skipped(SkipReason::Cancelled),
        Err(e) => return RepoOutcome::Failed(format!("tree listing for branch {}: {e}", branch.name)),
    };

    let fetched = fetch_files(ctx.host, repo, &branch.name, &entries, ctx.cancel).await;
    if fetched.cancelled {
        return RepoOutcome::Skipped(SkipReason::Cancelled);
    }
    if fetched.failed > 0 {
        warn!(repo = %repo, failed = fetched.failed, fetched = fetched.files.len(), "[HARVEST] Some files were left out");
    }

    match ctx.writer.write(repo, &fetched.files) {
        Ok(WriteResult::Written { path, files }) => RepoOutcome::Written {
            path,
            branch: branch.name,
            files,
        },
        Ok(WriteResult::Empty) => RepoOutcome::Skipped(SkipReason::NothingFetched),
        Err(e) => RepoOutcome::Failed(format!("writing artifact: {e}")),
    }
}

fn log_outcome(repo: &RepositoryRef, outcome: &RepoOutcome) {
    match outcome {
        RepoOutcome::Written { path, branch, files } => {
            info!(repo = %repo, branch = %branch, files, path = %path.display(), "[HARVEST] Repository written")
        }
        RepoOutcome::Skipped(reason) => {
            info!(repo = %repo, reason = ?reason, "[HARVEST] Repository skipped")
        }
        RepoOutcome::Failed(detail) => {
            error!(repo = %repo, error = %detail, "[HARVEST][ERROR] Repository failed")
        }
    }
}
