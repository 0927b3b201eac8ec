//! Picks the branch to extract from, degrading through three tiers:
//! the declared default branch, then the branch with the most recent head
//! commit, then a fixed conventional name. Resolution never fails.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::contract::{BranchInfo, CommitDates, RepositoryRef, SourceHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchSource {
    /// Declared default branch from repository metadata.
    Default,
    /// Branch whose head commit is the most recent.
    MostRecentCommit,
    /// Nothing usable upstream; the configured conventional name.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBranch {
    pub name: String,
    pub source: BranchSource,
}

pub async fn resolve_branch<H>(host: &H, repo: &RepositoryRef, fallback: &str) -> ResolvedBranch
where
    H: SourceHost + ?Sized,
{
    match host.repository_metadata(repo).await {
        Ok(metadata) => match metadata.default_branch.filter(|b| !b.trim().is_empty()) {
            Some(name) => {
                info!(repo = %repo, branch = %name, "[BRANCH] Using default branch");
                return ResolvedBranch {
                    name,
                    source: BranchSource::Default,
                };
            }
            None => {
                info!(repo = %repo, "[BRANCH] No default branch in metadata, looking for most recent branch");
            }
        },
        Err(e) => {
            warn!(repo = %repo, error = %e, "[BRANCH] Metadata lookup failed, looking for most recent branch");
        }
    }

    let branches = match host.list_branches(repo).await {
        Ok(branches) => branches,
        Err(e) => {
            warn!(repo = %repo, error = %e, fallback, "[BRANCH] Branch listing failed, using fallback");
            return fallback_branch(fallback);
        }
    };

    let mut newest: Option<(DateTime<Utc>, BranchInfo)> = None;
    for branch in branches {
        let date = match host.commit_dates(repo, &branch.head_sha).await {
            Ok(dates) => commit_timestamp(&dates),
            Err(e) => {
                warn!(repo = %repo, branch = %branch.name, error = %e, "[BRANCH] Could not fetch head commit");
                DateTime::<Utc>::MIN_UTC
            }
        };
        debug!(repo = %repo, branch = %branch.name, %date, "[BRANCH] Head commit date");
        // Strictly newer replaces, so the first of equal dates is kept.
        if newest.as_ref().map_or(true, |(best, _)| date > *best) {
            newest = Some((date, branch));
        }
    }

    match newest {
        Some((date, branch)) => {
            info!(repo = %repo, branch = %branch.name, %date, "[BRANCH] Using most recently committed branch");
            ResolvedBranch {
                name: branch.name,
                source: BranchSource::MostRecentCommit,
            }
        }
        None => {
            info!(repo = %repo, fallback, "[BRANCH] No branches found, using fallback");
            fallback_branch(fallback)
        }
    }
}

fn fallback_branch(name: &str) -> ResolvedBranch {
    ResolvedBranch {
        name: name.to_string(),
        source: BranchSource::Fallback,
    }
}

/// Committer date, else author date. Missing or unparsable dates sort last.
pub fn commit_timestamp(dates: &CommitDates) -> DateTime<Utc> {
    [dates.committer_date.as_deref(), dates.author_date.as_deref()]
        .into_iter()
        .flatten()
        .find_map(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|date| date.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
