//! # GitHub REST client
//!
//! Production [`SourceHost`] implementation on top of `reqwest`.
//!
//! - Construct with [`GitHubClient::new`] or [`GitHubClient::new_from_env`]
//!   (reads `GITHUB_TOKEN`; a missing token is an error, never an anonymous client).
//! - Every request carries the bearer token and GitHub's JSON media type.
//! - All workers share one [`RateBudget`]: a semaphore bounding requests in
//!   flight, and a pause that kicks in once `x-ratelimit-remaining` hits zero.
//! - [`GitHubClient::with_cancellation`] ties the client to a run: once the
//!   token fires, paused and new requests fail with `HostError::Cancelled`.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ApiConfig;
use crate::contract::{
    BranchInfo, CommitDates, EntryKind, HostError, RepositoryMetadata, RepositoryRef,
    SourceHost, Tree, TreeEntry,
};

pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

const BRANCHES_PER_PAGE: u32 = 100;
const MAX_BRANCH_PAGES: u32 = 10;

/// How long to pause given a response's rate-limit headers, or `None` while
/// requests remain. A missing or unparsable reset time means `max_wait`.
fn rate_limit_pause(headers: &HeaderMap, now_epoch: u64, max_wait: Duration) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };
    let remaining = header("x-ratelimit-remaining")?;
    debug!(remaining, "[GITHUB] Rate limit remaining");
    if remaining > 0 {
        return None;
    }
    let wait = header("x-ratelimit-reset")
        .map(|reset| Duration::from_secs(reset.saturating_sub(now_epoch)))
        .unwrap_or(max_wait);
    Some(wait.min(max_wait))
}

/// Request budget shared by every clone of a client.
#[derive(Debug)]
pub struct RateBudget {
    permits: Semaphore,
    blocked_until: Mutex<Option<Instant>>,
    max_wait: Duration,
}

impl RateBudget {
    pub fn new(max_in_flight: usize, max_wait: Duration) -> Self {
        Self {
            permits: Semaphore::new(max_in_flight.max(1)),
            blocked_until: Mutex::new(None),
            max_wait,
        }
    }

    /// Hold back until the rate limit resets. Returns `HostError::Cancelled`
    /// as soon as `cancel` fires, whether or not a pause is in effect.
    pub async fn wait_if_exhausted(&self, cancel: &CancellationToken) -> Result<(), HostError> {
        if cancel.is_cancelled() {
            return Err(HostError::Cancelled);
        }
        let until = *self.blocked_until.lock().await;
        let Some(until) = until.filter(|until| *until > Instant::now()) else {
            return Ok(());
        };
        info!(
            wait_secs = (until - Instant::now()).as_secs(),
            "[GITHUB] Rate limit exhausted, pausing until reset"
        );
        tokio::select! {
            _ = tokio::time::sleep_until(until) => Ok(()),
            _ = cancel.cancelled() => {
                warn!("[GITHUB] Cancelled while paused for rate limit");
                Err(HostError::Cancelled)
            }
        }
    }

    /// Record the rate-limit headers of a response.
    pub async fn observe(&self, headers: &HeaderMap) {
        let now_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        if let Some(wait) = rate_limit_pause(headers, now_epoch, self.max_wait) {
            warn!(wait_secs = wait.as_secs(), "[GITHUB] Rate limit reached");
            *self.blocked_until.lock().await = Some(Instant::now() + wait);
        }
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    base_url: Url,
    budget: Arc<RateBudget>,
    cancel: CancellationToken,
}

impl GitHubClient {
    pub fn new(token: &str, api: &ApiConfig) -> Result<Self, HostError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| HostError::Endpoint(format!("invalid token header: {e}")))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("repo-harvest/", env!("CARGO_PKG_VERSION"))),
        );

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| HostError::Transport {
                url: api.base_url.clone(),
                source: e,
            })?;
        let base_url = Url::parse(api.base_url.trim_end_matches('/'))
            .map_err(|e| HostError::Endpoint(format!("{}: {e}", api.base_url)))?;

        info!(base_url = %base_url, max_in_flight = api.max_in_flight, "Initialized GitHubClient");
        Ok(Self {
            http,
            base_url,
            budget: Arc::new(RateBudget::new(
                api.max_in_flight,
                Duration::from_secs(api.max_rate_limit_wait_secs),
            )),
            cancel: CancellationToken::new(),
        })
    }

    /// Stop issuing requests once `cancel` fires. Requests already sent are
    /// left to finish; any later one, or one paused for the rate limit,
    /// fails with [`HostError::Cancelled`].
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Build a client with the token from `GITHUB_TOKEN`.
    pub fn new_from_env(api: &ApiConfig) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        match std::env::var(TOKEN_ENV_VAR) {
            Ok(token) if !token.trim().is_empty() => Ok(Self::new(token.trim(), api)?),
            Ok(_) => {
                error!("{TOKEN_ENV_VAR} is set but empty");
                Err(format!("{TOKEN_ENV_VAR} is set but empty").into())
            }
            Err(e) => {
                error!(error = ?e, "{TOKEN_ENV_VAR} missing in environment");
                Err(format!("{TOKEN_ENV_VAR} environment variable not set: {e}").into())
            }
        }
    }

    /// Base URL joined with percent-encoded path segments.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, HostError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HostError::Endpoint(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn repo_endpoint<'a>(
        &self,
        repo: &'a RepositoryRef,
        rest: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, HostError> {
        self.endpoint(
            ["repos", repo.owner.as_str(), repo.name.as_str()]
                .into_iter()
                .chain(rest),
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, HostError> {
        self.budget.wait_if_exhausted(&self.cancel).await?;
        let _permit = self
            .budget
            .permits
            .acquire()
            .await
            .map_err(|e| HostError::Endpoint(format!("request budget closed: {e}")))?;

        debug!(url = %url, "[GITHUB] GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| HostError::Transport {
                url: url.to_string(),
                source: e,
            })?;
        self.budget.observe(response.headers()).await;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "[GITHUB] Non-success status");
            return Err(HostError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response.json::<T>().await.map_err(|e| HostError::Payload {
            url: url.to_string(),
            detail: e.to_string(),
        })
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Deserialize)]
struct SearchItem {
    name: String,
    owner: Owner,
}

#[derive(Deserialize)]
struct Owner {
    login: String,
}

#[derive(Deserialize)]
struct RepoResponse {
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Deserialize)]
struct BranchResponse {
    name: String,
    commit: CommitRef,
}

#[derive(Deserialize)]
struct CommitRef {
    sha: String,
}

#[derive(Deserialize)]
struct CommitResponse {
    commit: CommitDetail,
}

#[derive(Deserialize)]
struct CommitDetail {
    #[serde(default)]
    committer: Option<Signature>,
    #[serde(default)]
    author: Option<Signature>,
}

#[derive(Deserialize)]
struct Signature {
    #[serde(default)]
    date: Option<String>,
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct TreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[async_trait]
impl SourceHost for GitHubClient {
    async fn search_repositories(
        &self,
        query: &str,
        per_page: u32,
        page: u32,
    ) -> Result<Vec<RepositoryRef>, HostError> {
        let mut url = self.endpoint(["search", "repositories"])?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("per_page", &per_page.to_string())
            .append_pair("page", &page.to_string());
        let body: SearchResponse = self.get_json(url).await?;
        Ok(body
            .items
            .into_iter()
            .map(|item| RepositoryRef::new(item.owner.login, item.name))
            .collect())
    }

    async fn repository_metadata(
        &self,
        repo: &RepositoryRef,
    ) -> Result<RepositoryMetadata, HostError> {
        let url = self.repo_endpoint(repo, [])?;
        let body: RepoResponse = self.get_json(url).await?;
        Ok(RepositoryMetadata {
            default_branch: body.default_branch,
        })
    }

    async fn list_branches(&self, repo: &RepositoryRef) -> Result<Vec<BranchInfo>, HostError> {
        let mut branches = Vec::new();
        for page in 1..=MAX_BRANCH_PAGES {
            let mut url = self.repo_endpoint(repo, ["branches"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &BRANCHES_PER_PAGE.to_string())
                .append_pair("page", &page.to_string());
            let body: Vec<BranchResponse> = match self.get_json(url).await {
                Ok(body) => body,
                Err(e) if page > 1 => {
                    warn!(repo = %repo, page, kept = branches.len(), error = %e, "[GITHUB] Branch page failed, keeping branches listed so far");
                    break;
                }
                Err(e) => return Err(e),
            };
            let count = body.len();
            branches.extend(body.into_iter().map(|b| BranchInfo {
                name: b.name,
                head_sha: b.commit.sha,
            }));
            if count < BRANCHES_PER_PAGE as usize {
                break;
            }
        }
        Ok(branches)
    }

    async fn commit_dates(
        &self,
        repo: &RepositoryRef,
        sha: &str,
    ) -> Result<CommitDates, HostError> {
        let url = self.repo_endpoint(repo, ["commits", sha])?;
        let body: CommitResponse = self.get_json(url).await?;
        Ok(CommitDates {
            committer_date: body.commit.committer.and_then(|s| s.date),
            author_date: body.commit.author.and_then(|s| s.date),
        })
    }

    async fn tree(&self, repo: &RepositoryRef, branch: &str) -> Result<Tree, HostError> {
        let mut url = self.repo_endpoint(repo, ["git", "trees"].into_iter().chain(branch.split('/')))?;
        url.query_pairs_mut().append_pair("recursive", "1");
        let body: TreeResponse = self.get_json(url).await?;
        Ok(Tree {
            entries: body
                .tree
                .into_iter()
                .map(|item| TreeEntry {
                    kind: EntryKind::from(item.kind.as_str()),
                    path: item.path,
                })
                .collect(),
            truncated: body.truncated,
        })
    }

    async fn file_content(
        &self,
        repo: &RepositoryRef,
        path: &str,
        reference: &str,
    ) -> Result<String, HostError> {
        let mut url = self.repo_endpoint(repo, ["contents"].into_iter().chain(path.split('/')))?;
        url.query_pairs_mut().append_pair("ref", reference);
        let body: ContentResponse = self.get_json(url.clone()).await?;
        match (body.content, body.encoding.as_deref()) {
            (Some(content), None | Some("base64")) => Ok(content),
            (Some(_), Some(other)) => Err(HostError::Payload {
                url: url.to_string(),
                detail: format!("unsupported encoding {other}"),
            }),
            (None, _) => Err(HostError::Payload {
                url: url.to_string(),
                detail: "no content field".to_string(),
            }),
        }
    }
}
