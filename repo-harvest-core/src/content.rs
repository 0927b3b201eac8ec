use base64::engine::general_purpose::STANDARD as B64_STD;
use base64::Engine as _;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::contract::{HostError, RepositoryRef, SourceHost, TreeEntry};

/// Decoded text of one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub path: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("content is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Decode a contents-API payload. The API wraps base64 at 60 columns, so
/// whitespace is dropped before decoding.
pub fn decode_payload(payload: &str) -> Result<String, FetchError> {
    let compact: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = B64_STD.decode(compact.as_bytes())?;
    Ok(String::from_utf8(bytes)?)
}

pub async fn fetch_file<H>(
    host: &H,
    repo: &RepositoryRef,
    branch: &str,
    path: &str,
) -> Result<FileContent, FetchError>
where
    H: SourceHost + ?Sized,
{
    let payload = host.file_content(repo, path, branch).await?;
    let text = decode_payload(&payload)?;
    Ok(FileContent {
        path: path.to_string(),
        text,
    })
}

/// Files that were fetched, and whether the batch ran to the end.
#[derive(Debug, Default)]
pub struct FetchedFiles {
    pub files: Vec<FileContent>,
    pub failed: usize,
    pub cancelled: bool,
}

/// Fetch `entries` in order. A file that cannot be fetched or decoded is
/// logged and left out; the rest are still fetched. Cancellation, seen either
/// on the token or as a refused request, ends the batch.
pub async fn fetch_files<H>(
    host: &H,
    repo: &RepositoryRef,
    branch: &str,
    entries: &[TreeEntry],
    cancel: &CancellationToken,
) -> FetchedFiles
where
    H: SourceHost + ?Sized,
{
    let mut fetched = FetchedFiles::default();
    for entry in entries {
        if cancel.is_cancelled() {
            warn!(repo = %repo, remaining = entries.len() - fetched.files.len() - fetched.failed, "[CONTENT] Cancelled before all files were fetched");
            fetched.cancelled = true;
            break;
        }
        match fetch_file(host, repo, branch, &entry.path).await {
            Ok(file) => {
                debug!(repo = %repo, path = %file.path, bytes = file.text.len(), "[CONTENT] Fetched file");
                fetched.files.push(file);
            }
            Err(FetchError::Host(HostError::Cancelled)) => {
                warn!(repo = %repo, path = %entry.path, "[CONTENT] Cancelled while fetching");
                fetched.cancelled = true;
                break;
            }
            Err(e) => {
                warn!(repo = %repo, path = %entry.path, error = %e, "[CONTENT] Skipping file");
                fetched.failed += 1;
            }
        }
    }
    fetched
}
