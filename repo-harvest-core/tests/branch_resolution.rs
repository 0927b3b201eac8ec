use repo_harvest_core::branch::{resolve_branch, BranchSource, ResolvedBranch};
use repo_harvest_core::contract::{
    BranchInfo, CommitDates, HostError, MockSourceHost, RepositoryMetadata, RepositoryRef,
};

fn repo() -> RepositoryRef {
    RepositoryRef::new("frc6328", "RobotCode2024")
}

fn branch(name: &str, sha: &str) -> BranchInfo {
    BranchInfo {
        name: name.to_string(),
        head_sha: sha.to_string(),
    }
}

fn status_error(status: u16) -> HostError {
    HostError::Status {
        url: "https://api.github.com/repos/frc6328/RobotCode2024".to_string(),
        status,
    }
}

fn committed_at(date: &str) -> CommitDates {
    CommitDates {
        committer_date: Some(date.to_string()),
        author_date: None,
    }
}

#[tokio::test]
async fn declared_default_branch_wins_without_listing_branches() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata().times(1).returning(|_| {
        Ok(RepositoryMetadata {
            default_branch: Some("develop".to_string()),
        })
    });
    host.expect_list_branches().never();
    host.expect_commit_dates().never();

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(
        resolved,
        ResolvedBranch {
            name: "develop".to_string(),
            source: BranchSource::Default,
        }
    );
}

#[tokio::test]
async fn missing_default_picks_most_recently_committed_branch() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata()
        .returning(|_| Ok(RepositoryMetadata::default()));
    host.expect_list_branches()
        .returning(|_| Ok(vec![branch("A", "sha-a"), branch("B", "sha-b")]));
    host.expect_commit_dates()
        .times(2)
        .returning(|_, sha| match sha {
            "sha-a" => Ok(committed_at("2023-01-01T00:00:00Z")),
            "sha-b" => Ok(committed_at("2024-06-01T00:00:00Z")),
            other => panic!("unexpected sha {other}"),
        });

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(resolved.name, "B");
    assert_eq!(resolved.source, BranchSource::MostRecentCommit);
}

#[tokio::test]
async fn blank_default_branch_is_treated_as_missing() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata().returning(|_| {
        Ok(RepositoryMetadata {
            default_branch: Some("  ".to_string()),
        })
    });
    host.expect_list_branches()
        .returning(|_| Ok(vec![branch("only", "sha-1")]));
    host.expect_commit_dates()
        .returning(|_, _| Ok(committed_at("2024-01-01T00:00:00Z")));

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(resolved.name, "only");
}

#[tokio::test]
async fn metadata_failure_falls_through_to_branch_listing() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata()
        .returning(|_| Err(status_error(500)));
    host.expect_list_branches()
        .returning(|_| Ok(vec![branch("old", "sha-old"), branch("new", "sha-new")]));
    host.expect_commit_dates().returning(|_, sha| {
        if sha == "sha-new" {
            Ok(committed_at("2025-02-01T08:00:00+01:00"))
        } else {
            Ok(committed_at("2025-01-31T23:00:00Z"))
        }
    });

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(resolved.name, "new");
}

#[tokio::test]
async fn author_date_is_used_when_committer_date_is_absent() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata()
        .returning(|_| Ok(RepositoryMetadata::default()));
    host.expect_list_branches()
        .returning(|_| Ok(vec![branch("committer", "c"), branch("author", "a")]));
    host.expect_commit_dates().returning(|_, sha| {
        if sha == "c" {
            Ok(committed_at("2022-03-01T00:00:00Z"))
        } else {
            Ok(CommitDates {
                committer_date: None,
                author_date: Some("2023-03-01T00:00:00Z".to_string()),
            })
        }
    });

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(resolved.name, "author");
}

#[tokio::test]
async fn undated_and_unreachable_commits_sort_last() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata()
        .returning(|_| Ok(RepositoryMetadata::default()));
    host.expect_list_branches().returning(|_| {
        Ok(vec![
            branch("broken", "sha-broken"),
            branch("undated", "sha-undated"),
            branch("dated", "sha-dated"),
        ])
    });
    host.expect_commit_dates().returning(|_, sha| match sha {
        "sha-broken" => Err(status_error(404)),
        "sha-undated" => Ok(CommitDates::default()),
        _ => Ok(committed_at("2019-09-09T09:09:09Z")),
    });

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(resolved.name, "dated");
}

#[tokio::test]
async fn equal_dates_keep_first_listed_branch() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata()
        .returning(|_| Ok(RepositoryMetadata::default()));
    host.expect_list_branches()
        .returning(|_| Ok(vec![branch("first", "1"), branch("second", "2")]));
    host.expect_commit_dates()
        .returning(|_, _| Ok(committed_at("2024-01-15T12:00:00Z")));

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(resolved.name, "first");
}

#[tokio::test]
async fn metadata_and_listing_failures_end_in_fallback_name() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata()
        .returning(|_| Err(status_error(502)));
    host.expect_list_branches()
        .returning(|_| Err(status_error(502)));
    host.expect_commit_dates().never();

    let resolved = resolve_branch(&host, &repo(), "main").await;
    assert_eq!(
        resolved,
        ResolvedBranch {
            name: "main".to_string(),
            source: BranchSource::Fallback,
        }
    );
}

#[tokio::test]
async fn empty_branch_list_ends_in_configured_fallback() {
    let mut host = MockSourceHost::new();
    host.expect_repository_metadata()
        .returning(|_| Ok(RepositoryMetadata::default()));
    host.expect_list_branches().returning(|_| Ok(vec![]));

    let resolved = resolve_branch(&host, &repo(), "master").await;
    assert_eq!(resolved.name, "master");
    assert_eq!(resolved.source, BranchSource::Fallback);
}
