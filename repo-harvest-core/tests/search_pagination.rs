use mockall::Sequence;
use repo_harvest_core::contract::{HostError, MockSourceHost, RepositoryRef};
use repo_harvest_core::search::fetch_repositories;
use tokio_util::sync::CancellationToken;

fn page_of(names: &[&str]) -> Vec<RepositoryRef> {
    names
        .iter()
        .map(|n| RepositoryRef::new("frc", n.to_string()))
        .collect()
}

#[tokio::test]
async fn failing_page_is_skipped_and_order_is_kept() {
    let mut host = MockSourceHost::new();
    let mut seq = Sequence::new();

    host.expect_search_repositories()
        .withf(|q, per_page, page| q == "crescendo in:name" && *per_page == 2 && *page == 1)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(page_of(&["one", "two"])));
    host.expect_search_repositories()
        .withf(|_, _, page| *page == 2)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| {
            Err(HostError::Status {
                url: "https://api.github.com/search/repositories".to_string(),
                status: 503,
            })
        });
    host.expect_search_repositories()
        .withf(|_, _, page| *page == 3)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Ok(page_of(&["three"])));

    let repos = fetch_repositories(&host, "crescendo in:name", 2, 3, &CancellationToken::new()).await;
    let keys: Vec<String> = repos.iter().map(RepositoryRef::key).collect();
    assert_eq!(keys, ["frc/one", "frc/two", "frc/three"]);
}

#[tokio::test]
async fn zero_pages_makes_no_requests() {
    let mut host = MockSourceHost::new();
    host.expect_search_repositories().never();

    let repos = fetch_repositories(&host, "anything", 50, 0, &CancellationToken::new()).await;
    assert!(repos.is_empty());
}

#[tokio::test]
async fn cancelled_token_stops_pagination() {
    let mut host = MockSourceHost::new();
    host.expect_search_repositories().never();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let repos = fetch_repositories(&host, "anything", 50, 5, &cancel).await;
    assert!(repos.is_empty());
}
