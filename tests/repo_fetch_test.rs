use httpmock::prelude::*;
use repo_pulse::core::RepoSource;
use repo_pulse::{HttpRepoSource, PulseError, RepoRecord};
use std::time::Duration;

#[tokio::test]
async fn test_fetch_repo_data_from_stubbed_endpoint() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/repos/tannerlinsley/react-query")
            .header("accept", "application/vnd.github+json");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({
                "name": "react-query",
                "description": "d",
                "subscribers_count": "1",
                "stargazers_count": "2",
                "forks_count": "3"
            }));
    });

    let source = HttpRepoSource::new(server.url("/repos/tannerlinsley/react-query")).unwrap();
    let record = source.fetch_repo_data().await.unwrap();

    api_mock.assert();
    assert_eq!(record.name, "react-query");
    assert_eq!(record.description, "d");
    assert_eq!(record.subscriber_count, "1");
    assert_eq!(record.star_count, "2");
    assert_eq!(record.fork_count, "3");
}

#[tokio::test]
async fn test_each_call_hits_the_endpoint() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/repo");
        then.status(200).json_body(serde_json::json!({
            "name": "query",
            "description": "numbers from the live API",
            "subscribers_count": 216,
            "stargazers_count": 42000,
            "forks_count": 2900
        }));
    });

    let source = HttpRepoSource::new(server.url("/repo")).unwrap();
    let first: RepoRecord = source.fetch_repo_data().await.unwrap();
    let second: RepoRecord = source.fetch_repo_data().await.unwrap();

    api_mock.assert_hits(2);
    assert_eq!(first, second);
    assert_eq!(first.star_count, "42000");
}

#[tokio::test]
async fn test_transport_failure_is_network_error() {
    // 沒有服務在這個埠上
    let source = HttpRepoSource::new("http://127.0.0.1:1/repo").unwrap();

    let result = tokio::time::timeout(Duration::from_secs(10), source.fetch_repo_data())
        .await
        .expect("fetch should fail instead of hanging");

    let err = result.unwrap_err();
    assert!(matches!(err, PulseError::NetworkError(_)));
    assert!(err.is_network_error());
}

#[tokio::test]
async fn test_request_timeout_is_network_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/slow");
        then.status(200)
            .delay(Duration::from_secs(3))
            .json_body(serde_json::json!({}));
    });

    let source =
        HttpRepoSource::with_timeout(server.url("/slow"), Some(Duration::from_millis(200))).unwrap();
    let err = source.fetch_repo_data().await.unwrap_err();

    match err {
        PulseError::NetworkError(e) => assert!(e.is_timeout()),
        other => panic!("expected a network error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_not_found_is_http_status_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repos/nobody/nothing");
        then.status(404)
            .json_body(serde_json::json!({"message": "Not Found"}));
    });

    let source = HttpRepoSource::new(server.url("/repos/nobody/nothing")).unwrap();
    let err = source.fetch_repo_data().await.unwrap_err();

    assert!(matches!(err, PulseError::HttpStatusError { status: 404, .. }));
}

#[tokio::test]
async fn test_non_json_body_is_decode_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repo");
        then.status(200).body("<html>rate limited</html>");
    });

    let source = HttpRepoSource::new(server.url("/repo")).unwrap();
    let err = source.fetch_repo_data().await.unwrap_err();

    assert!(matches!(err, PulseError::DecodeError(_)));
}
