use httpmock::prelude::*;
use repo_pulse::core::query_client::QueryEvent;
use repo_pulse::{
    CounterService, CounterSync, Dashboard, HttpRepoSource, MutationStub, PreviewRepoSource,
    QueryClient, RepoRecord, COUNTER_KEY, REPO_DATA_KEY,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const TICK: Duration = Duration::from_millis(3000);

fn preview_record() -> RepoRecord {
    RepoRecord {
        name: "react-query".to_string(),
        description: "d".to_string(),
        subscriber_count: "1".to_string(),
        star_count: "2".to_string(),
        fork_count: "3".to_string(),
    }
}

fn preview_dashboard(sync: CounterSync) -> Dashboard {
    Dashboard::new(
        Arc::new(CounterService::new(TICK)),
        QueryClient::new(),
        Arc::new(PreviewRepoSource::new(preview_record())),
        Arc::new(MutationStub::new(Duration::from_millis(1000))),
        sync,
    )
}

fn http_dashboard(endpoint: String) -> Dashboard {
    Dashboard::new(
        // 計時器不會在測試期間觸發
        Arc::new(CounterService::new(Duration::from_secs(3600))),
        QueryClient::new(),
        Arc::new(HttpRepoSource::new(endpoint).unwrap()),
        Arc::new(MutationStub::new(Duration::from_millis(10))),
        CounterSync::Invalidate,
    )
}

/// 等到某個 key 出現指定事件
async fn wait_for_event(
    events: &mut broadcast::Receiver<QueryEvent>,
    predicate: impl Fn(&QueryEvent) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let event = events.recv().await.unwrap();
            if predicate(&event) {
                return;
            }
        }
    })
    .await
    .expect("timed out waiting for cache event");
}

fn succeeded(key: &'static str) -> impl Fn(&QueryEvent) -> bool {
    move |event| matches!(event, QueryEvent::FetchSucceeded { key: k } if k == key)
}

#[tokio::test]
async fn test_dashboard_renders_repo_from_http() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/repos/tannerlinsley/react-query");
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

    let dashboard = http_dashboard(server.url("/repos/tannerlinsley/react-query"));
    let mut events = dashboard.subscribe();
    assert_eq!(dashboard.snapshot().to_string(), "Loading...");

    dashboard.start();
    wait_for_event(&mut events, succeeded(REPO_DATA_KEY)).await;
    if dashboard.counter().is_none() {
        wait_for_event(&mut events, succeeded(COUNTER_KEY)).await;
    }

    api_mock.assert();
    assert_eq!(
        dashboard.snapshot().to_string(),
        "react-query | Counter: 1 | d | 👀 1 ✨ 2 🍴 3"
    );

    let repo = dashboard.repo_data();
    assert!(!repo.is_pending);
    assert!(!repo.is_fetching);
    assert!(repo.error.is_none());

    dashboard.shutdown();
}

#[tokio::test]
async fn test_mutation_refreshes_repo_data() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/repo");
        then.status(200).json_body(serde_json::json!({
            "name": "react-query",
            "description": "d",
            "subscribers_count": "1",
            "stargazers_count": "2",
            "forks_count": "3"
        }));
    });

    let dashboard = http_dashboard(server.url("/repo"));
    let mut events = dashboard.subscribe();
    dashboard.start();
    wait_for_event(&mut events, succeeded(REPO_DATA_KEY)).await;

    dashboard.mutate_repo().await.unwrap();
    wait_for_event(&mut events, succeeded(REPO_DATA_KEY)).await;

    api_mock.assert_hits(2);
    let mutation = dashboard
        .queries()
        .mutation_status(repo_pulse::app::dashboard::MUTATE_REPO_KEY)
        .unwrap();
    assert!(mutation.is_success());
    assert_eq!(
        dashboard
            .queries()
            .get_status(REPO_DATA_KEY)
            .unwrap()
            .fetch_count,
        2
    );

    dashboard.shutdown();
}

#[tokio::test]
async fn test_fetch_error_is_shown() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/repo");
        then.status(500);
    });

    let dashboard = http_dashboard(server.url("/repo"));
    let mut events = dashboard.subscribe();
    dashboard.start();
    wait_for_event(&mut events, |event| {
        matches!(event, QueryEvent::FetchFailed { key } if key == REPO_DATA_KEY)
    })
    .await;

    let repo = dashboard.repo_data();
    assert!(repo.data.is_none());
    assert!(repo.error.as_ref().unwrap().is_network_error());
    assert!(dashboard
        .snapshot()
        .to_string()
        .starts_with("An error has occurred: Upstream returned HTTP 500"));

    dashboard.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_ticks_invalidate_counter_query() {
    let dashboard = preview_dashboard(CounterSync::Invalidate);
    dashboard.start();

    tokio::time::sleep(TICK / 2).await;
    assert_eq!(dashboard.counter(), Some(1));

    for expected in 2..=6 {
        tokio::time::sleep(TICK).await;
        assert_eq!(dashboard.counter(), Some(expected));
    }

    let state = dashboard.queries().get_status(COUNTER_KEY).unwrap();
    // 掛載一次 + 每個 tick 一次
    assert_eq!(state.fetch_count, 6);
    assert!(!state.is_stale());
    dashboard.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_ticks_push_counter_value() {
    let dashboard = preview_dashboard(CounterSync::Push);
    dashboard.start();

    tokio::time::sleep(TICK * 5 + TICK / 2).await;
    assert_eq!(dashboard.counter(), Some(6));

    // 推送模式不會重新呼叫查詢函式
    let state = dashboard.queries().get_status(COUNTER_KEY).unwrap();
    assert_eq!(state.fetch_count, 1);
    dashboard.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_counter() {
    let dashboard = preview_dashboard(CounterSync::Invalidate);
    dashboard.start();

    tokio::time::sleep(TICK * 2 + TICK / 2).await;
    assert_eq!(dashboard.counter(), Some(3));

    dashboard.shutdown();
    assert!(!dashboard.counter_service().is_running());

    tokio::time::sleep(TICK * 3).await;
    assert_eq!(dashboard.counter_service().get_value(), 3);
    assert_eq!(dashboard.counter(), Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_dashboard_releases_counter() {
    let queries = QueryClient::new();
    let mut events = queries.subscribe();

    let dashboard = Dashboard::new(
        Arc::new(CounterService::new(TICK)),
        queries.clone(),
        Arc::new(PreviewRepoSource::new(preview_record())),
        Arc::new(MutationStub::new(Duration::from_millis(1000))),
        CounterSync::Invalidate,
    );
    let counter = Arc::downgrade(dashboard.counter_service());
    dashboard.start();

    tokio::time::sleep(TICK + TICK / 2).await;
    assert_eq!(dashboard.counter(), Some(2));

    // 不呼叫 shutdown，直接丟掉
    drop(dashboard);
    assert!(counter.upgrade().is_none());
    while events.try_recv().is_ok() {}

    tokio::time::sleep(TICK * 3).await;
    let mut invalidations = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, QueryEvent::Invalidated { .. }) {
            invalidations += 1;
        }
    }
    assert_eq!(invalidations, 0);

    // 計數器已釋放，查詢回報錯誤但保留最後的值
    let err = queries.fetch_query(COUNTER_KEY).await.unwrap_err();
    assert!(matches!(
        err.root(),
        repo_pulse::PulseError::CounterReleasedError { .. }
    ));
    let state = queries.get_status(COUNTER_KEY).unwrap();
    assert_eq!(state.data_as::<u64>().unwrap(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn test_mutation_alongside_ticks() {
    let dashboard = preview_dashboard(CounterSync::Invalidate);
    dashboard.start();

    tokio::time::sleep(TICK - Duration::from_millis(500)).await;
    dashboard.mutate_repo().await.unwrap();

    // 寫入期間剛好跨過一次 tick
    assert_eq!(dashboard.counter_service().get_value(), 2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(dashboard.counter(), Some(2));

    let repo = dashboard.queries().get_status(REPO_DATA_KEY).unwrap();
    assert_eq!(repo.fetch_count, 2);
    dashboard.shutdown();
}

#[tokio::test]
async fn test_offline_config_builds_preview_dashboard() {
    let config = repo_pulse::TomlConfig::from_toml_str(
        "[source]\noffline = true\n\n[counter]\nsync = \"push\"\n",
    )
    .unwrap();

    let dashboard = Dashboard::from_config(&config).unwrap();
    assert_eq!(dashboard.counter_sync(), CounterSync::Push);

    let mut events = dashboard.subscribe();
    dashboard.mount();
    wait_for_event(&mut events, succeeded(REPO_DATA_KEY)).await;

    assert_eq!(dashboard.repo_data().data.unwrap().name, "react-query");
}
