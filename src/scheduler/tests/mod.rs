use super::*;
use crate::archive::ArchiveClient;
use crate::playlist::{FetchState, PlaylistFetcher, YouTubeClient};
use crate::queue::QueueClient;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn cron_dispatcher(server: &MockServer, presets: &[(&str, &str)]) -> Arc<CronDispatcher> {
    let http = reqwest::Client::new();
    let dispatcher = Arc::new(Dispatcher::new(2, 4));
    let roster = Arc::new(RosterCache::new(
        http.clone(),
        format!("{}/roster", server.uri()),
        Duration::from_secs(300),
    ));
    let playlists = PlaylistFetcher::new(
        Arc::new(YouTubeClient::new(http.clone(), server.uri(), "key")),
        Arc::new(FetchState::new()),
        Duration::from_secs(72 * 60 * 60),
    );
    let reconciler = Arc::new(Reconciler::new(
        playlists,
        ArchiveClient::new(http.clone(), server.uri()),
        QueueClient::new(http, format!("{}/queue", server.uri())),
        dispatcher.items().clone(),
    ));
    let presets = presets
        .iter()
        .map(|(name, expr)| (name.to_string(), expr.to_string()))
        .collect();

    Arc::new(CronDispatcher::new(roster, reconciler, dispatcher, presets))
}

async fn mount_roster(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/roster"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_channel(server: &MockServer, channel_id: &str, published: &[&str]) {
    let playlist_id = playlist_id_for(channel_id);
    let items: Vec<_> = published
        .iter()
        .map(|id| serde_json::json!({ "snippet": { "resourceId": { "videoId": id } } }))
        .collect();
    Mock::given(method("GET"))
        .and(path("/playlistItems"))
        .and(query_param("playlistId", playlist_id.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": items })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/search"))
        .and(query_param("channel_id", channel_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "hits": { "total": { "value": 0, "relation": "eq" }, "hits": [] }
        })))
        .mount(server)
        .await;
}

fn playlist_id_for(channel_id: &str) -> String {
    crate::reconcile::playlist_id_for(channel_id).unwrap()
}

async fn requests_to(server: &MockServer, wanted: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

#[test]
fn test_normalize_classic_expression() {
    assert_eq!(normalize_schedule("0 * * * *").unwrap(), "0 0 * * * *");
    assert_eq!(normalize_schedule("  */15   3 * * 1  ").unwrap(), "0 */15 3 * * 1");
}

#[test]
fn test_normalize_passes_through_seconds_and_descriptors() {
    assert_eq!(normalize_schedule("*/5 * * * * *").unwrap(), "*/5 * * * * *");
    assert_eq!(normalize_schedule("30  0 12 * * MON").unwrap(), "30 0 12 * * MON");
    assert_eq!(normalize_schedule("@daily").unwrap(), "@daily");
    assert_eq!(normalize_schedule(" @hourly ").unwrap(), "@hourly");
}

#[test]
fn test_normalize_rejects_empty_expression() {
    assert!(matches!(normalize_schedule("   "), Err(Error::Config { .. })));
}

#[tokio::test]
async fn test_firing_only_processes_matching_channels() {
    let server = MockServer::start().await;
    mount_roster(&server, "Agency\tGen 0\tUCdaily\tDaily Channel\tdaily\n").await;
    mount_channel(&server, "UCdaily", &["v1"]).await;
    Mock::given(method("PUT"))
        .and(path("/queue"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    let cron = cron_dispatcher(&server, &[("daily", "@daily"), ("hourly", "@hourly")]);
    let cancel = CancellationToken::new();

    let hourly = cron.run_preset(&cancel, "hourly").await.unwrap();
    assert_eq!(hourly.roster_size, 1);
    assert_eq!(hourly.matched, 0);
    assert_eq!(requests_to(&server, "/playlistItems").await, 0);

    let daily = cron.run_preset(&cancel, "daily").await.unwrap();
    assert_eq!(
        daily,
        FiringReport {
            preset: "daily".into(),
            roster_size: 1,
            matched: 1,
            succeeded: 1,
            failed: 0,
            cancelled: 0,
            enqueued: 1,
        }
    );
}

#[tokio::test]
async fn test_preset_match_ignores_case() {
    let server = MockServer::start().await;
    mount_roster(&server, "A\tB\tUCone\tOne\tDaily\n").await;
    mount_channel(&server, "UCone", &[]).await;
    let cron = cron_dispatcher(&server, &[("daily", "@daily")]);

    let report = cron
        .run_preset(&CancellationToken::new(), "daily")
        .await
        .unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.succeeded, 1);
}

#[tokio::test]
async fn test_failing_channel_does_not_stop_others() {
    let server = MockServer::start().await;
    mount_roster(
        &server,
        "A\tB\tnot-a-channel\tBroken\thourly\n\
         A\tB\tUCgood\tGood\thourly\n",
    )
    .await;
    mount_channel(&server, "UCgood", &["v1", "v2"]).await;
    Mock::given(method("PUT"))
        .and(path("/queue"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;
    let cron = cron_dispatcher(&server, &[("hourly", "@hourly")]);

    let report = cron
        .run_preset(&CancellationToken::new(), "hourly")
        .await
        .unwrap();

    assert_eq!(report.matched, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.enqueued, 2);
}

#[tokio::test]
async fn test_roster_failure_fails_the_firing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/roster"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let cron = cron_dispatcher(&server, &[("daily", "@daily")]);

    let err = cron
        .run_preset(&CancellationToken::new(), "daily")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Roster(_)));
    assert_eq!(requests_to(&server, "/playlistItems").await, 0);
}

#[tokio::test]
async fn test_fire_is_tracked_until_drained() {
    let server = MockServer::start().await;
    mount_roster(&server, "A\tB\tUCone\tOne\tdaily\n").await;
    mount_channel(&server, "UCone", &["v1"]).await;
    Mock::given(method("PUT"))
        .and(path("/queue"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .expect(1)
        .mount(&server)
        .await;
    let cron = cron_dispatcher(&server, &[("daily", "@daily")]);
    let cancel = CancellationToken::new();

    assert!(cron.fire(&cancel, "daily").is_some());
    assert_eq!(cron.dispatcher.in_flight(), 1);

    tokio::time::timeout(Duration::from_secs(5), cron.dispatcher.drain())
        .await
        .expect("drain should wait for the firing to finish");
    assert_eq!(requests_to(&server, "/queue").await, 1);
}

#[tokio::test]
async fn test_firing_after_cancel_fails_even_with_cached_roster() {
    let server = MockServer::start().await;
    mount_roster(&server, "A\tB\tUCone\tOne\tdaily\n").await;
    mount_channel(&server, "UCone", &["v1"]).await;
    Mock::given(method("PUT"))
        .and(path("/queue"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let cron = cron_dispatcher(&server, &[("daily", "@daily")]);
    let cancel = CancellationToken::new();

    // Fill the roster cache, then shut down
    assert_eq!(cron.roster.channels(&cancel).await.unwrap().len(), 1);
    cancel.cancel();

    let err = cron.run_preset(&cancel, "daily").await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(requests_to(&server, "/playlistItems").await, 0);
}

#[tokio::test]
async fn test_fire_after_cancel_is_ignored() {
    let server = MockServer::start().await;
    let cron = cron_dispatcher(&server, &[("daily", "@daily")]);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(cron.fire(&cancel, "daily").is_none());
    assert_eq!(cron.dispatcher.in_flight(), 0);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_rejects_invalid_expression() {
    let server = MockServer::start().await;
    let cron = cron_dispatcher(&server, &[("daily", "@daily"), ("broken", "not a cron")]);

    match cron.register(&CancellationToken::new()).await {
        Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("cron_presets.broken")),
        Err(other) => panic!("expected config error, got {other:?}"),
        Ok(_) => panic!("expected config error, got a scheduler"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_accepts_supported_dialect() {
    let server = MockServer::start().await;
    let cron = cron_dispatcher(
        &server,
        &[
            ("weekly", "@weekly"),
            ("sunday", "0 0 * * 7"),
            ("monday", "30 6 * * MON"),
            ("seconds", "15 */10 * * * *"),
        ],
    );

    let mut scheduler = cron.register(&CancellationToken::new()).await.unwrap();
    scheduler.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_register_rejects_year_field() {
    let server = MockServer::start().await;
    let cron = cron_dispatcher(&server, &[("yearly", "0 0 12 * * * 2030")]);

    let result = cron.register(&CancellationToken::new()).await;
    assert!(matches!(result, Err(Error::Config { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scheduled_job_fires_preset() {
    let server = MockServer::start().await;
    mount_roster(&server, "A\tB\tUCone\tOne\tfast\n").await;
    mount_channel(&server, "UCone", &[]).await;
    let cron = cron_dispatcher(&server, &[("fast", "* * * * * *")]);
    let cancel = CancellationToken::new();

    let mut scheduler = cron.register(&cancel).await.unwrap();
    scheduler.start().await.unwrap();

    let fired = tokio::time::timeout(Duration::from_secs(5), async {
        while requests_to(&server, "/playlistItems").await == 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
    .await;

    scheduler.shutdown().await.unwrap();
    cancel.cancel();
    cron.dispatcher.drain().await;

    assert!(fired.is_ok(), "the every-second job never ran the preset");
}
