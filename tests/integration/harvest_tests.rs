//! Integration tests for full harvest runs
//!
//! These tests drive the harvester against the scripted feed engine and a
//! wiremock server standing in for the media host.

use gleaner::browser::testing::{ScriptedFeed, ScriptedItem, ScriptedThread};
use gleaner::collector::ObservedResponse;
use gleaner::config::Config;
use gleaner::output::{OutputLayout, ResourceManifest};
use gleaner::{GleanError, Harvester, WaitCondition};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE: &str = "https://www.patreon.com";

/// Creates a test configuration whose media host is the mock server
fn create_test_config(posts: usize) -> Config {
    let mut config = Config::for_creator("somecreator", posts);
    config.platform.user_content_host = "127.0.0.1".to_string();
    config.browser.poll_interval_ms = 1;
    config.browser.wait_timeout_secs = 5;
    config
}

fn post_api(id: &str, video: &str) -> ObservedResponse {
    ObservedResponse::with_body(
        format!("{}/api/posts/{}", BASE, id),
        format!(
            r#"{{"data":{{"attributes":{{"main_video_url":"{}"}}}}}}"#,
            video
        ),
    )
}

#[tokio::test]
async fn test_full_harvest_two_partitions() {
    let mock_server = MockServer::start().await;
    let media_host = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/p/post/10/ep.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 64]))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patreon-media/p/post/20/abcdef12/img.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![2u8; 32]))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/post/999/login.mp3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let year_2024 = vec![
        vec![
            ScriptedItem::new("10", "Episode Ten")
                .with_markup(r#"<iframe src="https://www.youtube.com/embed/ten"></iframe>"#)
                .on_render(ObservedResponse::new(format!("{}/p/post/10/ep.mp3", media_host)))
                .with_comment_pages(2),
            ScriptedItem::new("11", "Discussion")
                .with_thread(ScriptedThread::new("Nice").with_replies(&["same"]).phantom())
                .with_thread(ScriptedThread::new("Question").with_hidden_batch(&["answer"])),
        ],
        vec![
            ScriptedItem::new("12", "Twelve"),
            ScriptedItem::new("13", "Past the limit"),
        ],
    ];
    let year_2023 = vec![vec![ScriptedItem::new("20", "Cover Art")
        .on_render(ObservedResponse::new(format!(
            "{}/patreon-media/p/post/20/abcdef12/img.png",
            media_host
        )))
        .on_detail(post_api("20", "https://youtu.be/z"))]];

    let mut feed = ScriptedFeed::new(BASE, vec![vec![ScriptedItem::new("1", "Latest")]])
        .requiring_sign_in(2)
        .with_login_noise(ObservedResponse::new(format!(
            "{}/p/post/999/login.mp3",
            media_host
        )))
        .with_settle_polls(1)
        .with_partition("2024", "4", year_2024)
        .with_partition("2023", "3", year_2023);

    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path().join("run"));
    let (harvester, tap) = Harvester::new(create_test_config(3), CancellationToken::new()).unwrap();
    let mut harvester = harvester.with_layout(layout.clone());
    feed.attach(tap);

    let summary = harvester.run(&mut feed).await.unwrap();

    let labels: Vec<&str> = summary.partitions.iter().map(|p| p.label.as_str()).collect();
    assert_eq!(labels, vec!["2024", "2023"]);

    let first = &summary.partitions[0];
    assert_eq!(first.items_processed, 3);
    assert_eq!(first.threads_exhausted, 1);
    assert_eq!(first.download.unwrap().downloaded, 1);

    assert!(layout.snapshot_path("2024").exists());
    assert!(layout.snapshot_path("2023").exists());
    assert!(layout.media_dir("2024").join("10 - Episode Ten.mp3").exists());
    assert!(layout
        .image_dir("2023")
        .join("20_abcdef12 - Cover Art.png")
        .exists());

    let links_2024 = std::fs::read_to_string(layout.ledger_path("2024")).unwrap();
    let links_2023 = std::fs::read_to_string(layout.ledger_path("2023")).unwrap();
    assert_eq!(links_2024, "https://www.youtube.com/embed/ten\n");
    assert_eq!(links_2023, "https://youtu.be/z\n");

    for slug in ["2024", "2023"] {
        let manifest = ResourceManifest::read(&layout.manifest_path(slug))
            .await
            .unwrap();
        assert!(manifest.media.iter().all(|url| !url.contains("login")));
    }
    assert!(layout.summary_path().exists());
}

#[tokio::test]
async fn test_single_partition_when_not_split_by_year() {
    let mut config = create_test_config(10);
    config.harvest.partition_by_year = false;
    config.harvest.capture_detail_views = false;

    let mut feed = ScriptedFeed::new(
        BASE,
        vec![
            vec![ScriptedItem::new("1", "One"), ScriptedItem::new("2", "Two")],
            vec![ScriptedItem::new("3", "Three")],
        ],
    )
    .with_partition("2024", "4", vec![])
    .with_page_markup(
        r#"<script>{"main_video_url":"https:\/\/vimeo.com\/42","other":"https://example.com"}</script>"#,
    );

    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let (harvester, tap) = Harvester::new(config, CancellationToken::new()).unwrap();
    let mut harvester = harvester.with_layout(layout.clone());
    feed.attach(tap);

    let summary = harvester.run(&mut feed).await.unwrap();

    assert_eq!(summary.partitions.len(), 1);
    assert_eq!(summary.partitions[0].label, "all");
    assert_eq!(summary.partitions[0].items_processed, 3);
    assert_eq!(
        std::fs::read_to_string(layout.ledger_path("all")).unwrap(),
        "https://vimeo.com/42\n"
    );
    assert_eq!(harvester.session().state.title("3"), Some("Three"));
}

#[tokio::test]
async fn test_sign_in_wait_times_out() {
    let mut config = create_test_config(10);
    config.browser.wait_timeout_secs = 1;

    let mut feed = ScriptedFeed::new(BASE, vec![]).requiring_sign_in(usize::MAX);
    let dir = TempDir::new().unwrap();
    let (harvester, tap) = Harvester::new(config, CancellationToken::new()).unwrap();
    let mut harvester = harvester.with_layout(OutputLayout::new(dir.path()));
    feed.attach(tap);

    let err = harvester.run(&mut feed).await.unwrap_err();

    assert!(matches!(
        err,
        GleanError::Timeout {
            condition: WaitCondition::SignedIn,
            ..
        }
    ));
}

#[tokio::test]
async fn test_cancelled_run_stops_at_first_wait() {
    let cancel = CancellationToken::new();
    let mut feed = ScriptedFeed::new(BASE, vec![vec![ScriptedItem::new("1", "One")]])
        .requiring_sign_in(5);
    let dir = TempDir::new().unwrap();
    let (harvester, tap) = Harvester::new(create_test_config(10), cancel.clone()).unwrap();
    let mut harvester = harvester.with_layout(OutputLayout::new(dir.path()));
    feed.attach(tap);

    cancel.cancel();
    let err = harvester.run(&mut feed).await.unwrap_err();

    assert!(err.is_cancelled());
    assert!(!dir.path().join("all.snapshot").exists());
}
