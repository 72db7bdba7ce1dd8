//! Integration tests for the download pass and manifest resume

use gleaner::collector::ResourceEvent;
use gleaner::config::DownloadConfig;
use gleaner::output::{OutputLayout, ResourceManifest};
use gleaner::{Downloader, HarvestState};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn downloader() -> Downloader {
    Downloader::new(&DownloadConfig::default()).unwrap()
}

fn state_with(media: &[String], images: &[String], titles: &[(&str, &str)]) -> HarvestState {
    let mut state = HarvestState::default();
    for url in media {
        state.record(ResourceEvent::Media(url.clone()));
    }
    for url in images {
        state.record(ResourceEvent::Image(url.clone()));
    }
    state.merge_titles(
        titles
            .iter()
            .map(|(id, title)| (id.to_string(), title.to_string())),
    );
    state
}

#[tokio::test]
async fn test_rerun_does_not_refetch() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/post/5/talk.m4a"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 128]))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let url = format!("{}/p/post/5/talk.m4a?token=abc", mock_server.uri());

    let mut first = state_with(&[url.clone()], &[], &[("5", "Talk: Part 1")]);
    let report = downloader()
        .download_partition(&mut first, &layout, "2022")
        .await
        .unwrap();
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.bytes, 128);

    let mut second = state_with(&[url], &[], &[("5", "Talk: Part 1")]);
    let report = downloader()
        .download_partition(&mut second, &layout, "2022")
        .await
        .unwrap();
    assert_eq!(report.downloaded, 0);
    assert_eq!(report.skipped, 1);

    let saved = layout.media_dir("2022").join("5 - Talk_ Part 1.m4a");
    assert_eq!(std::fs::read(saved).unwrap().len(), 128);
}

#[tokio::test]
async fn test_failed_fetch_leaves_nothing_and_continues() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/post/6/missing.mp3"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/p/post/7/present.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("audio"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let mut state = state_with(
        &[
            format!("{}/p/post/6/missing.mp3", mock_server.uri()),
            format!("{}/p/post/7/present.mp3", mock_server.uri()),
        ],
        &[],
        &[],
    );

    let report = downloader()
        .download_partition(&mut state, &layout, "all")
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.downloaded, 1);

    let media_dir = layout.media_dir("all");
    assert!(!media_dir.join("6.mp3").exists());
    assert!(!media_dir.join("6.mp3.part").exists());
    assert!(media_dir.join("7.mp3").exists());
}

#[tokio::test]
async fn test_resume_from_manifest() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/p/post/8/show.mp3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("show"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patreon-media/p/post/8/0123abcd99/cover.jpeg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("jpeg"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let layout = OutputLayout::new(dir.path());
    let state = state_with(
        &[format!("{}/p/post/8/show.mp3", mock_server.uri())],
        &[format!(
            "{}/patreon-media/p/post/8/0123abcd99/cover.jpeg",
            mock_server.uri()
        )],
        &[("8", "The Show")],
    );
    ResourceManifest::from_state("2021", &state)
        .write(&layout.manifest_path("2021"))
        .await
        .unwrap();

    let manifests = ResourceManifest::find_in(dir.path()).await.unwrap();
    assert_eq!(manifests, vec![layout.manifest_path("2021")]);

    let manifest = ResourceManifest::read(&manifests[0]).await.unwrap();
    let report = downloader()
        .download_manifest(&manifest, &layout)
        .await
        .unwrap();

    assert_eq!(report.downloaded, 2);
    assert!(layout.media_dir("2021").join("8 - The Show.mp3").exists());
    assert!(layout
        .image_dir("2021")
        .join("8_0123abcd - The Show.jpeg")
        .exists());
}
