use std::sync::Arc;

use segsync::test_support::{CopyDeltaApplier, RecordingSink};
use segsync::{
    AncillaryFiles, CancelFlag, ContentHasher, LocalLayout, Md5Hasher, MinSizeVerifier,
    ProgressChannel, ProgressEvent, RemoteLayout, SegmentPercent, SyncOutcome,
};
use segsync_engine::{BatchOrchestrator, SegmentSynchronizer};
use segsync_http::{DownloaderConfig, HttpFetcher};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Setup {
    _dir: tempfile::TempDir,
    local: LocalLayout,
    sink: Arc<RecordingSink>,
    orchestrator: BatchOrchestrator,
}

fn setup(server: &MockServer) -> Setup {
    let dir = tempfile::tempdir().unwrap();
    let local = LocalLayout::new(dir.path());
    let sink = Arc::new(RecordingSink::default());
    let channel = ProgressChannel::new(sink.clone(), Arc::new(CancelFlag::new()));

    let fetcher = HttpFetcher::new(DownloaderConfig::default(), channel.clone()).unwrap();
    let remote = RemoteLayout {
        lookup_url: format!("{}/profiles2", server.uri()),
        profiles_url: format!("{}/profiles2/", server.uri()),
        segment_url: format!("{}/segments4/", server.uri()),
    };
    let synchronizer = SegmentSynchronizer::new(
        Arc::new(fetcher),
        Arc::new(MinSizeVerifier::default()),
        local.clone(),
        remote,
        channel,
    )
    .with_delta_applier(Arc::new(CopyDeltaApplier));

    Setup {
        _dir: dir,
        local,
        sink,
        orchestrator: BatchOrchestrator::new(synchronizer),
    }
}

async fn get(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn delta_update_over_http() {
    let server = MockServer::start().await;
    let s = setup(&server);

    let live = s.local.segment("E5_N45").live;
    std::fs::create_dir_all(s.local.segments_dir()).unwrap();
    std::fs::write(&live, b"segment version 1").unwrap();
    let hash = Md5Hasher.hash_file(&live).unwrap();
    let delta_route = format!("/segments4/diff/E5_N45/{hash}.df5");

    Mock::given(method("HEAD"))
        .and(path(delta_route.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    get(&server, &delta_route, b"segment version 2").await;
    get(&server, "/profiles2/lookups.dat", b"lookups").await;

    let files = AncillaryFiles {
        lookups: vec!["lookups.dat".into()],
        profiles: Vec::new(),
    };
    let report = s
        .orchestrator
        .run(&files, &["E5_N45".to_owned()])
        .await
        .unwrap();

    assert_eq!(
        report.segments,
        vec![("E5_N45".to_owned(), SyncOutcome::UpdatedViaDelta)]
    );
    assert_eq!(std::fs::read(&live).unwrap(), b"segment version 2");
    assert_eq!(
        std::fs::read(s.local.ancillary_path("lookups.dat")).unwrap(),
        b"lookups"
    );
    assert!(!s.local.segment("E5_N45").delta.exists());
}

#[tokio::test]
async fn full_download_over_http_when_probe_misses() {
    let server = MockServer::start().await;
    let s = setup(&server);

    let live = s.local.segment("W5_N50").live;
    std::fs::create_dir_all(s.local.segments_dir()).unwrap();
    std::fs::write(&live, b"ancient").unwrap();

    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    get(&server, "/segments4/W5_N50.rd5", b"fresh segment").await;

    let report = s
        .orchestrator
        .run(&AncillaryFiles::default(), &["W5_N50.rd5".to_owned()])
        .await
        .unwrap();

    assert_eq!(
        report.segments,
        vec![("W5_N50.rd5".to_owned(), SyncOutcome::UpdatedViaFullDownload)]
    );
    assert_eq!(std::fs::read(&live).unwrap(), b"fresh segment");

    let events = s.sink.events();
    assert!(events.contains(&ProgressEvent::Percent(SegmentPercent {
        name: Some("W5_N50.rd5".into()),
        percent: Some(100),
    })));
    assert!(s.sink.statuses().contains(&"Connecting...".to_owned()));
}

#[tokio::test]
async fn server_error_fails_batch_and_keeps_live_file() {
    let server = MockServer::start().await;
    let s = setup(&server);

    Mock::given(method("GET"))
        .and(path("/segments4/E5_N45.rd5"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    get(&server, "/segments4/E10_N45.rd5", b"never fetched").await;

    let err = s
        .orchestrator
        .run(
            &AncillaryFiles::default(),
            &["E5_N45".to_owned(), "E10_N45".to_owned()],
        )
        .await
        .unwrap_err();

    assert_eq!(err.item(), "E5_N45");
    assert!(err.to_string().contains("status 503"));
    assert!(!s.local.segment("E10_N45").live.exists());
    assert!(!s.local.segment("E5_N45").temp.exists());
}
