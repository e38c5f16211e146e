use kbfetch_core::types::Settings;
use kbfetch_core::{FetchError, FileFetchWorker, WorkerPool};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn follows_permanent_redirect_to_final_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("Location", format!("{}/new", server.uri()).as_str())
                .set_body_string("moved"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200).set_body_string("final body"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let worker = FileFetchWorker::new(format!("{}/old", server.uri()), Some("page.html"), Some(dir.path()));
    let done = worker.start_download().await.unwrap();

    assert!(done.success);
    assert_eq!(done.path, dir.path().join("page.html"));
    assert_eq!(std::fs::read_to_string(&done.path).unwrap(), "final body");

    let requests = server.received_requests().await.unwrap();
    let paths: Vec<_> = requests.iter().map(|r| r.url.path().to_string()).collect();
    assert_eq!(paths, vec!["/old", "/new"]);
}

#[tokio::test]
async fn relative_location_resolves_against_current_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/a"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/b"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let done = FileFetchWorker::new(format!("{}/files/a", server.uri()), Some("b.bin"), Some(dir.path()))
        .run()
        .await;

    assert!(done.success);
    assert_eq!(std::fs::read(&done.path).unwrap(), vec![1u8, 2, 3]);
}

#[tokio::test]
async fn permanent_redirect_without_location_keeps_its_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(301).set_body_string("no forwarding address"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let done = FileFetchWorker::new(format!("{}/gone", server.uri()), Some("gone.txt"), Some(dir.path()))
        .run()
        .await;

    assert!(done.success);
    assert_eq!(std::fs::read_to_string(&done.path).unwrap(), "no forwarding address");
}

#[tokio::test]
async fn other_redirect_codes_are_not_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/temp"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/elsewhere", server.uri()).as_str())
                .set_body_string("found"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/elsewhere"))
        .respond_with(ResponseTemplate::new(200).set_body_string("should not be fetched"))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let done = FileFetchWorker::new(format!("{}/temp", server.uri()), Some("out"), Some(dir.path()))
        .run()
        .await;

    assert!(done.success);
    assert_eq!(std::fs::read_to_string(&done.path).unwrap(), "found");
}

#[tokio::test]
async fn redirect_loop_stops_at_hop_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let settings = Settings {
        max_redirects: 3,
        ..Settings::default()
    };
    let worker = FileFetchWorker::new(format!("{}/loop", server.uri()), Some("never"), Some(dir.path()))
        .with_settings(&settings);

    let err = worker.download().await.unwrap_err();
    assert!(matches!(err, FetchError::TooManyRedirects { limit: 3, .. }));
    assert!(!dir.path().join("never").exists());

    // initial request plus three followed hops
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn unwritable_target_reports_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does/not/exist");
    let worker = FileFetchWorker::new(format!("{}/file", server.uri()), Some("x"), Some(&missing));

    let done = worker.start_download().await.unwrap();
    assert!(!done.success);
    assert_eq!(done.path, missing.join("x"));
}

#[tokio::test]
async fn existing_file_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("new"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("f.txt"), "much longer old content").unwrap();

    let done = FileFetchWorker::new(server.uri(), Some("f.txt"), Some(dir.path()))
        .with_pool(WorkerPool::new("test", 1))
        .start_download()
        .await
        .unwrap();

    assert!(done.success);
    assert_eq!(std::fs::read_to_string(&done.path).unwrap(), "new");
}

#[tokio::test]
async fn invalid_url_fails_without_writing() {
    let dir = TempDir::new().unwrap();
    let done = FileFetchWorker::new("not a url", Some("x"), Some(dir.path())).run().await;

    assert!(!done.success);
    assert!(!dir.path().join("x").exists());
}
