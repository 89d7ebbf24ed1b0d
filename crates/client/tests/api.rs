//! Round trips against a mock Disk backend.
//!
//! The mock server runs on an explicitly created tokio runtime so the
//! blocking client under test stays blocking.

use std::io::Cursor;
use std::time::Duration;

use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};
use yandisk_client::{DiskError, DiskPath, OperationStatus, Watchable, YanDisk};

const TOKEN: &str = "test-token";

fn server(rt: &Runtime) -> MockServer {
    rt.block_on(MockServer::start())
}

fn disk(server: &MockServer) -> YanDisk {
    YanDisk::new(TOKEN)
        .with_base_url(&format!("{}/v1/disk/resources", server.uri()))
        .unwrap()
}

fn mount(rt: &Runtime, server: &MockServer, mock: Mock) {
    rt.block_on(mock.mount(server));
}

fn file_json(name: &str, size: u64) -> serde_json::Value {
    json!({
        "type": "file",
        "name": name,
        "path": format!("disk:/{name}"),
        "created": "2024-03-01T12:00:00+00:00",
        "modified": "2024-03-02T08:30:00+00:00",
        "md5": "0cc175b9c0f1b6a831c399e269772661",
        "mime_type": "application/octet-stream",
        "size": size,
    })
}

fn dir_json(name: &str) -> serde_json::Value {
    json!({
        "type": "dir",
        "name": name,
        "path": format!("disk:/{name}"),
        "created": "2024-03-01T12:00:00+00:00",
        "modified": "2024-03-01T12:00:00+00:00",
    })
}

#[test]
fn list_all_sends_auth_and_parses_nodes() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/files"))
            .and(header("Authorization", format!("OAuth {TOKEN}").as_str()))
            .and(query_param("limit", "10"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [file_json("a.bin", 8), dir_json("music")],
            }))),
    );

    let nodes = disk(&server).list_all(10, 0).unwrap();
    assert_eq!(nodes.len(), 2);
    assert!(nodes[0].is_file());
    assert_eq!(nodes[0].name(), "a.bin");
    assert!(nodes[1].is_dir());
    assert_eq!(nodes[1].path().to_string(), "disk:/music");
}

#[test]
fn list_all_pages_joins_pages() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/files"))
            .and(query_param("offset", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [file_json("a.bin", 1), file_json("b.bin", 2)],
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/files"))
            .and(query_param("offset", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [file_json("c.bin", 3)],
            }))),
    );

    let pages = disk(&server).list_all_pages(2);
    let names: Vec<String> = pages
        .iter()
        .map(|node| node.unwrap().name().to_string())
        .collect();
    assert_eq!(names, ["a.bin", "b.bin", "c.bin"]);
}

#[test]
fn list_rejects_files() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources"))
            .and(query_param("path", "disk:/a.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(file_json("a.bin", 8))),
    );

    let root = DiskPath::parse("disk:/a.bin").unwrap();
    let err = disk(&server).list(&root, 20, 0).unwrap_err();
    assert!(matches!(err, DiskError::Operation(_)));
    assert!(err.to_string().contains("not a directory"));
}

#[test]
fn list_reads_embedded_items() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources"))
            .and(query_param("path", "disk:/music"))
            .and(query_param("sort", "path"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "dir",
                "_embedded": { "items": [file_json("song.mp3", 4096)] },
            }))),
    );

    let root = DiskPath::parse("disk:/music").unwrap();
    let nodes = disk(&server).list(&root, 20, 0).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0].name(), "song.mp3");
}

#[test]
fn download_relays_content() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    let payload: Vec<u8> = (0..20_000u32).map(|i| (i % 256) as u8).collect();

    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/download"))
            .and(query_param("path", "disk:/big.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/content/big.bin", server.uri()),
                "method": "GET",
                "templated": false,
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/content/big.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone())),
    );

    let dir = tempfile::TempDir::new().unwrap();
    let dest = dir.path().join("big.bin");

    let downloader = disk(&server)
        .download(&DiskPath::parse("disk:/big.bin").unwrap())
        .unwrap();
    let transfer = downloader.read_async_file(&dest).unwrap();
    transfer.wait_until_done();

    assert!(transfer.error().is_none());
    assert_eq!(transfer.total(), Some(payload.len() as u64));
    assert_eq!(transfer.transferred(), payload.len() as u64);
    assert_eq!(transfer.progress().unwrap(), 1.0);
    assert_eq!(std::fs::read(&dest).unwrap(), payload);
}

#[test]
fn synchronous_download_to_file() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/download"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/content/note.txt", server.uri()),
                "method": "GET",
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/content/note.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello disk".to_vec())),
    );

    let dir = tempfile::TempDir::new().unwrap();
    let dest = dir.path().join("note.txt");
    disk(&server)
        .download(&DiskPath::parse("disk:/note.txt").unwrap())
        .unwrap()
        .read_to_file(&dest)
        .unwrap();
    assert_eq!(std::fs::read(&dest).unwrap(), b"hello disk");
}

#[test]
fn upload_streams_the_body() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/upload"))
            .and(query_param("path", "disk:/up.bin"))
            .and(query_param("overwrite", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/up", server.uri()),
                "method": "PUT",
                "templated": false,
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("PUT"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(201)),
    );

    let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
    let uploader = disk(&server)
        .upload(&DiskPath::parse("disk:/up.bin").unwrap(), true)
        .unwrap();
    let transfer = uploader.write_async(Cursor::new(payload.clone()), Some(payload.len() as u64));
    transfer.wait_until_done();
    assert!(transfer.error().is_none(), "{:?}", transfer.error());
    assert_eq!(transfer.transferred(), payload.len() as u64);

    // The mock recorded the streamed body; it must match byte for byte.
    let requests = rt.block_on(server.received_requests()).unwrap();
    let put = requests
        .iter()
        .find(|request| request.url.path() == "/up")
        .expect("upload request recorded");
    assert_eq!(put.body, payload);
}

#[test]
fn upload_from_url_relays_between_endpoints() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    let payload = b"mirrored content".to_vec();

    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/up", server.uri()),
                "method": "PUT",
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/source/data.bin"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone())),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("PUT"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(201)),
    );

    let uploader = disk(&server)
        .upload(&DiskPath::parse("disk:/mirror.bin").unwrap(), false)
        .unwrap();
    let transfer = uploader
        .write_async_url(&format!("{}/source/data.bin", server.uri()))
        .unwrap();
    transfer.wait_until_done();

    assert!(transfer.error().is_none(), "{:?}", transfer.error());
    assert_eq!(transfer.total(), Some(payload.len() as u64));

    let requests = rt.block_on(server.received_requests()).unwrap();
    let put = requests
        .iter()
        .find(|request| request.url.path() == "/up")
        .expect("upload request recorded");
    assert_eq!(put.body, payload);
}

#[test]
fn upload_surfaces_limit_errors() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": format!("{}/up", server.uri()),
                "method": "PUT",
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("PUT"))
            .and(path("/up"))
            .respond_with(ResponseTemplate::new(507)),
    );

    let uploader = disk(&server)
        .upload(&DiskPath::parse("disk:/up.bin").unwrap(), false)
        .unwrap();
    let err = uploader.write(Cursor::new(b"data".to_vec())).unwrap_err();
    assert!(matches!(err, DiskError::Limit(_)));
    assert!(err.to_string().contains("507"));
}

#[test]
fn copy_accepted_polls_to_success() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("POST"))
            .and(path("/v1/disk/resources/copy"))
            .and(query_param("from", "disk:/a"))
            .and(query_param("path", "disk:/b"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "href": format!("{}/operations/op-1", server.uri()),
                "method": "GET",
            }))),
    );
    // Two pending polls, then success.
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "in-progress"})),
            )
            .up_to_n_times(2),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/operations/op-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"}))),
    );

    let from = DiskPath::parse("disk:/a").unwrap();
    let to = DiskPath::parse("disk:/b").unwrap();
    let operation = disk(&server).copy(&from, &to, false).unwrap();
    operation.set_refresh_interval(Duration::from_millis(10));

    operation.wait_until_done();
    assert_eq!(operation.status().unwrap(), OperationStatus::Success);
}

#[test]
fn move_completed_synchronously() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("POST"))
            .and(path("/v1/disk/resources/move"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "href": "ignored", "method": "GET",
            }))),
    );

    let from = DiskPath::parse("disk:/a").unwrap();
    let to = DiskPath::parse("disk:/b").unwrap();
    let operation = disk(&server).move_node(&from, &to, true).unwrap();
    // Synchronous completion: terminal handle, nothing to poll.
    assert_eq!(operation.status().unwrap(), OperationStatus::Success);
    assert_eq!(operation.refresh_interval(), None);
    operation.wait_until_done();
}

#[test]
fn delete_with_bogus_status_keeps_failing() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("DELETE"))
            .and(path("/v1/disk/resources"))
            .and(query_param("path", "disk:/old"))
            .and(query_param("permanently", "true"))
            .respond_with(ResponseTemplate::new(202).set_body_json(json!({
                "href": format!("{}/operations/op-2", server.uri()),
                "method": "GET",
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/operations/op-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "bogus"}))),
    );

    let operation = disk(&server)
        .delete(&DiskPath::parse("disk:/old").unwrap(), true)
        .unwrap();
    operation.set_refresh_interval(Duration::from_millis(10));
    operation.wait_until_done();

    for _ in 0..2 {
        let err = operation.status().unwrap_err();
        assert!(matches!(*err, DiskError::Operation(_)));
        assert!(err.to_string().contains("bogus"));
    }
}

#[test]
fn mkdir_lazy_tolerates_existing_directories() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("PUT"))
            .and(path("/v1/disk/resources"))
            .and(query_param("path", "disk:/existing"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": "DiskPathPointsToExistentDirectoryError",
                "description": "Specified folder already exists.",
            }))),
    );
    mount(
        &rt,
        &server,
        Mock::given(method("PUT"))
            .and(path("/v1/disk/resources"))
            .and(query_param("path", "disk:/fresh"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "href": "ignored", "method": "GET",
            }))),
    );

    let client = disk(&server);
    let existing = DiskPath::parse("disk:/existing").unwrap();
    let fresh = DiskPath::parse("disk:/fresh").unwrap();

    assert!(client.mkdir(&fresh, false).unwrap());
    assert!(!client.mkdir(&existing, true).unwrap());

    let err = client.mkdir(&existing, false).unwrap_err();
    assert!(matches!(err, DiskError::Api { .. }));
}

#[test]
fn gateway_errors_are_mapped() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources/files"))
            .respond_with(ResponseTemplate::new(502)),
    );

    let err = disk(&server).list_all(20, 0).unwrap_err();
    assert!(matches!(err, DiskError::Gateway(502)));
}

#[test]
fn api_errors_are_mapped() {
    let rt = Runtime::new().unwrap();
    let server = server(&rt);
    mount(
        &rt,
        &server,
        Mock::given(method("GET"))
            .and(path("/v1/disk/resources"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "DiskNotFoundError",
                "description": "Resource not found.",
            }))),
    );

    let root = DiskPath::parse("disk:/missing").unwrap();
    let err = disk(&server).list(&root, 20, 0).unwrap_err();
    let DiskError::Api { code, description } = err else {
        panic!("expected an API error, got {err:?}");
    };
    assert_eq!(code, "DiskNotFoundError");
    assert_eq!(description, "Resource not found.");
}
