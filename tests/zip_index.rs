mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use bia_catalog_tools::error::BiaError;
use bia_catalog_tools::http::HttpClient;
use bia_catalog_tools::zip_index::ZipIndexer;

use common::{Route, StubServer, build_raw_name_zip, build_zip, build_zip64_tail};

fn indexer() -> ZipIndexer {
    ZipIndexer::new(HttpClient::new(Duration::from_secs(5)).unwrap())
}

#[test]
fn falls_back_to_next_candidate_without_merging() {
    let first = build_zip(&[("ignored.tif", 10)]);
    let second = build_zip(&[("plate/a.tif", 100), ("plate/b.tif", 200), ("notes.txt", 7)]);
    let server = StubServer::start(vec![
        ("/no-ranges.zip", Route::Whole(first)),
        ("/ranged.zip", Route::Ranged(second)),
    ]);

    let indexer = indexer();
    let listed = indexer
        .list_members(&[server.url("/no-ranges.zip"), server.url("/ranged.zip")])
        .unwrap();
    let alone = indexer.list_members(&[server.url("/ranged.zip")]).unwrap();

    assert_eq!(listed, alone);
    let names: Vec<&str> = listed.iter().map(|m| m.filename.as_str()).collect();
    assert_eq!(names, vec!["plate/a.tif", "plate/b.tif", "notes.txt"]);
    assert_eq!(listed[1].size, 200);
}

#[test]
fn missing_candidate_then_success() {
    let archive = build_zip(&[("x.czi", 3)]);
    let server = StubServer::start(vec![("/x.zip", Route::Ranged(archive))]);

    let listed = indexer()
        .list_members(&[server.url("/gone.zip"), server.url("/x.zip")])
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].filename, "x.czi");
}

#[test]
fn all_candidates_failing_reports_every_cause() {
    let server = StubServer::start(vec![("/whole.zip", Route::Whole(build_zip(&[])))]);
    let err = indexer()
        .list_members(&[server.url("/gone.zip"), server.url("/whole.zip")])
        .unwrap_err();
    assert_matches!(err, BiaError::ZipUnavailable(ref msg) if msg.contains("gone.zip") && msg.contains("whole.zip"));
}

#[test]
fn no_candidates_is_unavailable() {
    let err = indexer().list_members::<&str>(&[]).unwrap_err();
    assert_matches!(err, BiaError::ZipUnavailable(_));
}

#[test]
fn local_and_remote_listings_agree() {
    let bytes = build_zip(&[("dir/", 0), ("dir/img.tif", 64), ("readme", 5)]);
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("archive.zip");
    std::fs::write(&path, &bytes).unwrap();
    let server = StubServer::start(vec![("/archive.zip", Route::Ranged(bytes))]);

    let local = ZipIndexer::list_members_local(&path).unwrap();
    let remote = indexer()
        .list_members(&[server.url("/archive.zip")])
        .unwrap();
    let via_path = indexer()
        .list_members(&[path.to_string_lossy().to_string()])
        .unwrap();

    assert_eq!(local, remote);
    assert_eq!(local, via_path);
}

#[test]
fn local_listing_of_missing_file_fails() {
    let temp = tempfile::tempdir().unwrap();
    let err = ZipIndexer::list_members_local(&temp.path().join("none.zip")).unwrap_err();
    assert_matches!(err, BiaError::ZipUnavailable(_));
}

#[test]
fn legacy_encoded_names_match_local_listing() {
    let bytes = build_raw_name_zip(b"c\x82fe.tif");
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("legacy.zip");
    std::fs::write(&path, &bytes).unwrap();
    let server = StubServer::start(vec![("/legacy.zip", Route::Ranged(bytes))]);

    let local = ZipIndexer::list_members_local(&path).unwrap();
    let remote = indexer()
        .list_members(&[server.url("/legacy.zip")])
        .unwrap();

    assert_eq!(local, remote);
    assert_eq!(remote[0].filename, "c\u{e9}fe.tif");
}

#[test]
fn corrupt_zip64_locator_falls_back_to_next_candidate() {
    let good = build_zip(&[("ok.tif", 8)]);
    let server = StubServer::start(vec![
        ("/bad.zip", Route::Ranged(build_zip64_tail(u64::MAX - 10))),
        ("/good.zip", Route::Ranged(good)),
    ]);

    let listed = indexer()
        .list_members(&[server.url("/bad.zip"), server.url("/good.zip")])
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].filename, "ok.tif");

    let err = indexer()
        .list_members(&[server.url("/bad.zip")])
        .unwrap_err();
    assert_matches!(err, BiaError::ZipUnavailable(_));
}
