/*!
 * Integration tests for the GitHub-backed cache store over HTTP
 */

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::json;
use std::io::{Cursor, Write};
use std::path::Path;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitelingo::cache::github::GitHubClient;
use sitelingo::cache::{CacheState, CacheStore, GitBranchCache};
use sitelingo::errors::CacheError;

use crate::common::create_temp_dir;

const BRANCH: &str = "translation-cache";
const REPO_PATH: &str = "/repos/acme/site";

fn branch_cache(server: &MockServer, mirror_dir: &Path) -> GitBranchCache {
    let api = GitHubClient::new(server.uri(), "acme", "site", "ghp_test");
    GitBranchCache::new(mirror_dir, api, BRANCH, "unused").with_ref_backoff(1)
}

fn snapshot_zip(files: &[(&str, &str)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        writer.add_directory("acme-site-1a2b3c4/", options).unwrap();
        for (name, content) in files {
            writer
                .start_file(format!("acme-site-1a2b3c4/{}", name), options)
                .unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }
    buf
}

fn ref_body(sha: &str) -> serde_json::Value {
    json!({ "ref": "refs/heads/x", "object": { "sha": sha, "type": "commit" } })
}

#[tokio::test]
async fn test_fetch_withMissingBranch_shouldCreateOrphanBranchAndBeCold() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/branches/{}", REPO_PATH, BRANCH)))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Branch not found" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/git/blobs", REPO_PATH)))
        .and(body_string_contains("Translation cache"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": "blob111" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/git/trees", REPO_PATH)))
        .and(body_string_contains("blob111"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": "tree222" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/git/commits", REPO_PATH)))
        .and(body_partial_json(json!({ "tree": "tree222", "parents": [] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "sha": "commit333" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/git/refs", REPO_PATH)))
        .and(body_partial_json(json!({ "ref": "refs/heads/translation-cache", "sha": "commit333" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(ref_body("commit333")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let mirror_dir = dir.path().join("mirror");
    std::fs::create_dir_all(mirror_dir.join("de/pages")).unwrap();
    std::fs::write(mirror_dir.join("de/pages/stale.html"), "old").unwrap();

    let cache = branch_cache(&server, &mirror_dir);
    assert_eq!(cache.fetch().await.unwrap(), CacheState::Cold);
    assert!(mirror_dir.is_dir());
    assert!(!mirror_dir.join("de").exists());
}

#[tokio::test]
async fn test_fetch_withExistingBranch_shouldExtractSnapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/branches/{}", REPO_PATH, BRANCH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "name": BRANCH })))
        .mount(&server)
        .await;
    let zip = snapshot_zip(&[
        ("README.md", "# Translation cache\n"),
        ("es/pages/index.html", "[0]Hola[/0]"),
        ("es/meta.json", r#"{ "prompt_hash": "p", "entries": {} }"#),
    ]);
    Mock::given(method("GET"))
        .and(path(format!("{}/zipball/{}", REPO_PATH, BRANCH)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(zip))
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let cache = branch_cache(&server, dir.path());

    assert_eq!(cache.fetch().await.unwrap(), CacheState::Warm);
    assert_eq!(cache.lookup("es", "index.html").unwrap().as_deref(), Some("[0]Hola[/0]"));
    assert_eq!(cache.load_meta("es", "p").unwrap().prompt_hash, "p");
    assert!(dir.path().join("README.md").is_file());
}

#[tokio::test]
async fn test_fetch_withApiFailure_shouldReturnHttpError() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/branches/{}", REPO_PATH, BRANCH)))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let result = branch_cache(&server, dir.path()).fetch().await;
    assert!(matches!(result, Err(CacheError::Http { status: 503, .. })));
}

#[tokio::test]
async fn test_putRemoteFile_withSameContent_shouldSkipUpload() {
    let server = MockServer::start().await;
    let content = "{\n  \"prompt_hash\": \"p\"\n}\n";
    // The contents API wraps base64 at 60 columns
    let encoded = BASE64
        .encode(content)
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).to_string())
        .collect::<Vec<_>>()
        .join("\n");
    Mock::given(method("GET"))
        .and(path(format!("{}/contents/es/meta.json", REPO_PATH)))
        .and(query_param("ref", BRANCH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sha": "s1", "content": encoded })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/contents/es/meta.json", REPO_PATH)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let uploaded = branch_cache(&server, dir.path())
        .put_remote_file("es/meta.json", content.as_bytes())
        .await
        .unwrap();
    assert!(!uploaded);
}

#[tokio::test]
async fn test_putRemoteFile_withChangedContent_shouldUploadWithSha() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/contents/es/meta.json", REPO_PATH)))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "sha": "s1", "content": BASE64.encode("old") })),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/contents/es/meta.json", REPO_PATH)))
        .and(body_partial_json(json!({
            "sha": "s1",
            "branch": BRANCH,
            "content": BASE64.encode("new"),
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": { "sha": "s2" } })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let uploaded = branch_cache(&server, dir.path())
        .put_remote_file("es/meta.json", b"new")
        .await
        .unwrap();
    assert!(uploaded);
}

#[tokio::test]
async fn test_putRemoteFile_withNewFile_shouldCreateIt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/contents/fr/meta.json", REPO_PATH)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/contents/fr/meta.json", REPO_PATH)))
        .and(body_partial_json(json!({ "branch": BRANCH })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "content": { "sha": "s9" } })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let uploaded = branch_cache(&server, dir.path())
        .put_remote_file("fr/meta.json", b"{}")
        .await
        .unwrap();
    assert!(uploaded);
}

#[tokio::test]
async fn test_replaceBranch_shouldMoveTargetAndDeleteSource() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/git/ref/heads/rebuild", REPO_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body("newhead1234")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/git/ref/heads/{}", REPO_PATH, BRANCH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body("oldhead5678")))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(format!("{}/git/refs/heads/{}", REPO_PATH, BRANCH)))
        .and(body_partial_json(json!({ "sha": "newhead1234", "force": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body("newhead1234")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("{}/git/refs/heads/rebuild", REPO_PATH)))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    branch_cache(&server, dir.path())
        .replace_branch("rebuild", BRANCH)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_replaceBranch_withMissingTarget_shouldCreateIt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/git/ref/heads/rebuild", REPO_PATH)))
        .respond_with(ResponseTemplate::new(200).set_body_json(ref_body("newhead1234")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/git/ref/heads/{}", REPO_PATH, BRANCH)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/git/refs", REPO_PATH)))
        .and(body_partial_json(json!({ "ref": "refs/heads/translation-cache", "sha": "newhead1234" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(ref_body("newhead1234")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"/git/refs/heads/rebuild$"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    branch_cache(&server, dir.path())
        .replace_branch("rebuild", BRANCH)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_replaceBranch_withInvisibleSource_shouldGiveUp() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/git/ref/heads/rebuild", REPO_PATH)))
        .respond_with(ResponseTemplate::new(404))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = create_temp_dir().unwrap();
    let result = branch_cache(&server, dir.path())
        .replace_branch("rebuild", BRANCH)
        .await;
    assert!(matches!(result, Err(CacheError::Http { status: 404, .. })));
}
