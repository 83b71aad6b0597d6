//! The HTTP transport end to end, against a listener on an ephemeral port.

use chrono::Utc;
use sitectl_core::auth::{compute_tag, Secret, SqliteCredentialStore, TagAlgorithm};
use sitectl_core::datastore::SqliteDatastore;
use sitectl_core::{Endpoint, EndpointConfig, EndpointContext};
use std::sync::Arc;
use tempfile::TempDir;

const SECRET: &str = "http-secret";

struct Harness {
    dir: TempDir,
    url: String,
    client: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = EndpointConfig {
            secret: Some(SECRET.into()),
            issued_at: Some(Utc::now()),
            site_root: dir.path().to_path_buf(),
            ..Default::default()
        };
        let datastore = SqliteDatastore::memory().unwrap();
        sitectl_core::app::install_schema(&datastore, &config.table_prefix).unwrap();
        let ctx = EndpointContext::with_stores(
            config,
            Arc::new(SqliteCredentialStore::memory().unwrap()),
            datastore,
        );
        let endpoint = Arc::new(Endpoint::new(ctx));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        tokio::spawn(sitectl_server::serve(listener, endpoint, std::future::pending()));

        Self {
            dir,
            url,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, fields: &[(&str, &str)]) -> reqwest::Response {
        self.client.post(&self.url).form(fields).send().await.unwrap()
    }
}

fn tag(counter: i64) -> String {
    compute_tag(TagAlgorithm::Md5, &Secret::new(SECRET), counter)
}

#[tokio::test]
async fn test_ping_over_http() {
    let h = Harness::start().await;
    let resp = h.post(&[("auth-tag", tag(0).as_str()), ("command", "ping")]).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers()["content-type"].to_str().unwrap().starts_with("text/plain"));
    assert!(resp.headers().get("x-sitectl-ttl").is_none());
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("AUTHOK:PONG:23:"), "{body}");
}

#[tokio::test]
async fn test_legacy_field_names() {
    let h = Harness::start().await;
    let body = h
        .post(&[("wpm-a", tag(0).as_str()), ("wpm-c", "optget:nonexistent_key")])
        .await
        .text()
        .await
        .unwrap();
    assert_eq!(body, "AUTHOK:NOTFOUND");
}

#[tokio::test]
async fn test_debug_headers() {
    let h = Harness::start().await;
    let resp = h
        .post(&[
            ("auth-tag", tag(0).as_str()),
            ("command", "optget:site url"),
            ("debug-flag", "1"),
        ])
        .await;
    let headers = resp.headers();
    assert!(headers["x-sitectl-version"].to_str().unwrap().starts_with("23, "));
    assert_eq!(headers["x-sitectl-command"], "optget%3Asite+url");
    let ttl: i64 = headers["x-sitectl-ttl"].to_str().unwrap().parse().unwrap();
    assert!((170..=180).contains(&ttl), "{ttl}");
}

#[tokio::test]
async fn test_refusals() {
    let h = Harness::start().await;
    let body = h.post(&[("command", "ping")]).await.text().await.unwrap();
    assert!(body.starts_with("NOAUTH:MissingTag:"), "{body}");

    let resp = h.client.post(&h.url).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp.text().await.unwrap().starts_with("NOAUTH:MissingTag:"));

    let body = h
        .post(&[("auth-tag", "0000"), ("command", "ping")])
        .await
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("NOAUTH:BadCredential:"), "{body}");
}

#[tokio::test]
async fn test_large_file_streams_verbatim() {
    let h = Harness::start().await;
    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    std::fs::write(h.dir.path().join("big.bin"), &payload).unwrap();

    let resp = h.post(&[("auth-tag", tag(0).as_str()), ("command", "getfile:big.bin")]).await;
    let body = resp.bytes().await.unwrap();
    assert_eq!(body.len(), payload.len());
    assert!(body[..] == payload[..]);
}

#[tokio::test]
async fn test_early_ping_leaves_counter_alone() {
    let h = Harness::start().await;
    let body = h
        .post(&[("auth-tag", "x"), ("command", "earlyping")])
        .await
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("AUTHOK:PONG:"));

    let body = h
        .post(&[("auth-tag", tag(0).as_str()), ("command", "help")])
        .await
        .text()
        .await
        .unwrap();
    assert!(body.starts_with("AUTHOK:Program version: "), "{body}");
}
