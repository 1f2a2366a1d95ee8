//! HTTP tests of the up-to-date check client against a local responder.

use plugin_auto_updater::{LocalVersion, SteamVersionClient, UpdateCheckError, VersionSource};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Serves one canned HTTP response and returns the request line it received.
async fn respond_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!(
        "http://{}/ISteamApps/UpToDateCheck/v0001/",
        listener.local_addr().unwrap()
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );
        let _ = socket.write_all(response.as_bytes()).await;
        let _ = socket.shutdown().await;

        String::from_utf8_lossy(&request)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    });

    (endpoint, handle)
}

fn local() -> LocalVersion {
    LocalVersion::parse("PatchVersion=1.39.8.5").unwrap()
}

#[tokio::test]
async fn test_outdated_answer_is_parsed() {
    let (endpoint, server) = respond_once(
        "200 OK",
        r#"{"response":{"success":true,"up_to_date":false,"version_is_listable":false,"required_version":9001,"message":"Your server is out of date, please upgrade"}}"#,
    )
    .await;
    let client = SteamVersionClient::new(&endpoint, 730, Some(Duration::from_secs(5))).unwrap();

    let check = client.check(&local()).await.unwrap();

    assert!(check.success);
    assert!(!check.up_to_date);
    assert_eq!(check.required_version, 9001);

    let request_line = server.await.unwrap();
    assert!(request_line.starts_with("GET /ISteamApps/UpToDateCheck/v0001/?"));
    assert!(request_line.contains("appid=730"));
    assert!(request_line.contains("version=1.39.8.5"));
}

#[tokio::test]
async fn test_error_status_is_a_network_error() {
    let (endpoint, server) = respond_once("503 Service Unavailable", "{}").await;
    let client = SteamVersionClient::new(&endpoint, 730, Some(Duration::from_secs(5))).unwrap();

    let result = client.check(&local()).await;

    match result {
        Err(UpdateCheckError::Network(reason)) => assert!(reason.contains("503")),
        other => panic!("expected a network error, got {:?}", other),
    }
    server.await.unwrap();
}

#[tokio::test]
async fn test_garbage_body_is_malformed() {
    let (endpoint, server) = respond_once("200 OK", "<html>maintenance</html>").await;
    let client = SteamVersionClient::new(&endpoint, 730, Some(Duration::from_secs(5))).unwrap();

    assert!(matches!(
        client.check(&local()).await,
        Err(UpdateCheckError::MalformedResponse(_))
    ));
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}/", listener.local_addr().unwrap());
    drop(listener);

    let client = SteamVersionClient::new(&endpoint, 730, Some(Duration::from_secs(5))).unwrap();
    assert!(matches!(
        client.check(&local()).await,
        Err(UpdateCheckError::Network(_))
    ));
}
