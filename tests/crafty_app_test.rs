//! End-to-end tests
//!
//! Load a configuration file, run the application with the real control
//! client against a mocked control API and proxy a client through it.

use serde_json::json;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crafty_reverse_proxy::config::{load_config, validate_config};
use crafty_reverse_proxy::{App, CraftyClient};

async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn control_api(backend_port: u16) -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v2/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "data": {"token": "tok", "user_id": "1"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v2/servers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "data": [{"server_id": 7, "server_port": backend_port}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v2/servers/7/action/start_server"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    server
}

async fn connect_with_retry(addr: &str) -> TcpStream {
    for _ in 0..100 {
        if let Ok(stream) = TcpStream::connect(addr).await {
            return stream;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Proxy never started listening on {}", addr);
}

#[tokio::test]
async fn test_config_file_to_forwarded_connection() {
    let listen_port = free_port().await;
    let backend_port = free_port().await;
    let api = control_api(backend_port).await;

    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.yaml");
    fs::write(
        &config_path,
        format!(
            r#"
api_url: "{}"
username: "admin"
password: "secret"
auto_shutdown: false
dial_timeout_ms: 200
ready_poll_interval_ms: 20
ready_timeout: 10
addresses:
  - listener:
      addr: "127.0.0.1"
      port: {}
    proxy_host:
      addr: "127.0.0.1"
      port: {}
"#,
            api.uri(),
            listen_port,
            backend_port
        ),
    )
    .unwrap();

    let config = load_config(&config_path, false).unwrap();
    validate_config(&config).unwrap();

    let backend = Arc::new(CraftyClient::from_config(&config).unwrap());
    let app = App::new(config, backend);
    let cancel = CancellationToken::new();
    let running = tokio::spawn({
        let cancel = cancel.clone();
        async move { app.run(cancel).await }
    });

    // The game server comes up a little after the start request
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let listener = TcpListener::bind(("127.0.0.1", backend_port)).await.unwrap();
        let (stream, _) = listener.accept().await.unwrap();
        let (mut reader, mut writer) = stream.into_split();
        let _ = tokio::io::copy(&mut reader, &mut writer).await;
    });

    let mut client = connect_with_retry(&format!("127.0.0.1:{}", listen_port)).await;
    client.write_all(b"handshake").await.unwrap();
    let mut reply = [0u8; 9];
    tokio::time::timeout(Duration::from_secs(5), client.read_exact(&mut reply))
        .await
        .expect("Reply should be forwarded")
        .unwrap();
    assert_eq!(&reply, b"handshake");

    drop(client);
    cancel.cancel();
    let result = tokio::time::timeout(Duration::from_secs(5), running).await;
    assert!(matches!(result, Ok(Ok(Ok(())))));
}

#[test]
fn test_missing_config_file_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config").join("config.yaml");

    assert!(load_config(&config_path, false).is_err());
    assert!(config_path.exists());

    // The written defaults load and validate on the next start
    let config = load_config(&config_path, false).unwrap();
    validate_config(&config).unwrap();
    assert_eq!(config.addresses.len(), 1);
}
