//! Integration tests for the marquee-rpc JSON-RPC server.
//!
//! These tests start the real binary against temporary library roots and
//! check the response envelopes the dashboard relies on.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;

/// Temporary movie and TV roots plus a data directory.
struct TestEnv {
    temp: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir_all(temp.path().join("movies")).unwrap();
        std::fs::create_dir_all(temp.path().join("tv")).unwrap();
        Self { temp }
    }

    fn root(&self, name: &str) -> PathBuf {
        self.temp.path().join(name)
    }

    fn movie(&self, folder: &str) -> PathBuf {
        let dir = self.root("movies").join(folder);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}

/// Make an RPC call to the server.
async fn rpc_call(port: u16, method: &str, params: Value) -> Result<Value, String> {
    let json = rpc_call_raw(port, method, params).await?;
    if let Some(error) = json.get("error") {
        return Err(error.to_string());
    }
    Ok(json.get("result").cloned().unwrap_or(Value::Null))
}

/// Make an RPC call and return the full JSON-RPC payload.
async fn rpc_call_raw(port: u16, method: &str, params: Value) -> Result<Value, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/rpc", port))
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    response.json::<Value>().await.map_err(|e| e.to_string())
}

/// Check health endpoint.
async fn check_health(port: u16) -> bool {
    let client = reqwest::Client::new();
    if let Ok(response) = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        if let Ok(json) = response.json::<Value>().await {
            return json.get("status").and_then(|v| v.as_str()) == Some("ok");
        }
    }
    false
}

/// Wait for server to be ready.
async fn wait_for_server(port: u16, timeout_secs: u64) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(timeout_secs) {
        if check_health(port).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

struct RpcServerHandle {
    child: tokio::process::Child,
    port: u16,
    stdout_drain: Option<tokio::task::JoinHandle<()>>,
}

impl RpcServerHandle {
    async fn stop(mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.start_kill();
    }
}

/// Start the RPC binary and wait until `/health` is ready.
async fn start_rpc_server(env: &TestEnv) -> Result<RpcServerHandle, String> {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_marquee-rpc"));

    let mut child = tokio::process::Command::new(&binary)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg("0")
        .arg("--movie-folders")
        .arg(env.root("movies"))
        .arg("--tv-folders")
        .arg(env.root("tv"))
        .arg("--data-dir")
        .arg(env.root("data"))
        .env_remove("TMDB_API_KEY")
        .env_remove("SLACK_WEBHOOK_URL")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("failed to spawn marquee-rpc: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "failed to capture stdout".to_string())?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let mut discovered_port: Option<u16> = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(250), lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if let Some(value) = line.strip_prefix("RPC_PORT=") {
                    let parsed = value
                        .trim()
                        .parse::<u16>()
                        .map_err(|e| format!("invalid RPC_PORT value '{value}': {e}"))?;
                    discovered_port = Some(parsed);
                    break;
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => return Err(format!("failed to read marquee-rpc stdout: {err}")),
            Err(_) => continue,
        }
    }

    let port =
        discovered_port.ok_or_else(|| "RPC_PORT line not emitted by marquee-rpc".to_string())?;
    if !wait_for_server(port, 15).await {
        return Err(format!("marquee-rpc failed health check on port {port}"));
    }

    let stdout_drain =
        tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    Ok(RpcServerHandle {
        child,
        port,
        stdout_drain: Some(stdout_drain),
    })
}

fn error_code(payload: &Value) -> Option<i64> {
    payload.get("error")?.get("code")?.as_i64()
}

fn write_poster(dir: &Path) {
    let mut buf = std::io::Cursor::new(Vec::new());
    image::RgbImage::from_pixel(20, 30, image::Rgb([90, 90, 90]))
        .write_to(&mut buf, image::ImageFormat::Jpeg)
        .unwrap();
    std::fs::write(dir.join("poster.jpg"), buf.into_inner()).unwrap();
}

#[tokio::test]
async fn test_health_check() {
    let env = TestEnv::new();
    let server = start_rpc_server(&env).await.unwrap();

    let result = rpc_call(server.port, "health_check", json!({})).await.unwrap();
    assert_eq!(result["status"], "ok");

    server.stop().await;
}

#[tokio::test]
async fn test_list_items_envelope() {
    let env = TestEnv::new();
    write_poster(&env.movie("Heat (1995)"));
    env.movie("The Matrix (1999) {tmdb-603}");
    let server = start_rpc_server(&env).await.unwrap();

    let result = rpc_call(server.port, "list_items", json!({"category": "movies"}))
        .await
        .unwrap();
    assert_eq!(result["success"], true);
    assert_eq!(result["category"], "movies");
    assert_eq!(result["items"].as_array().unwrap().len(), 2);
    assert_eq!(result["items"][0]["statuses"]["poster"], "green");
    assert_eq!(result["items"][1]["statuses"]["poster"], "yellow");
    assert_eq!(result["totals"]["items"], 2);
    assert_eq!(result["ledgerHealth"]["status"], "healthy");

    let tv = rpc_call(server.port, "list_items", json!({"category": "tv"}))
        .await
        .unwrap();
    assert!(tv["items"].as_array().unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_mark_and_clear_unavailable() {
    let env = TestEnv::new();
    env.movie("Heat (1995)");
    let server = start_rpc_server(&env).await.unwrap();

    let marked = rpc_call(
        server.port,
        "mark_unavailable",
        json!({"category": "movies", "folderName": "Heat (1995)", "kind": "logo"}),
    )
    .await
    .unwrap();
    assert_eq!(marked["status"], "red");
    assert_eq!(marked["changed"], true);

    let listing = rpc_call(server.port, "list_items", json!({"category": "movies"}))
        .await
        .unwrap();
    assert_eq!(listing["items"][0]["statuses"]["logo"], "red");

    let cleared = rpc_call(
        server.port,
        "clear_unavailable",
        json!({"category": "movies", "folder": "Heat (1995)", "kind": "logo"}),
    )
    .await
    .unwrap();
    assert_eq!(cleared["status"], "yellow");

    server.stop().await;
}

#[tokio::test]
async fn test_error_codes() {
    let env = TestEnv::new();
    write_poster(&env.movie("Heat (1995)"));
    let server = start_rpc_server(&env).await.unwrap();

    let unknown = rpc_call_raw(server.port, "no_such_method", json!({})).await.unwrap();
    assert_eq!(error_code(&unknown), Some(-32601));

    let missing = rpc_call_raw(
        server.port,
        "mark_unavailable",
        json!({"category": "movies", "folder": "Nope (2001)", "kind": "poster"}),
    )
    .await
    .unwrap();
    assert_eq!(error_code(&missing), Some(-32002));

    let present = rpc_call_raw(
        server.port,
        "mark_unavailable",
        json!({"category": "movies", "folder": "Heat (1995)", "kind": "poster"}),
    )
    .await
    .unwrap();
    assert_eq!(error_code(&present), Some(-32005));

    let bad_kind = rpc_call_raw(
        server.port,
        "mark_unavailable",
        json!({"category": "movies", "folder": "Heat (1995)", "kind": "banner"}),
    )
    .await
    .unwrap();
    assert_eq!(error_code(&bad_kind), Some(-32005));

    server.stop().await;
}

#[tokio::test]
async fn test_search_without_catalog_is_an_error() {
    let env = TestEnv::new();
    env.movie("Heat (1995)");
    let server = start_rpc_server(&env).await.unwrap();

    let payload = rpc_call_raw(
        server.port,
        "search_artwork",
        json!({"category": "movies", "folder": "Heat (1995)", "kind": "poster"}),
    )
    .await
    .unwrap();
    assert!(payload.get("error").is_some());

    let health = rpc_call(server.port, "ledger_health", json!({})).await.unwrap();
    assert_eq!(health["ledger"]["status"], "healthy");

    server.stop().await;
}
