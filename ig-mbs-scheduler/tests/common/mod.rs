//! Local stand-ins for the browser automation endpoint.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Number of recorded requests starting with `prefix`.
pub fn count_requests(log: &Arc<Mutex<Vec<String>>>, prefix: &str) -> usize {
    log.lock().unwrap().iter().filter(|r| r.starts_with(prefix)).count()
}

/// Read one HTTP request and return `(method, path, body)`.
async fn read_request(socket: &mut TcpStream) -> std::io::Result<(String, String, String)> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let body = String::from_utf8_lossy(&buffer[header_end..]).to_string();
    Ok((method, path, body))
}

fn route(method: &str, path: &str, body: &str, execute_result: &Value) -> (u16, Value) {
    let element = |id: &str| json!({ ELEMENT_KEY: id });
    match (method, path) {
        ("POST", "/session") => (200, json!({ "value": { "sessionId": "s1", "capabilities": {} } })),
        ("GET", "/session/s1/url") => (200, json!({ "value": "https://example.com/start" })),
        ("POST", "/session/s1/url") => (200, json!({ "value": null })),
        ("POST", "/session/s1/element") if body.contains("missing") => (
            404,
            json!({ "value": { "error": "no such element", "message": "Unable to locate element" } }),
        ),
        ("POST", "/session/s1/element") => (200, json!({ "value": element("e1") })),
        ("POST", "/session/s1/elements") if body.contains("missing") => (200, json!({ "value": [] })),
        ("POST", "/session/s1/elements") => (200, json!({ "value": [element("e1"), element("e2")] })),
        ("POST", "/session/s1/element/e1/element") => (200, json!({ "value": element("e3") })),
        ("GET", "/session/s1/element/e1/text") => (200, json!({ "value": "Oct 16, 2026 at 9:00 AM" })),
        ("GET", "/session/s1/element/e1/attribute/aria-checked") => (200, json!({ "value": "true" })),
        ("GET", "/session/s1/element/e1/attribute/href") => (200, json!({ "value": null })),
        ("POST", "/session/s1/element/e1/value") => (200, json!({ "value": null })),
        ("POST", "/session/s1/execute/sync") => (200, json!({ "value": execute_result })),
        ("DELETE", "/session/s1") => (200, json!({ "value": null })),
        _ => (
            404,
            json!({ "value": { "error": "unknown command", "message": format!("{} {}", method, path) } }),
        ),
    }
}

/// A fake WebDriver endpoint that records every request it receives.
///
/// Scripts run through `/execute/sync` all return `execute_result`.
pub async fn fake_driver(execute_result: Value) -> std::io::Result<(String, Arc<Mutex<Vec<String>>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorded = log.clone();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let log = recorded.clone();
            let execute_result = execute_result.clone();
            tokio::spawn(async move {
                let Ok((method, path, body)) = read_request(&mut socket).await else {
                    return;
                };
                let (status, payload) = route(&method, &path, &body, &execute_result);
                log.lock().unwrap().push(format!("{} {} {}", method, path, body));

                let body = payload.to_string();
                let head = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(body.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Ok((format!("http://{}", addr), log))
}

