#![allow(dead_code)]
//! Shared test fixtures: a scriptable mock planner-agent server.
//!
//! Speaks just enough HTTP/1.1 over a raw TCP listener for the client
//! under test: `GET /events` returns a close-delimited SSE stream fed from
//! the test body, `POST /send-message` records the body and acknowledges,
//! `GET /status` returns a fixed JSON document.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

#[derive(Clone)]
enum StreamCmd {
    /// Raw SSE text to write to every open /events connection.
    Write(String),
    /// Drop every open /events connection (client sees EOF).
    Close,
}

pub struct MockPlannerAgent {
    pub base_url: String,
    commands: broadcast::Sender<StreamCmd>,
    /// Number of /events connections accepted so far.
    pub events_accepted: Arc<AtomicUsize>,
    /// Bodies received on /send-message, in order.
    pub sent_bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl MockPlannerAgent {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");
        let (commands, _) = broadcast::channel(64);
        let events_accepted = Arc::new(AtomicUsize::new(0));
        let sent_bodies = Arc::new(Mutex::new(Vec::new()));

        let commands_accept = commands.clone();
        let events_counter = Arc::clone(&events_accepted);
        let bodies = Arc::clone(&sent_bodies);
        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let commands = commands_accept.clone();
                let events_counter = Arc::clone(&events_counter);
                let bodies = Arc::clone(&bodies);
                tokio::spawn(async move {
                    let _ = handle_connection(socket, commands, events_counter, bodies).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            commands,
            events_accepted,
            sent_bodies,
        }
    }

    /// Push a frame on the default channel.
    pub fn push_broadcast(&self, body: &str) {
        self.push_raw(&format!("data: {}\n\n", body));
    }

    /// Push a frame on the named channel `event`.
    pub fn push_named(&self, event: &str, body: &str) {
        self.push_raw(&format!("event: {}\ndata: {}\n\n", event, body));
    }

    /// Push pre-formatted SSE text verbatim.
    pub fn push_raw(&self, raw: &str) {
        let _ = self.commands.send(StreamCmd::Write(raw.to_string()));
    }

    /// Drop every open event stream; later connections are still served.
    pub fn drop_streams(&self) {
        let _ = self.commands.send(StreamCmd::Close);
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    commands: broadcast::Sender<StreamCmd>,
    events_counter: Arc<AtomicUsize>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
) -> std::io::Result<()> {
    let (method, path, body) = read_request(&mut socket).await?;

    match (method.as_str(), path.as_str()) {
        ("GET", "/events") => {
            events_counter.fetch_add(1, Ordering::SeqCst);
            let mut rx = commands.subscribe();
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\n\
                      Content-Type: text/event-stream\r\n\
                      Cache-Control: no-cache\r\n\
                      Connection: close\r\n\r\n",
                )
                .await?;
            socket.flush().await?;
            loop {
                match rx.recv().await {
                    Ok(StreamCmd::Write(raw)) => {
                        socket.write_all(raw.as_bytes()).await?;
                        socket.flush().await?;
                    }
                    Ok(StreamCmd::Close) | Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        }
        ("POST", "/send-message") => {
            if let Ok(value) = serde_json::from_slice::<serde_json::Value>(&body) {
                bodies.lock().unwrap().push(value);
            }
            write_json(&mut socket, 200, r#"{"status":"Message sent"}"#).await?;
        }
        ("GET", "/status") => {
            write_json(
                &mut socket,
                200,
                r#"{"status":"running","service":"planner-agent"}"#,
            )
            .await?;
        }
        _ => {
            write_json(&mut socket, 404, r#"{"error":"not found"}"#).await?;
        }
    }
    Ok(())
}

async fn read_request(socket: &mut TcpStream) -> std::io::Result<(String, String, Vec<u8>)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before request head",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let content_length = lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            if name.eq_ignore_ascii_case("content-length") {
                value.trim().parse::<usize>().ok()
            } else {
                None
            }
        })
        .next()
        .unwrap_or(0);

    let mut body = buf[head_end..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok((method, path, body))
}

async fn write_json(socket: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
    let reason = if status == 200 { "OK" } else { "Not Found" };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    socket.write_all(response.as_bytes()).await?;
    socket.flush().await
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// A base URL nothing is listening on.
pub async fn refused_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Poll `cond` until it holds or `timeout` elapses.
pub async fn wait_until(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}
