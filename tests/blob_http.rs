use anyhow::Result;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use agriscan_overlay::blob::{BlobFetcher, BlobScope, HttpBlobFetcher, ScopeState};
use agriscan_overlay::BlobRegistry;

struct CannedResponse {
    status_line: &'static str,
    content_type: &'static str,
    body: Vec<u8>,
}

impl CannedResponse {
    fn new(status_line: &'static str, content_type: &'static str, body: &[u8]) -> Self {
        Self {
            status_line,
            content_type,
            body: body.to_vec(),
        }
    }
}

/// Serves each canned response to one connection, in order, and reports the
/// request head it received.
struct TestServer {
    addr: SocketAddr,
    requests: mpsc::Receiver<String>,
    join: Option<JoinHandle<()>>,
}

impl TestServer {
    fn start(responses: Vec<CannedResponse>) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let (tx, requests) = mpsc::channel();
        let join = std::thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                let head = read_head(&mut stream).unwrap_or_default();
                let _ = tx.send(head);
                let _ = write_response(&mut stream, &response);
            }
        });
        Ok(Self {
            addr,
            requests,
            join: Some(join),
        })
    }

    fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn next_request(&self) -> String {
        self.requests
            .recv_timeout(Duration::from_secs(5))
            .expect("request received")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn read_head(stream: &mut TcpStream) -> Result<String> {
    stream.set_read_timeout(Some(Duration::from_secs(2)))?;
    let mut buf = [0u8; 1024];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    Ok(String::from_utf8_lossy(&data).to_string())
}

fn write_response(stream: &mut TcpStream, response: &CannedResponse) -> Result<()> {
    let header = format!(
        "{}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status_line,
        response.content_type,
        response.body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(&response.body)?;
    stream.flush()?;
    Ok(())
}

fn header_value<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.split("\r\n").find_map(|line| {
        let (k, v) = line.split_once(':')?;
        k.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

#[test]
fn fetch_sends_bearer_token_and_returns_bytes() -> Result<()> {
    let server = TestServer::start(vec![CannedResponse::new(
        "HTTP/1.1 200 OK",
        "image/png",
        b"\x89PNG-bytes",
    )])?;
    let fetcher = HttpBlobFetcher::new(&server.base_url())?;

    let blob = fetcher.fetch("/api/scans/7/image", "tok-123")?;
    assert_eq!(blob.bytes, b"\x89PNG-bytes");
    assert_eq!(blob.content_type.as_deref(), Some("image/png"));

    let head = server.next_request();
    assert!(head.starts_with("GET /api/scans/7/image "));
    assert_eq!(header_value(&head, "authorization"), Some("Bearer tok-123"));
    Ok(())
}

#[test]
fn json_detail_becomes_failure_message() -> Result<()> {
    let server = TestServer::start(vec![CannedResponse::new(
        "HTTP/1.1 404 Not Found",
        "application/json",
        br#"{"detail":"Image not found"}"#,
    )])?;
    let fetcher = HttpBlobFetcher::new(&server.base_url())?;
    let err = fetcher.fetch("/img/missing.jpg", "tok").unwrap_err();
    assert_eq!(err.to_string(), "Image not found");
    Ok(())
}

#[test]
fn plain_text_body_becomes_failure_message() -> Result<()> {
    let server = TestServer::start(vec![CannedResponse::new(
        "HTTP/1.1 502 Bad Gateway",
        "text/plain",
        b"upstream unavailable",
    )])?;
    let fetcher = HttpBlobFetcher::new(&server.base_url())?;
    let err = fetcher.fetch("/img/a.jpg", "tok").unwrap_err();
    assert_eq!(err.to_string(), "upstream unavailable");
    Ok(())
}

#[test]
fn empty_body_falls_back_to_status_text() -> Result<()> {
    let server = TestServer::start(vec![CannedResponse::new(
        "HTTP/1.1 401 Unauthorized",
        "text/plain",
        b"",
    )])?;
    let fetcher = HttpBlobFetcher::new(&server.base_url())?;
    let err = fetcher.fetch("/img/a.jpg", "expired").unwrap_err();
    assert_eq!(err.to_string(), "Unauthorized");
    Ok(())
}

#[test]
fn oversized_body_is_rejected() -> Result<()> {
    let server = TestServer::start(vec![CannedResponse::new(
        "HTTP/1.1 200 OK",
        "image/jpeg",
        &[0u8; 64],
    )])?;
    let fetcher = HttpBlobFetcher::new(&server.base_url())?.with_max_bytes(16);
    assert!(fetcher.fetch("/img/big.jpg", "tok").is_err());
    Ok(())
}

#[test]
fn connection_failure_surfaces_message() -> Result<()> {
    // Bind then drop to get a port nothing listens on.
    let addr = TcpListener::bind("127.0.0.1:0")?.local_addr()?;
    let fetcher = HttpBlobFetcher::new(&format!("http://{}", addr))?;
    let err = fetcher.fetch("/img/a.jpg", "tok").unwrap_err();
    assert!(!err.to_string().is_empty());
    Ok(())
}

#[test]
fn scope_over_http_swaps_and_reports_failures() -> Result<()> {
    let server = TestServer::start(vec![
        CannedResponse::new("HTTP/1.1 200 OK", "image/jpeg", b"first"),
        CannedResponse::new("HTTP/1.1 200 OK", "image/jpeg", b"second"),
        CannedResponse::new(
            "HTTP/1.1 403 Forbidden",
            "application/json",
            br#"{"detail":"Not enough permissions"}"#,
        ),
    ])?;
    let fetcher = HttpBlobFetcher::new(&server.base_url())?;
    let registry = BlobRegistry::new();
    let mut scope = BlobScope::new("scan-viewer", registry.clone());

    let first = scope.acquire(&fetcher, "/img/1.jpg", "tok")?.reference();
    assert_eq!(first.data().as_deref(), Some(&b"first"[..]));

    let second = scope.acquire(&fetcher, "/img/2.jpg", "tok")?.reference();
    assert!(!first.is_live());
    assert_eq!(second.data().as_deref(), Some(&b"second"[..]));
    assert_eq!(registry.live_count(), 1);

    let err = scope.acquire(&fetcher, "/img/3.jpg", "tok").unwrap_err();
    assert_eq!(err.to_string(), "Not enough permissions");
    assert_eq!(
        scope.state(),
        &ScopeState::Failed("Not enough permissions".to_string())
    );
    assert!(!second.is_live());
    assert_eq!(registry.live_count(), 0);

    drop(scope);
    let stats = registry.stats();
    assert_eq!(stats.created, 2);
    assert_eq!(stats.released, 2);
    Ok(())
}
