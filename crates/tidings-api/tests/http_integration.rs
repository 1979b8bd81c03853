//! Integration tests for the HTTP collaborators against a raw TCP stub.
//!
//! The stub records each request and answers with a canned HTTP response, so
//! the tests check both what the clients send and how they classify replies.
//!
//! Run with: `cargo test -p tidings-api --test http_integration -- --ignored`

use std::sync::{Arc, Mutex};

use tidings_api::{GeminiClient, SerperClient};
use tidings_types::{ApiError, CompletionProvider, SearchProvider};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Build an HTTP response with a JSON body.
fn http_json_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\n\
         Content-Type: application/json\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        body.len(),
        body
    )
}

/// Read one HTTP request: headers plus a `Content-Length` body.
async fn read_request(socket: &mut TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(split) = text.find("\r\n\r\n") {
            let content_length = text[..split]
                .lines()
                .find_map(|l| {
                    let (name, value) = l.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if data.len() >= split + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&data).into_owned()
}

/// Start a stub server answering every connection with `response`.
/// Returns the base URL and the log of raw requests received.
async fn start_stub(response: String) -> (String, Arc<Mutex<Vec<String>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&requests);

    tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            let request = read_request(&mut socket).await;
            log.lock().unwrap().push(request);
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.flush().await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{addr}"), requests)
}

// ---------------------------------------------------------------------------
// Serper
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn serper_sends_key_and_query() {
    let body = r#"{"news":[
        {"title":"Markets rally","snippet":"Stocks up","link":"https://news/1"},
        {"title":"Rain expected","snippet":"Bring umbrellas","link":"https://news/2"}
    ]}"#;
    let (base, requests) = start_stub(http_json_response("200 OK", body)).await;

    let client = SerperClient::new("serper-key", &base).unwrap();
    let hits = client.search("markets").await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "Markets rally");
    assert_eq!(hits[1].url, "https://news/2");

    let requests = requests.lock().unwrap();
    let raw = requests[0].to_ascii_lowercase();
    assert!(raw.starts_with("post /news "));
    assert!(raw.contains("x-api-key: serper-key"));
    assert!(requests[0].contains(r#"{"q":"markets"}"#));
}

#[tokio::test]
#[ignore]
async fn serper_auth_failure_is_classified() {
    let body = r#"{"message":"Unauthorized.","statusCode":403}"#;
    let (base, _) = start_stub(http_json_response("403 Forbidden", body)).await;

    let client = SerperClient::new("bad-key", &base).unwrap();
    match client.search("anything").await {
        Err(ApiError::Auth { message }) => assert_eq!(message, "Unauthorized."),
        other => panic!("Expected Auth, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn serper_garbage_body_is_parse_error() {
    let (base, _) = start_stub(http_json_response("200 OK", "<html>oops</html>")).await;

    let client = SerperClient::new("k", &base).unwrap();
    assert!(matches!(
        client.search("x").await,
        Err(ApiError::Parse(_))
    ));
}

#[tokio::test]
#[ignore]
async fn unreachable_host_is_network_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = SerperClient::new("k", format!("http://{addr}")).unwrap();
    assert!(matches!(
        client.search("x").await,
        Err(ApiError::Network(_))
    ));
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

#[tokio::test]
#[ignore]
async fn gemini_posts_prompt_to_model_endpoint() {
    let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Cautiously optimistic."}]}}]}"#;
    let (base, requests) = start_stub(http_json_response("200 OK", body)).await;

    let client = GeminiClient::new("gemini-key", &base, "gemini-1.5-flash").unwrap();
    let text = client.complete("How do these headlines feel?").await.unwrap();
    assert_eq!(text, "Cautiously optimistic.");

    let requests = requests.lock().unwrap();
    let raw = requests[0].to_ascii_lowercase();
    assert!(raw.starts_with("post /v1beta/models/gemini-1.5-flash:generatecontent "));
    assert!(raw.contains("x-goog-api-key: gemini-key"));
    assert!(requests[0].contains("How do these headlines feel?"));
}

#[tokio::test]
#[ignore]
async fn gemini_rate_limit_is_classified() {
    let response = "HTTP/1.1 429 Too Many Requests\r\n\
                    Content-Type: application/json\r\n\
                    Retry-After: 2\r\n\
                    Content-Length: 2\r\n\
                    Connection: close\r\n\
                    \r\n\
                    {}"
    .to_string();
    let (base, _) = start_stub(response).await;

    let client = GeminiClient::new("k", &base, "gemini-1.5-flash").unwrap();
    match client.complete("x").await {
        Err(ApiError::RateLimited { retry_after_ms }) => assert_eq!(retry_after_ms, Some(2000)),
        other => panic!("Expected RateLimited, got {other:?}"),
    }
}
