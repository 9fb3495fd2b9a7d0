//! Integration tests for the direct HTTP path.
//!
//! Each test serves one canned response from a loopback listener and points
//! the panel at it.

use llm_client::client::ChatClient;
use llm_client::host::InsertMethod;
use llm_client::notebook_state::{NotebookDocument, Workspace};
use llm_client::request::ChatRequest;
use llm_client::status::StatusKind;
use llm_client::{LlmPanel, MemoryStore, PanelError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// Read one HTTP request and return its body.
async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            return String::new();
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = find_header_end(&buf) {
            let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            let body_start = end + 4;
            if buf.len() >= body_start + content_length {
                return String::from_utf8_lossy(&buf[body_start..body_start + content_length])
                    .into_owned();
            }
        }
    }
}

/// Serve one response and hand back the request body the client sent.
async fn serve_once(status_line: &str, content_type: &str, body: &str) -> (u16, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nConnection: close\r\n\r\n{}",
        status_line, content_type, body
    );

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let request_body = read_request(&mut stream).await;
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        request_body
    });

    (port, handle)
}

fn delta(content: &str) -> String {
    format!(
        "data: {}\n\n",
        serde_json::json!({"choices": [{"delta": {"content": content}}]})
    )
}

fn panel_for(port: u16, prompt: &str) -> LlmPanel {
    let mut panel = LlmPanel::new(Box::new(MemoryStore::new()));
    panel.set_host("127.0.0.1");
    panel.set_port(port.to_string());
    panel.set_model("test-model");
    panel.set_prompt(prompt);
    panel
}

#[tokio::test]
async fn test_streamed_response_is_rendered() {
    let _ = env_logger::builder().is_test(true).try_init();

    let body = format!("{}{}data: [DONE]\n\n", delta("Hel"), delta("lo"));
    let (port, server) = serve_once("200 OK", "text/event-stream", &body).await;

    let mut panel = panel_for(port, "  say hello  ");
    let output = panel.watch_output();

    panel.send_direct().await.unwrap();

    assert_eq!(panel.response().html, "Hello");
    assert_eq!(panel.response().source.as_deref(), Some("Hello"));
    assert_eq!(*output.borrow(), "Hello");

    let status = panel.status().unwrap();
    assert_eq!(status.text, "✅ Response completed");
    assert_eq!(status.kind, StatusKind::Success);

    let sent: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
    assert_eq!(sent["model"], "test-model");
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["max_tokens"], 32000);
    assert_eq!(sent["messages"][0]["role"], "user");
    assert_eq!(sent["messages"][0]["content"], "say hello /no_think");
}

#[tokio::test]
async fn test_partial_renders_carry_cursor() {
    let body = format!("{}{}data: [DONE]\n\n", delta("**Hel"), delta("lo**"));
    let (port, server) = serve_once("200 OK", "text/event-stream", &body).await;

    let url = format!("http://127.0.0.1:{}/v1/chat/completions", port);
    let request = ChatRequest::new("m", "hi", true);
    let mut connected = false;
    let mut snapshots = Vec::new();

    let text = ChatClient::new()
        .stream_chat(
            &url,
            &request,
            || connected = true,
            |text| snapshots.push(llm_client::markdown::render_streaming(text)),
        )
        .await
        .unwrap();

    assert!(connected);
    assert_eq!(text, "**Hello**");
    assert_eq!(snapshots, vec!["**Hel▌", "<strong>Hello</strong>▌"]);
    server.await.unwrap();
}

#[tokio::test]
async fn test_malformed_lines_are_skipped() {
    let body = format!(
        "{}data: {{not json\n\n: keep-alive\n\n{}data: [DONE]\n\n",
        delta("Hel"),
        delta("lo")
    );
    let (port, server) = serve_once("200 OK", "text/event-stream", &body).await;

    let mut panel = panel_for(port, "hi");
    panel.send_direct().await.unwrap();

    assert_eq!(panel.response().html, "Hello");
    server.await.unwrap();
}

#[tokio::test]
async fn test_trailing_line_without_newline_is_kept() {
    let body = format!("{}{}", delta("Hel"), delta("lo").trim_end());
    let (port, server) = serve_once("200 OK", "text/event-stream", &body).await;

    let mut panel = panel_for(port, "hi");
    panel.send_direct().await.unwrap();

    assert_eq!(panel.response().html, "Hello");
    server.await.unwrap();
}

#[tokio::test]
async fn test_markdown_in_final_render() {
    let body = format!("{}data: [DONE]\n\n", delta("# Title\nuse `x`"));
    let (port, server) = serve_once("200 OK", "text/event-stream", &body).await;

    let mut panel = panel_for(port, "hi");
    panel.send_direct().await.unwrap();

    assert_eq!(panel.response().html, "<h1>Title</h1><br>use <code>x</code>");
    assert_eq!(
        panel.response().insertable_text().as_deref(),
        Some("# Title\nuse `x`")
    );
    server.await.unwrap();
}

#[tokio::test]
async fn test_http_error_status() {
    let (port, server) = serve_once("500 Internal Server Error", "text/plain", "boom").await;

    let mut panel = panel_for(port, "hi");
    let result = panel.send_direct().await;

    match result {
        Err(PanelError::Http { status, reason }) => {
            assert_eq!(status, 500);
            assert_eq!(reason, "Internal Server Error");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }

    let status = panel.status().unwrap();
    assert_eq!(status.text, "❌ Error: HTTP 500: Internal Server Error");
    assert_eq!(status.kind, StatusKind::Error);
    assert!(panel.response().html.is_empty());
    server.await.unwrap();
}

#[tokio::test]
async fn test_connection_refused_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut panel = panel_for(port, "hi");
    let result = panel.send_direct().await;

    assert!(matches!(result, Err(PanelError::Transport(_))));
    assert!(panel.status().unwrap().text.starts_with("❌ Error: "));
}

#[tokio::test]
async fn test_new_request_discards_previous_response() {
    let body = format!("{}data: [DONE]\n\n", delta("first"));
    let (port, server) = serve_once("200 OK", "text/event-stream", &body).await;
    let mut panel = panel_for(port, "hi");
    panel.send_direct().await.unwrap();
    server.await.unwrap();
    assert_eq!(panel.response().html, "first");

    let (port, server) = serve_once("503 Service Unavailable", "text/plain", "").await;
    panel.set_port(port.to_string());
    assert!(panel.send_direct().await.is_err());
    server.await.unwrap();

    assert!(panel.response().html.is_empty());
    assert_eq!(panel.response().insertable_text(), None);
}

#[tokio::test]
async fn test_insert_uses_streamed_text_verbatim() {
    let reply = "if a < b and c > d:\n    print(a)";
    let body = format!("{}data: [DONE]\n\n", delta(reply));
    let (port, server) = serve_once("200 OK", "text/event-stream", &body).await;

    let mut panel = panel_for(port, "write a comparison");
    panel.send_direct().await.unwrap();
    server.await.unwrap();

    let mut workspace = Workspace::new();
    workspace.open(NotebookDocument::new_empty());
    let method = panel.insert_into_cell(&mut workspace).unwrap();

    assert_eq!(method, InsertMethod::Appended);
    let document = workspace.document(0).unwrap();
    let cell_id = document.active_cell_id().unwrap();
    assert_eq!(document.get_cell_source(&cell_id).unwrap(), reply);
}
