//! Direct HTTP path: streaming chat completions from the panel itself.

use futures::StreamExt;
use log::{error, info};

use crate::error::PanelError;
use crate::request::ChatRequest;
use crate::sse::{SseDecoder, SseEvent};

#[derive(Debug, Clone, Default)]
pub struct ChatClient {
    http: reqwest::Client,
}

impl ChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// POST `request` to `url` and read the SSE body to the end.
    ///
    /// `on_connected` runs once the response headers arrived with a success
    /// status. `on_text` receives the accumulated text after every content
    /// fragment. Returns the full text once the transport closes the stream.
    pub async fn stream_chat<C, F>(
        &self,
        url: &str,
        request: &ChatRequest,
        on_connected: C,
        mut on_text: F,
    ) -> Result<String, PanelError>
    where
        C: FnOnce(),
        F: FnMut(&str),
    {
        info!("[llm-client] POST {} model={}", url, request.model);

        let response = self.http.post(url).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            error!("[llm-client] {} returned {}", url, status);
            return Err(PanelError::Http {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        on_connected();

        let mut decoder = SseDecoder::new();
        let mut full_text = String::new();
        let mut byte_stream = response.bytes_stream();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            for event in decoder.push(&chunk) {
                apply_event(event, &mut full_text, &mut on_text);
            }
        }
        for event in decoder.finish() {
            apply_event(event, &mut full_text, &mut on_text);
        }

        Ok(full_text)
    }
}

fn apply_event<F: FnMut(&str)>(event: SseEvent, full_text: &mut String, on_text: &mut F) {
    // [DONE] is informational; the loop ends when the transport does.
    if let SseEvent::Delta(content) = event {
        full_text.push_str(&content);
        on_text(full_text);
    }
}
