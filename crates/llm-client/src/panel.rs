//! The LLM client panel: form state, request strategies, rendering and
//! cell insertion.
//!
//! All operations take `&mut self`, so a panel runs at most one request at
//! a time. Starting a request discards whatever the previous one rendered.

use log::{debug, error, info, warn};
use std::time::Instant;
use tokio::sync::watch;

use crate::capture::{CaptureOutcome, CaptureState, OutputCapture};
use crate::client::ChatClient;
use crate::error::PanelError;
use crate::host::{append_to_model, InsertMethod, NotebookHost};
use crate::kernel::StreamName;
use crate::markdown;
use crate::request::ValidatedRequest;
use crate::runtime::Runtime;
use crate::settings::{load_settings, save_settings, ConnectionSettings, KeyValueStore};
use crate::snippet::kernel_snippet;
use crate::status::{StatusKind, StatusMessage};

/// Which path a Send goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Stream from the endpoint over HTTP.
    #[default]
    Direct,
    /// Run the request inside the focused notebook's kernel.
    Kernel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelAction {
    Send,
    Clear,
    Insert,
}

/// Ctrl+Enter in the prompt sends.
pub fn action_for_key(ctrl: bool, key: &str) -> Option<PanelAction> {
    (ctrl && key == "Enter").then_some(PanelAction::Send)
}

/// What the response area shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseView {
    pub html: String,
    /// Plain text the HTML was rendered from, when it was retained.
    pub source: Option<String>,
}

impl ResponseView {
    /// Text to put into a cell: the retained source if there is one,
    /// otherwise the text content of the rendered HTML.
    pub fn insertable_text(&self) -> Option<String> {
        let text = self
            .source
            .clone()
            .unwrap_or_else(|| markdown::text_content(&self.html));
        Some(text).filter(|text| !text.trim().is_empty())
    }
}

pub struct LlmPanel {
    store: Box<dyn KeyValueStore + Send>,
    settings: ConnectionSettings,
    prompt: String,
    mode: RequestMode,
    client: ChatClient,
    capture: OutputCapture,
    response: ResponseView,
    output_tx: watch::Sender<String>,
    status: Option<StatusMessage>,
}

impl LlmPanel {
    /// Build the panel and populate the form from the persisted settings.
    pub fn new(store: Box<dyn KeyValueStore + Send>) -> Self {
        Self::with_client(store, ChatClient::new())
    }

    pub fn with_client(store: Box<dyn KeyValueStore + Send>, client: ChatClient) -> Self {
        let settings = load_settings(&*store);
        let (output_tx, _) = watch::channel(String::new());
        Self {
            store,
            settings,
            prompt: String::new(),
            mode: RequestMode::default(),
            client,
            capture: OutputCapture::new(),
            response: ResponseView::default(),
            output_tx,
            status: None,
        }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn set_host(&mut self, host: impl Into<String>) {
        self.settings.host = host.into();
        self.persist_settings();
    }

    pub fn set_port(&mut self, port: impl Into<String>) {
        self.settings.port = port.into();
        self.persist_settings();
    }

    pub fn set_model(&mut self, model: impl Into<String>) {
        self.settings.model = model.into();
        self.persist_settings();
    }

    pub fn set_use_https(&mut self, use_https: bool) {
        self.settings.use_https = use_https;
        self.persist_settings();
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn mode(&self) -> RequestMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RequestMode) {
        self.mode = mode;
    }

    pub fn response(&self) -> &ResponseView {
        &self.response
    }

    /// Receiver that sees every render of the response area, including the
    /// partial renders while a response streams in.
    pub fn watch_output(&self) -> watch::Receiver<String> {
        self.output_tx.subscribe()
    }

    /// The status line, if one was posted less than the status timeout ago.
    pub fn status(&self) -> Option<&StatusMessage> {
        self.status_at(Instant::now())
    }

    pub fn status_at(&self, now: Instant) -> Option<&StatusMessage> {
        self.status.as_ref().filter(|status| status.is_visible_at(now))
    }

    pub fn capture_state(&self) -> &CaptureState {
        self.capture.state()
    }

    pub async fn dispatch(
        &mut self,
        action: PanelAction,
        host: &mut dyn NotebookHost,
    ) -> Result<(), PanelError> {
        match action {
            PanelAction::Send => self.send(host).await,
            PanelAction::Clear => {
                self.clear();
                Ok(())
            }
            PanelAction::Insert => self.insert_into_cell(host).map(|_| ()),
        }
    }

    /// Send the prompt using the current [`RequestMode`].
    pub async fn send(&mut self, host: &mut dyn NotebookHost) -> Result<(), PanelError> {
        match self.mode {
            RequestMode::Direct => self.send_direct().await,
            RequestMode::Kernel => self.send_via_kernel(host).await,
        }
    }

    /// Stream the response straight from the endpoint.
    pub async fn send_direct(&mut self) -> Result<(), PanelError> {
        let validated = match ValidatedRequest::from_form(&self.settings, &self.prompt) {
            Ok(validated) => validated,
            Err(e) => return Err(self.fail(e)),
        };

        self.show_response(ResponseView::default());
        self.post_status("⏳ Sending request...", StatusKind::Info);

        let request = validated.chat_request(true);
        let status = &mut self.status;
        let response = &mut self.response;
        let output_tx = &self.output_tx;
        let result = self
            .client
            .stream_chat(
                &validated.url,
                &request,
                || {
                    *status = Some(StatusMessage::new(
                        "📡 Receiving response...",
                        StatusKind::Info,
                    ))
                },
                |text| {
                    response.html = markdown::render_streaming(text);
                    output_tx.send_replace(response.html.clone());
                },
            )
            .await;

        match result {
            Ok(text) => {
                self.show_response(ResponseView {
                    html: markdown::render(&text),
                    source: Some(text),
                });
                self.post_status("✅ Response completed", StatusKind::Success);
                Ok(())
            }
            Err(e) => {
                error!("[llm-client] LLM request error: {}", e);
                Err(self.fail(e))
            }
        }
    }

    /// Run the request inside the focused notebook's kernel and scrape the
    /// reply out of its stdout.
    pub async fn send_via_kernel(&mut self, host: &mut dyn NotebookHost) -> Result<(), PanelError> {
        let validated = match ValidatedRequest::from_form(&self.settings, &self.prompt) {
            Ok(validated) => validated,
            Err(e) => return Err(self.fail(e)),
        };

        let Some(session) = host.active_document().and_then(|doc| doc.session()) else {
            return Err(self.fail(PanelError::NoSession));
        };

        let runtime = match session.language().parse::<Runtime>() {
            Ok(runtime) => runtime,
            Err(_) => {
                let language = session.language().to_string();
                return Err(self.fail(PanelError::UnsupportedLanguage(language)));
            }
        };

        let code = match kernel_snippet(runtime, &validated.url, &validated.chat_request(false)) {
            Ok(code) => code,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.show_response(ResponseView::default());
        self.capture.reset();
        self.post_status("⏳ Executing request in kernel...", StatusKind::Info);
        info!("[llm-client] Proxying request through {} kernel", runtime);

        let mut outputs = match session.execute(code).await {
            Ok(outputs) => outputs,
            Err(e) => return Err(self.fail(PanelError::Execution(e))),
        };

        let mut last_error = None;
        while let Some(fragment) = outputs.recv().await {
            if fragment.name != StreamName::Stdout {
                continue;
            }
            match self.capture.feed(&fragment.text) {
                Some(CaptureOutcome::Completed(text)) => {
                    self.show_response(ResponseView {
                        html: markdown::render(&text),
                        source: Some(text),
                    });
                    self.post_status("✅ Response completed", StatusKind::Success);
                    last_error = None;
                }
                Some(CaptureOutcome::Failed(message)) => {
                    last_error = Some(self.fail(PanelError::Kernel(message)));
                }
                None => {}
            }
        }

        if self.capture.is_capturing() {
            debug!("[llm-client] Kernel output ended before the end sentinel");
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Empty the response area and the status line.
    pub fn clear(&mut self) {
        self.show_response(ResponseView::default());
        self.capture.reset();
        self.status = None;
    }

    /// Put the response into the focused cell, falling back to selection
    /// replacement and then to the clipboard.
    pub fn insert_into_cell(
        &mut self,
        host: &mut dyn NotebookHost,
    ) -> Result<InsertMethod, PanelError> {
        let Some(text) = self.response.insertable_text() else {
            return Err(self.fail(PanelError::NoResponse));
        };

        let inserted = match insert_into_active_cell(host, &text) {
            Ok(inserted) => inserted,
            Err(e) => return Err(self.fail(e)),
        };

        let method = match inserted {
            Some(method) => method,
            None => match host.clipboard().map(|clipboard| clipboard.write_text(&text)) {
                Some(Ok(())) => InsertMethod::CopiedToClipboard,
                Some(Err(e)) => {
                    warn!("[llm-client] Clipboard write failed: {}", e);
                    return Err(self.fail(PanelError::InsertFailed));
                }
                None => return Err(self.fail(PanelError::InsertFailed)),
            },
        };

        match method {
            InsertMethod::Appended | InsertMethod::ReplacedSelection => {
                self.post_status("✅ Text inserted to cell", StatusKind::Success)
            }
            InsertMethod::CopiedToClipboard => self.post_status(
                "📋 Response copied to clipboard. Paste it into the cell manually",
                StatusKind::Info,
            ),
        }
        Ok(method)
    }

    fn show_response(&mut self, response: ResponseView) {
        self.response = response;
        self.output_tx.send_replace(self.response.html.clone());
    }

    fn post_status(&mut self, text: &str, kind: StatusKind) {
        self.status = Some(StatusMessage::new(text, kind));
    }

    fn fail(&mut self, e: PanelError) -> PanelError {
        self.post_status(&e.status_text(), StatusKind::Error);
        e
    }

    fn persist_settings(&mut self) {
        if let Err(e) = save_settings(&mut *self.store, &self.settings) {
            warn!("[llm-client] Failed to save settings: {}", e);
        }
    }
}

/// Try the cell's own capabilities. `Ok(None)` means the cell offered
/// neither direct mutation nor a usable editor.
fn insert_into_active_cell(
    host: &mut dyn NotebookHost,
    text: &str,
) -> Result<Option<InsertMethod>, PanelError> {
    let document = host
        .active_document()
        .ok_or(PanelError::NoActiveDocument)?;
    let cell = document.active_cell().ok_or(PanelError::NoActiveCell)?;

    if let Some(model) = cell.text_model() {
        append_to_model(model, text);
        return Ok(Some(InsertMethod::Appended));
    }

    if let Some(editor) = cell.selection_editor() {
        match editor.replace_selection(text) {
            Ok(()) => return Ok(Some(InsertMethod::ReplacedSelection)),
            Err(e) => warn!("[llm-client] Selection replace failed: {}", e),
        }
    }

    Ok(None)
}
