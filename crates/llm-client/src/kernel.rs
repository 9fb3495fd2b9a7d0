//! Execution sessions for the kernel-proxy request path.

use anyhow::Result;
use futures::future::BoxFuture;
use jupyter_protocol::{
    ConnectionInfo, ExecuteRequest, ExecutionState, JupyterMessage, JupyterMessageContent,
    KernelInfoRequest, Status, Stdio,
};
use log::{debug, error, info};
use runtimelib::ClientShellConnection;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

const KERNEL_INFO_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// One `stream` output notification from an execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFragment {
    pub name: StreamName,
    pub text: String,
}

impl OutputFragment {
    pub fn stdout(text: impl Into<String>) -> Self {
        Self {
            name: StreamName::Stdout,
            text: text.into(),
        }
    }

    pub fn stderr(text: impl Into<String>) -> Self {
        Self {
            name: StreamName::Stderr,
            text: text.into(),
        }
    }
}

/// Output of one execution, in arrival order. The channel closes once the
/// kernel reports the execution finished.
pub type OutputReceiver = mpsc::UnboundedReceiver<OutputFragment>;

/// A running kernel that can execute arbitrary source.
pub trait ExecutionSession: Send + Sync {
    /// Language name as reported by the kernel (e.g. `python`).
    fn language(&self) -> &str;

    fn execute(&self, code: String) -> BoxFuture<'_, Result<OutputReceiver>>;
}

/// Pending executions by `execute_request` msg_id.
type Routes = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<OutputFragment>>>>;

/// A Jupyter kernel reached through its connection file.
///
/// One iopub subscription lives as long as the session. A background task
/// routes `stream` output to the execution whose request it answers, so
/// output published right after a request is sent is never missed.
pub struct KernelSession {
    shell: tokio::sync::Mutex<ClientShellConnection>,
    routes: Routes,
    language: String,
    iopub_task: JoinHandle<()>,
}

impl KernelSession {
    pub async fn from_connection_file(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let connection_info: ConnectionInfo = serde_json::from_str(&contents)?;
        Self::connect(connection_info).await
    }

    /// Subscribe to iopub, then verify the kernel is alive with a
    /// kernel_info handshake, which also tells us the kernel's language.
    pub async fn connect(connection_info: ConnectionInfo) -> Result<Self> {
        let session_id = Uuid::new_v4().to_string();

        let mut iopub =
            runtimelib::create_client_iopub_connection(&connection_info, "", &session_id).await?;

        let identity = runtimelib::peer_identity_for_session(&session_id)?;
        let mut shell = runtimelib::create_client_shell_connection_with_identity(
            &connection_info,
            &session_id,
            identity,
        )
        .await?;

        let request: JupyterMessage = KernelInfoRequest::default().into();
        shell.send(request).await?;

        let reply = match tokio::time::timeout(KERNEL_INFO_TIMEOUT, shell.read()).await {
            Ok(Ok(msg)) => msg,
            Ok(Err(e)) => {
                error!("[llm-client] Error reading kernel_info_reply: {}", e);
                return Err(anyhow::anyhow!("Kernel did not respond: {}", e));
            }
            Err(_) => {
                error!("[llm-client] Timeout waiting for kernel_info_reply");
                return Err(anyhow::anyhow!("Kernel did not respond within 30s"));
            }
        };

        let language = match &reply.content {
            JupyterMessageContent::KernelInfoReply(info) => info.language_info.name.clone(),
            _ => anyhow::bail!(
                "Expected kernel_info_reply, got {}",
                reply.header.msg_type
            ),
        };

        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));
        let task_routes = routes.clone();
        let iopub_task = tokio::spawn(async move {
            while let Ok(message) = iopub.read().await {
                let Some(parent_id) = message.parent_header.as_ref().map(|h| h.msg_id.clone())
                else {
                    continue;
                };
                debug!(
                    "[llm-client] iopub: type={} parent={}",
                    message.header.msg_type, parent_id
                );
                route_output(&task_routes, &parent_id, message.content);
            }
            error!("[llm-client] iopub connection closed");
            // Dropping the senders closes every pending execution's channel.
            if let Ok(mut routes) = task_routes.lock() {
                routes.clear();
            }
        });

        info!("[llm-client] Connected to {} kernel", language);
        Ok(Self {
            shell: tokio::sync::Mutex::new(shell),
            routes,
            language,
            iopub_task,
        })
    }

    async fn run(&self, code: String) -> Result<OutputReceiver> {
        let message: JupyterMessage = ExecuteRequest::new(code).into();
        let msg_id = message.header.msg_id.clone();

        // Register before sending so the router knows where output goes.
        let (tx, rx) = mpsc::unbounded_channel();
        match self.routes.lock() {
            Ok(mut routes) => {
                routes.insert(msg_id.clone(), tx);
            }
            Err(_) => anyhow::bail!("Kernel output routes are poisoned"),
        }

        let sent = self.shell.lock().await.send(message).await;
        if let Err(e) = sent {
            if let Ok(mut routes) = self.routes.lock() {
                routes.remove(&msg_id);
            }
            return Err(e.into());
        }

        info!("[llm-client] Sent execute_request: msg_id={}", msg_id);
        Ok(rx)
    }
}

impl Drop for KernelSession {
    fn drop(&mut self) {
        self.iopub_task.abort();
    }
}

/// Forward one iopub message to the execution it belongs to. An `idle`
/// status ends that execution and closes its channel.
fn route_output(
    routes: &Mutex<HashMap<String, mpsc::UnboundedSender<OutputFragment>>>,
    parent_id: &str,
    content: JupyterMessageContent,
) {
    let Ok(mut routes) = routes.lock() else {
        return;
    };
    match content {
        JupyterMessageContent::StreamContent(stream) => {
            let name = match stream.name {
                Stdio::Stdout => StreamName::Stdout,
                Stdio::Stderr => StreamName::Stderr,
            };
            let fragment = OutputFragment {
                name,
                text: stream.text,
            };
            let delivered = routes
                .get(parent_id)
                .map(|tx| tx.send(fragment).is_ok());
            if delivered == Some(false) {
                routes.remove(parent_id);
            }
        }
        JupyterMessageContent::Status(Status { execution_state })
            if execution_state == ExecutionState::Idle =>
        {
            routes.remove(parent_id);
        }
        _ => {}
    }
}

impl ExecutionSession for KernelSession {
    fn language(&self) -> &str {
        &self.language
    }

    fn execute(&self, code: String) -> BoxFuture<'_, Result<OutputReceiver>> {
        Box::pin(self.run(code))
    }
}
