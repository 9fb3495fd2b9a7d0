//! llm-client - A notebook sidebar panel for OpenAI-compatible LLM endpoints.
//!
//! The panel sends a prompt either directly to a `/v1/chat/completions`
//! endpoint (streaming over Server-Sent Events) or through the focused
//! notebook's Jupyter kernel, renders the reply as lightweight markdown and
//! can insert the reply into the active cell.
//!
//! The host application is reached only through the capability traits in
//! [`host`], so the panel can be embedded in any shell that can provide a
//! focused document, an active cell and an execution session.

pub mod capture;
pub mod client;
pub mod error;
pub mod host;
pub mod kernel;
pub mod markdown;
pub mod notebook_state;
pub mod panel;
pub mod request;
pub mod runtime;
pub mod settings;
pub mod snippet;
pub mod sse;
pub mod status;

pub use error::PanelError;
pub use panel::{LlmPanel, PanelAction, RequestMode};
pub use runtime::Runtime;
pub use settings::{ConnectionSettings, FileStore, KeyValueStore, MemoryStore};
