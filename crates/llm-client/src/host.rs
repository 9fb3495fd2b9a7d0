//! Capabilities the panel needs from its host application.
//!
//! Each step of the focused-document → active-cell → editor chain is an
//! explicit optional capability. A host implements only what it supports
//! and the panel degrades along the chain: direct text mutation, then
//! selection replacement, then the clipboard.

use anyhow::Result;
use std::sync::Arc;

use crate::kernel::ExecutionSession;

pub trait NotebookHost {
    /// The document that currently has focus, if it is a notebook.
    fn active_document(&mut self) -> Option<&mut dyn ActiveDocument>;

    fn clipboard(&mut self) -> Option<&mut dyn Clipboard>;
}

pub trait ActiveDocument {
    /// Execution session bound to this document, if a kernel is running.
    fn session(&self) -> Option<Arc<dyn ExecutionSession>>;

    fn active_cell(&mut self) -> Option<&mut dyn ActiveCell>;
}

pub trait ActiveCell {
    /// Direct access to the cell's source text.
    fn text_model(&mut self) -> Option<&mut dyn TextModel>;

    /// The cell's editor, for hosts that only expose selection edits.
    fn selection_editor(&mut self) -> Option<&mut dyn SelectionEditor>;
}

pub trait TextModel {
    fn text(&self) -> String;
    fn set_text(&mut self, text: &str);
}

pub trait SelectionEditor {
    /// Replace the current selection (or insert at the cursor).
    fn replace_selection(&mut self, text: &str) -> Result<()>;
}

pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// How a response ended up in (or near) the cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMethod {
    Appended,
    ReplacedSelection,
    CopiedToClipboard,
}

/// Append `text` to the cell model, separated by a newline when the cell
/// already has content.
pub fn append_to_model(model: &mut dyn TextModel, text: &str) {
    let current = model.text();
    if current.is_empty() {
        model.set_text(text);
    } else {
        model.set_text(&format!("{}\n{}", current, text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Source(String);

    impl TextModel for Source {
        fn text(&self) -> String {
            self.0.clone()
        }

        fn set_text(&mut self, text: &str) {
            self.0 = text.to_string();
        }
    }

    #[test]
    fn test_append_to_empty_model() {
        let mut model = Source::default();
        append_to_model(&mut model, "answer");
        assert_eq!(model.0, "answer");
    }

    #[test]
    fn test_append_to_non_empty_model_adds_separator() {
        let mut model = Source("x = 1".into());
        append_to_model(&mut model, "answer");
        assert_eq!(model.0, "x = 1\nanswer");
    }
}
