//! nbformat-backed notebook documents and a workspace that hosts them.

use anyhow::Result;
use nbformat::v4::{Cell, CellId, CellMetadata, Notebook};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::host::{ActiveCell, ActiveDocument, Clipboard, NotebookHost, SelectionEditor, TextModel};
use crate::kernel::ExecutionSession;

/// Convert source string back to nbformat's Vec<String> (lines with newlines).
fn source_to_lines(source: &str) -> Vec<String> {
    if source.is_empty() {
        return Vec::new();
    }
    source.split_inclusive('\n').map(|s| s.to_string()).collect()
}

fn empty_cell_metadata() -> CellMetadata {
    CellMetadata {
        id: None,
        collapsed: None,
        scrolled: None,
        deletable: None,
        editable: None,
        format: None,
        name: None,
        tags: None,
        jupyter: None,
        execution: None,
        additional: HashMap::new(),
    }
}

/// An open notebook with a focused cell and an optional kernel session.
///
/// The document doubles as the handle for its focused cell: text edits made
/// through [`ActiveCell`] go to that cell and mark the document dirty.
pub struct NotebookDocument {
    pub notebook: Notebook,
    pub path: Option<PathBuf>,
    pub dirty: bool,
    active_cell: Option<usize>,
    session: Option<Arc<dyn ExecutionSession>>,
}

impl NotebookDocument {
    pub fn new_empty() -> Self {
        let notebook = Notebook {
            metadata: nbformat::v4::Metadata {
                kernelspec: None,
                language_info: None,
                authors: None,
                additional: HashMap::new(),
            },
            nbformat: 4,
            nbformat_minor: 5,
            cells: vec![Cell::Code {
                id: CellId::from(Uuid::new_v4()),
                metadata: empty_cell_metadata(),
                execution_count: None,
                source: Vec::new(),
                outputs: Vec::new(),
            }],
        };
        Self::from_notebook(notebook, None)
    }

    /// Wrap a notebook, focusing its first cell if it has one.
    pub fn from_notebook(notebook: Notebook, path: Option<PathBuf>) -> Self {
        let active_cell = if notebook.cells.is_empty() {
            None
        } else {
            Some(0)
        };
        NotebookDocument {
            notebook,
            path,
            dirty: false,
            active_cell,
            session: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let nb = nbformat::parse_notebook(&content).map_err(|e| anyhow::anyhow!("{}", e))?;
        let notebook = match nb {
            nbformat::Notebook::V4(nb) => nb,
            nbformat::Notebook::Legacy(legacy) => nbformat::upgrade_legacy_notebook(legacy)?,
        };
        Ok(Self::from_notebook(notebook, Some(path.to_path_buf())))
    }

    /// Write the notebook back to its path and clear the dirty flag.
    pub fn save(&mut self) -> Result<()> {
        let path = self
            .path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Notebook has no path"))?;
        std::fs::write(path, self.serialize()?)?;
        self.dirty = false;
        Ok(())
    }

    pub fn serialize(&self) -> Result<String> {
        let nb = nbformat::Notebook::V4(self.notebook.clone());
        nbformat::serialize_notebook(&nb).map_err(|e| anyhow::anyhow!("{}", e))
    }

    pub fn attach_session(&mut self, session: Arc<dyn ExecutionSession>) {
        self.session = Some(session);
    }

    pub fn detach_session(&mut self) {
        self.session = None;
    }

    pub fn find_cell_index(&self, cell_id: &str) -> Option<usize> {
        self.notebook
            .cells
            .iter()
            .position(|c| c.id().as_str() == cell_id)
    }

    /// Focus a cell by id. Returns false if no such cell exists.
    pub fn focus_cell(&mut self, cell_id: &str) -> bool {
        match self.find_cell_index(cell_id) {
            Some(idx) => {
                self.active_cell = Some(idx);
                true
            }
            None => false,
        }
    }

    pub fn focus_cell_at(&mut self, idx: usize) -> bool {
        if idx < self.notebook.cells.len() {
            self.active_cell = Some(idx);
            true
        } else {
            false
        }
    }

    pub fn blur_cell(&mut self) {
        self.active_cell = None;
    }

    pub fn active_cell_id(&self) -> Option<String> {
        self.active_cell
            .and_then(|idx| self.notebook.cells.get(idx))
            .map(|cell| cell.id().to_string())
    }

    pub fn get_cell_source(&self, cell_id: &str) -> Option<String> {
        self.find_cell_index(cell_id)
            .map(|idx| self.notebook.cells[idx].source().join(""))
    }

    pub fn update_cell_source(&mut self, cell_id: &str, source: &str) {
        if let Some(idx) = self.find_cell_index(cell_id) {
            self.set_source_at(idx, source);
        }
    }

    fn set_source_at(&mut self, idx: usize, source: &str) {
        let lines = source_to_lines(source);
        match &mut self.notebook.cells[idx] {
            Cell::Code {
                source: ref mut s, ..
            } => *s = lines,
            Cell::Markdown {
                source: ref mut s, ..
            } => *s = lines,
            Cell::Raw {
                source: ref mut s, ..
            } => *s = lines,
        }
        self.dirty = true;
    }

    fn active_index(&self) -> Option<usize> {
        self.active_cell
            .filter(|idx| *idx < self.notebook.cells.len())
    }
}

impl ActiveDocument for NotebookDocument {
    fn session(&self) -> Option<Arc<dyn ExecutionSession>> {
        self.session.clone()
    }

    fn active_cell(&mut self) -> Option<&mut dyn ActiveCell> {
        self.active_index()?;
        Some(self)
    }
}

impl ActiveCell for NotebookDocument {
    fn text_model(&mut self) -> Option<&mut dyn TextModel> {
        self.active_index()?;
        Some(self)
    }

    fn selection_editor(&mut self) -> Option<&mut dyn SelectionEditor> {
        None
    }
}

impl TextModel for NotebookDocument {
    fn text(&self) -> String {
        self.active_index()
            .map(|idx| self.notebook.cells[idx].source().join(""))
            .unwrap_or_default()
    }

    fn set_text(&mut self, text: &str) {
        if let Some(idx) = self.active_index() {
            self.set_source_at(idx, text);
        }
    }
}

/// Open notebooks plus which one has focus.
#[derive(Default)]
pub struct Workspace {
    documents: Vec<NotebookDocument>,
    focused: Option<usize>,
    clipboard: Option<Box<dyn Clipboard + Send>>,
}

impl Workspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document and give it focus. Returns its index.
    pub fn open(&mut self, document: NotebookDocument) -> usize {
        self.documents.push(document);
        let idx = self.documents.len() - 1;
        self.focused = Some(idx);
        idx
    }

    pub fn focus(&mut self, idx: usize) -> bool {
        if idx < self.documents.len() {
            self.focused = Some(idx);
            true
        } else {
            false
        }
    }

    /// Move focus away from every notebook (e.g. to a terminal or launcher).
    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn document(&self, idx: usize) -> Option<&NotebookDocument> {
        self.documents.get(idx)
    }

    pub fn document_mut(&mut self, idx: usize) -> Option<&mut NotebookDocument> {
        self.documents.get_mut(idx)
    }

    pub fn set_clipboard(&mut self, clipboard: Box<dyn Clipboard + Send>) {
        self.clipboard = Some(clipboard);
    }
}

impl NotebookHost for Workspace {
    fn active_document(&mut self) -> Option<&mut dyn ActiveDocument> {
        let idx = self.focused?;
        self.documents
            .get_mut(idx)
            .map(|doc| doc as &mut dyn ActiveDocument)
    }

    fn clipboard(&mut self) -> Option<&mut dyn Clipboard> {
        self.clipboard
            .as_mut()
            .map(|clipboard| &mut **clipboard as &mut dyn Clipboard)
    }
}
