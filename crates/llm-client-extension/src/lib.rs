//! llm-client-extension - Registers the LLM client panel with a notebook host.
//!
//! Activation attaches the panel to the shell's left sidebar and adds an
//! "Open LLM Client" command to the command palette that re-attaches and
//! focuses the panel.

use log::{info, warn};
use std::collections::HashMap;

use llm_client::{KeyValueStore, LlmPanel};

pub const PLUGIN_ID: &str = "llm-client-extension:plugin";
pub const PANEL_ID: &str = "llm-client-extension";
pub const PANEL_CAPTION: &str = "LLM Client";

// Command palette entry
pub const COMMAND_OPEN: &str = "llm-client:open";
pub const COMMAND_OPEN_LABEL: &str = "Open LLM Client";
pub const PALETTE_CATEGORY: &str = "LLM Client";

/// Sidebar rank of the panel. Lower ranks sit higher in the sidebar.
pub const PANEL_RANK: u32 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShellArea {
    Left,
    Right,
    Main,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetTitle {
    pub caption: String,
    pub closable: bool,
}

impl WidgetTitle {
    pub fn panel() -> Self {
        Self {
            caption: PANEL_CAPTION.to_string(),
            closable: true,
        }
    }
}

/// The host's layout: where widgets live and which one has focus.
pub trait Shell {
    fn add(&mut self, id: &str, title: WidgetTitle, area: ShellArea, rank: u32);
    fn activate_by_id(&mut self, id: &str);
    fn is_attached(&self, id: &str) -> bool;
    fn close(&mut self, id: &str);
}

#[derive(Debug, Clone)]
struct DockedWidget {
    id: String,
    title: WidgetTitle,
    rank: u32,
}

/// A shell with one rank-ordered dock per area.
#[derive(Debug, Default)]
pub struct DockShell {
    areas: HashMap<ShellArea, Vec<DockedWidget>>,
    active: Option<String>,
}

impl DockShell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Widget ids in `area`, in display order.
    pub fn widgets_in(&self, area: ShellArea) -> Vec<&str> {
        self.areas
            .get(&area)
            .map(|widgets| widgets.iter().map(|w| w.id.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn title(&self, id: &str) -> Option<&WidgetTitle> {
        self.areas
            .values()
            .flatten()
            .find(|w| w.id == id)
            .map(|w| &w.title)
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }
}

impl Shell for DockShell {
    fn add(&mut self, id: &str, title: WidgetTitle, area: ShellArea, rank: u32) {
        if self.is_attached(id) {
            self.close(id);
        }
        let widgets = self.areas.entry(area).or_default();
        // Equal ranks keep insertion order.
        let pos = widgets
            .iter()
            .position(|w| w.rank > rank)
            .unwrap_or(widgets.len());
        widgets.insert(
            pos,
            DockedWidget {
                id: id.to_string(),
                title,
                rank,
            },
        );
    }

    fn activate_by_id(&mut self, id: &str) {
        if self.is_attached(id) {
            self.active = Some(id.to_string());
        } else {
            warn!("[llm-client-extension] Cannot activate unknown widget {}", id);
        }
    }

    fn is_attached(&self, id: &str) -> bool {
        self.areas.values().flatten().any(|w| w.id == id)
    }

    fn close(&mut self, id: &str) {
        for widgets in self.areas.values_mut() {
            widgets.retain(|w| w.id != id);
        }
        if self.active.as_deref() == Some(id) {
            self.active = None;
        }
    }
}

pub type CommandHandler = Box<dyn Fn(&mut dyn Shell) + Send + Sync>;

struct Command {
    label: String,
    handler: CommandHandler,
}

#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Command>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_command(&mut self, id: &str, label: &str, handler: CommandHandler) {
        let previous = self.commands.insert(
            id.to_string(),
            Command {
                label: label.to_string(),
                handler,
            },
        );
        if previous.is_some() {
            warn!("[llm-client-extension] Command {} was already registered, replacing", id);
        }
    }

    /// Run a command. Returns false if no command has that id.
    pub fn execute(&self, id: &str, shell: &mut dyn Shell) -> bool {
        match self.commands.get(id) {
            Some(command) => {
                (command.handler)(shell);
                true
            }
            None => false,
        }
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.commands.get(id).map(|c| c.label.as_str())
    }

    pub fn has_command(&self, id: &str) -> bool {
        self.commands.contains_key(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteItem {
    pub command: String,
    pub category: String,
}

#[derive(Debug, Default)]
pub struct CommandPalette {
    items: Vec<PaletteItem>,
}

impl CommandPalette {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&mut self, command: &str, category: &str) {
        self.items.push(PaletteItem {
            command: command.to_string(),
            category: category.to_string(),
        });
    }

    pub fn items_in(&self, category: &str) -> Vec<&str> {
        self.items
            .iter()
            .filter(|item| item.category == category)
            .map(|item| item.command.as_str())
            .collect()
    }
}

/// The host services a plugin can register with.
pub struct Application<S: Shell> {
    pub shell: S,
    pub commands: CommandRegistry,
    pub palette: CommandPalette,
}

impl<S: Shell> Application<S> {
    pub fn new(shell: S) -> Self {
        Self {
            shell,
            commands: CommandRegistry::new(),
            palette: CommandPalette::new(),
        }
    }

    pub fn execute(&mut self, command: &str) -> bool {
        self.commands.execute(command, &mut self.shell)
    }
}

fn attach_panel(shell: &mut dyn Shell) {
    shell.add(PANEL_ID, WidgetTitle::panel(), ShellArea::Left, PANEL_RANK);
}

/// Attach the panel to the left sidebar and register the open command.
pub fn activate<S: Shell>(
    app: &mut Application<S>,
    store: Box<dyn KeyValueStore + Send>,
) -> LlmPanel {
    info!("[llm-client-extension] {} activated", PLUGIN_ID);

    let panel = LlmPanel::new(store);
    attach_panel(&mut app.shell);

    app.commands.add_command(
        COMMAND_OPEN,
        COMMAND_OPEN_LABEL,
        Box::new(|shell: &mut dyn Shell| {
            if !shell.is_attached(PANEL_ID) {
                attach_panel(shell);
            }
            shell.activate_by_id(PANEL_ID);
        }),
    );
    app.palette.add_item(COMMAND_OPEN, PALETTE_CATEGORY);

    panel
}
