//! Shared text document replica.

use serde::{Deserialize, Serialize};

/// Per-client copy of the shared text content and style flags.
///
/// Logically there is one document; physically every connected peer holds a
/// replica kept consistent by relayed events. All updates are unconditional
/// last-writer-wins: after quiescence every replica is identical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    /// Full text content. Replaced wholesale on every edit, never diffed.
    pub content: String,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl DocumentState {
    /// Create an empty document with all style flags off.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the text content.
    pub fn set_content(&mut self, content: String) {
        self.content = content;
    }

    pub fn set_bold(&mut self, value: bool) {
        self.bold = value;
    }

    pub fn set_italic(&mut self, value: bool) {
        self.italic = value;
    }

    pub fn set_underline(&mut self, value: bool) {
        self.underline = value;
    }
}
