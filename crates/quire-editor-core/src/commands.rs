//! Selection commands and the registry that names them.
//!
//! A command receives the selected text and returns its replacement. The
//! registry is populated once at startup and looked up by capability name
//! when the host activates a command (toolbar button, key binding, ...).

use std::collections::BTreeMap;

use smol_str::SmolStr;
use thiserror::Error;

use crate::document::PlainEditor;
use crate::text::TextBuffer;

/// Errors raised when activating a command.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("no command registered as `{0}`")]
    Unknown(SmolStr),
}

/// Transforms a selection into its replacement text.
pub trait SelectionCommand: Send + Sync {
    fn on_activate(&self, selection: &str) -> String;
}

impl<F> SelectionCommand for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn on_activate(&self, selection: &str) -> String {
        self(selection)
    }
}

/// Capability name → command handler.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<SmolStr, Box<dyn SelectionCommand>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the built-in formatting commands.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("bold-italic", toggle_bold_italic);
        registry.register("bold", |s: &str| wrap_lines(s, "**"));
        registry.register("italic", |s: &str| wrap_lines(s, "*"));
        registry.register("strikethrough", |s: &str| wrap_lines(s, "~~"));
        registry.register("inline-code", |s: &str| format!("`{s}`"));
        registry
    }

    /// Register a command, returning the one it replaced.
    pub fn register(
        &mut self,
        name: impl Into<SmolStr>,
        command: impl SelectionCommand + 'static,
    ) -> Option<Box<dyn SelectionCommand>> {
        self.commands.insert(name.into(), Box::new(command))
    }

    pub fn get(&self, name: &str) -> Option<&dyn SelectionCommand> {
        self.commands.get(name).map(|c| c.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(|k| k.as_str())
    }

    /// Run `name` against the editor's selection.
    ///
    /// With no selection the word under the cursor is used. The replacement
    /// is left selected.
    pub fn activate<T: TextBuffer>(
        &self,
        name: &str,
        editor: &mut PlainEditor<T>,
    ) -> Result<(), CommandError> {
        let command = self
            .get(name)
            .ok_or_else(|| CommandError::Unknown(name.into()))?;

        let range = match editor.selection().filter(|s| !s.is_collapsed()) {
            Some(sel) => sel.to_range(),
            None => {
                let (start, end) = word_bounds(editor, editor.cursor_offset());
                start..end
            }
        };
        let selected = editor.slice(range.clone()).unwrap_or_default();
        let replacement = command.on_activate(&selected);

        tracing::debug!(command = name, start = range.start, end = range.end, "activating command");
        editor.replace(range, &replacement);
        Ok(())
    }
}

const BOLD_ITALIC: &str = "***";

/// Wrap every line in `***`, or unwrap if the selection is already wrapped.
pub fn toggle_bold_italic(selection: &str) -> String {
    let trimmed = selection.trim_start();
    let already_wrapped = trimmed.len() > BOLD_ITALIC.len()
        && trimmed.starts_with(BOLD_ITALIC)
        && trimmed[BOLD_ITALIC.len()..].contains(BOLD_ITALIC);

    if already_wrapped {
        selection
            .split('\n')
            .map(|line| {
                let inner = line.trim();
                inner
                    .strip_prefix(BOLD_ITALIC)
                    .and_then(|l| l.strip_suffix(BOLD_ITALIC))
                    .filter(|l| !l.is_empty())
                    .unwrap_or(line)
            })
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        wrap_lines(selection, BOLD_ITALIC)
    }
}

/// Wrap each non-empty line of `text` in `marker`.
pub fn wrap_lines(text: &str, marker: &str) -> String {
    if text.is_empty() {
        return format!("{marker}{marker}");
    }
    text.split('\n')
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("{marker}{line}{marker}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn word_bounds<T: TextBuffer>(editor: &PlainEditor<T>, offset: usize) -> (usize, usize) {
    let len = editor.len_chars();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    let mut start = offset.min(len);
    while start > 0 && editor.char_at(start - 1).is_some_and(is_word) {
        start -= 1;
    }
    let mut end = offset.min(len);
    while end < len && editor.char_at(end).is_some_and(is_word) {
        end += 1;
    }
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocumentStore;
    use crate::types::Selection;

    #[test]
    fn test_toggle_bold_italic_wraps_each_line() {
        assert_eq!(toggle_bold_italic("one\ntwo"), "***one***\n***two***");
        assert_eq!(toggle_bold_italic("one\n\ntwo"), "***one***\n\n***two***");
    }

    #[test]
    fn test_toggle_bold_italic_unwraps() {
        assert_eq!(toggle_bold_italic("***one***"), "one");
        assert_eq!(toggle_bold_italic("***one***\n***two***"), "one\ntwo");
    }

    #[test]
    fn test_activate_on_selection() {
        let registry = CommandRegistry::with_builtins();
        let mut editor = PlainEditor::from_text("hello world");
        editor.set_selection(Some(Selection::new(6, 11)));

        registry.activate("bold", &mut editor).unwrap();
        assert_eq!(editor.text(), "hello **world**");
        assert_eq!(editor.selected_text().as_deref(), Some("**world**"));
    }

    #[test]
    fn test_activate_uses_word_under_cursor() {
        let registry = CommandRegistry::with_builtins();
        let mut editor = PlainEditor::from_text("hello world");
        editor.set_cursor_offset(2);

        registry.activate("italic", &mut editor).unwrap();
        assert_eq!(editor.text(), "*hello* world");
    }

    #[test]
    fn test_activate_twice_toggles_back() {
        let registry = CommandRegistry::with_builtins();
        let mut editor = PlainEditor::from_text("plain");
        editor.set_selection(Some(Selection::new(0, 5)));

        registry.activate("bold-italic", &mut editor).unwrap();
        assert_eq!(editor.text(), "***plain***");
        registry.activate("bold-italic", &mut editor).unwrap();
        assert_eq!(editor.text(), "plain");
    }

    #[test]
    fn test_unknown_command() {
        let registry = CommandRegistry::new();
        let mut editor = PlainEditor::from_text("x");
        assert_eq!(
            registry.activate("nope", &mut editor),
            Err(CommandError::Unknown("nope".into()))
        );
    }

    #[test]
    fn test_register_closure_replaces() {
        let mut registry = CommandRegistry::with_builtins();
        let previous = registry.register("bold", |s: &str| s.to_uppercase());
        assert!(previous.is_some());
        assert_eq!(registry.get("bold").unwrap().on_activate("abc"), "ABC");
        assert!(registry.names().any(|n| n == "inline-code"));
    }
}
