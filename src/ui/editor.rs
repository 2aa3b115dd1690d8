use crate::runtime::{ScrollAction, UserInputEvent};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

const PAGE_LINES: usize = 10;
const HISTORY_LIMIT: usize = 500;

/// Single-line command editor with shell-style history.
///
/// Keys that act on the block view rather than the line being edited are
/// translated into [`UserInputEvent`]s; everything else edits in place.
#[derive(Debug, Default)]
pub struct CommandLine {
    buffer: String,
    cursor: usize,
    history: Vec<String>,
    history_index: Option<usize>,
    history_stash: Option<String>,
}

impl CommandLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Byte offset of the cursor, always on a char boundary.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn apply_event(&mut self, event: Event) -> Option<UserInputEvent> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.apply_key(key),
            Event::Paste(text) => {
                // Pasted newlines would submit half a command.
                let flattened = text.replace(['\r', '\n'], " ");
                self.insert_str(flattened.trim_end());
                None
            }
            _ => None,
        }
    }

    pub fn apply_key(&mut self, key: KeyEvent) -> Option<UserInputEvent> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char('c') if ctrl => return Some(UserInputEvent::Interrupt),
            KeyCode::Char('f') if ctrl => return Some(UserInputEvent::ToggleSearch),
            KeyCode::Char('o') if ctrl => return Some(UserInputEvent::ToggleBlockCollapse),
            KeyCode::Char('x') if ctrl => return Some(UserInputEvent::ToggleOutputCollapse),
            KeyCode::Char('d') if ctrl && self.buffer.is_empty() => {
                return Some(UserInputEvent::Submit(":quit".to_string()));
            }
            KeyCode::Char('a') if ctrl => self.cursor = 0,
            KeyCode::Char('e') if ctrl => self.cursor = self.buffer.len(),
            KeyCode::Char('u') if ctrl => {
                self.buffer.replace_range(..self.cursor, "");
                self.cursor = 0;
            }
            KeyCode::Char('p') if ctrl => self.history_up(),
            KeyCode::Char('n') if ctrl => self.history_down(),
            KeyCode::Enter => return self.submit().map(UserInputEvent::Submit),
            KeyCode::Tab => return Some(UserInputEvent::SelectBlock(1)),
            KeyCode::BackTab => return Some(UserInputEvent::SelectBlock(-1)),
            KeyCode::Up => return Some(UserInputEvent::Scroll(ScrollAction::LineUp)),
            KeyCode::Down => return Some(UserInputEvent::Scroll(ScrollAction::LineDown)),
            KeyCode::PageUp => {
                return Some(UserInputEvent::Scroll(ScrollAction::PageUp(PAGE_LINES)));
            }
            KeyCode::PageDown => {
                return Some(UserInputEvent::Scroll(ScrollAction::PageDown(PAGE_LINES)));
            }
            KeyCode::Home if ctrl => return Some(UserInputEvent::Scroll(ScrollAction::Home)),
            KeyCode::End => return Some(UserInputEvent::Scroll(ScrollAction::End)),
            KeyCode::Home => self.cursor = 0,
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Left => self.cursor = self.prev_char_boundary(self.cursor),
            KeyCode::Right => self.cursor = self.next_char_boundary(self.cursor),
            KeyCode::Char(ch) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                let mut encoded = [0u8; 4];
                self.insert_str(ch.encode_utf8(&mut encoded));
            }
            _ => {}
        }
        None
    }

    pub fn insert_str(&mut self, value: &str) {
        self.history_index = None;
        self.history_stash = None;
        self.buffer.insert_str(self.cursor, value);
        self.cursor += value.len();
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = self.prev_char_boundary(self.cursor);
        self.buffer.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    fn delete(&mut self) {
        if self.cursor >= self.buffer.len() {
            return;
        }
        let end = self.next_char_boundary(self.cursor);
        self.buffer.replace_range(self.cursor..end, "");
    }

    fn submit(&mut self) -> Option<String> {
        let value = self.buffer.trim().to_string();
        self.buffer.clear();
        self.cursor = 0;
        self.history_index = None;
        self.history_stash = None;
        if value.is_empty() {
            return None;
        }
        if self.history.last() != Some(&value) {
            self.history.push(value.clone());
            if self.history.len() > HISTORY_LIMIT {
                self.history.remove(0);
            }
        }
        Some(value)
    }

    fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let next = match self.history_index {
            Some(index) => index.saturating_sub(1),
            None => {
                self.history_stash = Some(self.buffer.clone());
                self.history.len() - 1
            }
        };
        self.show_history(next);
    }

    fn history_down(&mut self) {
        let Some(index) = self.history_index else {
            return;
        };
        if index + 1 < self.history.len() {
            self.show_history(index + 1);
            return;
        }
        self.history_index = None;
        self.buffer = self.history_stash.take().unwrap_or_default();
        self.cursor = self.buffer.len();
    }

    fn show_history(&mut self, index: usize) {
        self.history_index = Some(index);
        self.buffer = self.history[index].clone();
        self.cursor = self.buffer.len();
    }

    fn prev_char_boundary(&self, index: usize) -> usize {
        self.buffer[..index]
            .char_indices()
            .next_back()
            .map_or(0, |(start, _)| start)
    }

    fn next_char_boundary(&self, index: usize) -> usize {
        self.buffer[index..]
            .chars()
            .next()
            .map_or(self.buffer.len(), |ch| index + ch.len_utf8())
    }
}
