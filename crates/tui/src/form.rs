use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::theme::Theme;

const MAX_FIELD_LEN: usize = 128;
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Render a timestamp in local time the way forms accept it.
pub fn format_local(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(DATETIME_FORMAT).to_string()
}

/// Parse `YYYY-MM-DD HH:MM` in local time.
pub fn parse_local(text: &str) -> Result<DateTime<Utc>, String> {
    let naive = NaiveDateTime::parse_from_str(text.trim(), DATETIME_FORMAT)
        .map_err(|_| format!("Use YYYY-MM-DD HH:MM, got '{}'", text.trim()))?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| format!("'{}' is not a valid local time", text.trim()))
}

/// Single-line text input with a cursor counted in characters.
#[derive(Debug, Clone)]
pub struct TextField {
    pub label: &'static str,
    input: String,
    cursor: usize,
    masked: bool,
}

impl TextField {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            input: String::new(),
            cursor: 0,
            masked: false,
        }
    }

    pub fn masked(label: &'static str) -> Self {
        Self {
            masked: true,
            ..Self::new(label)
        }
    }

    pub fn with_value(label: &'static str, value: impl Into<String>) -> Self {
        let mut field = Self::new(label);
        field.set(value);
        field
    }

    pub fn value(&self) -> &str {
        &self.input
    }

    pub fn trimmed(&self) -> &str {
        self.input.trim()
    }

    pub fn set(&mut self, value: impl Into<String>) {
        self.input = value.into();
        self.cursor = self.input.chars().count();
    }

    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor = 0;
    }

    fn len(&self) -> usize {
        self.input.chars().count()
    }

    fn byte_index(&self, cursor: usize) -> usize {
        self.input
            .char_indices()
            .nth(cursor)
            .map(|(idx, _)| idx)
            .unwrap_or(self.input.len())
    }

    fn move_cursor(&mut self, delta: isize) {
        let next = self.cursor as isize + delta;
        self.cursor = next.clamp(0, self.len() as isize) as usize;
    }

    fn insert(&mut self, ch: char) {
        if self.len() >= MAX_FIELD_LEN || ch.is_control() {
            return;
        }
        let at = self.byte_index(self.cursor);
        self.input.insert(at, ch);
        self.cursor += 1;
    }

    fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let at = self.byte_index(self.cursor);
            self.input.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor < self.len() {
            let at = self.byte_index(self.cursor);
            self.input.remove(at);
        }
    }

    /// Apply an editing key. Returns `false` if the key is not an editing key.
    pub fn handle_key(&mut self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Left => self.move_cursor(-1),
            KeyCode::Right => self.move_cursor(1),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.len(),
            KeyCode::Backspace => self.backspace(),
            KeyCode::Delete => self.delete(),
            KeyCode::Char(ch)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.insert(ch)
            }
            _ => return false,
        }
        true
    }

    fn display(&self) -> String {
        if self.masked {
            "•".repeat(self.len())
        } else {
            self.input.clone()
        }
    }
}

/// What a key did to a [`Form`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKey {
    Submit,
    Cancel,
    Handled,
    Ignored,
}

/// Vertical stack of text fields with one focused at a time.
#[derive(Debug, Clone)]
pub struct Form {
    pub fields: Vec<TextField>,
    pub focus: usize,
}

impl Form {
    pub fn new(fields: Vec<TextField>) -> Self {
        Self { fields, focus: 0 }
    }

    pub fn value(&self, idx: usize) -> &str {
        self.fields.get(idx).map(TextField::trimmed).unwrap_or("")
    }

    /// Raw value, used for passwords where surrounding spaces are significant.
    pub fn raw(&self, idx: usize) -> &str {
        self.fields.get(idx).map(TextField::value).unwrap_or("")
    }

    pub fn set(&mut self, idx: usize, value: impl Into<String>) {
        if let Some(field) = self.fields.get_mut(idx) {
            field.set(value);
        }
    }

    pub fn clear(&mut self) {
        self.fields.iter_mut().for_each(TextField::clear);
        self.focus = 0;
    }

    pub fn any_blank(&self) -> bool {
        self.fields.iter().any(|field| field.trimmed().is_empty())
    }

    fn step(&mut self, delta: isize) {
        if self.fields.is_empty() {
            return;
        }
        let len = self.fields.len() as isize;
        self.focus = (self.focus as isize + delta).rem_euclid(len) as usize;
    }

    pub fn handle_key(&mut self, key: &KeyEvent) -> FormKey {
        match key.code {
            KeyCode::Enter => FormKey::Submit,
            KeyCode::Esc => FormKey::Cancel,
            KeyCode::Tab | KeyCode::Down => {
                self.step(1);
                FormKey::Handled
            }
            KeyCode::BackTab | KeyCode::Up => {
                self.step(-1);
                FormKey::Handled
            }
            _ => {
                let handled = self
                    .fields
                    .get_mut(self.focus)
                    .is_some_and(|field| field.handle_key(key));
                if handled {
                    FormKey::Handled
                } else {
                    FormKey::Ignored
                }
            }
        }
    }

    /// Draw the form in `area` and place the terminal cursor on the focused field.
    pub fn render(&self, frame: &mut Frame, area: Rect, title: &str, theme: &Theme, focused: bool) {
        let label_width = self
            .fields
            .iter()
            .map(|field| field.label.chars().count())
            .max()
            .unwrap_or(0);

        let lines: Vec<Line> = self
            .fields
            .iter()
            .enumerate()
            .flat_map(|(idx, field)| {
                let active = focused && idx == self.focus;
                let marker = if active {
                    Span::styled("▶ ", Style::default().fg(theme.accent))
                } else {
                    Span::raw("  ")
                };
                let label_style = if active {
                    Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.muted)
                };
                [
                    Line::from(vec![
                        marker,
                        Span::styled(format!("{:<label_width$}  ", field.label), label_style),
                        Span::styled(field.display(), Style::default().fg(theme.primary_fg)),
                    ]),
                    Line::from(""),
                ]
            })
            .collect();

        let paragraph = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);

        if focused {
            if let Some(field) = self.fields.get(self.focus) {
                let offset = 2 + label_width + 2 + field.cursor;
                let x = (area.x + 1 + offset as u16).min(area.right().saturating_sub(2));
                let y = area.y + 1 + (self.focus as u16) * 2;
                if y < area.bottom().saturating_sub(1) {
                    frame.set_cursor(x, y);
                }
            }
        }
    }
}
