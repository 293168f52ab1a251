//! Key events handed to modules through `mosaic.next_key`, as JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub struct KeyModifiers {
    pub bits: u8,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum KeyCode {
    Backspace,
    Enter,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    Tab,
    BackTab,
    Delete,
    Insert,
    F(u8),
    Char(char),
    Null,
    Esc,
}

impl KeyEvent {
    pub fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::default(),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl TryFrom<crossterm::event::KeyEvent> for KeyEvent {
    type Error = crossterm::event::KeyCode;

    fn try_from(event: crossterm::event::KeyEvent) -> Result<Self, Self::Error> {
        use crossterm::event::KeyCode as Ct;

        let code = match event.code {
            Ct::Backspace => KeyCode::Backspace,
            Ct::Enter => KeyCode::Enter,
            Ct::Left => KeyCode::Left,
            Ct::Right => KeyCode::Right,
            Ct::Up => KeyCode::Up,
            Ct::Down => KeyCode::Down,
            Ct::Home => KeyCode::Home,
            Ct::End => KeyCode::End,
            Ct::PageUp => KeyCode::PageUp,
            Ct::PageDown => KeyCode::PageDown,
            Ct::Tab => KeyCode::Tab,
            Ct::BackTab => KeyCode::BackTab,
            Ct::Delete => KeyCode::Delete,
            Ct::Insert => KeyCode::Insert,
            Ct::F(n) => KeyCode::F(n),
            Ct::Char(c) => KeyCode::Char(c),
            Ct::Null => KeyCode::Null,
            Ct::Esc => KeyCode::Esc,
            other => return Err(other),
        };

        Ok(Self {
            code,
            modifiers: KeyModifiers {
                bits: event.modifiers.bits(),
            },
        })
    }
}
