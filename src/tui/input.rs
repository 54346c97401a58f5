use crossterm::event::{KeyCode, KeyEvent};

use crate::editor::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Move(Direction),
    NextNode,
    Activate,
    Cancel,
    EditField(Field),
    EditText,
    Export,
    Import,
    Save,
    ToggleHelp,
    Quit,
    SubmitText,
    Backspace,
    InputChar(char),
    Noop,
}

pub fn action_for_key(key: KeyEvent, text_mode: bool) -> Action {
    if text_mode {
        return match key.code {
            KeyCode::Enter => Action::SubmitText,
            KeyCode::Esc => Action::Cancel,
            KeyCode::Backspace => Action::Backspace,
            KeyCode::Left => Action::Move(Direction::Left),
            KeyCode::Right => Action::Move(Direction::Right),
            KeyCode::Char(c) => Action::InputChar(c),
            _ => Action::Noop,
        };
    }

    match key.code {
        KeyCode::Up => Action::Move(Direction::Up),
        KeyCode::Down => Action::Move(Direction::Down),
        KeyCode::Left => Action::Move(Direction::Left),
        KeyCode::Right => Action::Move(Direction::Right),
        KeyCode::Tab => Action::NextNode,
        KeyCode::Enter | KeyCode::Char(' ') => Action::Activate,
        KeyCode::Esc => Action::Cancel,
        KeyCode::Char('h') => Action::Move(Direction::Left),
        KeyCode::Char('j') => Action::Move(Direction::Down),
        KeyCode::Char('k') => Action::Move(Direction::Up),
        KeyCode::Char('l') => Action::Move(Direction::Right),
        KeyCode::Char('n') => Action::EditField(Field::FullName),
        KeyCode::Char('e') => Action::EditField(Field::Economy),
        KeyCode::Char('g') => Action::EditField(Field::Guard),
        KeyCode::Char('E') => Action::EditText,
        KeyCode::Char('x') => Action::Export,
        KeyCode::Char('i') => Action::Import,
        KeyCode::Char('s') => Action::Save,
        KeyCode::Char('?') => Action::ToggleHelp,
        KeyCode::Char('q') => Action::Quit,
        _ => Action::Noop,
    }
}
