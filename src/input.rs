//! Key bindings: WASD and arrows.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Action from a key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    MoveLeft,
    MoveRight,
    Rotate,
    AccelerateOn,
    AccelerateOff,
    Restart,
    Quit,
    None,
}

/// Map key event to game action.
///
/// Accelerate follows the key: press and repeat hold it, release lets go.
/// Everything else fires once per press; repeats and releases are ignored.
pub fn key_to_action(key: KeyEvent) -> Action {
    let KeyEvent {
        code,
        modifiers,
        kind,
        ..
    } = key;
    if modifiers == KeyModifiers::CONTROL && code == KeyCode::Char('c') {
        return Action::Quit;
    }
    let no_mod = modifiers.is_empty() || modifiers == KeyModifiers::SHIFT;
    if !no_mod {
        return Action::None;
    }
    if is_accelerate(code) {
        return match kind {
            KeyEventKind::Release => Action::AccelerateOff,
            KeyEventKind::Press | KeyEventKind::Repeat => Action::AccelerateOn,
        };
    }
    if kind != KeyEventKind::Press {
        return Action::None;
    }
    match code {
        KeyCode::Char('a' | 'A') | KeyCode::Left => Action::MoveLeft,
        KeyCode::Char('d' | 'D') | KeyCode::Right => Action::MoveRight,
        KeyCode::Char('s' | 'S') | KeyCode::Down => Action::Rotate,
        KeyCode::Char('r' | 'R') => Action::Restart,
        KeyCode::Char('q' | 'Q') | KeyCode::Esc => Action::Quit,
        _ => Action::None,
    }
}

fn is_accelerate(code: KeyCode) -> bool {
    matches!(code, KeyCode::Char('w' | 'W') | KeyCode::Up)
}
