use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return;
  }

  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('t') {
    app.next_theme();
    return;
  }

  match app.mode {
    AppMode::Input => handle_input_key(app, key),
    AppMode::Results => handle_results_key(app, key),
    AppMode::Detail => handle_detail_key(app, key),
  }
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Enter => {
      app.trigger_search();
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.input.clear();
        app.cursor_position = 0;
        app.input_scroll = 0;
      } else if !app.search_results.is_empty() {
        app.mode = AppMode::Results;
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Down => {
      if !app.search_results.is_empty() {
        app.mode = AppMode::Results;
      }
    }
    _ => {}
  }
}

fn handle_results_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.trigger_detail();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      let count = app.search_results.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| (i + 1) % count);
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let count = app.search_results.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Char('/') | KeyCode::Esc => {
      app.mode = AppMode::Input;
    }
    _ => {}
  }
}

fn handle_detail_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => {
      app.back_to_results();
    }
    KeyCode::Down | KeyCode::Char('j') => {
      app.detail_scroll = app.detail_scroll.saturating_add(1);
    }
    KeyCode::Up | KeyCode::Char('k') => {
      app.detail_scroll = app.detail_scroll.saturating_sub(1);
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  // --- char_to_byte_index ---

  #[test]
  fn char_to_byte_ascii() {
    assert_eq!(char_to_byte_index("batman", 0), 0);
    assert_eq!(char_to_byte_index("batman", 4), 4);
    assert_eq!(char_to_byte_index("batman", 6), 6); // past end
  }

  #[test]
  fn char_to_byte_multibyte() {
    let s = "où猫"; // o=1 byte, ù=2 bytes, 猫=3 bytes
    assert_eq!(char_to_byte_index(s, 0), 0);
    assert_eq!(char_to_byte_index(s, 1), 1);
    assert_eq!(char_to_byte_index(s, 2), 3);
    assert_eq!(char_to_byte_index(s, 3), 6); // past end
  }

  #[test]
  fn char_to_byte_empty() {
    assert_eq!(char_to_byte_index("", 0), 0);
    assert_eq!(char_to_byte_index("", 9), 0);
  }
}
