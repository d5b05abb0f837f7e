//! Unit tests for the host input mapping

use super::*;

fn character(text: &str) -> Key {
    Key::Character(text.into())
}

// ============================================================================
// Key mapping
// ============================================================================

#[test]
fn test_button_for_key() {
    assert_eq!(button_for_key(&character("+")), Some(Buttons::PLUS));
    assert_eq!(button_for_key(&Key::Named(NamedKey::Escape)), Some(Buttons::PLUS));
    assert_eq!(button_for_key(&character("-")), Some(Buttons::MINUS));
    assert_eq!(button_for_key(&character("a")), None);
    assert_eq!(button_for_key(&Key::Named(NamedKey::Enter)), None);
}

#[test]
fn test_mode_toggle_key() {
    assert!(is_mode_toggle(&character("d")));
    assert!(is_mode_toggle(&character("D")));
    assert!(!is_mode_toggle(&character("-")));
}

#[test]
fn test_toggled_mode() {
    assert_eq!(toggled(OperationMode::Handheld), OperationMode::Console);
    assert_eq!(toggled(OperationMode::Console), OperationMode::Handheld);
}

// ============================================================================
// KeyTracker
// ============================================================================

#[test]
fn test_press_reported_once() {
    let mut keys = KeyTracker::default();
    keys.handle_key(&character("+"), ElementState::Pressed, false);

    let first = keys.take_input();
    assert!(first.pressed(Buttons::PLUS));
    assert!(first.is_held(Buttons::PLUS));

    let second = keys.take_input();
    assert!(!second.pressed(Buttons::PLUS));
    assert!(second.is_held(Buttons::PLUS));
}

#[test]
fn test_repeat_does_not_press_again() {
    let mut keys = KeyTracker::default();
    keys.handle_key(&character("-"), ElementState::Pressed, false);
    keys.take_input();

    keys.handle_key(&character("-"), ElementState::Pressed, true);
    let input = keys.take_input();
    assert!(!input.pressed(Buttons::MINUS));
    assert!(input.is_held(Buttons::MINUS));
}

#[test]
fn test_release_clears_held() {
    let mut keys = KeyTracker::default();
    keys.handle_key(&character("-"), ElementState::Pressed, false);
    keys.handle_key(&character("-"), ElementState::Released, false);

    let input = keys.take_input();
    // The press still counts for the frame it happened in
    assert!(input.pressed(Buttons::MINUS));
    assert!(!input.is_held(Buttons::MINUS));
}

#[test]
fn test_release_all() {
    let mut keys = KeyTracker::default();
    keys.handle_key(&character("-"), ElementState::Pressed, false);
    keys.handle_key(&Key::Named(NamedKey::Escape), ElementState::Pressed, false);
    keys.release_all();

    let input = keys.take_input();
    assert_eq!(input.held, Buttons::empty());
}

#[test]
fn test_mode_toggle_pairs_cancel() {
    let mut keys = KeyTracker::default();
    keys.handle_key(&character("d"), ElementState::Pressed, false);
    assert!(keys.take_mode_toggle());
    assert!(!keys.take_mode_toggle());

    keys.handle_key(&character("d"), ElementState::Pressed, false);
    keys.handle_key(&character("d"), ElementState::Released, false);
    keys.handle_key(&character("d"), ElementState::Pressed, true);
    keys.handle_key(&character("d"), ElementState::Pressed, false);
    assert!(!keys.take_mode_toggle());
}

#[test]
fn test_mode_toggle_is_not_a_button() {
    let mut keys = KeyTracker::default();
    keys.handle_key(&character("d"), ElementState::Pressed, false);
    let input = keys.take_input();
    assert_eq!(input.down, Buttons::empty());
    assert_eq!(input.held, Buttons::empty());
}
