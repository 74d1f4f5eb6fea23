//! Terminal events to viewer events.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use stackops_scrollback::{ViewState, ViewerEvent};

const HORIZONTAL_STEP: usize = 8;

pub fn map_terminal_event(event: &Event, state: ViewState) -> Option<ViewerEvent> {
    match event {
        Event::Resize(width, height) => Some(ViewerEvent::Resize {
            width: *width,
            height: *height,
        }),
        Event::Key(key) => {
            if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                return None;
            }
            match state {
                ViewState::List => map_list_key(key),
                ViewState::Viewing => map_viewing_key(key),
            }
        }
        _ => None,
    }
}

fn map_list_key(key: &KeyEvent) -> Option<ViewerEvent> {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(ViewerEvent::MoveSelection(-1)),
        KeyCode::Down | KeyCode::Char('j') => Some(ViewerEvent::MoveSelection(1)),
        KeyCode::PageUp => Some(ViewerEvent::MoveSelection(-10)),
        KeyCode::PageDown => Some(ViewerEvent::MoveSelection(10)),
        KeyCode::Enter => Some(ViewerEvent::SelectHighlighted),
        KeyCode::Char('x') => Some(ViewerEvent::DismissError),
        KeyCode::Char('q') | KeyCode::Esc => Some(ViewerEvent::Quit),
        _ => None,
    }
}

fn map_viewing_key(key: &KeyEvent) -> Option<ViewerEvent> {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(ViewerEvent::ScrollUp(1)),
        KeyCode::Down | KeyCode::Char('j') => Some(ViewerEvent::ScrollDown(1)),
        KeyCode::PageUp | KeyCode::Char('b') => Some(ViewerEvent::PageOlder),
        KeyCode::PageDown | KeyCode::Char(' ') => Some(ViewerEvent::PageNewer),
        KeyCode::Home | KeyCode::Char('g') => Some(ViewerEvent::ScrollToTop),
        KeyCode::End | KeyCode::Char('G') => Some(ViewerEvent::ScrollToBottom),
        KeyCode::Left | KeyCode::Char('h') => Some(ViewerEvent::ScrollLeft(HORIZONTAL_STEP)),
        KeyCode::Right | KeyCode::Char('l') => Some(ViewerEvent::ScrollRight(HORIZONTAL_STEP)),
        KeyCode::Char('f') => Some(ViewerEvent::ToggleFollow),
        KeyCode::Char('m') => Some(ViewerEvent::ToggleMetadata),
        KeyCode::Char('x') => Some(ViewerEvent::DismissError),
        KeyCode::Esc | KeyCode::Backspace => Some(ViewerEvent::Back),
        KeyCode::Char('q') => Some(ViewerEvent::Quit),
        _ => None,
    }
}

pub fn is_interrupt(event: &Event) -> bool {
    let Event::Key(key) = event else {
        return false;
    };
    if !matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
        return false;
    }
    matches!(key.code, KeyCode::Char('c')) && key.modifiers.contains(KeyModifiers::CONTROL)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn same_key_maps_per_state() {
        assert_eq!(
            map_terminal_event(&press(KeyCode::Esc), ViewState::Viewing),
            Some(ViewerEvent::Back)
        );
        assert_eq!(
            map_terminal_event(&press(KeyCode::Esc), ViewState::List),
            Some(ViewerEvent::Quit)
        );
        assert_eq!(
            map_terminal_event(&press(KeyCode::Down), ViewState::List),
            Some(ViewerEvent::MoveSelection(1))
        );
        assert_eq!(
            map_terminal_event(&press(KeyCode::Down), ViewState::Viewing),
            Some(ViewerEvent::ScrollDown(1))
        );
    }

    #[test]
    fn paging_and_toggles() {
        assert_eq!(
            map_terminal_event(&press(KeyCode::PageUp), ViewState::Viewing),
            Some(ViewerEvent::PageOlder)
        );
        assert_eq!(
            map_terminal_event(&press(KeyCode::Char('f')), ViewState::Viewing),
            Some(ViewerEvent::ToggleFollow)
        );
        assert_eq!(
            map_terminal_event(&press(KeyCode::Right), ViewState::Viewing),
            Some(ViewerEvent::ScrollRight(HORIZONTAL_STEP))
        );
        assert_eq!(map_terminal_event(&press(KeyCode::Tab), ViewState::Viewing), None);
    }

    #[test]
    fn resize_and_release_events() {
        assert_eq!(
            map_terminal_event(&Event::Resize(120, 40), ViewState::List),
            Some(ViewerEvent::Resize {
                width: 120,
                height: 40
            })
        );
        let mut release = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(map_terminal_event(&Event::Key(release), ViewState::List), None);
    }

    #[test]
    fn ctrl_c_is_interrupt() {
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(is_interrupt(&ctrl_c));
        assert!(!is_interrupt(&press(KeyCode::Char('c'))));
    }
}
