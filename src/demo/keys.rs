//! Keyboard shortcuts for demo mode
//!
//! Ctrl+D demo mode, Ctrl+P auto-play, Ctrl+F fullscreen, Ctrl+1/2/3 speed,
//! Space auto-play. Space is only claimed while demo mode is on so that it
//! reaches other handlers otherwise.

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::controller::DemoSpeed;

/// Action derived from a key event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoKey {
    ToggleDemo,
    ToggleAutoPlay,
    ToggleFullscreen,
    SetSpeed(DemoSpeed),
    /// Space; acts as auto-play only when demo mode is on
    Space,
    Quit,
    None,
}

impl DemoKey {
    /// Resolve the action given the current demo mode
    pub fn resolve(self, demo_enabled: bool) -> Self {
        match self {
            DemoKey::Space if demo_enabled => DemoKey::ToggleAutoPlay,
            DemoKey::Space => DemoKey::None,
            other => other,
        }
    }
}

impl From<KeyEvent> for DemoKey {
    fn from(key: KeyEvent) -> Self {
        if key.kind == KeyEventKind::Release {
            return DemoKey::None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Char(c) if ctrl => match c.to_ascii_lowercase() {
                'd' => DemoKey::ToggleDemo,
                'p' => DemoKey::ToggleAutoPlay,
                'f' => DemoKey::ToggleFullscreen,
                '1' => DemoKey::SetSpeed(DemoSpeed::X1),
                '2' => DemoKey::SetSpeed(DemoSpeed::X2),
                '3' => DemoKey::SetSpeed(DemoSpeed::X3),
                'c' => DemoKey::Quit,
                _ => DemoKey::None,
            },
            KeyCode::Char(' ') => DemoKey::Space,
            KeyCode::Char('q') | KeyCode::Esc => DemoKey::Quit,
            _ => DemoKey::None,
        }
    }
}

/// Spawn the terminal key reader. It is registered once per runtime and
/// stops when the receiver is dropped or the handle is aborted.
pub fn spawn_key_reader(tx: mpsc::Sender<KeyEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = EventStream::new();
        while let Some(event) = events.next().await {
            match event {
                Ok(Event::Key(key)) => {
                    if tx.send(key).await.is_err() {
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Key reader stopped: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctrl(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    #[test]
    fn test_ctrl_shortcuts() {
        assert_eq!(DemoKey::from(ctrl('d')), DemoKey::ToggleDemo);
        assert_eq!(DemoKey::from(ctrl('p')), DemoKey::ToggleAutoPlay);
        assert_eq!(DemoKey::from(ctrl('f')), DemoKey::ToggleFullscreen);
        assert_eq!(DemoKey::from(ctrl('2')), DemoKey::SetSpeed(DemoSpeed::X2));
        assert_eq!(DemoKey::from(ctrl('3')), DemoKey::SetSpeed(DemoSpeed::X3));
    }

    #[test]
    fn test_plain_letters_are_ignored() {
        let key = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE);
        assert_eq!(DemoKey::from(key), DemoKey::None);
    }

    #[test]
    fn test_space_only_claimed_in_demo_mode() {
        let space = DemoKey::from(KeyEvent::new(KeyCode::Char(' '), KeyModifiers::NONE));
        assert_eq!(space, DemoKey::Space);
        assert_eq!(space.resolve(true), DemoKey::ToggleAutoPlay);
        assert_eq!(space.resolve(false), DemoKey::None);
        assert_eq!(DemoKey::ToggleDemo.resolve(false), DemoKey::ToggleDemo);
    }
}
