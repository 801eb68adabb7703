use crate::transition::Transition;

pub const KEY_ARROW_UP: u32 = 38;
pub const KEY_ARROW_DOWN: u32 = 40;

/// A request to move through the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Next,
    Previous,
}

impl Navigation {
    /// Arrow up goes forward, arrow down goes back.
    pub fn from_key_code(code: u32) -> Option<Self> {
        match code {
            KEY_ARROW_UP => Some(Navigation::Next),
            KEY_ARROW_DOWN => Some(Navigation::Previous),
            _ => None,
        }
    }

    /// Pan gesture direction as reported by the gesture recognizer (`"panup"`, `"pandown"`).
    pub fn from_pan(direction: &str) -> Option<Self> {
        match direction {
            "panup" => Some(Navigation::Next),
            "pandown" => Some(Navigation::Previous),
            _ => None,
        }
    }

    /// Returns whether a transition started.
    pub fn apply(self, transition: &mut Transition) -> bool {
        match self {
            Navigation::Next => transition.next(),
            Navigation::Previous => transition.previous(),
        }
    }
}
