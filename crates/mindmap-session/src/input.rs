/// Keys the session reacts to. Printable text arrives through [`Key::Char`]
/// or directly via `Session::type_char`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Tab,
    Delete,
    Backspace,
    Escape,
    Plus,
    Minus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    /// Ctrl, or Cmd on macOS.
    pub command: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        shift: false,
        command: false,
    };
    pub const SHIFT: Self = Self {
        shift: true,
        command: false,
    };
    pub const COMMAND: Self = Self {
        shift: false,
        command: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    /// Selects and drags.
    Primary,
    /// Draws a new parent/child connection.
    Secondary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    Text(String),
    /// Raw encoded image file bytes (PNG, JPEG, ...).
    Image(Vec<u8>),
}
