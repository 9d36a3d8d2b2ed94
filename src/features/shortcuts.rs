use crate::state::field_ids;

/// A key press as reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub ctrl: bool,
    pub shift: bool,
    /// DOM id of the focused element, if any.
    pub focus: Option<String>,
}

/// Maps a key press to the action it triggers. Ctrl+Enter only formats JSON
/// while the JSON input has focus; the Ctrl+Shift chords work anywhere.
pub fn shortcut_action(press: &KeyPress) -> Option<&'static str> {
    if !press.ctrl {
        return None;
    }
    if press.key == "Enter" {
        return (press.focus.as_deref() == Some(field_ids::JSON_INPUT)).then_some("json_format");
    }
    if !press.shift {
        return None;
    }
    match press.key.to_ascii_uppercase().as_str() {
        "E" => Some("base64_encode"),
        "D" => Some("base64_decode"),
        "Q" => Some("qr_generate"),
        "B" => Some("code_beautify"),
        "R" => Some("regex_test"),
        _ => None,
    }
}
