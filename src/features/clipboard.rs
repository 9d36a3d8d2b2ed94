use crate::error::ToolError;
use crate::state::{AppState, Effect};
use rust_i18n::t;

/// Asks the host to copy the value of `target`. Blank fields are refused
/// without touching the clipboard.
pub fn handle_copy(state: &mut AppState, target: Option<&str>) -> Result<(), ToolError> {
    let text = target
        .and_then(|id| state.field_value(id))
        .filter(|value| !value.trim().is_empty())
        .map(str::to_string);
    match text {
        Some(text) => {
            state.push_effect(Effect::CopyText { text });
            Ok(())
        }
        None => {
            state.notify_error(t!("common.nothing_to_copy"));
            Err(ToolError::EmptyInput("clipboard"))
        }
    }
}

/// Host answer for a `CopyText` effect.
pub fn handle_copy_result(state: &mut AppState, ok: bool, error: Option<&str>) {
    if ok {
        state.notify_success(t!("common.copied"));
    } else {
        log::warn!("clipboard write failed: {}", error.unwrap_or("unknown"));
        state.notify_error(t!("common.copy_failed"));
    }
}
