use crate::application::modal::{UiAction, ViewBindings};
use crate::error::Result;

/// Maps one line of user input onto a modal action.
pub fn parse_command(line: &str) -> Option<UiAction> {
    match line.trim().to_ascii_lowercase().as_str() {
        "c" | "close" | "q" | "quit" => Some(UiAction::Close),
        "y" | "yes" => Some(UiAction::ConfirmCancel),
        "n" | "no" | "resume" => Some(UiAction::Resume),
        "r" | "rerender" => Some(UiAction::Rerender),
        "d" | "download" => Some(UiAction::Download),
        _ => None,
    }
}

/// Applies a line of input to the view currently on screen.
///
/// Returns `Ok(false)` when the line is not a command or nothing is mounted.
pub fn apply_line(line: &str, bindings: Option<&ViewBindings>) -> Result<bool> {
    match (parse_command(line), bindings) {
        (Some(action), Some(bindings)) => bindings.dispatch(action).map(|_| true),
        _ => Ok(false),
    }
}
