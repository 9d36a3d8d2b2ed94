use crate::error::ToolError;
use crate::features::{run_tool, ToolMessages};
use crate::state::{field_ids, AppState, OutputField};
use crate::ui::{
    to_value_or_text, Button as UiButton, Row as UiRow, Section as UiSection,
    TextArea as UiTextArea,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rust_i18n::t;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonAction {
    Format,
    Minify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base64Action {
    Encode,
    Decode,
}

/// Two-space pretty print. Key order follows the input.
pub fn format_json(input: &str) -> Result<String, ToolError> {
    let value: Value = serde_json::from_str(input).map_err(ToolError::parse)?;
    serde_json::to_string_pretty(&value).map_err(ToolError::parse)
}

pub fn minify_json(input: &str) -> Result<String, ToolError> {
    let value: Value = serde_json::from_str(input).map_err(ToolError::parse)?;
    serde_json::to_string(&value).map_err(ToolError::parse)
}

pub fn encode_base64(input: &str) -> String {
    STANDARD.encode(input.as_bytes())
}

/// Whitespace (line wraps from mail clients, pasted blocks) is ignored.
pub fn decode_base64(input: &str) -> Result<String, ToolError> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ToolError::parse(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|_| ToolError::parse("decoded bytes are not valid UTF-8"))
}

pub fn handle_json_action(state: &mut AppState, action: JsonAction) -> Result<(), ToolError> {
    let input = state.json.input.clone();
    match action {
        JsonAction::Format => run_tool(
            state,
            OutputField::Json,
            &input,
            ToolMessages {
                empty: t!("json.empty").into(),
                success: t!("json.formatted").into(),
                failure: |e| t!("json.error", error = e).into(),
            },
            format_json,
        ),
        JsonAction::Minify => run_tool(
            state,
            OutputField::Json,
            &input,
            ToolMessages {
                empty: t!("json.empty").into(),
                success: t!("json.minified").into(),
                failure: |e| t!("json.error", error = e).into(),
            },
            minify_json,
        ),
    }
}

pub fn handle_json_clear(state: &mut AppState) {
    state.json.clear();
    state.notify_success(t!("json.cleared"));
}

pub fn handle_base64_action(state: &mut AppState, action: Base64Action) -> Result<(), ToolError> {
    let input = state.base64.input.clone();
    match action {
        Base64Action::Encode => run_tool(
            state,
            OutputField::Base64,
            &input,
            ToolMessages {
                empty: t!("base64.empty_encode").into(),
                success: t!("base64.encoded").into(),
                failure: |e| t!("base64.encode_failed", error = e).into(),
            },
            |text| Ok(encode_base64(text)),
        ),
        Base64Action::Decode => run_tool(
            state,
            OutputField::Base64,
            &input,
            ToolMessages {
                empty: t!("base64.empty_decode").into(),
                success: t!("base64.decoded").into(),
                failure: |e| t!("base64.decode_failed", error = e).into(),
            },
            decode_base64,
        ),
    }
}

pub fn handle_base64_clear(state: &mut AppState) {
    state.base64.clear();
    state.notify_success(t!("base64.cleared"));
}

pub fn render_json_panel(state: &AppState) -> Value {
    let title = t!("json.title");
    let hint = t!("json.input_hint");
    let format = t!("json.format");
    let minify = t!("json.minify");
    let clear = t!("common.clear");
    let copy = t!("common.copy");

    let children = vec![
        to_value_or_text(
            UiTextArea::new(field_ids::JSON_INPUT, &state.json.input).hint(&hint),
            "json_input",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(
                    UiButton::new(&format, "json_format").shortcut("Ctrl+Enter"),
                    "json_format",
                ),
                to_value_or_text(UiButton::new(&minify, "json_minify"), "json_minify"),
                to_value_or_text(UiButton::new(&clear, "json_clear"), "json_clear"),
            ]),
            "json_buttons",
        ),
        to_value_or_text(
            UiTextArea::new(field_ids::JSON_OUTPUT, &state.json.output).readonly(true),
            "json_output",
        ),
        to_value_or_text(
            UiButton::new(&copy, "copy_to_clipboard").target(field_ids::JSON_OUTPUT),
            "json_copy",
        ),
    ];
    to_value_or_text(
        UiSection::new("json-formatter", &title, children).icon("{ }"),
        "json_panel",
    )
}

pub fn render_base64_panel(state: &AppState) -> Value {
    let title = t!("base64.title");
    let hint = t!("base64.input_hint");
    let encode = t!("base64.encode");
    let decode = t!("base64.decode");
    let clear = t!("common.clear");
    let copy = t!("common.copy");

    let children = vec![
        to_value_or_text(
            UiTextArea::new(field_ids::BASE64_INPUT, &state.base64.input).hint(&hint),
            "base64_input",
        ),
        to_value_or_text(
            UiRow::new(vec![
                to_value_or_text(
                    UiButton::new(&encode, "base64_encode").shortcut("Ctrl+Shift+E"),
                    "base64_encode",
                ),
                to_value_or_text(
                    UiButton::new(&decode, "base64_decode").shortcut("Ctrl+Shift+D"),
                    "base64_decode",
                ),
                to_value_or_text(UiButton::new(&clear, "base64_clear"), "base64_clear"),
            ]),
            "base64_buttons",
        ),
        to_value_or_text(
            UiTextArea::new(field_ids::BASE64_OUTPUT, &state.base64.output).readonly(true),
            "base64_output",
        ),
        to_value_or_text(
            UiButton::new(&copy, "copy_to_clipboard").target(field_ids::BASE64_OUTPUT),
            "base64_copy",
        ),
    ];
    to_value_or_text(
        UiSection::new("base64-converter", &title, children).icon("🔐"),
        "base64_panel",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_uses_two_space_indent_and_keeps_key_order() {
        let out = format_json(r#"{"b":1,"a":[true,null]}"#).unwrap();
        assert_eq!(out, "{\n  \"b\": 1,\n  \"a\": [\n    true,\n    null\n  ]\n}");
    }

    #[test]
    fn minify_of_format_matches_original_value() {
        let src = r#" { "name" : "x", "list" : [1, 2.5, "y"], "nested": {"k": false} } "#;
        let round = minify_json(&format_json(src).unwrap()).unwrap();
        let a: Value = serde_json::from_str(&round).unwrap();
        let b: Value = serde_json::from_str(src).unwrap();
        assert_eq!(a, b);
        assert!(!round.contains(' '));
    }

    #[test]
    fn malformed_json_reports_parser_message() {
        let err = format_json("{").unwrap_err();
        assert!(matches!(err, ToolError::Parse(ref msg) if msg.contains("EOF")));
    }

    #[test]
    fn base64_handles_multibyte_text() {
        for s in ["hello", "héllo wörld", "二维码", "emoji 🚀"] {
            assert_eq!(decode_base64(&encode_base64(s)).unwrap(), s);
        }
        assert_eq!(encode_base64("hi"), "aGk=");
    }

    #[test]
    fn base64_decode_ignores_whitespace() {
        assert_eq!(decode_base64("aGVs\nbG8=\r\n").unwrap(), "hello");
    }

    #[test]
    fn base64_decode_rejects_invalid_input() {
        assert!(decode_base64("not base64!").is_err());
        // 0xFF 0xFE is not UTF-8.
        assert!(decode_base64("//4=").is_err());
    }

    #[test]
    fn empty_input_leaves_output_untouched() {
        let mut state = AppState::new();
        state.json.input = "   ".into();
        state.json.output = "previous".into();
        let err = handle_json_action(&mut state, JsonAction::Format).unwrap_err();
        assert!(matches!(err, ToolError::EmptyInput(_)));
        assert_eq!(state.json.output, "previous");
        assert_eq!(state.messages.current().unwrap().text, "Please enter JSON data");
    }

    #[test]
    fn parse_failure_clears_output_and_keeps_input() {
        let mut state = AppState::new();
        state.json.input = "{".into();
        state.json.output = "stale".into();
        assert!(handle_json_action(&mut state, JsonAction::Format).is_err());
        assert_eq!(state.json.input, "{");
        assert!(state.json.output.is_empty());
        let msg = state.messages.current().unwrap();
        assert!(msg.text.starts_with("JSON format error: "), "got {}", msg.text);
    }
}
