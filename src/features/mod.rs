pub mod capabilities;
pub mod clipboard;
pub mod code_tools;
pub mod image_convert;
pub mod message;
pub mod persistence;
pub mod qr;
pub mod regex_tester;
pub mod shortcuts;
pub mod storage;
pub mod text_tools;
pub mod video_gif;

use crate::error::ToolError;
use crate::state::{AppState, OutputField};
use crate::ui::{to_value_or_text, Button as UiButton, Column as UiColumn, Section as UiSection, Text as UiText};
use serde_json::Value;

/// A tool entry for the page header.
pub struct Feature {
    pub id: &'static str,
    pub name: &'static str,
    pub category: &'static str,
    pub anchor: &'static str,
    pub description: &'static str,
}

pub fn feature_catalog() -> Vec<Feature> {
    vec![
        Feature {
            id: "json",
            name: "JSON Formatter",
            category: "📝 Text",
            anchor: "json-formatter",
            description: "Format, minify and validate JSON",
        },
        Feature {
            id: "base64",
            name: "Base64 Encoder/Decoder",
            category: "📝 Text",
            anchor: "base64-converter",
            description: "Encode text to Base64 and back",
        },
        Feature {
            id: "qr",
            name: "QR Code Generator",
            category: "🖼️ Media",
            anchor: "qr-generator",
            description: "Turn text or URLs into QR codes",
        },
        Feature {
            id: "code",
            name: "Code Beautifier",
            category: "💻 Developer",
            anchor: "code-formatter",
            description: "Beautify or minify JavaScript, CSS, HTML, JSON and XML",
        },
        Feature {
            id: "regex",
            name: "Regex Tester",
            category: "💻 Developer",
            anchor: "regex-tester",
            description: "Try patterns, flags and capture groups",
        },
        Feature {
            id: "image",
            name: "Image Converter",
            category: "🖼️ Media",
            anchor: "image-converter",
            description: "Convert between PNG, JPEG and WebP",
        },
        Feature {
            id: "gif",
            name: "Video to GIF",
            category: "🖼️ Media",
            anchor: "video-gif",
            description: "Turn a short clip into an animated GIF",
        },
    ]
}

/// Page header: the tools grouped by category, each linking to its panel.
pub fn render_menu(catalog: &[Feature]) -> Value {
    use std::collections::BTreeMap;

    let title = rust_i18n::t!("app.title");
    let subtitle = rust_i18n::t!("app.subtitle");
    let mut children = vec![
        to_value_or_text(UiText::new(&title).size(24.0), "menu_title"),
        to_value_or_text(UiText::new(&subtitle).size(14.0), "menu_subtitle"),
    ];

    let mut grouped: BTreeMap<&str, Vec<&Feature>> = BTreeMap::new();
    for feature in catalog {
        grouped.entry(feature.category).or_default().push(feature);
    }

    for (category, feats) in grouped {
        let links: Vec<Value> = feats
            .iter()
            .map(|f| {
                let label = format!("{} – {}", f.name, f.description);
                let action = format!("#{}", f.anchor);
                to_value_or_text(UiButton::new(&label, &action).id(f.id), "menu_link")
            })
            .collect();
        let mut section = UiSection::new(category, category, links);
        if let Some(first) = category.split_whitespace().next() {
            if first.chars().all(|c| !c.is_ascii_alphanumeric()) {
                section = section.icon(first);
            }
        }
        children.push(to_value_or_text(section, "menu_section"));
    }

    to_value_or_text(UiColumn::new(children).id("tool-index"), "menu")
}

/// Texts a tool run reports through the message channel.
pub(crate) struct ToolMessages {
    pub empty: String,
    pub success: String,
    pub failure: fn(&str) -> String,
}

/// Shared shape of the text tools: trimmed input, one transform, output
/// written on success and cleared on failure. The input is never touched.
pub(crate) fn run_tool<F>(
    state: &mut AppState,
    field: OutputField,
    raw_input: &str,
    messages: ToolMessages,
    transform: F,
) -> Result<(), ToolError>
where
    F: FnOnce(&str) -> Result<String, ToolError>,
{
    let input = raw_input.trim();
    if input.is_empty() {
        state.notify_error(messages.empty);
        return Err(ToolError::EmptyInput(field.id()));
    }

    match transform(input) {
        Ok(output) => {
            *state.output_mut(field) = output;
            state.notify_success(messages.success);
            Ok(())
        }
        Err(err) => {
            state.output_mut(field).clear();
            state.notify_error((messages.failure)(&err.to_string()));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::message::MessageKind;

    fn messages() -> ToolMessages {
        ToolMessages {
            empty: "empty".into(),
            success: "done".into(),
            failure: |e| format!("failed: {e}"),
        }
    }

    #[test]
    fn run_tool_passes_trimmed_input() {
        let mut state = AppState::new();
        run_tool(&mut state, OutputField::Code, "  abc \n", messages(), |s| {
            Ok(format!("[{s}]"))
        })
        .unwrap();
        assert_eq!(state.code.output, "[abc]");
        assert_eq!(state.messages.current().unwrap().kind, MessageKind::Success);
    }

    #[test]
    fn run_tool_failure_interpolates_delegate_message() {
        let mut state = AppState::new();
        state.regex.output = "old".into();
        let result = run_tool(&mut state, OutputField::Regex, "x", messages(), |_| {
            Err(ToolError::delegate("boom"))
        });
        assert_eq!(result, Err(ToolError::Delegate("boom".into())));
        assert!(state.regex.output.is_empty());
        let msg = state.messages.current().unwrap();
        assert_eq!(msg.text, "failed: boom");
        assert_eq!(msg.kind, MessageKind::Error);
    }

    #[test]
    fn catalog_anchors_are_unique() {
        let catalog = feature_catalog();
        let mut anchors: Vec<_> = catalog.iter().map(|f| f.anchor).collect();
        anchors.sort_unstable();
        anchors.dedup();
        assert_eq!(anchors.len(), catalog.len());
    }

    #[test]
    fn menu_groups_by_category() {
        let menu = render_menu(&feature_catalog());
        let sections: Vec<_> = menu["children"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|n| n["type"] == "Section")
            .collect();
        assert_eq!(sections.len(), 3);
    }
}
