use serde::Serialize;
use serde_json::{json, Value};

/// Serializes a node, falling back to an inline error text so a single bad
/// node never blanks the whole page.
pub fn to_value_or_text<T: Serialize>(value: T, context: &str) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        json!({
            "type": "Text",
            "text": format!("{context}_serialize_error:{e}")
        })
    })
}

/// Rows needed to show `text` without scrolling.
pub fn auto_rows(text: &str) -> u32 {
    let lines = text.lines().count().max(1) as u32;
    lines.clamp(3, 40)
}

#[derive(Serialize)]
pub struct Text<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monospace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_description: Option<&'a str>,
}

impl<'a> Text<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            kind: "Text",
            text,
            size: None,
            monospace: None,
            content_description: None,
        }
    }

    pub fn size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn monospace(mut self, mono: bool) -> Self {
        self.monospace = Some(mono);
        self
    }

    pub fn content_description(mut self, cd: &'a str) -> Self {
        self.content_description = Some(cd);
        self
    }
}

#[derive(Serialize)]
pub struct Button<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'a str,
    pub action: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortcut: Option<&'a str>,
}

impl<'a> Button<'a> {
    pub fn new(text: &'a str, action: &'a str) -> Self {
        Self {
            kind: "Button",
            text,
            action,
            id: None,
            class: None,
            visible: None,
            target: None,
            shortcut: None,
        }
    }

    pub fn id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    /// The `.btn-download` affordance of a panel: hidden until the panel has
    /// something to download.
    pub fn download(mut self, visible: bool) -> Self {
        self.class = Some("btn-download");
        self.visible = Some(visible);
        self
    }

    /// Field id the action operates on (e.g. copy target).
    pub fn target(mut self, target: &'a str) -> Self {
        self.target = Some(target);
        self
    }

    pub fn shortcut(mut self, shortcut: &'a str) -> Self {
        self.shortcut = Some(shortcut);
        self
    }
}

#[derive(Serialize)]
pub struct Column<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
    pub children: Vec<Value>,
}

impl<'a> Column<'a> {
    pub fn new(children: Vec<Value>) -> Self {
        Self {
            kind: "Column",
            id: None,
            padding: None,
            children,
        }
    }

    pub fn id(mut self, id: &'a str) -> Self {
        self.id = Some(id);
        self
    }

    pub fn padding(mut self, padding: u32) -> Self {
        self.padding = Some(padding);
        self
    }
}

#[derive(Serialize)]
pub struct Row {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub children: Vec<Value>,
}

impl Row {
    pub fn new(children: Vec<Value>) -> Self {
        Self {
            kind: "Row",
            children,
        }
    }
}

/// A tool panel (`<section class="tool-card" id=...>`).
#[derive(Serialize)]
pub struct Section<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'a str,
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'a str>,
    pub children: Vec<Value>,
}

impl<'a> Section<'a> {
    pub fn new(id: &'a str, title: &'a str, children: Vec<Value>) -> Self {
        Self {
            kind: "Section",
            id,
            title,
            icon: None,
            children,
        }
    }

    pub fn icon(mut self, icon: &'a str) -> Self {
        self.icon = Some(icon);
        self
    }
}

/// Styled box; used for the degraded QR placeholder.
#[derive(Serialize)]
pub struct Card<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<&'a str>,
    pub children: Vec<Value>,
}

impl<'a> Card<'a> {
    pub fn new(children: Vec<Value>) -> Self {
        Self {
            kind: "Card",
            title: None,
            style: None,
            children,
        }
    }

    pub fn title(mut self, title: &'a str) -> Self {
        self.title = Some(title);
        self
    }

    pub fn style(mut self, style: &'a str) -> Self {
        self.style = Some(style);
        self
    }
}

#[derive(Serialize)]
pub struct TextInput<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_on_submit: Option<&'a str>,
}

impl<'a> TextInput<'a> {
    pub fn new(id: &'a str, text: &'a str) -> Self {
        Self {
            kind: "TextInput",
            id,
            text,
            hint: None,
            input_type: None,
            action_on_submit: None,
        }
    }

    pub fn hint(mut self, hint: &'a str) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn input_type(mut self, input_type: &'a str) -> Self {
        self.input_type = Some(input_type);
        self
    }

    pub fn action_on_submit(mut self, action: &'a str) -> Self {
        self.action_on_submit = Some(action);
        self
    }
}

#[derive(Serialize)]
pub struct TextArea<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'a str,
    pub text: &'a str,
    pub rows: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
}

impl<'a> TextArea<'a> {
    pub fn new(id: &'a str, text: &'a str) -> Self {
        Self {
            kind: "TextArea",
            id,
            text,
            rows: auto_rows(text),
            hint: None,
            readonly: None,
        }
    }

    pub fn hint(mut self, hint: &'a str) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }
}

#[derive(Serialize)]
pub struct Checkbox<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'a str,
    pub text: &'a str,
    pub checked: bool,
}

impl<'a> Checkbox<'a> {
    pub fn new(id: &'a str, text: &'a str, checked: bool) -> Self {
        Self {
            kind: "Checkbox",
            id,
            text,
            checked,
        }
    }
}

#[derive(Serialize)]
pub struct SelectOption<'a> {
    pub value: &'a str,
    pub label: &'a str,
}

#[derive(Serialize)]
pub struct Select<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: &'a str,
    pub selected: &'a str,
    pub options: Vec<SelectOption<'a>>,
}

impl<'a> Select<'a> {
    pub fn new(id: &'a str, selected: &'a str, options: &[(&'a str, &'a str)]) -> Self {
        Self {
            kind: "Select",
            id,
            selected,
            options: options
                .iter()
                .map(|&(value, label)| SelectOption { value, label })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ImageBase64<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mime: &'a str,
    pub base64: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_description: Option<&'a str>,
}

impl<'a> ImageBase64<'a> {
    pub fn new(mime: &'a str, base64: &'a str) -> Self {
        Self {
            kind: "ImageBase64",
            mime,
            base64,
            width: None,
            height: None,
            content_description: None,
        }
    }

    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn content_description(mut self, cd: &'a str) -> Self {
        self.content_description = Some(cd);
        self
    }
}

/// The single feedback banner, always the first node of the page.
#[derive(Serialize)]
pub struct Message<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub class: String,
    pub text: &'a str,
    pub expires_at_ms: u64,
}

impl<'a> Message<'a> {
    pub fn new(text: &'a str, level: &str, expires_at_ms: u64) -> Self {
        Self {
            kind: "Message",
            class: format!("message {level}"),
            text,
            expires_at_ms,
        }
    }
}

#[derive(Serialize)]
pub struct Progress<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
}

impl<'a> Progress<'a> {
    pub fn new() -> Self {
        Self {
            kind: "Progress",
            text: None,
            fraction: None,
        }
    }

    pub fn text(mut self, text: &'a str) -> Self {
        self.text = Some(text);
        self
    }

    pub fn fraction(mut self, fraction: f64) -> Self {
        self.fraction = Some(fraction.clamp(0.0, 1.0));
        self
    }
}
